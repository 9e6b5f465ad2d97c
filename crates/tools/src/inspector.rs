//! Filesystem-backed repository inspection tools

use async_trait::async_trait;
use regex::Regex;
use repoagent_core::config::AnalysisConfig;
use repoagent_core::error::{Error, Result};
use repoagent_core::facts::{
    Dependency, DirectoryEntry, ModuleInfo, SourceExcerpt, Symbol, SymbolKind,
    VerificationOutputs,
};
use repoagent_core::services::RepoInspector;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use twox_hash::XxHash3_128;

/// Directory names never descended into
const IGNORED_DIRS: &[&str] = &[
    "target",
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    ".pytest_cache",
    ".mypy_cache",
];

/// Extensions treated as source code for reads, symbols, and fingerprinting
const SOURCE_EXTENSIONS: &[&str] = &["rs", "py", "js", "ts", "go", "java"];

/// Maximum lines included in one source excerpt
const MAX_EXCERPT_LINES: usize = 60;

/// Maximum files sampled for the content fingerprint
const MAX_FINGERPRINT_FILES: usize = 512;

/// Repository-introspection tools backed by the local filesystem
pub struct FsRepoInspector {
    root: PathBuf,
    root_str: String,
    config: AnalysisConfig,
}

impl FsRepoInspector {
    pub fn new(root: impl Into<PathBuf>, config: AnalysisConfig) -> Self {
        let root = root.into();
        let root_str = root.to_string_lossy().to_string();
        Self {
            root,
            root_str,
            config,
        }
    }

    fn is_ignored(name: &str) -> bool {
        IGNORED_DIRS.contains(&name) || (name.starts_with('.') && name != ".")
    }

    fn is_source_file(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| SOURCE_EXTENSIONS.contains(&e))
            .unwrap_or(false)
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }

    /// Collect source files under the root, sorted for determinism
    fn collect_source_files(&self, limit: usize) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries: Vec<_> = std::fs::read_dir(&dir)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .collect();
            entries.sort();
            for path in entries {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                if path.is_dir() {
                    if !Self::is_ignored(&name) {
                        stack.push(path);
                    }
                } else if Self::is_source_file(&path) {
                    files.push(path);
                    if files.len() >= limit {
                        return Ok(files);
                    }
                }
            }
        }
        Ok(files)
    }

    fn scan_entry(&self, path: &Path, depth: usize) -> Option<DirectoryEntry> {
        let name = path.file_name()?.to_string_lossy().to_string();
        // Ignore rules never apply to the scan root itself
        if depth > 0 && Self::is_ignored(&name) {
            return None;
        }
        if path.is_file() {
            let size = path.metadata().map(|m| m.len()).unwrap_or(0);
            return Some(DirectoryEntry {
                name,
                is_dir: false,
                size,
                children: vec![],
            });
        }
        let mut children = Vec::new();
        if depth < self.config.max_scan_depth {
            if let Ok(entries) = std::fs::read_dir(path) {
                let mut paths: Vec<_> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
                paths.sort();
                for child in paths {
                    if let Some(entry) = self.scan_entry(&child, depth + 1) {
                        children.push(entry);
                    }
                }
            }
        }
        Some(DirectoryEntry {
            name,
            is_dir: true,
            size: 0,
            children,
        })
    }

    fn dependencies_from_cargo_toml(&self, manifest_path: &Path) -> Result<Vec<Dependency>> {
        let content = std::fs::read_to_string(manifest_path)?;
        let cargo: toml::Value = content
            .parse()
            .map_err(|e| Error::tool("dependency_extract", format!("{e}")))?;
        let manifest_name = self.relative(manifest_path);
        let mut deps = Vec::new();
        for table_name in ["dependencies", "workspace.dependencies"] {
            let table = table_name
                .split('.')
                .try_fold(&cargo, |value, key| value.get(key))
                .and_then(|v| v.as_table());
            let Some(table) = table else { continue };
            for (name, value) in table {
                let version = match value {
                    toml::Value::String(v) => Some(v.clone()),
                    toml::Value::Table(t) => t
                        .get("version")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    _ => None,
                };
                deps.push(Dependency {
                    name: name.clone(),
                    version,
                    manifest: manifest_name.clone(),
                });
            }
        }
        deps.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(deps)
    }

    fn dependencies_from_requirements(&self, path: &Path) -> Result<Vec<Dependency>> {
        let raw = std::fs::read_to_string(path)?;
        let manifest_name = self.relative(path);
        let deps = raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('-'))
            .map(|line| {
                // name==1.2.3, name~=1.2, name>=1.0 or bare name
                let split_at = line
                    .find(|c| ['=', '~', '>', '<', '!'].contains(&c))
                    .unwrap_or(line.len());
                let name = line[..split_at].trim().to_string();
                let version = line[split_at..]
                    .trim_start_matches(|c| ['=', '~', '>', '<', '!'].contains(&c))
                    .trim();
                Dependency {
                    name,
                    version: (!version.is_empty()).then(|| version.to_string()),
                    manifest: manifest_name.clone(),
                }
            })
            .filter(|d| !d.name.is_empty())
            .collect();
        Ok(deps)
    }

    fn symbols_in_file(&self, path: &Path, patterns: &SymbolPatterns) -> Vec<Symbol> {
        let Ok(content) = std::fs::read_to_string(path) else {
            return vec![];
        };
        let file = self.relative(path);
        let mut symbols = Vec::new();
        let mut pending_test_attr = false;
        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            if patterns.rust_test_attr.is_match(line) {
                pending_test_attr = true;
                continue;
            }
            if let Some(caps) = patterns.type_def.captures(line) {
                symbols.push(Symbol {
                    kind: SymbolKind::Class,
                    name: caps[1].to_string(),
                    file: file.clone(),
                    line: line_no,
                });
                pending_test_attr = false;
            } else if let Some(caps) = patterns.function_def.captures(line) {
                let name = caps[1].to_string();
                let kind = if pending_test_attr || name.starts_with("test_") {
                    SymbolKind::Test
                } else {
                    SymbolKind::Function
                };
                symbols.push(Symbol {
                    kind,
                    name,
                    file: file.clone(),
                    line: line_no,
                });
                pending_test_attr = false;
            } else if !line.trim().is_empty() && !line.trim_start().starts_with("//") {
                pending_test_attr = false;
            }
        }
        symbols
    }

    fn count_test_files(&self) -> Result<u32> {
        let files = self.collect_source_files(4096)?;
        let count = files
            .iter()
            .filter(|p| {
                let name = p
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let in_tests_dir = p
                    .components()
                    .any(|c| c.as_os_str() == "tests" || c.as_os_str() == "test");
                name.starts_with("test_") || name.ends_with("_test.rs") || in_tests_dir
            })
            .count();
        Ok(count as u32)
    }
}

struct SymbolPatterns {
    type_def: Regex,
    function_def: Regex,
    rust_test_attr: Regex,
}

impl SymbolPatterns {
    fn compile() -> Result<Self> {
        let build = |p: &str| {
            Regex::new(p).map_err(|e| Error::tool("symbol_extract", format!("bad pattern: {e}")))
        };
        Ok(Self {
            type_def: build(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait|class)\s+([A-Za-z_][A-Za-z0-9_]*)")?,
            function_def: build(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:fn|def)\s+([A-Za-z_][A-Za-z0-9_]*)")?,
            rust_test_attr: build(r"^\s*#\[(?:tokio::)?test\]")?,
        })
    }
}

#[async_trait]
impl RepoInspector for FsRepoInspector {
    fn repo_path(&self) -> &str {
        &self.root_str
    }

    async fn fingerprint(&self) -> Result<String> {
        let files = self.collect_source_files(MAX_FINGERPRINT_FILES)?;
        let mut key = String::new();
        for path in &files {
            let meta = path.metadata()?;
            let mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);
            key.push_str(&format!("{}:{}:{}\n", self.relative(path), mtime, meta.len()));
        }
        Ok(format!("{:032x}", XxHash3_128::oneshot(key.as_bytes())))
    }

    async fn scan_structure(&self) -> Result<DirectoryEntry> {
        debug!("Scanning directory structure at {}", self.root_str);
        self.scan_entry(&self.root, 0).ok_or_else(|| {
            Error::tool(
                "structure_scan",
                format!("repository root not readable: {}", self.root_str),
            )
        })
    }

    async fn read_sources(&self, max_files: usize) -> Result<Vec<SourceExcerpt>> {
        let limit = max_files.min(self.config.max_source_files);
        let files = self.collect_source_files(limit)?;
        let mut excerpts = Vec::with_capacity(files.len());
        for path in files {
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    let line_count = content.lines().count();
                    let excerpt: String = content
                        .lines()
                        .take(MAX_EXCERPT_LINES)
                        .collect::<Vec<_>>()
                        .join("\n");
                    excerpts.push(SourceExcerpt {
                        path: self.relative(&path),
                        excerpt,
                        line_count,
                    });
                }
                Err(e) => {
                    warn!("Skipping unreadable source file {}: {e}", path.display());
                }
            }
        }
        Ok(excerpts)
    }

    async fn extract_dependencies(&self) -> Result<Vec<Dependency>> {
        let mut deps = Vec::new();
        let cargo_manifest = self.root.join("Cargo.toml");
        if cargo_manifest.is_file() {
            match self.dependencies_from_cargo_toml(&cargo_manifest) {
                Ok(found) => deps.extend(found),
                Err(e) => warn!("Cargo.toml parse failed: {e}"),
            }
        }
        let requirements = self.root.join("requirements.txt");
        if requirements.is_file() {
            match self.dependencies_from_requirements(&requirements) {
                Ok(found) => deps.extend(found),
                Err(e) => warn!("requirements.txt parse failed: {e}"),
            }
        }
        Ok(deps)
    }

    async fn map_modules(&self) -> Result<Vec<ModuleInfo>> {
        let files = self.collect_source_files(4096)?;
        let mut counts: std::collections::BTreeMap<String, usize> = Default::default();
        for file in &files {
            let rel = self.relative(file);
            let module = rel
                .split('/')
                .next()
                .filter(|head| *head != rel)
                .unwrap_or("(root)")
                .to_string();
            *counts.entry(module).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(name, file_count)| ModuleInfo {
                path: if name == "(root)" {
                    self.root_str.clone()
                } else {
                    name.clone()
                },
                name,
                file_count,
            })
            .collect())
    }

    async fn extract_symbols(&self, max_files: usize) -> Result<Vec<Symbol>> {
        let patterns = SymbolPatterns::compile()?;
        let limit = max_files.min(self.config.max_symbol_files);
        let files = self.collect_source_files(limit)?;
        let mut symbols = Vec::new();
        for path in &files {
            symbols.extend(self.symbols_in_file(path, &patterns));
        }
        Ok(symbols)
    }

    async fn run_verification(&self) -> Result<VerificationOutputs> {
        let mut outputs = VerificationOutputs {
            test_file_count: self.count_test_files().ok(),
            ..Default::default()
        };

        let Some((program, args)) = self.config.test_collection_command.split_first() else {
            return Ok(outputs);
        };

        let run = tokio::process::Command::new(program)
            .args(args)
            .current_dir(&self.root)
            .output();
        let timeout = Duration::from_secs(self.config.verification_timeout_secs);
        match tokio::time::timeout(timeout, run).await {
            Ok(Ok(output)) => {
                let mut text = String::from_utf8_lossy(&output.stdout).to_string();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                outputs.collected_tests = parse_collected_tests(&text);
                outputs.coverage_percent = parse_coverage_percent(&text);
                outputs.test_collection = Some(text);
            }
            Ok(Err(e)) => {
                return Err(Error::tool("verification", e.to_string()));
            }
            Err(_) => {
                return Err(Error::tool(
                    "verification",
                    format!("test collection timed out after {timeout:?}"),
                ));
            }
        }
        Ok(outputs)
    }
}

fn parse_collected_tests(output: &str) -> Option<u32> {
    let patterns = [r"(\d+) tests? collected", r"collected (\d+) items?"];
    for pattern in patterns {
        if let Some(caps) = Regex::new(pattern).ok()?.captures(output) {
            if let Ok(count) = caps[1].parse() {
                return Some(count);
            }
        }
    }
    None
}

fn parse_coverage_percent(output: &str) -> Option<f32> {
    let re = Regex::new(r"TOTAL\s+\d+\s+\d+\s+(\d+)%").ok()?;
    re.captures(output)?[1].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn fixture_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("src")).unwrap();
        fs::write(
            root.join("src/app.py"),
            "class Loader:\n    def load(self):\n        pass\n\ndef test_load():\n    pass\n",
        )
        .unwrap();
        fs::write(root.join("src/util.py"), "def helper(x):\n    return x\n").unwrap();
        fs::write(
            root.join("requirements.txt"),
            "requests==2.31.0\nnumpy~=1.26\npyyaml\n",
        )
        .unwrap();
        dir
    }

    fn inspector_for(dir: &tempfile::TempDir) -> FsRepoInspector {
        FsRepoInspector::new(dir.path(), AnalysisConfig::default())
    }

    #[tokio::test]
    async fn requirements_with_three_entries_yields_three_dependencies() {
        let dir = fixture_repo();
        let deps = inspector_for(&dir).extract_dependencies().await.unwrap();
        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name, "requests");
        assert_eq!(deps[0].version.as_deref(), Some("2.31.0"));
        assert_eq!(deps[1].version.as_deref(), Some("1.26"));
        assert_eq!(deps[2].name, "pyyaml");
        assert_eq!(deps[2].version, None);
    }

    #[tokio::test]
    async fn structure_scan_lists_top_level_entries() {
        let dir = fixture_repo();
        let tree = inspector_for(&dir).scan_structure().await.unwrap();
        assert!(tree.is_dir);
        let names: Vec<_> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"src"));
        assert!(names.contains(&"requirements.txt"));
    }

    #[tokio::test]
    async fn symbols_carry_file_and_line() {
        let dir = fixture_repo();
        let symbols = inspector_for(&dir).extract_symbols(50).await.unwrap();
        let class = symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Class)
            .unwrap();
        assert_eq!(class.name, "Loader");
        assert_eq!(class.citation(), "src/app.py:1");
        assert!(symbols
            .iter()
            .any(|s| s.kind == SymbolKind::Test && s.name == "test_load"));
        assert!(symbols
            .iter()
            .any(|s| s.kind == SymbolKind::Function && s.name == "helper"));
    }

    #[tokio::test]
    async fn rust_test_attribute_marks_test_symbols() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("lib.rs"),
            "pub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n\n#[test]\nfn adds_two() {\n    assert_eq!(add(1, 1), 2);\n}\n",
        )
        .unwrap();
        let symbols = inspector_for(&dir).extract_symbols(50).await.unwrap();
        assert!(symbols
            .iter()
            .any(|s| s.kind == SymbolKind::Function && s.name == "add"));
        assert!(symbols
            .iter()
            .any(|s| s.kind == SymbolKind::Test && s.name == "adds_two"));
    }

    #[tokio::test]
    async fn read_sources_bounds_file_count() {
        let dir = fixture_repo();
        let excerpts = inspector_for(&dir).read_sources(1).await.unwrap();
        assert_eq!(excerpts.len(), 1);
        assert!(excerpts[0].line_count > 0);
    }

    #[tokio::test]
    async fn fingerprint_changes_when_content_changes() {
        let dir = fixture_repo();
        let inspector = inspector_for(&dir);
        let before = inspector.fingerprint().await.unwrap();
        // A new source file must change the fingerprint
        fs::write(dir.path().join("src/extra.py"), "def extra():\n    pass\n").unwrap();
        let after = inspector.fingerprint().await.unwrap();
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn verification_without_command_counts_test_files() {
        let dir = fixture_repo();
        let outputs = inspector_for(&dir).run_verification().await.unwrap();
        assert!(outputs.test_collection.is_none());
        assert_eq!(outputs.test_file_count, Some(0));
    }

    #[test]
    fn parses_pytest_collection_counts() {
        assert_eq!(parse_collected_tests("collected 128 items"), Some(128));
        assert_eq!(parse_collected_tests("42 tests collected in 0.5s"), Some(42));
        assert_eq!(parse_collected_tests("no tests ran"), None);
    }

    #[test]
    fn parses_coverage_total() {
        let report = "src/app.py  100  10  90%\nTOTAL  350  35  90%\n";
        assert_eq!(parse_coverage_percent(report), Some(90.0));
    }
}
