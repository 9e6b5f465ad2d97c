//! Structural facts extracted from a repository
//!
//! Every sub-result is optional or may be empty: one tool failing must
//! never block the facts the other tools produced.

use serde::{Deserialize, Serialize};

/// One entry of the directory-structure scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub is_dir: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub children: Vec<DirectoryEntry>,
}

impl DirectoryEntry {
    /// Total number of entries in the subtree, this entry included
    pub fn entry_count(&self) -> usize {
        1 + self.children.iter().map(DirectoryEntry::entry_count).sum::<usize>()
    }
}

/// A bounded excerpt of one source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceExcerpt {
    pub path: String,
    pub excerpt: String,
    pub line_count: usize,
}

/// One project dependency with its declared version, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: Option<String>,
    /// Manifest the dependency was read from (e.g. `Cargo.toml`,
    /// `requirements.txt`)
    pub manifest: String,
}

/// One logical module of the repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub path: String,
    pub file_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Class,
    Function,
    Test,
}

/// An extracted code symbol with its definition site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub file: String,
    pub line: usize,
}

impl Symbol {
    /// `file:line` citation form used in generated output
    pub fn citation(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }
}

/// Raw outputs of the verification commands
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationOutputs {
    /// Raw test-collection command output
    pub test_collection: Option<String>,
    /// Number of tests the collection command reported
    pub collected_tests: Option<u32>,
    pub coverage_percent: Option<f32>,
    pub test_file_count: Option<u32>,
}

/// The bundle of repository-derived data produced by the analyzer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuralFacts {
    pub structure: Option<DirectoryEntry>,
    pub source_files: Vec<SourceExcerpt>,
    pub dependencies: Vec<Dependency>,
    pub modules: Vec<ModuleInfo>,
    pub symbols: Vec<Symbol>,
    pub verification: Option<VerificationOutputs>,
}

impl StructuralFacts {
    pub fn is_empty(&self) -> bool {
        self.structure.is_none()
            && self.source_files.is_empty()
            && self.dependencies.is_empty()
            && self.modules.is_empty()
            && self.symbols.is_empty()
            && self.verification.is_none()
    }

    /// One-line summary used in prompt context and log output
    pub fn summary(&self) -> String {
        format!(
            "{} top-level items, {} source files, {} dependencies, {} modules, {} symbols",
            self.structure
                .as_ref()
                .map(|s| s.children.len())
                .unwrap_or(0),
            self.source_files.len(),
            self.dependencies.len(),
            self.modules.len(),
            self.symbols.len(),
        )
    }
}

/// One recorded tool invocation in the audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub args_summary: String,
    pub result_summary: String,
}

impl ToolInvocation {
    pub fn new(
        tool_name: impl Into<String>,
        args_summary: impl Into<String>,
        result_summary: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            args_summary: args_summary.into(),
            result_summary: result_summary.into(),
        }
    }
}

/// One passage returned by the retrieval service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedPassage {
    pub text: String,
    pub score: f32,
    pub source: String,
}
