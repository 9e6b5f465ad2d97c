//! Cross-run analysis cache
//!
//! Maps a repository identity (path + content fingerprint) to previously
//! computed structural facts so follow-up questions in the same session do
//! not re-run the expensive tools. Safe for concurrent runs: the in-memory
//! map is sharded and no guard is held across a suspension point.
//! Optionally backed by on-disk JSON snapshots; a corrupt or stale snapshot
//! is treated as a miss, never as a fatal error.

use dashmap::DashMap;
use repoagent_core::config::CacheConfig;
use repoagent_core::facts::StructuralFacts;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use twox_hash::XxHash3_128;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    fingerprint: String,
    facts: StructuralFacts,
}

/// Concurrent analysis cache keyed by repository path
pub struct AnalysisCache {
    entries: DashMap<String, CacheEntry>,
    dir: Option<PathBuf>,
}

impl AnalysisCache {
    pub fn new(config: &CacheConfig) -> Self {
        if let Some(dir) = &config.dir {
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!("Failed to create cache dir {}: {e}", dir.display());
            }
        }
        Self {
            entries: DashMap::new(),
            dir: config.dir.clone(),
        }
    }

    /// Cache without on-disk backing
    pub fn in_memory() -> Self {
        Self {
            entries: DashMap::new(),
            dir: None,
        }
    }

    /// Look up facts for a repository. A hit requires the stored
    /// fingerprint to match; a changed repository invalidates its entry.
    pub fn get(&self, repo_path: &str, fingerprint: &str) -> Option<StructuralFacts> {
        if let Some(entry) = self.entries.get(repo_path) {
            if entry.fingerprint == fingerprint {
                debug!("Analysis cache hit (memory) for {repo_path}");
                return Some(entry.facts.clone());
            }
            debug!("Analysis cache stale (memory) for {repo_path}");
            return None;
        }

        let entry = self.load_snapshot(repo_path)?;
        if entry.fingerprint != fingerprint {
            debug!("Analysis cache stale (disk) for {repo_path}");
            return None;
        }
        info!("Analysis cache hit (disk) for {repo_path}");
        let facts = entry.facts.clone();
        self.entries.insert(repo_path.to_string(), entry);
        Some(facts)
    }

    /// Store facts for a repository. Last write wins; cached facts are
    /// idempotent per repository snapshot.
    pub fn put(&self, repo_path: &str, fingerprint: &str, facts: StructuralFacts) {
        let entry = CacheEntry {
            fingerprint: fingerprint.to_string(),
            facts,
        };
        self.write_snapshot(repo_path, &entry);
        self.entries.insert(repo_path.to_string(), entry);
    }

    /// Drop every entry (and snapshot) for a repository
    pub fn invalidate(&self, repo_path: &str) {
        self.entries.remove(repo_path);
        if let Some(path) = self.snapshot_path(repo_path) {
            let _ = std::fs::remove_file(path);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn snapshot_path(&self, repo_path: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        let hash = XxHash3_128::oneshot(repo_path.as_bytes());
        Some(dir.join(format!("repo_{hash:032x}.json")))
    }

    fn load_snapshot(&self, repo_path: &str) -> Option<CacheEntry> {
        let path = self.snapshot_path(repo_path)?;
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(
                    "Corrupt cache snapshot {} treated as a miss: {e}",
                    path.display()
                );
                let _ = std::fs::remove_file(&path);
                None
            }
        }
    }

    fn write_snapshot(&self, repo_path: &str, entry: &CacheEntry) {
        let Some(path) = self.snapshot_path(repo_path) else {
            return;
        };
        match serde_json::to_string(entry) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    warn!("Failed to write cache snapshot {}: {e}", path.display());
                }
            }
            Err(e) => warn!("Failed to serialize cache entry: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repoagent_core::facts::Dependency;

    fn facts_with_dep(name: &str) -> StructuralFacts {
        StructuralFacts {
            dependencies: vec![Dependency {
                name: name.into(),
                version: Some("1.0".into()),
                manifest: "Cargo.toml".into(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn hit_requires_matching_fingerprint() {
        let cache = AnalysisCache::in_memory();
        cache.put("/repo", "fp-1", facts_with_dep("serde"));

        assert!(cache.get("/repo", "fp-1").is_some());
        assert!(cache.get("/repo", "fp-2").is_none());
        assert!(cache.get("/other", "fp-1").is_none());
    }

    #[test]
    fn last_write_wins() {
        let cache = AnalysisCache::in_memory();
        cache.put("/repo", "fp-1", facts_with_dep("serde"));
        cache.put("/repo", "fp-2", facts_with_dep("tokio"));

        assert!(cache.get("/repo", "fp-1").is_none());
        let facts = cache.get("/repo", "fp-2").unwrap();
        assert_eq!(facts.dependencies[0].name, "tokio");
    }

    #[test]
    fn disk_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            enabled: true,
            dir: Some(dir.path().to_path_buf()),
        };

        let writer = AnalysisCache::new(&config);
        writer.put("/repo", "fp-1", facts_with_dep("serde"));

        // A fresh cache instance finds the snapshot on disk
        let reader = AnalysisCache::new(&config);
        let facts = reader.get("/repo", "fp-1").unwrap();
        assert_eq!(facts.dependencies[0].name, "serde");
    }

    #[test]
    fn corrupt_snapshot_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            enabled: true,
            dir: Some(dir.path().to_path_buf()),
        };

        let cache = AnalysisCache::new(&config);
        cache.put("/repo", "fp-1", facts_with_dep("serde"));

        // Overwrite the snapshot with garbage
        let snapshot = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        std::fs::write(&snapshot, "not json").unwrap();

        let fresh = AnalysisCache::new(&config);
        assert!(fresh.get("/repo", "fp-1").is_none());
        // The corrupt file was removed
        assert!(!snapshot.exists());
    }

    #[test]
    fn concurrent_population_is_safe() {
        let cache = std::sync::Arc::new(AnalysisCache::in_memory());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let repo = format!("/repo-{}", i % 2);
                    cache.put(&repo, "fp", facts_with_dep("serde"));
                    cache.get(&repo, "fp")
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_some());
        }
        assert_eq!(cache.len(), 2);
    }
}
