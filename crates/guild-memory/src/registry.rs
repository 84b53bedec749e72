//! Artifact store and the deliverable registry contract
//!
//! On disk, artifacts are grouped by the kind of work that produced them:
//!
//! ```text
//! artifacts/
//! ├── analysis/        functional_spec.md, user_stories.yaml
//! ├── architecture/    architecture.md, openapi.yaml, decisions.md
//! ├── design/          design_system.md, wireframes.md
//! ├── code/            backend_code, frontend_code
//! ├── testing/         test_plan.md, test_results.md
//! ├── review/          cto_review.md
//! └── documentation/   anything else
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use guild_core::{GuildError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Lookup used by the orchestrator when validating a phase
#[async_trait]
pub trait DeliverableRegistry: Send + Sync {
    async fn exists(&self, name: &str) -> bool;
}

/// Category of an artifact, derived from its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Analysis,
    Architecture,
    Design,
    Code,
    Testing,
    Review,
    Documentation,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 7] = [
        Self::Analysis,
        Self::Architecture,
        Self::Design,
        Self::Code,
        Self::Testing,
        Self::Review,
        Self::Documentation,
    ];

    pub fn from_name(name: &str) -> Self {
        let stem = name.split('.').next().unwrap_or(name);
        match stem {
            "functional_spec" | "user_stories" => Self::Analysis,
            "architecture" | "openapi" | "decisions" => Self::Architecture,
            "design_system" | "wireframes" => Self::Design,
            "backend_code" | "frontend_code" => Self::Code,
            "cto_review" => Self::Review,
            s if s.starts_with("test_") => Self::Testing,
            _ => Self::Documentation,
        }
    }

    /// Subdirectory name under the artifacts root
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Architecture => "architecture",
            Self::Design => "design",
            Self::Code => "code",
            Self::Testing => "testing",
            Self::Review => "review",
            Self::Documentation => "documentation",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Catalog entry for a stored artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    /// Content length in bytes
    pub size: usize,
    /// Location on disk, `None` for in-memory stores
    pub path: Option<PathBuf>,
}

struct Entry {
    artifact: Artifact,
    /// Kept only by in-memory stores
    content: Option<String>,
}

/// Named deliverables produced by workers
pub struct ArtifactStore {
    root: Option<PathBuf>,
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl ArtifactStore {
    pub fn in_memory() -> Self {
        Self {
            root: None,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open an artifacts directory, cataloguing files already present.
    ///
    /// Files found on disk have an unknown creator.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut entries = BTreeMap::new();

        for kind in ArtifactKind::ALL {
            let dir = root.join(kind.dir_name());
            tokio::fs::create_dir_all(&dir).await?;

            let mut listing = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = listing.next_entry().await? {
                let metadata = entry.metadata().await?;
                if !metadata.is_file() {
                    continue;
                }

                let name = entry.file_name().to_string_lossy().into_owned();
                let created_at = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());

                entries.insert(
                    name.clone(),
                    Entry {
                        artifact: Artifact {
                            name,
                            kind,
                            created_by: "unknown".to_string(),
                            created_at,
                            size: metadata.len() as usize,
                            path: Some(entry.path()),
                        },
                        content: None,
                    },
                );
            }
        }

        info!(
            "Artifact store opened at {:?} with {} artifacts",
            root,
            entries.len()
        );

        Ok(Self {
            root: Some(root),
            entries: RwLock::new(entries),
        })
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Store or overwrite an artifact
    pub async fn store(
        &self,
        name: &str,
        content: &str,
        created_by: &str,
    ) -> Result<Artifact> {
        validate_name(name)?;
        let kind = ArtifactKind::from_name(name);

        let (path, kept) = match &self.root {
            Some(root) => {
                let dir = root.join(kind.dir_name());
                tokio::fs::create_dir_all(&dir).await?;
                let path = dir.join(name);
                tokio::fs::write(&path, content).await?;
                (Some(path), None)
            }
            None => (None, Some(content.to_string())),
        };

        let artifact = Artifact {
            name: name.to_string(),
            kind,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            size: content.len(),
            path,
        };

        self.entries.write().await.insert(
            name.to_string(),
            Entry {
                artifact: artifact.clone(),
                content: kept,
            },
        );

        info!("Stored artifact {} ({}) by {}", name, kind, created_by);
        Ok(artifact)
    }

    /// Catalog entry for an artifact
    pub async fn retrieve(&self, name: &str) -> Option<Artifact> {
        self.entries
            .read()
            .await
            .get(name)
            .map(|entry| entry.artifact.clone())
    }

    /// Content of an artifact
    pub async fn read(&self, name: &str) -> Result<String> {
        let entries = self.entries.read().await;
        let entry = entries
            .get(name)
            .ok_or_else(|| GuildError::ArtifactNotFound(name.to_string()))?;

        if let Some(content) = &entry.content {
            return Ok(content.clone());
        }

        match &entry.artifact.path {
            Some(path) => Ok(tokio::fs::read_to_string(path).await?),
            None => Err(GuildError::ArtifactNotFound(name.to_string())),
        }
    }

    /// All artifacts, ordered by name
    pub async fn list_all(&self) -> Vec<Artifact> {
        self.entries
            .read()
            .await
            .values()
            .map(|entry| entry.artifact.clone())
            .collect()
    }

    pub async fn list_by_creator(&self, created_by: &str) -> Vec<Artifact> {
        self.list_all()
            .await
            .into_iter()
            .filter(|a| a.created_by == created_by)
            .collect()
    }

    pub async fn list_by_kind(&self, kind: ArtifactKind) -> Vec<Artifact> {
        self.list_all()
            .await
            .into_iter()
            .filter(|a| a.kind == kind)
            .collect()
    }

    /// Remove an artifact. Returns `false` if it was not catalogued.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let Some(entry) = self.entries.write().await.remove(name) else {
            debug!("Artifact {} not found for deletion", name);
            return Ok(false);
        };

        if let Some(path) = &entry.artifact.path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("Artifact file {:?} already gone", path);
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!("Deleted artifact {}", name);
        Ok(true)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(GuildError::Artifact(format!(
            "Invalid artifact name: {:?}",
            name
        )));
    }
    Ok(())
}

#[async_trait]
impl DeliverableRegistry for ArtifactStore {
    async fn exists(&self, name: &str) -> bool {
        let path = match self.entries.read().await.get(name) {
            Some(entry) if entry.content.is_some() => return true,
            Some(entry) => entry.artifact.path.clone(),
            None => return false,
        };

        match path {
            Some(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_name() {
        assert_eq!(
            ArtifactKind::from_name("functional_spec.md"),
            ArtifactKind::Analysis
        );
        assert_eq!(ArtifactKind::from_name("openapi.yaml"), ArtifactKind::Architecture);
        assert_eq!(ArtifactKind::from_name("backend_code"), ArtifactKind::Code);
        assert_eq!(ArtifactKind::from_name("test_results.md"), ArtifactKind::Testing);
        assert_eq!(ArtifactKind::from_name("cto_review.md"), ArtifactKind::Review);
        assert_eq!(ArtifactKind::from_name("README.md"), ArtifactKind::Documentation);
    }

    #[tokio::test]
    async fn test_in_memory_store_and_read() {
        let store = ArtifactStore::in_memory();
        store
            .store("functional_spec.md", "# Spec", "analyst")
            .await
            .unwrap();

        assert!(store.exists("functional_spec.md").await);
        assert!(!store.exists("user_stories.yaml").await);
        assert_eq!(store.read("functional_spec.md").await.unwrap(), "# Spec");

        let artifact = store.retrieve("functional_spec.md").await.unwrap();
        assert_eq!(artifact.kind, ArtifactKind::Analysis);
        assert_eq!(artifact.size, 6);
        assert!(artifact.path.is_none());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let store = ArtifactStore::in_memory();
        let err = store.read("nope.md").await.unwrap_err();
        assert!(matches!(err, GuildError::ArtifactNotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_path_names() {
        let store = ArtifactStore::in_memory();
        assert!(store.store("../escape.md", "x", "qa").await.is_err());
        assert!(store.store("", "x", "qa").await.is_err());
    }

    #[tokio::test]
    async fn test_list_by_creator_and_kind() {
        let store = ArtifactStore::in_memory();
        store.store("test_plan.md", "plan", "qa").await.unwrap();
        store.store("test_results.md", "ok", "qa").await.unwrap();
        store.store("cto_review.md", "GO", "cto").await.unwrap();

        assert_eq!(store.list_all().await.len(), 3);
        assert_eq!(store.list_by_creator("qa").await.len(), 2);
        assert_eq!(store.list_by_kind(ArtifactKind::Review).await.len(), 1);
    }

    #[tokio::test]
    async fn test_disk_layout_and_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = ArtifactStore::open(dir.path()).await.unwrap();
            store
                .store("architecture.md", "# Arch", "architect")
                .await
                .unwrap();
            store.store("backend_code", "fn main() {}", "backend").await.unwrap();
        }

        assert!(dir.path().join("architecture/architecture.md").exists());
        assert!(dir.path().join("code/backend_code").exists());

        let store = ArtifactStore::open(dir.path()).await.unwrap();
        assert!(store.exists("architecture.md").await);
        assert_eq!(store.read("backend_code").await.unwrap(), "fn main() {}");
        assert_eq!(
            store.retrieve("backend_code").await.unwrap().created_by,
            "unknown"
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).await.unwrap();
        store.store("wireframes.md", "boxes", "designer").await.unwrap();

        assert!(store.delete("wireframes.md").await.unwrap());
        assert!(!store.exists("wireframes.md").await);
        assert!(!dir.path().join("design/wireframes.md").exists());
        assert!(!store.delete("wireframes.md").await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_false_when_file_removed_externally() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).await.unwrap();
        let artifact = store.store("decisions.md", "d", "architect").await.unwrap();

        std::fs::remove_file(artifact.path.unwrap()).unwrap();
        assert!(!store.exists("decisions.md").await);
    }
}
