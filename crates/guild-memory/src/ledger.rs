//! Decision records governing a project
//!
//! Accepted records are binding on every later phase: their constraints are
//! attached to each task the orchestrator hands out. Records are identified as
//! `ADR-NNN` with numbers that only ever grow.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use guild_core::{GuildError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const ID_PREFIX: &str = "ADR-";

/// Lifecycle status of a decision record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Proposed,
    Accepted,
    Deprecated,
    Rejected,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Accepted => "accepted",
            Self::Deprecated => "deprecated",
            Self::Rejected => "rejected",
        }
    }

    /// Whether a record may move from this status to `target`
    pub fn can_become(&self, target: DecisionStatus) -> bool {
        matches!(
            (self, target),
            (Self::Proposed, Self::Accepted)
                | (Self::Proposed, Self::Rejected)
                | (Self::Accepted, Self::Deprecated)
        )
    }
}

impl std::fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DecisionStatus {
    type Err = GuildError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "proposed" => Ok(Self::Proposed),
            "accepted" => Ok(Self::Accepted),
            "deprecated" => Ok(Self::Deprecated),
            "rejected" => Ok(Self::Rejected),
            _ => Err(GuildError::Decision(format!("Unknown decision status: {}", s))),
        }
    }
}

/// A recorded decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    /// `ADR-NNN`
    pub id: String,
    pub title: String,
    pub status: DecisionStatus,
    /// Why the decision was needed
    #[serde(default)]
    pub context: String,
    /// What was decided
    pub decision: String,
    /// Rules every later phase must respect, in order
    #[serde(default)]
    pub constraints: Vec<String>,
    pub author: String,
    pub date: DateTime<Utc>,
    /// Record this one replaces
    #[serde(default)]
    pub supersedes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DecisionRecord {
    /// Numeric part of the id, if well formed
    pub fn number(&self) -> Option<u32> {
        parse_number(&self.id)
    }

    /// One-line form used when listing or summarizing
    pub fn summary(&self) -> String {
        format!("{}: {} ({})", self.id, self.title, self.decision)
    }
}

fn parse_number(id: &str) -> Option<u32> {
    id.strip_prefix(ID_PREFIX)?.parse().ok()
}

fn format_id(number: u32) -> String {
    format!("{}{:03}", ID_PREFIX, number)
}

/// A decision waiting to be proposed
#[derive(Debug, Clone, Default)]
pub struct NewDecision {
    pub title: String,
    pub decision: String,
    pub context: String,
    pub constraints: Vec<String>,
    pub author: String,
    pub tags: Vec<String>,
    pub supersedes: Option<String>,
}

impl NewDecision {
    pub fn new(title: impl Into<String>, decision: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            decision: decision.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn superseding(mut self, id: impl Into<String>) -> Self {
        self.supersedes = Some(id.into());
        self
    }
}

/// What the orchestrator needs from the decision ledger
#[async_trait]
pub trait GovernanceLedger: Send + Sync {
    /// Records with the given status, ordered by id
    async fn list_by_status(&self, status: DecisionStatus) -> Result<Vec<DecisionRecord>>;

    /// Binding records
    async fn list_accepted(&self) -> Result<Vec<DecisionRecord>> {
        self.list_by_status(DecisionStatus::Accepted).await
    }

    /// Ratify a proposed record. Returns `false` when the record is missing or
    /// not proposed.
    async fn accept(&self, id: &str) -> Result<bool>;
}

/// Decision ledger kept in memory and optionally mirrored to `<id>.json` files
pub struct DecisionLog {
    dir: Option<PathBuf>,
    records: RwLock<BTreeMap<String, DecisionRecord>>,
}

impl DecisionLog {
    /// Ledger that lives only for the current process
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open a ledger directory, loading any records already there.
    ///
    /// Unreadable files are skipped with a warning.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut records = BTreeMap::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }

            match load_record(&path).await {
                Ok(record) => {
                    debug!("Loaded decision record {}", record.id);
                    records.insert(record.id.clone(), record);
                }
                Err(e) => warn!("Failed to load decision record from {:?}: {}", path, e),
            }
        }

        info!("Decision log opened at {:?} with {} records", dir, records.len());

        Ok(Self {
            dir: Some(dir),
            records: RwLock::new(records),
        })
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    async fn persist(&self, record: &DecisionRecord) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let path = dir.join(format!("{}.json", record.id));
        let content = serde_json::to_string_pretty(record)?;
        tokio::fs::write(&path, content).await?;
        debug!("Saved decision record {} to {:?}", record.id, path);
        Ok(())
    }

    /// Next free id, one past the highest number ever used
    pub async fn next_id(&self) -> String {
        let records = self.records.read().await;
        next_id_in(&records)
    }

    /// Record a new decision with status `Proposed`
    pub async fn propose(&self, new: NewDecision) -> Result<DecisionRecord> {
        let mut records = self.records.write().await;

        let record = DecisionRecord {
            id: next_id_in(&records),
            title: new.title,
            status: DecisionStatus::Proposed,
            context: new.context,
            decision: new.decision,
            constraints: new.constraints,
            author: new.author,
            date: Utc::now(),
            supersedes: new.supersedes,
            tags: new.tags,
        };

        self.persist(&record).await?;
        info!("Proposed decision {}: {}", record.id, record.title);
        records.insert(record.id.clone(), record.clone());

        Ok(record)
    }

    pub async fn get(&self, id: &str) -> Option<DecisionRecord> {
        self.records.read().await.get(id).cloned()
    }

    /// Every record, ordered by id number
    pub async fn list_all(&self) -> Vec<DecisionRecord> {
        let records = self.records.read().await;
        let mut all: Vec<DecisionRecord> = records.values().cloned().collect();
        all.sort_by_key(|r| (r.number().unwrap_or(u32::MAX), r.id.clone()));
        all
    }

    pub async fn reject(&self, id: &str) -> Result<bool> {
        self.move_to(id, DecisionStatus::Rejected).await
    }

    /// Retire an accepted record, optionally naming its replacement.
    ///
    /// The replacement is marked as superseding `id`.
    pub async fn deprecate(&self, id: &str, superseded_by: Option<&str>) -> Result<bool> {
        if !self.move_to(id, DecisionStatus::Deprecated).await? {
            return Ok(false);
        }

        if let Some(replacement) = superseded_by {
            let mut records = self.records.write().await;
            match records.get_mut(replacement) {
                Some(record) => {
                    record.supersedes = Some(id.to_string());
                    let record = record.clone();
                    self.persist(&record).await?;
                }
                None => warn!("Replacement decision {} not found", replacement),
            }
        }

        Ok(true)
    }

    async fn move_to(&self, id: &str, target: DecisionStatus) -> Result<bool> {
        let mut records = self.records.write().await;

        let Some(record) = records.get_mut(id) else {
            warn!("Decision {} not found", id);
            return Ok(false);
        };

        if !record.status.can_become(target) {
            warn!(
                "Decision {} cannot move from {} to {}",
                id, record.status, target
            );
            return Ok(false);
        }

        let previous = record.status;
        record.status = target;
        let updated = record.clone();

        if let Err(e) = self.persist(&updated).await {
            if let Some(record) = records.get_mut(id) {
                record.status = previous;
            }
            return Err(e);
        }

        info!("Decision {} status: {} -> {}", id, previous, target);
        Ok(true)
    }

    /// Records whose title, context or decision contains `query` (case-insensitive)
    pub async fn search(&self, query: &str) -> Vec<DecisionRecord> {
        let query = query.to_lowercase();
        let results: Vec<DecisionRecord> = self
            .list_all()
            .await
            .into_iter()
            .filter(|r| {
                r.title.to_lowercase().contains(&query)
                    || r.context.to_lowercase().contains(&query)
                    || r.decision.to_lowercase().contains(&query)
            })
            .collect();

        debug!("Search for '{}' found {} decisions", query, results.len());
        results
    }

    /// Constraints of accepted records, keyed by id
    pub async fn constraints_summary(&self) -> BTreeMap<String, Vec<String>> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.status == DecisionStatus::Accepted && !r.constraints.is_empty())
            .map(|r| (r.id.clone(), r.constraints.clone()))
            .collect()
    }
}

fn next_id_in(records: &BTreeMap<String, DecisionRecord>) -> String {
    let highest = records.values().filter_map(DecisionRecord::number).max();
    format_id(highest.map_or(1, |n| n + 1))
}

async fn load_record(path: &Path) -> Result<DecisionRecord> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

#[async_trait]
impl GovernanceLedger for DecisionLog {
    async fn list_by_status(&self, status: DecisionStatus) -> Result<Vec<DecisionRecord>> {
        Ok(self
            .list_all()
            .await
            .into_iter()
            .filter(|r| r.status == status)
            .collect())
    }

    async fn accept(&self, id: &str) -> Result<bool> {
        self.move_to(id, DecisionStatus::Accepted).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> NewDecision {
        NewDecision::new(title, format!("Use {}", title))
            .with_author("architect")
            .with_constraint(format!("All services use {}", title))
    }

    #[tokio::test]
    async fn test_ids_increase() {
        let log = DecisionLog::in_memory();
        assert_eq!(log.next_id().await, "ADR-001");

        let first = log.propose(draft("PostgreSQL")).await.unwrap();
        let second = log.propose(draft("REST")).await.unwrap();

        assert_eq!(first.id, "ADR-001");
        assert_eq!(second.id, "ADR-002");
        assert_eq!(first.status, DecisionStatus::Proposed);
    }

    #[tokio::test]
    async fn test_ids_never_reused_after_reject_or_deprecate() {
        let log = DecisionLog::in_memory();
        let a = log.propose(draft("a")).await.unwrap();
        let b = log.propose(draft("b")).await.unwrap();

        assert!(log.reject(&a.id).await.unwrap());
        assert!(log.accept(&b.id).await.unwrap());
        assert!(log.deprecate(&b.id, None).await.unwrap());

        let c = log.propose(draft("c")).await.unwrap();
        assert_eq!(c.id, "ADR-003");
    }

    #[tokio::test]
    async fn test_proposal_can_name_the_record_it_replaces() {
        let log = DecisionLog::in_memory();
        let old = log.propose(draft("MySQL")).await.unwrap();
        assert!(log.accept(&old.id).await.unwrap());

        let new = log
            .propose(draft("PostgreSQL").superseding(old.id.clone()))
            .await
            .unwrap();
        assert_eq!(new.supersedes.as_deref(), Some("ADR-001"));

        assert!(log.deprecate(&old.id, Some(&new.id)).await.unwrap());
        assert_eq!(
            log.get(&old.id).await.unwrap().status,
            DecisionStatus::Deprecated
        );
        assert_eq!(log.list_accepted().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_only_legal_status_moves() {
        let log = DecisionLog::in_memory();
        let record = log.propose(draft("a")).await.unwrap();

        // Proposed cannot be deprecated
        assert!(!log.deprecate(&record.id, None).await.unwrap());

        assert!(log.accept(&record.id).await.unwrap());
        assert!(!log.accept(&record.id).await.unwrap());
        assert!(!log.reject(&record.id).await.unwrap());

        assert!(!log.accept("ADR-999").await.unwrap());
        assert_eq!(
            log.get(&record.id).await.unwrap().status,
            DecisionStatus::Accepted
        );
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let log = DecisionLog::in_memory();
        for title in ["a", "b", "c"] {
            log.propose(draft(title)).await.unwrap();
        }
        log.accept("ADR-002").await.unwrap();

        let proposed = log.list_by_status(DecisionStatus::Proposed).await.unwrap();
        let ids: Vec<&str> = proposed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["ADR-001", "ADR-003"]);

        let accepted = log.list_accepted().await.unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].title, "b");
    }

    #[tokio::test]
    async fn test_deprecate_marks_replacement() {
        let log = DecisionLog::in_memory();
        let old = log.propose(draft("MySQL")).await.unwrap();
        log.accept(&old.id).await.unwrap();
        let new = log.propose(draft("PostgreSQL")).await.unwrap();

        assert!(log.deprecate(&old.id, Some(&new.id)).await.unwrap());

        assert_eq!(
            log.get(&old.id).await.unwrap().status,
            DecisionStatus::Deprecated
        );
        assert_eq!(
            log.get(&new.id).await.unwrap().supersedes.as_deref(),
            Some("ADR-001")
        );
    }

    #[tokio::test]
    async fn test_search_and_constraints_summary() {
        let log = DecisionLog::in_memory();
        log.propose(draft("PostgreSQL").with_context("Need relational storage"))
            .await
            .unwrap();
        log.propose(NewDecision::new("Auth", "JWT tokens")).await.unwrap();
        log.accept("ADR-001").await.unwrap();
        log.accept("ADR-002").await.unwrap();

        assert_eq!(log.search("relational").await.len(), 1);
        assert_eq!(log.search("jwt").await.len(), 1);
        assert!(log.search("graphql").await.is_empty());

        let summary = log.constraints_summary().await;
        assert_eq!(summary.len(), 1);
        assert_eq!(summary["ADR-001"], vec!["All services use PostgreSQL"]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let log = DecisionLog::open(dir.path()).await.unwrap();
            log.propose(draft("a")).await.unwrap();
            log.propose(draft("b")).await.unwrap();
            log.accept("ADR-001").await.unwrap();
        }

        assert!(dir.path().join("ADR-001.json").exists());

        let log = DecisionLog::open(dir.path()).await.unwrap();
        assert_eq!(log.list_all().await.len(), 2);
        assert_eq!(
            log.get("ADR-001").await.unwrap().status,
            DecisionStatus::Accepted
        );
        assert_eq!(log.next_id().await, "ADR-003");
    }

    #[tokio::test]
    async fn test_open_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ADR-007.json"), "not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let log = DecisionLog::open(dir.path()).await.unwrap();
        assert!(log.list_all().await.is_empty());
        assert_eq!(log.next_id().await, "ADR-001");
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            "Accepted".parse::<DecisionStatus>().unwrap(),
            DecisionStatus::Accepted
        );
        assert!("maybe".parse::<DecisionStatus>().is_err());
    }
}
