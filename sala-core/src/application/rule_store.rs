// sala-core/src/application/rule_store.rs

use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{info, instrument, warn};

use crate::domain::error::DomainError;
use crate::domain::ports::{CommitLock, RuleRepository};
use crate::domain::rules::snapshot::next_rule_id;
use crate::domain::rules::{Provenance, Rule, RuleDraft, RuleSetSnapshot, RuleSignature};

/// A rule to merge into the next snapshot.
#[derive(Debug, Clone)]
pub struct RuleAddition {
    pub draft: RuleDraft,
    pub confidence: f64,
    pub provenance: Provenance,
}

#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// `None` when every addition was already present (no snapshot written).
    pub snapshot: Option<Arc<RuleSetSnapshot>>,
    /// (index into the additions, assigned rule id)
    pub merged: Vec<(usize, String)>,
    /// Indices of additions already present in the fresh base.
    pub skipped: Vec<usize>,
}

/// Exclusive right to commit: the in-process mutex, plus the repository's
/// cross-process lock when it has one.
pub struct CommitGuard<'a> {
    _state: Option<Box<dyn CommitLock>>,
    _local: MutexGuard<'a, ()>,
}

/// Canonical active rule set plus its append-only history.
///
/// Readers take an `Arc` snapshot and keep it for the whole run. Writers must
/// hold `commit_guard()` for their critical section; `commit` swaps the
/// active snapshot only after the repository accepted the new version.
pub struct RuleStore {
    repository: Arc<dyn RuleRepository>,
    active: RwLock<Arc<RuleSetSnapshot>>,
    commit_lock: Mutex<()>,
}

impl RuleStore {
    pub fn open(repository: Arc<dyn RuleRepository>) -> Result<Self, DomainError> {
        let active = repository.load_active()?;
        info!(version = active.version, rules = active.len(), "Rule store opened");
        Ok(Self {
            repository,
            active: RwLock::new(Arc::new(active)),
            commit_lock: Mutex::new(()),
        })
    }

    pub fn active(&self) -> Result<Arc<RuleSetSnapshot>, DomainError> {
        self.active
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| DomainError::Persistence("rule store lock poisoned".into()))
    }

    /// Reloads the active snapshot from the repository.
    pub fn refresh(&self) -> Result<Arc<RuleSetSnapshot>, DomainError> {
        let fresh = Arc::new(self.repository.load_active()?);
        let mut guard = self
            .active
            .write()
            .map_err(|_| DomainError::Persistence("rule store lock poisoned".into()))?;
        *guard = Arc::clone(&fresh);
        Ok(fresh)
    }

    pub fn commit_guard(&self) -> Result<CommitGuard<'_>, DomainError> {
        let local = self
            .commit_lock
            .lock()
            .map_err(|_| DomainError::Persistence("rule store commit lock poisoned".into()))?;
        Ok(CommitGuard {
            _state: self.repository.lock()?,
            _local: local,
        })
    }

    pub fn history(&self) -> Result<Vec<RuleSetSnapshot>, DomainError> {
        self.repository.history()
    }

    /// Writes the successor of `base_version`. Fails with `PersistenceConflict`
    /// if the repository head moved since the caller read `base_version`.
    #[instrument(skip(self, additions), fields(additions = additions.len()))]
    pub fn commit(
        &self,
        base_version: u64,
        additions: &[RuleAddition],
        source_run_id: Option<String>,
    ) -> Result<CommitOutcome, DomainError> {
        let head = self.repository.head_version()?;
        if head != base_version {
            return Err(DomainError::PersistenceConflict {
                expected: base_version,
                found: head,
            });
        }

        let base = self.repository.load_active()?;
        let mut signatures = base.signatures();
        let mut ids: Vec<String> = base.rules.iter().map(|r| r.id.clone()).collect();
        let mut added = Vec::new();
        let mut merged = Vec::new();
        let mut skipped = Vec::new();

        for (idx, addition) in additions.iter().enumerate() {
            let signature: RuleSignature = addition.draft.compile()?.signature();
            if !signatures.insert(signature) {
                skipped.push(idx);
                continue;
            }
            let id = next_rule_id(ids.iter().map(String::as_str));
            let rule = Rule::from_draft(
                id.clone(),
                &addition.draft,
                addition.confidence,
                addition.provenance,
                base.version + 1,
            )?;
            ids.push(id.clone());
            added.push(rule);
            merged.push((idx, id));
        }

        if added.is_empty() {
            return Ok(CommitOutcome {
                snapshot: None,
                merged,
                skipped,
            });
        }

        let next = base.successor(added, source_run_id);
        self.repository.commit(&next)?;
        info!(version = next.version, rules = next.len(), "Rule set committed");

        let next = Arc::new(next);
        let mut guard = self
            .active
            .write()
            .map_err(|_| DomainError::Persistence("rule store lock poisoned".into()))?;
        *guard = Arc::clone(&next);

        Ok(CommitOutcome {
            snapshot: Some(next),
            merged,
            skipped,
        })
    }

    /// `commit`, retried once against a freshly loaded base on conflict.
    pub fn commit_with_retry(
        &self,
        base_version: u64,
        additions: &[RuleAddition],
        source_run_id: Option<String>,
    ) -> Result<CommitOutcome, DomainError> {
        match self.commit(base_version, additions, source_run_id.clone()) {
            Err(DomainError::PersistenceConflict { expected, found }) => {
                warn!(expected, found, "Rule set moved during the run, retrying on fresh base");
                let fresh = self.refresh()?;
                self.commit(fresh.version, additions, source_run_id)
            }
            other => other,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::rules::RuleKind;
    use anyhow::Result;

    /// In-memory repository. Each pending race makes another writer commit first.
    #[derive(Default)]
    pub(crate) struct MemoryRules {
        pub snapshots: Mutex<Vec<RuleSetSnapshot>>,
        pub races: Mutex<u32>,
    }

    impl MemoryRules {
        pub fn with_races(races: u32) -> Self {
            Self {
                snapshots: Mutex::new(Vec::new()),
                races: Mutex::new(races),
            }
        }
    }

    impl RuleRepository for MemoryRules {
        fn load_active(&self) -> Result<RuleSetSnapshot, DomainError> {
            Ok(self
                .snapshots
                .lock()
                .unwrap()
                .last()
                .cloned()
                .unwrap_or_default())
        }

        fn head_version(&self) -> Result<u64, DomainError> {
            let mut races = self.races.lock().unwrap();
            let mut snapshots = self.snapshots.lock().unwrap();
            if *races > 0 {
                *races -= 1;
                let head = snapshots.last().cloned().unwrap_or_default();
                snapshots.push(head.successor(Vec::new(), Some("other_run".into())));
            }
            Ok(snapshots.last().map_or(0, |s| s.version))
        }

        fn commit(&self, snapshot: &RuleSetSnapshot) -> Result<(), DomainError> {
            self.snapshots.lock().unwrap().push(snapshot.clone());
            Ok(())
        }

        fn history(&self) -> Result<Vec<RuleSetSnapshot>, DomainError> {
            Ok(self.snapshots.lock().unwrap().clone())
        }
    }

    fn addition(condition: &str) -> RuleAddition {
        RuleAddition {
            draft: RuleDraft::new(RuleKind::Assign, condition, "dq_flag", "'x'"),
            confidence: 0.9,
            provenance: Provenance::AutoAccepted,
        }
    }

    #[test]
    fn test_commit_appends_and_swaps_active() -> Result<()> {
        let store = RuleStore::open(Arc::new(MemoryRules::default()))?;
        let outcome = store.commit(0, &[addition("a > 1"), addition("b > 1")], None)?;
        assert_eq!(outcome.merged, vec![(0, "R0001".to_string()), (1, "R0002".to_string())]);
        assert_eq!(store.active()?.version, 1);
        assert_eq!(store.history()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_nothing_new_writes_no_snapshot() -> Result<()> {
        let store = RuleStore::open(Arc::new(MemoryRules::default()))?;
        store.commit(0, &[addition("a > 1")], None)?;
        let outcome = store.commit(1, &[addition("a>1")], None)?;
        assert!(outcome.snapshot.is_none());
        assert_eq!(outcome.skipped, vec![0]);
        assert_eq!(store.history()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_stale_base_is_a_conflict() -> Result<()> {
        let store = RuleStore::open(Arc::new(MemoryRules::default()))?;
        store.commit(0, &[addition("a > 1")], None)?;
        let err = store.commit(0, &[addition("b > 1")], None).unwrap_err();
        assert!(matches!(err, DomainError::PersistenceConflict { expected: 0, found: 1 }));
        Ok(())
    }

    #[test]
    fn test_retry_succeeds_after_one_race() -> Result<()> {
        let store = RuleStore::open(Arc::new(MemoryRules::with_races(1)))?;
        let outcome = store.commit_with_retry(0, &[addition("a > 1")], None)?;
        let snapshot = outcome.snapshot.unwrap();
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.parent_version, Some(1));
        Ok(())
    }

    #[test]
    fn test_retry_gives_up_after_second_race() -> Result<()> {
        let store = RuleStore::open(Arc::new(MemoryRules::with_races(2)))?;
        let result = store.commit_with_retry(0, &[addition("a > 1")], None);
        assert!(matches!(result, Err(DomainError::PersistenceConflict { .. })));
        Ok(())
    }
}
