// sala-core/src/domain/ports/rules.rs

use crate::domain::error::DomainError;
use crate::domain::rules::RuleSetSnapshot;

/// Held for the length of a commit. Dropping it releases the lock.
pub trait CommitLock: Send {}

/// Durable home of the versioned rule set.
pub trait RuleRepository: Send + Sync {
    /// Excludes every other process writing the same state. Repositories that
    /// live in a single process return `None`.
    fn lock(&self) -> Result<Option<Box<dyn CommitLock>>, DomainError> {
        Ok(None)
    }

    /// Latest committed snapshot, or the empty version-0 set when nothing was ever committed.
    fn load_active(&self) -> Result<RuleSetSnapshot, DomainError>;

    fn head_version(&self) -> Result<u64, DomainError>;

    /// Makes `snapshot` the active set and appends it to history.
    /// Fails with `PersistenceConflict` when the head is no longer `snapshot.parent_version`.
    fn commit(&self, snapshot: &RuleSetSnapshot) -> Result<(), DomainError>;

    /// Every committed snapshot, oldest first.
    fn history(&self) -> Result<Vec<RuleSetSnapshot>, DomainError>;
}
