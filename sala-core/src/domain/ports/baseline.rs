// sala-core/src/domain/ports/baseline.rs

use crate::domain::compliance::Baseline;
use crate::domain::error::DomainError;

pub trait BaselineRepository: Send + Sync {
    /// `None` on the first run for this dataset identity.
    fn load(&self, dataset: &str) -> Result<Option<Baseline>, DomainError>;

    fn save(&self, dataset: &str, baseline: &Baseline) -> Result<(), DomainError>;
}
