pub mod compliance;
pub mod dataset;
pub mod error;
pub mod governance;
pub mod numeric;
pub mod ports;
pub mod project;
pub mod report;
pub mod rules;

// Re-exports pratiques pour simplifier les imports ailleurs
pub use dataset::{Dataset, Row, Value};
pub use error::DomainError;
