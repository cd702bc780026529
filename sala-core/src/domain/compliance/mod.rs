// sala-core/src/domain/compliance/mod.rs

pub mod anomaly;
pub mod config;
pub mod drift;
pub mod profile;

pub use anomaly::{AnomalyDetector, DegenerateReason, OutlierReport};
pub use config::{MonitoredColumns, MonitoringConfig};
pub use drift::{Baseline, ColumnBaseline, DriftMonitor, DriftReport};
pub use profile::{ColumnProfile, DatasetProfile};
