// src/domain/ports/mod.rs

pub mod artifacts;
pub mod baseline;
pub mod rules;

pub use artifacts::ArtifactStore;
pub use baseline::BaselineRepository;
pub use rules::{CommitLock, RuleRepository};
