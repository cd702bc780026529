// sala-core/src/infrastructure/store/mod.rs

pub mod artifacts;
pub mod baseline;
pub mod rules;

pub use artifacts::FileArtifactStore;
pub use baseline::FileBaselineRepository;
pub use rules::FileRuleRepository;
