// sala-core/src/ports/mod.rs

pub mod connector;
pub mod synthesizer;

pub use connector::{ColumnSchema, Connector};
pub use synthesizer::{EvidenceBundle, SuggestionSynthesizer, SynthesisError};
