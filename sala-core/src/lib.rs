// sala-core/src/lib.rs

#![allow(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::perf)]

// --- MODULES HEXAGONAUX ---

// 1. Ports (Connector, SuggestionSynthesizer)
pub mod ports;

// 2. Domain: rules, statistics, governance. Pure, no I/O.
pub mod domain;

// 3. Infrastructure: DuckDB, JSON stores, synthesizers, YAML config
pub mod infrastructure;

// 4. Application: executor, rule store, mediator, review
pub mod application;

pub mod error;

pub use error::SalaError;
