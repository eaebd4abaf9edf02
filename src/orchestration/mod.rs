//! Replay orchestration: event source in, indexed ledger out.

pub mod orchestrator;

pub use orchestrator::{Orchestrator, ReplaySummary};
