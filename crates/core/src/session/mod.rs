//! Session lifecycle subsystem.
//!
//! This module owns the [`Session`] aggregate and the orchestrator that
//! drives it from account resolution through live operation to teardown.

/// The coordinating state machine.
pub mod orchestrator;
/// Session aggregate and status transitions.
pub mod state;

/// Session entry point for the host CLI.
pub use orchestrator::{SessionOrchestrator, start};
/// Session aggregate.
pub use state::Session;
