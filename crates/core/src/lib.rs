//! Session orchestration for the Loft local dev workflow.
//!
//! One `loft dev` invocation runs exactly one session: resolve (or
//! provision) a backend account suited to the project's components, make
//! sure the project exists remotely, drive the initial build and deploy
//! through the polling engine, then stay live serving local clients over
//! the update hub until the host asks the session to stop.
//!
//! The platform REST client, credential storage, prompt rendering, and
//! source translation are the host's concern; they plug in through the
//! traits in [`collaborators`].

pub mod account;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod hub;
pub mod poll;
pub mod session;
pub mod shutdown;

pub use config::SessionConfig;
pub use error::{LoftError, Result, SessionOutcome};
pub use session::{SessionOrchestrator, start};
pub use shutdown::{ShutdownHandle, ShutdownSignal, shutdown_channel};
