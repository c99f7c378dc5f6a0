//! Wire types for the Loft local dev-session protocol.
//!
//! This crate contains the serde-serializable types exchanged between the
//! session process and its local clients, plus the shared data-model shapes
//! they reference (accounts, components, session state).
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * Stable: Changes only when the wire protocol changes
//!
//! The orchestration logic built on top of these types lives in `loft-core`.

pub mod account;
pub mod component;
pub mod session;
pub mod wire;

pub use account::*;
pub use component::*;
pub use session::*;
pub use wire::*;
