//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Open store → Build jobs → Scheduler → Admin API
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → scheduler loops stop arming new slots
//!             → in-flight cycles finish and record their run
//!             → admin server stops accepting
//! ```
//!
//! # Design Decisions
//! - A cycle is never cancelled midway; shutdown only prevents new ones
//! - Shutdown has timeout: forced exit after deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
