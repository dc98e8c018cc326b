//! Core types shared by the ghstats export pipeline.
//!
//! This crate provides:
//! - The GH Archive event record ([`Event`]) and its normalized type tag
//! - Window frequencies and window keys ([`Frequency`], [`WindowKey`])
//! - A best-effort process memory probe used in progress logs
//! - Shared error types

mod error;
mod event;
pub mod memory;
mod window;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Placeholder used wherever an event carries no actor login.
pub const UNKNOWN_LOGIN: &str = "<unknown>";

/// Timestamp layout used for window keys and `date` columns.
pub const ISO_SECONDS: &str = "%Y-%m-%dT%H:%M:%SZ";

pub use error::{Error, Result};
pub use event::{Actor, Event, Org, Repo};
pub use window::{Frequency, WindowKey};
