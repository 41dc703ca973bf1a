//! # Core Types
//!
//! This crate defines the fundamental types shared by the scheduler
//! simulator crates.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: Identities are typed and cannot be confused.
//! - **Type safety first**: A pool index is never mistaken for a pid.
//!
//! ## Key Types
//!
//! - [`Pid`]: External process identity, assigned by configuration
//! - [`ProcessIndex`]: Stable position of a process in the scheduler's pool
//! - [`RunId`]: Unique identifier for one simulation run

pub mod ids;

pub use ids::{Pid, ProcessIndex, RunId};
