//! Staple Core - Shared domain types.
//!
//! This crate provides the types shared by every Staple component:
//! - `server` - HTTP adapter, services, and storage backends
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types and their invariants - no I/O, no
//! database access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Emails, staple IDs, quotas, staples, credential records, and
//!   notification events

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
