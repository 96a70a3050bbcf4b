//! Core types for Staple.
//!
//! This module provides type-safe wrappers for the queue's domain concepts.

pub mod email;
pub mod event;
pub mod id;
pub mod quota;
pub mod staple;
pub mod user;

pub use email::{Email, EmailError};
pub use event::NotificationEvent;
pub use id::StapleId;
pub use quota::{MaxStaples, QuotaError};
pub use staple::{NewStaple, Staple};
pub use user::{Owner, UserRecord};
