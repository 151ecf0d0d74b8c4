//! # Cratemind Common Library
//!
//! Shared code for the cratemind services:
//! - Common error type
//! - Configuration loading and root folder resolution
//! - Analysis event types and the broadcast `EventBus`

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
