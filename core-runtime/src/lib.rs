//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the vault sync core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its configuration types,
//! its event channel and its logging conventions.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CacheSettings, ComparisonSettings, CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream};
