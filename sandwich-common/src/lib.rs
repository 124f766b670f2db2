//! Sandwich Common - Shared types, utilities, and configuration for the sandwich screener.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Error types and handling utilities
//! - Logging setup and structured logging helpers
//! - Utility functions used by the screener service and CLI

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;

pub use config::{
    Config, DataSourceEntry, DataSourcesConfig, ObservabilityConfig, ScreenerConfig,
    TelegramConfig, WatchlistConfig, WatchlistKind,
};
pub use error::{Error, Result};
