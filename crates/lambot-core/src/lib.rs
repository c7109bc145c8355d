//! # Lambot Core
//!
//! Core types, configuration, and secrets for Lambot.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - Secret wrappers that keep credentials out of logs
//! - Shared message types used by the channel adapters

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod secrets;
pub mod types;

pub use config::{Config, ConfigError, TransmissionConfig};
pub use secrets::BotToken;
pub use types::{DeliveryResult, Message};
