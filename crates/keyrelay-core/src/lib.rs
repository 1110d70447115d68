//! Core domain + application logic for the license-key relay bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the Seller API
//! transport live behind ports (traits) implemented in adapter crates or in
//! `seller::http`.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod mask;
pub mod messaging;
pub mod normalize;
pub mod ports;
pub mod relay;
pub mod report;
pub mod seller;
pub mod utils;

pub use errors::{Error, Result};
