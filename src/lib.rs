//! # Royale Scrape
//!
//! Clash Royale player statistics extracted from public royaleapi.com pages
//! and served as JSON.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (profiles, cards, battles, tags)
//! - **parse**: HTML extractors, one per page section
//! - **compose**: Assembly of the full player record
//! - **fetch**: Upstream page retrieval
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod api;
pub mod compose;
pub mod config;
pub mod fetch;
pub mod models;
pub mod parse;

pub use models::*;
