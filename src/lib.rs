//! # ReceiptMatch
//!
//! Core library for a Telegram bot that photographs grocery receipts,
//! extracts line items via an external vision service, and fuzzy-matches
//! each line against a user's personal ingredient catalog. This crate holds
//! the matching engine, its data model, manual-correction bookkeeping, and
//! the persistence of matching results; the Telegram choreography and the
//! vision call live in the surrounding bot layers.

pub mod cache;
pub mod config;
pub mod editing;
pub mod errors;
pub mod matching;
pub mod observability;
pub mod receipt;
pub mod similarity;
pub mod store;

// Re-export types for easier access
pub use config::{AppConfig, MatchingConfig};
pub use matching::{
    IngredientCatalog, IngredientMatch, IngredientMatcher, IngredientMatchingResult, MatchStatus,
    SuggestedMatch,
};
pub use receipt::{ItemStatus, ReceiptData, ReceiptItem};
