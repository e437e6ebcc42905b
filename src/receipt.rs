//! # Receipt Data Model
//!
//! Structured line items as returned by the external receipt-vision service.
//! The matching engine only reads item names; quantities and prices are
//! carried through for the surrounding bot layers (table rendering, export).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sentinel the vision service emits for a line it could not read.
pub const UNRECOGNIZED_NAME: &str = "???";

/// Recognition status of one parsed receipt line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// The line was parsed with reasonable confidence.
    #[default]
    Recognized,
    /// The parser flagged the line for manual review.
    NeedsReview,
}

/// One parsed line from a photographed receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    /// 1-based position of the line on the receipt.
    pub line_number: u32,
    /// Item name as extracted from the receipt.
    pub name: String,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
    pub total: Option<f64>,
    #[serde(default)]
    pub status: ItemStatus,
    /// True when `total` was derived from quantity and price rather than read.
    #[serde(default)]
    pub auto_calculated: bool,
}

impl ReceiptItem {
    /// Create an item carrying only a name, for lines where the parser could
    /// not extract numeric fields.
    pub fn with_name(line_number: u32, name: &str) -> Self {
        Self {
            line_number,
            name: name.to_string(),
            quantity: None,
            price: None,
            total: None,
            status: ItemStatus::default(),
            auto_calculated: false,
        }
    }
}

/// An ordered list of parsed receipt lines.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptData {
    pub items: Vec<ReceiptItem>,
}

impl ReceiptData {
    pub fn new(items: Vec<ReceiptItem>) -> Self {
        Self { items }
    }

    /// SHA-256 hex digest over the receipt content.
    ///
    /// Used as the storage key for matching results so that re-opening the
    /// same receipt restores prior manual corrections. Stable across
    /// re-parses of identical content; any change to a line's name, position
    /// or numbers produces a different key.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for item in &self.items {
            hasher.update(format!(
                "{}|{}|{:?}|{:?}|{:?}\n",
                item.line_number, item.name, item.quantity, item.price, item.total
            ));
        }
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect()
    }
}
