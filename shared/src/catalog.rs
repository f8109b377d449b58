//! Catalog product types

use serde::{Deserialize, Serialize};

/// Catalog product - authoritative row as returned by the store backend
///
/// `stock` is the live count at fetch time. Validation must always work
/// from a fresh fetch, never from a cached page-load snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogProduct {
    /// Product ID
    pub id: String,
    /// Product name
    pub name: String,
    /// Unit price
    pub price: f64,
    /// Available stock at fetch time
    pub stock: u32,
    /// Product image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}
