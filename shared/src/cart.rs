//! Cart line types
//!
//! A cart line is an immutable snapshot taken at the moment checkout
//! begins. Later stock changes affect validation against the live catalog,
//! never this record.

use serde::{Deserialize, Serialize};

/// Cart line snapshot - frozen when checkout starts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartLine {
    /// Product ID
    pub product_id: String,
    /// Product name snapshot
    pub name: String,
    /// Unit price snapshot
    pub unit_price: f64,
    /// Purchased quantity
    pub quantity: u32,
    /// Product image URL snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Cart line input - what the presentation layer submits at checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLineInput {
    /// Product ID
    pub product_id: String,
    /// Product name
    pub name: String,
    /// Unit price
    pub unit_price: f64,
    /// Quantity
    pub quantity: u32,
    /// Product image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<CartLineInput> for CartLine {
    fn from(input: CartLineInput) -> Self {
        Self {
            product_id: input.product_id,
            name: input.name,
            unit_price: input.unit_price,
            quantity: input.quantity,
            image: input.image,
        }
    }
}
