//! Order types - validation rejections, the validated order and its wire form

use crate::cart::CartLine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Validation Rejections
// ============================================================================

/// 拒绝原因 - 单个购物车行校验失败的结构化原因
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// 商品不在目录中（已下架或 ID 无效）
    #[error("Product not found in catalog")]
    ProductNotFound,
    /// 库存不足
    #[error("Insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: u32, requested: u32 },
}

/// One rejected cart line
///
/// A non-empty rejection list is a hard stop for the whole checkout:
/// no order is created and no stock is touched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineRejection {
    /// Product ID of the rejected line
    pub product_id: String,
    /// Structured rejection reason
    pub reason: RejectReason,
}

// ============================================================================
// Order
// ============================================================================

/// Order status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Completed,
}

/// Validated order - exists only after every line passed stock validation
///
/// `transaction_id` is the external correlation key for the persisted order
/// and for every hardware dispense call issued on its behalf.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatedOrder {
    /// Validated cart lines, in cart order
    pub lines: Vec<CartLine>,
    /// Sum of line totals
    pub subtotal: f64,
    /// Tax amount
    pub tax: f64,
    /// Final total (subtotal + tax)
    pub total: f64,
    /// Vending machine this order dispenses from
    pub machine_id: String,
    /// Process-unique transaction ID, generated at commit time
    pub transaction_id: String,
}

impl ValidatedOrder {
    /// Total number of physical dispense units in this order
    pub fn unit_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Build the wire record sent to the store backend
    pub fn to_record(&self, buyer_id: Option<String>) -> OrderRecord {
        OrderRecord {
            transaction_id: self.transaction_id.clone(),
            machine_id: self.machine_id.clone(),
            buyer_id,
            lines: self.lines.clone(),
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
            status: OrderStatus::Completed,
        }
    }
}

/// Order record - wire form persisted by the store backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRecord {
    /// Transaction ID (correlation key)
    pub transaction_id: String,
    /// Vending machine ID
    pub machine_id: String,
    /// Buyer ID, when the shopper is signed in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyer_id: Option<String>,
    /// Line items
    pub lines: Vec<CartLine>,
    /// Subtotal
    pub subtotal: f64,
    /// Tax
    pub tax: f64,
    /// Total
    pub total: f64,
    /// Order status (always COMPLETED - payment is final before commit)
    pub status: OrderStatus,
}

/// Stored order - what the store backend returns after persisting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredOrder {
    /// Server-assigned record ID
    pub id: String,
    /// Server-side creation timestamp
    pub created_at: DateTime<Utc>,
}

/// 生成事务 ID
///
/// 时间戳派生、进程内唯一。格式: `TXN-{毫秒时间戳}-{uuid 前 8 位}`，
/// 前缀时间戳保证可按创建顺序排序，uuid 片段避免同毫秒冲突。
pub fn generate_transaction_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("TXN-{}-{}", millis, &suffix[..8])
}
