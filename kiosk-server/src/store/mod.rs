//! Store backend gateway
//!
//! 商店后端是一个远端服务，提供三个被消费的接口：目录读取、订单落库、
//! 单品库存扣减。结算核心只通过 [`StoreGateway`] 访问它，测试用内存
//! 假实现替换。

use async_trait::async_trait;
use serde::Serialize;
use shared::catalog::CatalogProduct;
use shared::order::{OrderRecord, StoredOrder};
use std::time::Duration;

/// Store gateway errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Store returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Store backend operations consumed by the checkout core
#[async_trait]
pub trait StoreGateway: Send + Sync {
    /// Fetch the current catalog
    ///
    /// Must hit the backend every time. Validation works on live stock
    /// counts; a cached snapshot defeats the point of revalidating.
    async fn fetch_catalog(&self) -> Result<Vec<CatalogProduct>, StoreError>;

    /// Persist a completed order record
    async fn create_order(&self, record: &OrderRecord) -> Result<StoredOrder, StoreError>;

    /// Decrement one product's stock by the purchased quantity
    async fn decrement_stock(&self, product_id: &str, quantity: u32) -> Result<(), StoreError>;
}

/// HTTP implementation of the store gateway
pub struct HttpStoreGateway {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct DecrementBody {
    quantity: u32,
}

impl HttpStoreGateway {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl StoreGateway for HttpStoreGateway {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogProduct>, StoreError> {
        let url = format!("{}/products", self.base_url);
        let response = self.client.get(&url).send().await?;
        let response = Self::check_status(response).await?;
        let catalog = response.json::<Vec<CatalogProduct>>().await?;
        tracing::debug!(products = catalog.len(), "Fetched catalog snapshot");
        Ok(catalog)
    }

    async fn create_order(&self, record: &OrderRecord) -> Result<StoredOrder, StoreError> {
        let url = format!("{}/orders", self.base_url);
        let response = self.client.post(&url).json(record).send().await?;
        let response = Self::check_status(response).await?;
        let stored = response.json::<StoredOrder>().await?;
        tracing::info!(
            transaction_id = %record.transaction_id,
            order_id = %stored.id,
            total = record.total,
            "Order persisted"
        );
        Ok(stored)
    }

    async fn decrement_stock(&self, product_id: &str, quantity: u32) -> Result<(), StoreError> {
        let url = format!("{}/products/{}/decrement", self.base_url, product_id);
        let response = self
            .client
            .post(&url)
            .json(&DecrementBody { quantity })
            .send()
            .await?;
        Self::check_status(response).await?;
        tracing::debug!(product_id = %product_id, quantity, "Stock decremented");
        Ok(())
    }
}
