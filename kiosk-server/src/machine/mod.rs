//! Vending machine actuator gateway
//!
//! 执行器是非可重入的远端设备：同一时刻只能安全执行一条电机指令。
//! 网关本身不做互斥，单飞保证由出货序列器的单工作者结构承担。

use async_trait::async_trait;
use shared::dispense::DispenseRequest;
use std::time::Duration;

/// Dispense gateway errors
///
/// The sequencer treats every variant identically for progression purposes
/// (a failed unit is still "attempted"); the variants exist for logging and
/// for the operator-facing failure record.
#[derive(Debug, thiserror::Error)]
pub enum DispenseError {
    #[error("Dispense request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Machine returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Dispense request timed out")]
    Timeout,
}

/// The actuator's per-unit dispense protocol
#[async_trait]
pub trait DispenseGateway: Send + Sync {
    /// Issue exactly one unit-dispense command
    ///
    /// Any 2xx response is success; anything else is failure. No response
    /// schema beyond success/failure signaling is required.
    async fn dispense_unit(
        &self,
        machine_id: &str,
        request: &DispenseRequest,
    ) -> Result<(), DispenseError>;
}

/// HTTP implementation: `POST /machines/{machine_id}/dispense`
pub struct HttpDispenseGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDispenseGateway {
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
}

#[async_trait]
impl DispenseGateway for HttpDispenseGateway {
    async fn dispense_unit(
        &self,
        machine_id: &str,
        request: &DispenseRequest,
    ) -> Result<(), DispenseError> {
        let url = format!("{}/machines/{}/dispense", self.base_url, machine_id);
        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DispenseError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
