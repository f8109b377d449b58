use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::checkout::{CheckoutOrchestrator, CheckoutSession, ProgressParams};
use crate::common::AppError;
use crate::core::Config;
use crate::issues::SystemIssueLog;
use crate::machine::{DispenseGateway, HttpDispenseGateway};
use crate::store::{HttpStoreGateway, StoreGateway};

/// 服务器状态 - 持有所有服务的单例引用
///
/// ServerState 是结算节点的核心数据结构，使用 Arc 实现浅拷贝。
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | store | Arc<dyn StoreGateway> | 商店后端网关 |
/// | dispenser | Arc<dyn DispenseGateway> | 售货机执行器网关 |
/// | issues | Arc<SystemIssueLog> | 对账问题记录 |
/// | sessions | Arc<DashMap> | 结算会话注册表 |
/// | shutdown | CancellationToken | 关闭信号 (传播给序列器任务) |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 商店后端网关
    pub store: Arc<dyn StoreGateway>,
    /// 售货机执行器网关
    pub dispenser: Arc<dyn DispenseGateway>,
    /// 系统问题记录 (提交不一致)
    pub issues: Arc<SystemIssueLog>,
    /// 结算会话注册表 (session_id → session)
    pub sessions: Arc<DashMap<String, Arc<CheckoutSession>>>,
    /// 全局关闭信号
    pub shutdown: CancellationToken,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .field("issues", &self.issues.len())
            .finish()
    }
}

impl ServerState {
    /// 初始化服务器状态 (HTTP 网关)
    pub fn initialize(config: &Config) -> Self {
        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        let store: Arc<dyn StoreGateway> =
            Arc::new(HttpStoreGateway::new(&config.store_api_url, request_timeout));
        let dispenser: Arc<dyn DispenseGateway> = Arc::new(HttpDispenseGateway::new(
            &config.machine_api_url,
            // Per-request transport timeout; the sequencer applies its own
            // per-unit timeout on top.
            Duration::from_millis(config.dispense_timeout_ms),
        ));
        Self::with_gateways(config.clone(), store, dispenser)
    }

    /// 使用自定义网关构造 (测试用内存假实现)
    pub fn with_gateways(
        config: Config,
        store: Arc<dyn StoreGateway>,
        dispenser: Arc<dyn DispenseGateway>,
    ) -> Self {
        Self {
            config,
            store,
            dispenser,
            issues: Arc::new(SystemIssueLog::new()),
            sessions: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// 构造结算编排器
    pub fn orchestrator(&self) -> CheckoutOrchestrator {
        CheckoutOrchestrator::new(
            self.store.clone(),
            self.dispenser.clone(),
            self.issues.clone(),
            self.config.machine_id.clone(),
            self.config.tax_rate_percent,
            Duration::from_millis(self.config.dispense_timeout_ms),
            ProgressParams {
                per_unit_seconds: self.config.per_unit_seconds,
            },
        )
    }

    /// 创建并注册一个新会话
    pub fn create_session(&self) -> Arc<CheckoutSession> {
        let session = Arc::new(CheckoutSession::new(
            self.config.machine_id.clone(),
            self.shutdown.child_token(),
        ));
        self.sessions.insert(session.id.clone(), session.clone());
        tracing::debug!(session_id = %session.id, "Checkout session created");
        session
    }

    /// 查找会话
    pub fn get_session(&self, session_id: &str) -> Option<Arc<CheckoutSession>> {
        self.sessions.get(session_id).map(|s| s.value().clone())
    }

    /// 移除会话 (不做终态检查, 供校验拒绝后的即时回收使用)
    pub fn remove_session(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// 清理已结束的会话
    ///
    /// 清理是丢弃会话状态并回到 idle 的唯一合法操作，且仅在终态
    /// (complete / aborted) 允许；出货进行中的会话不可清理。
    pub fn clear_session(&self, session_id: &str) -> Result<(), AppError> {
        let session = self
            .get_session(session_id)
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))?;
        if !session.can_clear() {
            return Err(AppError::Conflict(
                "Checkout still in progress, cannot clear".into(),
            ));
        }
        self.sessions.remove(session_id);
        tracing::info!(session_id = %session_id, "Checkout session cleared");
        Ok(())
    }
}
