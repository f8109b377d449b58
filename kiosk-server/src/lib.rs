//! Kiosk Server - 无人售货机结算边缘服务
//!
//! # 架构概述
//!
//! 本模块是售货机前端的核心服务，负责付款确认之后的全部编排：
//!
//! - **结算核心** (`checkout`): 库存复核 → 订单提交 → 逐件出货状态机
//! - **商店网关** (`store`): 目录读取、订单落库、库存扣减 (远端 HTTP)
//! - **机器网关** (`machine`): 出货执行器的单件出货协议
//! - **HTTP API** (`api`): 结算启动 / 进度查询 / 会话清理
//! - **系统问题** (`issues`): 提交不一致的对账记录
//!
//! # 模块结构
//!
//! ```text
//! kiosk-server/src/
//! ├── core/          # 配置、状态、服务器
//! ├── common/        # 错误、日志
//! ├── checkout/      # 校验、提交、出货序列器、进度估算
//! ├── store/         # 商店后端网关
//! ├── machine/       # 售货机执行器网关
//! ├── issues/        # 对账记录
//! └── api/           # HTTP 路由和处理器
//! ```

pub mod api;
pub mod checkout;
pub mod common;
pub mod core;
pub mod issues;
pub mod machine;
pub mod store;

// Re-export 公共类型
pub use checkout::{
    CheckoutOrchestrator, CheckoutSession, CommitError, DispenseSequencer, ProgressParams,
};
pub use common::{AppError, AppResult};
pub use core::{Config, Server, ServerState};
pub use issues::{SystemIssue, SystemIssueLog};
pub use machine::{DispenseError, DispenseGateway, HttpDispenseGateway};
pub use store::{HttpStoreGateway, StoreError, StoreGateway};

// Re-export logger functions
pub use common::logger::init_logger_with_file;

/// 设置运行环境: dotenv + 日志
pub fn setup_environment() {
    dotenv::dotenv().ok();
    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());
}
