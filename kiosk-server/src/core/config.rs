/// 服务器配置 - 售货机结算节点的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | STORE_API_URL | http://localhost:4000 | 商店后端地址 (目录/订单/库存) |
/// | MACHINE_API_URL | http://localhost:5000 | 售货机执行器地址 |
/// | MACHINE_ID | kiosk-01 | 本机售货机 ID |
/// | TAX_RATE_PERCENT | 8.0 | 税率 (百分比) |
/// | DISPENSE_TIMEOUT_MS | 10000 | 单件出货请求超时(毫秒) |
/// | PER_UNIT_SECONDS | 2.5 | 单件出货周期估算(秒) |
/// | REQUEST_TIMEOUT_MS | 30000 | 商店网关请求超时(毫秒) |
/// | ENVIRONMENT | development | 运行环境 |
///
/// # 示例
///
/// ```ignore
/// MACHINE_ID=lobby-02 HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 商店后端 URL (目录读取、订单落库、库存扣减)
    pub store_api_url: String,
    /// 售货机执行器 URL
    pub machine_api_url: String,
    /// 本节点驱动的售货机 ID
    pub machine_id: String,
    /// 税率 (百分比, 8.0 = 8%)
    pub tax_rate_percent: f64,
    /// 单件出货请求超时 (毫秒)
    pub dispense_timeout_ms: u64,
    /// 单件出货周期估算 (秒, 用于剩余时间预估)
    pub per_unit_seconds: f64,
    /// 商店网关请求超时 (毫秒)
    pub request_timeout_ms: u64,
    /// 运行环境: development | staging | production
    pub environment: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            store_api_url: std::env::var("STORE_API_URL")
                .unwrap_or_else(|_| "http://localhost:4000".into()),
            machine_api_url: std::env::var("MACHINE_API_URL")
                .unwrap_or_else(|_| "http://localhost:5000".into()),
            machine_id: std::env::var("MACHINE_ID").unwrap_or_else(|_| "kiosk-01".into()),
            tax_rate_percent: std::env::var("TAX_RATE_PERCENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8.0),
            dispense_timeout_ms: std::env::var("DISPENSE_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10000),
            per_unit_seconds: std::env::var("PER_UNIT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2.5),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
