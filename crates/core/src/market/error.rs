use thiserror::Error;

/// # Summary
/// 市场数据域错误枚举，处理网络、限流、解析及数据缺失等问题。
///
/// # Invariants
/// - 必须通过 `thiserror` 派生 `Error` trait。
/// - `is_transient` 决定重试策略是否会再次尝试。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    // 网络层错误 (连接失败、连接重置等)，包含底层 HTTP 客户端错误信息
    #[error("Network error: {0}")]
    Network(String),
    // 请求超时
    #[error("Request timed out")]
    Timeout,
    // 交易所限流 (HTTP 429 或等价业务码)
    #[error("Rate limited: {0}")]
    RateLimited(String),
    // 非成功的 HTTP 状态码
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    // 数据解析错误，如 JSON 格式不匹配
    #[error("Parse error: {0}")]
    Parse(String),
    // 交易所返回的业务错误码
    #[error("Exchange error: {0}")]
    Exchange(String),
    // 交易对或资源不存在 (HTTP 404 或交易所的不存在错误码)
    #[error("Data not found")]
    NotFound,
}

impl MarketError {
    /// # Summary
    /// 根据 HTTP 状态码构造错误。
    ///
    /// # Logic
    /// 1. 429 映射为 `RateLimited`，404 映射为 `NotFound`。
    /// 2. 其余状态码保留原始数值与响应体。
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => MarketError::RateLimited(body),
            404 => MarketError::NotFound,
            _ => MarketError::Http { status, body },
        }
    }

    /// # Summary
    /// 判断错误是否为瞬时错误。
    ///
    /// # Returns
    /// 超时、限流、5xx 与连接错误返回 true；其他 4xx、解析错误和业务错误返回 false。
    pub fn is_transient(&self) -> bool {
        match self {
            MarketError::Network(_) | MarketError::Timeout | MarketError::RateLimited(_) => true,
            MarketError::Http { status, .. } => *status >= 500,
            MarketError::Parse(_) | MarketError::Exchange(_) | MarketError::NotFound => false,
        }
    }
}
