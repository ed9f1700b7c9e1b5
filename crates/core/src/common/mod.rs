use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// # Summary
/// 交易对实体，由基础币与计价币组成。
///
/// # Invariants
/// - `base` 与 `quote` 始终为大写形式，便于跨交易所比对。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketPair {
    // 基础币 (例如: ELIZAOS)
    pub base: String,
    // 计价币 (例如: USDT)
    pub quote: String,
}

impl MarketPair {
    /// # Summary
    /// 构造交易对并统一转为大写。
    ///
    /// # Arguments
    /// * `base`: 基础币代码。
    /// * `quote`: 计价币代码。
    ///
    /// # Returns
    /// 规范化后的 MarketPair。
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: base.trim().to_uppercase(),
            quote: quote.trim().to_uppercase(),
        }
    }
}

impl fmt::Display for MarketPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// # Summary
/// K 线周期枚举。
///
/// # Invariants
/// - 探测只使用 `Minute15`，`Day1` 仅用于读取首日统计。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TimeFrame {
    // 15分钟
    Minute15,
    // 1日
    Day1,
}

impl TimeFrame {
    /// # Summary
    /// 返回单根 K 线覆盖的时长。
    pub fn duration(&self) -> Duration {
        match self {
            TimeFrame::Minute15 => Duration::minutes(15),
            TimeFrame::Day1 => Duration::days(1),
        }
    }
}
