use crate::common::MarketPair;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// # Summary
/// 元数据服务的单条搜索结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMatch {
    // 元数据服务的规范 ID (例如: bitcoin)
    pub id: String,
    // 展示名称
    pub name: String,
    // 代币代码
    pub symbol: String,
}

/// # Summary
/// 元数据服务记录的单个交易场所行情。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueTicker {
    // 场所名称 (例如: Binance, Uniswap V3)
    pub venue: String,
    pub base: String,
    pub quote: String,
    // 元数据服务上报的成交量，用于排序
    pub volume: f64,
}

/// # Summary
/// 代币详情，补充交易对与预期 TGE 时间。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenDetails {
    pub tickers: Vec<VenueTicker>,
    pub expected_tge: Option<DateTime<Utc>>,
}

/// # Summary
/// 规范代币身份，用于区分同名代币。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenIdentity {
    pub canonical_id: String,
    pub display_name: String,
    pub symbol: String,
}

/// # Summary
/// 解析后的候选代币。
///
/// # Invariants
/// - 创建后不可变。
/// - `known_symbols` 已去重，顺序即探测顺序。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenCandidate {
    // 用户输入 (已去空格并大写)
    pub ticker: String,
    pub canonical_id: String,
    pub display_name: String,
    pub known_symbols: Vec<MarketPair>,
    pub expected_tge: Option<DateTime<Utc>>,
}

impl TokenCandidate {
    pub fn identity(&self) -> TokenIdentity {
        TokenIdentity {
            canonical_id: self.canonical_id.clone(),
            display_name: self.display_name.clone(),
            symbol: self.ticker.clone(),
        }
    }
}
