use crate::common::MarketPair;
use crate::token::entity::TokenIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// # Summary
/// 单根 K 线数据实体，记录特定时段内的行情波动。
///
/// # Invariants
/// - `low <= open, close <= high`。
/// - 所有数值字段非负。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    // K 线开始时间
    pub open_time: DateTime<Utc>,
    // 开盘价
    pub open: f64,
    // 最高价
    pub high: f64,
    // 最低价
    pub low: f64,
    // 收盘价
    pub close: f64,
    // 成交量 (基础币计)
    pub volume: f64,
}

impl Candle {
    /// # Summary
    /// 校验 OHLCV 是否满足不变式。
    ///
    /// # Logic
    /// 1. 所有字段必须为有限非负数。
    /// 2. `low` 为下界，`high` 为上界，`open`/`close` 落在区间内。
    ///
    /// # Returns
    /// 满足返回 true。适配器应丢弃返回 false 的数据行。
    pub fn is_consistent(&self) -> bool {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return false;
        }
        self.low <= self.high
            && self.low <= self.open
            && self.open <= self.high
            && self.low <= self.close
            && self.close <= self.high
    }

    /// # Summary
    /// 以计价币估算的成交额。
    ///
    /// # Logic
    /// 1. 按 close、open、high、low 的顺序取第一个非零价格作为参考价。
    /// 2. 成交量乘以参考价；没有可用价格或成交量为零时返回 None。
    pub fn quote_volume(&self) -> Option<f64> {
        let price = [self.close, self.open, self.high, self.low]
            .into_iter()
            .find(|p| *p > 0.0)?;
        if self.volume > 0.0 {
            Some(self.volume * price)
        } else {
            None
        }
    }
}

/// # Summary
/// 交易所目录中的一个现货市场条目。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedMarket {
    // 规范化交易对
    pub pair: MarketPair,
    // 交易所原生代码 (例如: BTCUSDT, BTC-USDT, BTC_USDT)
    pub symbol: String,
    // 交易所公开的上线时间 (若有)
    pub listed_at: Option<DateTime<Utc>>,
}

/// # Summary
/// 经探测确认存在的交易所市场。
///
/// # Invariants
/// - 只有在交易所目录中确认上线后才会被构造。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeMarket {
    pub exchange_id: String,
    pub base: String,
    pub quote: String,
    pub market_symbol: String,
}

impl ExchangeMarket {
    /// 由目录条目构造。
    pub fn from_listing(exchange_id: &str, listing: &ListedMarket) -> Self {
        Self {
            exchange_id: exchange_id.to_string(),
            base: listing.pair.base.clone(),
            quote: listing.pair.quote.clone(),
            market_symbol: listing.symbol.clone(),
        }
    }

    pub fn pair(&self) -> MarketPair {
        MarketPair::new(&self.base, &self.quote)
    }
}

/// # Summary
/// 单个交易所的探测结果状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStatus {
    // 找到最早 K 线
    Found,
    // 候选交易对均未上线
    NoMarket,
    // 市场存在但没有 K 线
    NoData,
    // 网络或交易所错误 (已重试)
    FetchError,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProbeStatus::Found => "FOUND",
            ProbeStatus::NoMarket => "NO_MARKET",
            ProbeStatus::NoData => "NO_DATA",
            ProbeStatus::FetchError => "FETCH_ERROR",
        };
        f.write_str(s)
    }
}

/// # Summary
/// 首日行情统计，来自包含最早 15 分钟 K 线的日线。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOneStats {
    pub open: f64,
    pub high: f64,
    // high / open，open 为零时不可用
    pub high_open_ratio: Option<f64>,
}

impl DayOneStats {
    pub fn from_candle(candle: &Candle) -> Self {
        let ratio = if candle.open > 0.0 {
            Some(candle.high / candle.open)
        } else {
            None
        };
        Self {
            open: candle.open,
            high: candle.high,
            high_open_ratio: ratio,
        }
    }
}

/// # Summary
/// 单个交易所的探测结果。
///
/// # Invariants
/// - `status == Found` 当且仅当 `earliest_candle` 存在。
/// - `status == NoMarket` 时 `market` 为空。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeResult {
    pub exchange_id: String,
    pub market: Option<ExchangeMarket>,
    pub earliest_candle: Option<Candle>,
    pub status: ProbeStatus,
    // 底层错误描述，仅用于诊断
    pub error: Option<String>,
    pub day_one: Option<DayOneStats>,
    // 附加说明 (例如交易所历史晚于预期 TGE)
    pub note: Option<String>,
}

impl ExchangeResult {
    pub fn found(exchange_id: &str, market: ExchangeMarket, candle: Candle) -> Self {
        Self {
            exchange_id: exchange_id.to_string(),
            market: Some(market),
            earliest_candle: Some(candle),
            status: ProbeStatus::Found,
            error: None,
            day_one: None,
            note: None,
        }
    }

    pub fn no_market(exchange_id: &str) -> Self {
        Self {
            exchange_id: exchange_id.to_string(),
            market: None,
            earliest_candle: None,
            status: ProbeStatus::NoMarket,
            error: None,
            day_one: None,
            note: None,
        }
    }

    pub fn no_data(exchange_id: &str, market: ExchangeMarket) -> Self {
        Self {
            exchange_id: exchange_id.to_string(),
            market: Some(market),
            earliest_candle: None,
            status: ProbeStatus::NoData,
            error: None,
            day_one: None,
            note: None,
        }
    }

    pub fn fetch_error(
        exchange_id: &str,
        market: Option<ExchangeMarket>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            exchange_id: exchange_id.to_string(),
            market,
            earliest_candle: None,
            status: ProbeStatus::FetchError,
            error: Some(error.into()),
            day_one: None,
            note: None,
        }
    }

    pub fn is_found(&self) -> bool {
        self.status == ProbeStatus::Found && self.earliest_candle.is_some()
    }
}

/// # Summary
/// 跨交易所最早的一根 K 线及其所属交易所。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarliestListing {
    pub exchange_id: String,
    pub candle: Candle,
}

/// # Summary
/// 单个代币身份的汇总报告，交给报告输出端消费。
///
/// # Invariants
/// - `earliest_overall` 存在当且仅当至少一个结果为 Found。
/// - `weighted_high`/`weighted_open` 与 `earliest_overall` 同时存在或同时缺失。
/// - `volume_weighted == false` 表示使用了算术平均回退。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedReport {
    pub ticker: String,
    pub token: Option<TokenIdentity>,
    // 与调用方给定的交易所顺序一致
    pub per_exchange: Vec<ExchangeResult>,
    pub earliest_overall: Option<EarliestListing>,
    pub weighted_high: Option<f64>,
    pub weighted_open: Option<f64>,
    pub volume_weighted: bool,
    // Found 结果首根 K 线的计价币成交额之和
    pub total_volume: f64,
}

impl ConsolidatedReport {
    /// # Summary
    /// 报告中是否没有任何交易所找到数据。
    pub fn is_empty(&self) -> bool {
        self.earliest_overall.is_none()
    }

    /// # Summary
    /// 参与汇总的 (交易所, K 线) 序列，保持交易所原始顺序。
    pub fn contributing_candles(&self) -> impl Iterator<Item = (&str, &Candle)> {
        self.per_exchange
            .iter()
            .filter(|r| r.is_found())
            .filter_map(|r| {
                r.earliest_candle
                    .as_ref()
                    .map(|c| (r.exchange_id.as_str(), c))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle {
            open_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn test_candle_consistency() {
        assert!(candle(1.0, 1.2, 0.9, 1.1, 10.0).is_consistent());
        assert!(!candle(1.3, 1.2, 0.9, 1.1, 10.0).is_consistent());
        assert!(!candle(1.0, 1.2, 0.9, 1.1, -1.0).is_consistent());
        assert!(!candle(f64::NAN, 1.2, 0.9, 1.1, 1.0).is_consistent());
    }

    #[test]
    fn test_quote_volume_uses_first_nonzero_price() {
        assert_eq!(candle(1.0, 1.2, 0.9, 2.0, 10.0).quote_volume(), Some(20.0));
        assert_eq!(candle(0.5, 1.2, 0.0, 0.0, 10.0).quote_volume(), Some(5.0));
        assert_eq!(candle(1.0, 1.2, 0.9, 1.1, 0.0).quote_volume(), None);
    }

    #[test]
    fn test_day_one_ratio() {
        let stats = DayOneStats::from_candle(&candle(2.0, 5.0, 1.0, 3.0, 1.0));
        assert_eq!(stats.high_open_ratio, Some(2.5));
        let zero = DayOneStats::from_candle(&candle(0.0, 5.0, 0.0, 3.0, 1.0));
        assert_eq!(zero.high_open_ratio, None);
    }
}
