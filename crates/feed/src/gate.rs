use crate::http::{collect_windows, from_secs, get_json, row_f64, row_i64};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tgescan_core::common::{MarketPair, TimeFrame};
use tgescan_core::market::entity::{Candle, ExchangeMarket, ListedMarket};
use tgescan_core::market::error::MarketError;
use tgescan_core::market::port::ExchangeProvider;
use tokio::sync::OnceCell;

const BASE_URL: &str = "https://api.gateio.ws";
// 距今超过该数量的 K 线会被接口拒绝
const MAX_HISTORY_POINTS: i64 = 10_000;

/// # Summary
/// Gate 现货行情提供者实现。
///
/// # Invariants
/// - `buy_start` 大于零时作为上线时间暴露。
/// - 超出历史深度的请求在本地直接返回空页，不发往交易所。
pub struct GateProvider {
    client: Client,
    catalog: OnceCell<Vec<ListedMarket>>,
}

impl GateProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            catalog: OnceCell::new(),
        }
    }

    async fn load_catalog(&self) -> Result<Vec<ListedMarket>, MarketError> {
        let pairs: Vec<GatePair> = get_json(
            &self.client,
            &format!("{}/api/v4/spot/currency_pairs", BASE_URL),
            &[],
        )
        .await?;
        parse_catalog(pairs)
    }

    /// 请求 `before` 之前 `limit` 个周期的窗口；超出历史深度时返回 None。
    async fn fetch_window(
        &self,
        market: &ExchangeMarket,
        timeframe: TimeFrame,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Option<Vec<Candle>>, MarketError> {
        let Some((from, to)) = query_window(before, timeframe, limit, Utc::now()) else {
            return Ok(None);
        };
        let query = vec![
            ("currency_pair", market.market_symbol.clone()),
            ("interval", interval(timeframe).to_string()),
            ("from", from.to_string()),
            ("to", to.to_string()),
        ];
        let rows: Vec<Vec<Value>> = get_json(
            &self.client,
            &format!("{}/api/v4/spot/candlesticks", BASE_URL),
            &query,
        )
        .await?;
        Ok(Some(parse_candlesticks(&rows)?))
    }
}

#[derive(Deserialize, Debug)]
struct GatePair {
    id: String,
    base: String,
    quote: String,
    #[serde(default)]
    buy_start: i64,
}

fn parse_catalog(pairs: Vec<GatePair>) -> Result<Vec<ListedMarket>, MarketError> {
    pairs
        .into_iter()
        .map(|p| {
            let listed_at = if p.buy_start > 0 {
                Some(from_secs(p.buy_start)?)
            } else {
                None
            };
            Ok(ListedMarket {
                pair: MarketPair::new(&p.base, &p.quote),
                symbol: p.id,
                listed_at,
            })
        })
        .collect()
}

/// candlestick 行: [t, quote_volume, close, high, low, open, base_volume, window_closed]
fn parse_candlesticks(rows: &[Vec<Value>]) -> Result<Vec<Candle>, MarketError> {
    rows.iter()
        .map(|row| {
            Ok(Candle {
                open_time: from_secs(row_i64(row, 0)?)?,
                open: row_f64(row, 5)?,
                high: row_f64(row, 3)?,
                low: row_f64(row, 4)?,
                close: row_f64(row, 2)?,
                volume: row_f64(row, 6)?,
            })
        })
        .collect()
}

fn interval(timeframe: TimeFrame) -> &'static str {
    match timeframe {
        TimeFrame::Minute15 => "15m",
        TimeFrame::Day1 => "1d",
    }
}

/// # Summary
/// 计算 `[from, to]` 查询窗口 (秒)。
///
/// # Logic
/// 1. `to` 为闭区间，取 `before - 1s`。
/// 2. `from` 回退 `limit` 个周期，并截断到历史深度边界。
/// 3. 整个窗口都在边界之前时返回 None。
fn query_window(
    before: DateTime<Utc>,
    timeframe: TimeFrame,
    limit: usize,
    now: DateTime<Utc>,
) -> Option<(i64, i64)> {
    let step = timeframe.duration().num_seconds();
    let span = i64::try_from(limit).unwrap_or(MAX_HISTORY_POINTS) * step;
    let floor = now.timestamp() - MAX_HISTORY_POINTS * step;
    let to = before.timestamp() - 1;
    if to < floor {
        return None;
    }
    Some(((to - span + 1).max(floor), to))
}

#[async_trait]
impl ExchangeProvider for GateProvider {
    fn id(&self) -> &str {
        "gate"
    }

    fn page_limit(&self) -> usize {
        1000
    }

    async fn list_markets(&self) -> Result<Vec<ListedMarket>, MarketError> {
        self.catalog
            .get_or_try_init(|| self.load_catalog())
            .await
            .cloned()
    }

    /// # Summary
    /// 通过 /api/v4/spot/candlesticks 抓取 K 线。
    ///
    /// # Logic
    /// 1. 有上界时接口只能按时间窗口查询，窗口内可能缺少数据行。
    /// 2. 以 `limit` 个周期为窗口向前回溯，直到凑满 `limit` 根或超出历史深度。
    /// 3. `before` 为 None 时从当前时间开始回溯。
    async fn fetch_candles(
        &self,
        market: &ExchangeMarket,
        timeframe: TimeFrame,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketError> {
        let limit = limit.clamp(1, self.page_limit());
        let span = timeframe.duration() * i32::try_from(limit).unwrap_or(i32::MAX);
        collect_windows(before.unwrap_or_else(Utc::now), span, limit, |end| {
            self.fetch_window(market, timeframe, end, limit)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_column_order() {
        let rows: Vec<Vec<Value>> = serde_json::from_value(json!([
            ["1700000000", "1100", "1.1", "1.2", "0.9", "1.0", "1000", "true"]
        ]))
        .unwrap();
        let c = &parse_candlesticks(&rows).unwrap()[0];
        assert_eq!((c.open, c.high, c.low, c.close, c.volume), (1.0, 1.2, 0.9, 1.1, 1000.0));
        assert!(c.is_consistent());
    }

    #[test]
    fn test_catalog_buy_start() {
        let pairs: Vec<GatePair> = serde_json::from_value(json!([
            {"id": "ELIZAOS_USDT", "base": "ELIZAOS", "quote": "USDT", "buy_start": 1700000000, "trade_status": "tradable"},
            {"id": "OLD_USDT", "base": "OLD", "quote": "USDT", "buy_start": 0}
        ]))
        .unwrap();
        let catalog = parse_catalog(pairs).unwrap();
        assert_eq!(catalog[0].listed_at.map(|t| t.timestamp()), Some(1_700_000_000));
        assert!(catalog[1].listed_at.is_none());
    }

    #[test]
    fn test_query_window_respects_history_depth() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let (from, to) = query_window(now, TimeFrame::Minute15, 1000, now).unwrap();
        assert_eq!(to, now.timestamp() - 1);
        assert_eq!(to - from + 1, 1000 * 900);

        let ancient = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert!(query_window(ancient, TimeFrame::Minute15, 1000, now).is_none());

        // 窗口跨越边界时截断 from
        let edge = now - chrono::Duration::seconds(9_500 * 900);
        let (from, _) = query_window(edge, TimeFrame::Minute15, 1000, now).unwrap();
        assert_eq!(from, now.timestamp() - 10_000 * 900);
    }
}
