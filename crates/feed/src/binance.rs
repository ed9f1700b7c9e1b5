use crate::http::{from_millis, get_json, normalize_page, row_f64, row_i64};
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

const BASE_URL: &str = "https://api.binance.com";

/// # Summary
/// Binance 现货行情提供者实现。
///
/// # Invariants
/// - 市场目录在实例生命周期内只成功加载一次。
pub struct BinanceProvider {
    client: Client,
    catalog: OnceCell<Vec<ListedMarket>>,
}

impl BinanceProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            catalog: OnceCell::new(),
        }
    }

    async fn load_catalog(&self) -> Result<Vec<ListedMarket>, MarketError> {
        let info: ExchangeInfo =
            get_json(&self.client, &format!("{}/api/v3/exchangeInfo", BASE_URL), &[]).await?;
        Ok(parse_catalog(info))
    }
}

/// # Summary
/// exchangeInfo 接口响应。
#[derive(Deserialize, Debug)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    base_asset: String,
    quote_asset: String,
}

fn parse_catalog(info: ExchangeInfo) -> Vec<ListedMarket> {
    info.symbols
        .into_iter()
        .map(|s| ListedMarket {
            pair: MarketPair::new(&s.base_asset, &s.quote_asset),
            symbol: s.symbol,
            listed_at: None,
        })
        .collect()
}

/// kline 行: [openTime, open, high, low, close, volume, closeTime, ...]
fn parse_klines(rows: &[Vec<Value>]) -> Result<Vec<Candle>, MarketError> {
    rows.iter()
        .map(|row| {
            Ok(Candle {
                open_time: from_millis(row_i64(row, 0)?)?,
                open: row_f64(row, 1)?,
                high: row_f64(row, 2)?,
                low: row_f64(row, 3)?,
                close: row_f64(row, 4)?,
                volume: row_f64(row, 5)?,
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

#[async_trait]
impl ExchangeProvider for BinanceProvider {
    fn id(&self) -> &str {
        "binance"
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
    /// 通过 /api/v3/klines 抓取 K 线。
    ///
    /// # Logic
    /// 1. `endTime` 为闭区间，因此传入 `before - 1ms`。
    /// 2. 返回结果本身为升序，统一经过 normalize_page 过滤。
    async fn fetch_candles(
        &self,
        market: &ExchangeMarket,
        timeframe: TimeFrame,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketError> {
        let limit = limit.min(self.page_limit());
        let mut query = vec![
            ("symbol", market.market_symbol.clone()),
            ("interval", interval(timeframe).to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(b) = before {
            query.push(("endTime", (b.timestamp_millis() - 1).to_string()));
        }

        let rows: Vec<Vec<Value>> =
            get_json(&self.client, &format!("{}/api/v3/klines", BASE_URL), &query).await?;
        Ok(normalize_page(parse_klines(&rows)?, before, limit))
    }
}
