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

const BASE_URL: &str = "https://api.bybit.com";
const RATE_LIMIT_CODE: i64 = 10006;

/// # Summary
/// Bybit v5 现货行情提供者实现。
pub struct BybitProvider {
    client: Client,
    catalog: OnceCell<Vec<ListedMarket>>,
}

impl BybitProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            catalog: OnceCell::new(),
        }
    }

    async fn load_catalog(&self) -> Result<Vec<ListedMarket>, MarketError> {
        let resp: BybitResponse<BybitInstrument> = get_json(
            &self.client,
            &format!("{}/v5/market/instruments-info", BASE_URL),
            &[("category", "spot".to_string())],
        )
        .await?;
        Ok(resp
            .into_list()?
            .into_iter()
            .map(|i| ListedMarket {
                pair: MarketPair::new(&i.base_coin, &i.quote_coin),
                symbol: i.symbol,
                listed_at: None,
            })
            .collect())
    }
}

/// # Summary
/// Bybit v5 通用响应包裹。
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BybitResponse<T> {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    result: Option<BybitList<T>>,
}

#[derive(Deserialize, Debug)]
struct BybitList<T> {
    #[serde(default = "Vec::new")]
    list: Vec<T>,
}

impl<T> BybitResponse<T> {
    fn into_list(self) -> Result<Vec<T>, MarketError> {
        match self.ret_code {
            0 => Ok(self.result.map(|r| r.list).unwrap_or_default()),
            RATE_LIMIT_CODE => Err(MarketError::RateLimited(self.ret_msg)),
            code => Err(MarketError::Exchange(format!(
                "bybit retCode {}: {}",
                code, self.ret_msg
            ))),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BybitInstrument {
    symbol: String,
    base_coin: String,
    quote_coin: String,
}

/// kline 行: [startTime, open, high, low, close, volume, turnover]，最新在前
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
        TimeFrame::Minute15 => "15",
        TimeFrame::Day1 => "D",
    }
}

#[async_trait]
impl ExchangeProvider for BybitProvider {
    fn id(&self) -> &str {
        "bybit"
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

    async fn fetch_candles(
        &self,
        market: &ExchangeMarket,
        timeframe: TimeFrame,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketError> {
        let limit = limit.min(self.page_limit());
        let mut query = vec![
            ("category", "spot".to_string()),
            ("symbol", market.market_symbol.clone()),
            ("interval", interval(timeframe).to_string()),
            ("limit", limit.to_string()),
        ];
        // end 为闭区间
        if let Some(b) = before {
            query.push(("end", (b.timestamp_millis() - 1).to_string()));
        }

        let resp: BybitResponse<Vec<Value>> =
            get_json(&self.client, &format!("{}/v5/market/kline", BASE_URL), &query).await?;
        let rows = resp.into_list()?;
        Ok(normalize_page(parse_klines(&rows)?, before, limit))
    }
}
