use crate::http::{collect_windows, from_secs, get_json, row_f64, row_i64};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tgescan_core::common::{MarketPair, TimeFrame};
use tgescan_core::market::entity::{Candle, ExchangeMarket, ListedMarket};
use tgescan_core::market::error::MarketError;
use tgescan_core::market::port::ExchangeProvider;
use tokio::sync::OnceCell;

const BASE_URL: &str = "https://api.kucoin.com";
const SUCCESS_CODE: &str = "200000";
const RATE_LIMIT_CODE: &str = "429000";
// 交易对不存在或已下线
const PAIR_NOT_PROVIDED_CODE: &str = "400100";

/// # Summary
/// KuCoin 现货行情提供者实现。
pub struct KucoinProvider {
    client: Client,
    catalog: OnceCell<Vec<ListedMarket>>,
}

impl KucoinProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            catalog: OnceCell::new(),
        }
    }

    async fn load_catalog(&self) -> Result<Vec<ListedMarket>, MarketError> {
        let resp: KucoinResponse<Vec<KucoinSymbol>> =
            get_json(&self.client, &format!("{}/api/v2/symbols", BASE_URL), &[]).await?;
        Ok(resp
            .into_data()?
            .into_iter()
            .map(|s| ListedMarket {
                pair: MarketPair::new(&s.base_currency, &s.quote_currency),
                symbol: s.symbol,
                listed_at: None,
            })
            .collect())
    }

    /// 请求 `[end - span, end)` 窗口内的 K 线；窗口早于纪元时返回 None。
    async fn fetch_window(
        &self,
        market: &ExchangeMarket,
        timeframe: TimeFrame,
        end: DateTime<Utc>,
        span: Duration,
    ) -> Result<Option<Vec<Candle>>, MarketError> {
        let end_at = end.timestamp() - 1;
        if end_at < 0 {
            return Ok(None);
        }
        let start_at = (end - span).timestamp().max(0);

        let query = vec![
            ("symbol", market.market_symbol.clone()),
            ("type", candle_type(timeframe).to_string()),
            ("startAt", start_at.to_string()),
            ("endAt", end_at.to_string()),
        ];
        let resp: KucoinResponse<Vec<Vec<Value>>> = get_json(
            &self.client,
            &format!("{}/api/v1/market/candles", BASE_URL),
            &query,
        )
        .await?;
        Ok(Some(parse_candles(&resp.into_data()?)?))
    }
}

#[derive(Deserialize, Debug)]
struct KucoinResponse<T> {
    code: String,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T: Default> KucoinResponse<T> {
    fn into_data(self) -> Result<T, MarketError> {
        match self.code.as_str() {
            SUCCESS_CODE => Ok(self.data.unwrap_or_default()),
            RATE_LIMIT_CODE => Err(MarketError::RateLimited(self.msg)),
            PAIR_NOT_PROVIDED_CODE => Err(MarketError::NotFound),
            code => Err(MarketError::Exchange(format!("kucoin code {}: {}", code, self.msg))),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct KucoinSymbol {
    symbol: String,
    base_currency: String,
    quote_currency: String,
}

/// candle 行: [time, open, close, high, low, volume, turnover]，最新在前
fn parse_candles(rows: &[Vec<Value>]) -> Result<Vec<Candle>, MarketError> {
    rows.iter()
        .map(|row| {
            Ok(Candle {
                open_time: from_secs(row_i64(row, 0)?)?,
                open: row_f64(row, 1)?,
                close: row_f64(row, 2)?,
                high: row_f64(row, 3)?,
                low: row_f64(row, 4)?,
                volume: row_f64(row, 5)?,
            })
        })
        .collect()
}

fn candle_type(timeframe: TimeFrame) -> &'static str {
    match timeframe {
        TimeFrame::Minute15 => "15min",
        TimeFrame::Day1 => "1day",
    }
}

#[async_trait]
impl ExchangeProvider for KucoinProvider {
    fn id(&self) -> &str {
        "kucoin"
    }

    fn page_limit(&self) -> usize {
        1500
    }

    async fn list_markets(&self) -> Result<Vec<ListedMarket>, MarketError> {
        self.catalog
            .get_or_try_init(|| self.load_catalog())
            .await
            .cloned()
    }

    /// # Summary
    /// 通过 /api/v1/market/candles 抓取 K 线。
    ///
    /// # Logic
    /// 1. 接口只接受时间窗口，无成交的周期不返回数据行。
    /// 2. 以 `limit` 个周期为窗口向前回溯，直到凑满 `limit` 根 (见 collect_windows)。
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
            self.fetch_window(market, timeframe, end, span)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_order() {
        let resp: KucoinResponse<Vec<Vec<Value>>> = serde_json::from_value(json!({
            "code": "200000",
            "data": [["1700000000", "1.0", "1.1", "1.2", "0.9", "1000", "1100"]]
        }))
        .unwrap();
        let c = &parse_candles(&resp.into_data().unwrap()).unwrap()[0];
        assert_eq!((c.open, c.high, c.low, c.close, c.volume), (1.0, 1.2, 0.9, 1.1, 1000.0));
    }

    #[test]
    fn test_codes() {
        let limited: KucoinResponse<Vec<Vec<Value>>> =
            serde_json::from_value(json!({"code": "429000", "msg": "Too Many Requests"})).unwrap();
        assert!(limited.into_data().unwrap_err().is_transient());

        let missing: KucoinResponse<Vec<Vec<Value>>> =
            serde_json::from_value(json!({"code": "400100", "msg": "This pair is not provided at present"}))
                .unwrap();
        assert_eq!(missing.into_data().unwrap_err(), MarketError::NotFound);

        let other: KucoinResponse<Vec<Vec<Value>>> =
            serde_json::from_value(json!({"code": "400001", "msg": "Invalid KC-API-KEY"})).unwrap();
        assert!(matches!(other.into_data(), Err(MarketError::Exchange(_))));
    }
}
