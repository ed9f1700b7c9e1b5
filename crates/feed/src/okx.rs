use crate::http::{from_millis, get_json, normalize_page, row_f64, row_i64, value_i64};
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

const BASE_URL: &str = "https://www.okx.com";
// 请求频率超限
const RATE_LIMIT_CODE: &str = "50011";

/// # Summary
/// OKX 现货行情提供者实现。
///
/// # Invariants
/// - 目录中的 `listTime` 作为上线时间暴露给探测逻辑。
/// - 历史 K 线接口单页最多 100 条。
pub struct OkxProvider {
    client: Client,
    catalog: OnceCell<Vec<ListedMarket>>,
}

impl OkxProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            catalog: OnceCell::new(),
        }
    }

    async fn load_catalog(&self) -> Result<Vec<ListedMarket>, MarketError> {
        let resp: OkxResponse<OkxInstrument> = get_json(
            &self.client,
            &format!("{}/api/v5/public/instruments", BASE_URL),
            &[("instType", "SPOT".to_string())],
        )
        .await?;
        parse_catalog(resp.into_data()?)
    }
}

/// # Summary
/// OKX v5 通用响应包裹。
#[derive(Deserialize, Debug)]
struct OkxResponse<T> {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

impl<T> OkxResponse<T> {
    fn into_data(self) -> Result<Vec<T>, MarketError> {
        match self.code.as_str() {
            "0" => Ok(self.data),
            RATE_LIMIT_CODE => Err(MarketError::RateLimited(self.msg)),
            code => Err(MarketError::Exchange(format!("okx code {}: {}", code, self.msg))),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct OkxInstrument {
    inst_id: String,
    base_ccy: String,
    quote_ccy: String,
    #[serde(default)]
    list_time: Value,
}

fn parse_catalog(instruments: Vec<OkxInstrument>) -> Result<Vec<ListedMarket>, MarketError> {
    instruments
        .into_iter()
        .map(|inst| {
            // listTime 可能为空字符串
            let listed_at = match value_i64(&inst.list_time) {
                Ok(ms) if ms > 0 => Some(from_millis(ms)?),
                _ => None,
            };
            Ok(ListedMarket {
                pair: MarketPair::new(&inst.base_ccy, &inst.quote_ccy),
                symbol: inst.inst_id,
                listed_at,
            })
        })
        .collect()
}

/// candle 行: [ts, o, h, l, c, vol, volCcy, volCcyQuote, confirm]，最新在前
fn parse_candles(rows: &[Vec<Value>]) -> Result<Vec<Candle>, MarketError> {
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

fn bar(timeframe: TimeFrame) -> &'static str {
    match timeframe {
        TimeFrame::Minute15 => "15m",
        TimeFrame::Day1 => "1Dutc",
    }
}

#[async_trait]
impl ExchangeProvider for OkxProvider {
    fn id(&self) -> &str {
        "okx"
    }

    fn page_limit(&self) -> usize {
        100
    }

    async fn list_markets(&self) -> Result<Vec<ListedMarket>, MarketError> {
        self.catalog
            .get_or_try_init(|| self.load_catalog())
            .await
            .cloned()
    }

    /// # Summary
    /// 通过 /api/v5/market/history-candles 抓取 K 线。
    ///
    /// # Logic
    /// 1. `after` 参数返回早于该时间戳的数据，与 `before` 语义一致。
    /// 2. 返回为降序，统一经过 normalize_page 转为升序。
    async fn fetch_candles(
        &self,
        market: &ExchangeMarket,
        timeframe: TimeFrame,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketError> {
        let limit = limit.min(self.page_limit());
        let mut query = vec![
            ("instId", market.market_symbol.clone()),
            ("bar", bar(timeframe).to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(b) = before {
            query.push(("after", b.timestamp_millis().to_string()));
        }

        let resp: OkxResponse<Vec<Value>> = get_json(
            &self.client,
            &format!("{}/api/v5/market/history-candles", BASE_URL),
            &query,
        )
        .await?;
        let rows = resp.into_data()?;
        Ok(normalize_page(parse_candles(&rows)?, before, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_catalog_reads_list_time() {
        let resp: OkxResponse<OkxInstrument> = serde_json::from_value(json!({
            "code": "0",
            "msg": "",
            "data": [
                {"instId": "ELIZAOS-USDT", "baseCcy": "ELIZAOS", "quoteCcy": "USDT", "listTime": "1700000000000", "state": "live"},
                {"instId": "OLD-USDT", "baseCcy": "OLD", "quoteCcy": "USDT", "listTime": "", "state": "live"}
            ]
        }))
        .unwrap();
        let catalog = parse_catalog(resp.into_data().unwrap()).unwrap();
        assert_eq!(catalog[0].symbol, "ELIZAOS-USDT");
        assert_eq!(
            catalog[0].listed_at.map(|t| t.timestamp_millis()),
            Some(1_700_000_000_000)
        );
        assert!(catalog[1].listed_at.is_none());
    }

    #[test]
    fn test_error_codes_are_classified() {
        let limited: OkxResponse<Vec<Value>> =
            serde_json::from_value(json!({"code": "50011", "msg": "Too Many Requests", "data": []})).unwrap();
        let err = limited.into_data().unwrap_err();
        assert!(err.is_transient());

        let bad: OkxResponse<Vec<Value>> =
            serde_json::from_value(json!({"code": "51001", "msg": "Instrument ID does not exist"})).unwrap();
        assert!(matches!(bad.into_data(), Err(MarketError::Exchange(_))));
    }

    #[test]
    fn test_descending_rows_become_ascending() {
        let rows: Vec<Vec<Value>> = serde_json::from_value(json!([
            ["1700000900000", "1.1", "1.3", "1.0", "1.2", "50", "55", "55", "1"],
            ["1700000000000", "1.0", "1.2", "0.9", "1.1", "100", "110", "110", "1"]
        ]))
        .unwrap();
        let page = normalize_page(parse_candles(&rows).unwrap(), None, 100);
        assert_eq!(page[0].open_time.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(page[1].volume, 50.0);
    }
}
