use crate::http::get_json;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use tgescan_core::market::error::MarketError;
use tgescan_core::token::entity::{TokenDetails, TokenMatch, VenueTicker};
use tgescan_core::token::port::TokenDirectory;

/// # Summary
/// 基于 CoinGecko REST API 的代币元数据服务。
///
/// # Invariants
/// - 只读查询，不保留调用间状态。
pub struct CoinGeckoDirectory {
    client: Client,
    base_url: String,
}

impl CoinGeckoDirectory {
    /// # Summary
    /// 创建 CoinGecko 客户端。
    ///
    /// # Arguments
    /// * `client`: 共享的 HTTP 客户端。
    /// * `base_url`: API 根地址 (例如 `https://api.coingecko.com/api/v3`)。
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<SearchCoin>,
}

#[derive(Deserialize, Debug)]
struct SearchCoin {
    id: String,
    name: String,
    #[serde(default)]
    symbol: String,
}

#[derive(Deserialize, Debug)]
struct CoinResponse {
    genesis_date: Option<String>,
    #[serde(default)]
    tickers: Vec<CoinTicker>,
}

#[derive(Deserialize, Debug)]
struct CoinTicker {
    base: Option<String>,
    target: Option<String>,
    market: Option<TickerMarket>,
    volume: Option<f64>,
    last_traded_at: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TickerMarket {
    name: Option<String>,
}

/// # Summary
/// 估算预期 TGE 时间。
///
/// # Logic
/// 1. 优先使用 `genesis_date` (按 UTC 零点)。
/// 2. 否则取所有行情中最早的 `last_traded_at`。
fn expected_tge(coin: &CoinResponse) -> Option<DateTime<Utc>> {
    let genesis = coin
        .genesis_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc());
    if genesis.is_some() {
        return genesis;
    }

    coin.tickers
        .iter()
        .filter_map(|t| t.last_traded_at.as_deref())
        .filter_map(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .min()
}

fn into_details(coin: CoinResponse) -> TokenDetails {
    let expected = expected_tge(&coin);
    let tickers = coin
        .tickers
        .into_iter()
        .filter_map(|t| {
            let venue = t.market.and_then(|m| m.name)?;
            Some(VenueTicker {
                venue,
                base: t.base?,
                quote: t.target?,
                volume: t.volume.unwrap_or(0.0),
            })
        })
        .collect();
    TokenDetails {
        tickers,
        expected_tge: expected,
    }
}

#[async_trait]
impl TokenDirectory for CoinGeckoDirectory {
    /// # Summary
    /// 调用 `/search` 接口。
    ///
    /// # Logic
    /// 1. 搜索接口为模糊匹配，精确过滤由解析器完成。
    async fn search(&self, query: &str) -> Result<Vec<TokenMatch>, MarketError> {
        let resp: SearchResponse = get_json(
            &self.client,
            &format!("{}/search", self.base_url),
            &[("query", query.to_string())],
        )
        .await?;
        Ok(resp
            .coins
            .into_iter()
            .map(|c| TokenMatch {
                id: c.id,
                name: c.name,
                symbol: c.symbol,
            })
            .collect())
    }

    async fn details(&self, id: &str) -> Result<TokenDetails, MarketError> {
        let params = [
            ("localization", "false"),
            ("tickers", "true"),
            ("market_data", "false"),
            ("community_data", "false"),
            ("developer_data", "false"),
            ("sparkline", "false"),
        ]
        .map(|(k, v)| (k, v.to_string()));
        let coin: CoinResponse =
            get_json(&self.client, &format!("{}/coins/{}", self.base_url, id), &params).await?;
        Ok(into_details(coin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_details_prefer_genesis_date() {
        let coin: CoinResponse = serde_json::from_value(json!({
            "id": "elizaos",
            "genesis_date": "2024-11-05",
            "tickers": [
                {"base": "ELIZAOS", "target": "USDT", "market": {"name": "Binance"}, "volume": 1200.5,
                 "last_traded_at": "2024-10-01T00:00:00+00:00"},
                {"base": "0xabc", "target": "WETH", "market": {"name": "Uniswap V3 (Ethereum)"}, "volume": 10.0}
            ]
        }))
        .unwrap();
        let details = into_details(coin);
        assert_eq!(details.expected_tge.unwrap().to_rfc3339(), "2024-11-05T00:00:00+00:00");
        assert_eq!(details.tickers.len(), 2);
        assert_eq!(details.tickers[0].venue, "Binance");
        assert_eq!(details.tickers[0].volume, 1200.5);
    }

    #[test]
    fn test_details_fall_back_to_last_traded() {
        let coin: CoinResponse = serde_json::from_value(json!({
            "genesis_date": null,
            "tickers": [
                {"base": "AAA", "target": "USDT", "market": {"name": "OKX"}, "last_traded_at": "2024-03-02T00:00:00+00:00"},
                {"base": "AAA", "target": "USDC", "market": {"name": "Bybit"}, "last_traded_at": "2024-03-01T12:00:00+00:00"},
                {"base": "AAA", "target": null, "market": {"name": "Gate"}}
            ]
        }))
        .unwrap();
        let details = into_details(coin);
        assert_eq!(details.expected_tge.unwrap().to_rfc3339(), "2024-03-01T12:00:00+00:00");
        // 缺少 target 的行被丢弃
        assert_eq!(details.tickers.len(), 2);
    }

    #[test]
    fn test_search_payload() {
        let resp: SearchResponse = serde_json::from_value(json!({
            "coins": [{"id": "ai16z", "name": "ai16z", "symbol": "AI16Z", "market_cap_rank": 100}],
            "exchanges": []
        }))
        .unwrap();
        assert_eq!(resp.coins[0].id, "ai16z");
    }
}
