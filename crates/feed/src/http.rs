use chrono::{DateTime, TimeZone, Utc};
use std::future::Future;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tgescan_core::market::entity::Candle;
use tgescan_core::market::error::MarketError;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("tgescan/", env!("CARGO_PKG_VERSION"));

/// # Summary
/// 构建所有适配器共享的 HTTP 客户端。
///
/// # Logic
/// 1. 配置单次请求超时。
/// 2. 设置 User-Agent 以减少被拦截风险。
///
/// # Arguments
/// * `timeout`: 单次请求超时。
///
/// # Returns
/// 成功返回 reqwest 客户端，失败返回 MarketError。
pub fn build_client(timeout: Duration) -> Result<Client, MarketError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| MarketError::Network(format!("Failed to build HTTP client: {}", e)))
}

/// # Summary
/// 发送 GET 请求并解析 JSON 响应。
///
/// # Logic
/// 1. 发送请求；超时映射为 `Timeout`，其余传输错误映射为 `Network`。
/// 2. 非 2xx 状态码映射为 `Http` 或 `RateLimited`。
/// 3. 读取完整响应体后反序列化，失败映射为 `Parse`。
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<T, MarketError> {
    debug!(url, "GET");
    let resp = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(map_transport_error)?;

    let status = resp.status();
    let body = resp.text().await.map_err(map_transport_error)?;
    if !status.is_success() {
        warn!(url, status = status.as_u16(), "request rejected");
        return Err(MarketError::from_status(status.as_u16(), truncate(&body)));
    }

    serde_json::from_str(&body).map_err(|e| MarketError::Parse(e.to_string()))
}

fn map_transport_error(e: reqwest::Error) -> MarketError {
    if e.is_timeout() {
        MarketError::Timeout
    } else {
        MarketError::Network(e.to_string())
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(200).collect()
}

/// 解析可能以字符串或数字表示的浮点数。
pub(crate) fn value_f64(value: &Value) -> Result<f64, MarketError> {
    match value {
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|e| MarketError::Parse(format!("bad number {:?}: {}", s, e))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| MarketError::Parse(format!("bad number {}", n))),
        other => Err(MarketError::Parse(format!("expected number, got {}", other))),
    }
}

/// 解析可能以字符串或数字表示的整数。
pub(crate) fn value_i64(value: &Value) -> Result<i64, MarketError> {
    match value {
        Value::String(s) => s
            .parse::<i64>()
            .map_err(|e| MarketError::Parse(format!("bad integer {:?}: {}", s, e))),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| MarketError::Parse(format!("bad integer {}", n))),
        other => Err(MarketError::Parse(format!("expected integer, got {}", other))),
    }
}

pub(crate) fn row_f64(row: &[Value], idx: usize) -> Result<f64, MarketError> {
    row.get(idx)
        .ok_or_else(|| MarketError::Parse(format!("missing column {}", idx)))
        .and_then(value_f64)
}

pub(crate) fn row_i64(row: &[Value], idx: usize) -> Result<i64, MarketError> {
    row.get(idx)
        .ok_or_else(|| MarketError::Parse(format!("missing column {}", idx)))
        .and_then(value_i64)
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, MarketError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| MarketError::Parse(format!("bad timestamp {}", ms)))
}

pub(crate) fn from_secs(secs: i64) -> Result<DateTime<Utc>, MarketError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| MarketError::Parse(format!("bad timestamp {}", secs)))
}

/// # Summary
/// 将交易所原始 K 线整理为统一的分页结果。
///
/// # Logic
/// 1. 丢弃不满足 OHLC 不变式的行以及不早于 `before` 的行。
/// 2. 按开盘时间升序排序并去重。
/// 3. 只保留最近的 `limit` 根。
pub(crate) fn normalize_page(
    mut candles: Vec<Candle>,
    before: Option<DateTime<Utc>>,
    limit: usize,
) -> Vec<Candle> {
    candles.retain(|c| c.is_consistent() && before.is_none_or(|b| c.open_time < b));
    candles.sort_by_key(|c| c.open_time);
    candles.dedup_by_key(|c| c.open_time);
    let skip = candles.len().saturating_sub(limit);
    candles.drain(..skip);
    candles
}

// 按时间窗口查询的接口单次最多向前回溯的窗口数
pub(crate) const MAX_WINDOWS: usize = 8;

/// # Summary
/// 把只接受时间窗口的 K 线接口适配为按条数分页的语义。
///
/// # Logic
/// 1. 从 `before` 开始逐个向前请求长度为 `span` 的窗口。
/// 2. 凑满 `limit` 根后停止。
/// 3. 已有数据时遇到空窗口即停止；尚无数据时继续回溯，最多 `MAX_WINDOWS` 个窗口。
/// 4. `fetch_window` 返回 None 表示窗口超出交易所可查询的历史，立即停止。
///
/// # Arguments
/// * `fetch_window`: 给定窗口上界 (开区间)，返回 `[end - span, end)` 内的 K 线。
pub(crate) async fn collect_windows<F, Fut>(
    before: DateTime<Utc>,
    span: chrono::Duration,
    limit: usize,
    mut fetch_window: F,
) -> Result<Vec<Candle>, MarketError>
where
    F: FnMut(DateTime<Utc>) -> Fut,
    Fut: Future<Output = Result<Option<Vec<Candle>>, MarketError>>,
{
    let mut collected = Vec::new();
    let mut end = before;
    for _ in 0..MAX_WINDOWS {
        let Some(mut window) = fetch_window(end).await? else {
            break;
        };
        let empty = window.is_empty();
        collected.append(&mut window);
        if collected.len() >= limit || (empty && !collected.is_empty()) {
            break;
        }
        end -= span;
    }
    Ok(normalize_page(collected, Some(before), limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candle(minute: u32, high: f64) -> Candle {
        Candle {
            open_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
            open: 1.0,
            high,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
        }
    }

    #[test]
    fn test_value_parsing_accepts_strings_and_numbers() {
        assert_eq!(value_f64(&json!("1.5")).unwrap(), 1.5);
        assert_eq!(value_f64(&json!(2)).unwrap(), 2.0);
        assert_eq!(value_i64(&json!("1700000000000")).unwrap(), 1_700_000_000_000);
        assert!(value_f64(&json!(null)).is_err());
        assert!(row_f64(&[json!("1")], 3).is_err());
    }

    #[test]
    fn test_normalize_page_sorts_filters_and_trims() {
        let before = Utc.with_ymd_and_hms(2024, 1, 1, 0, 45, 0).unwrap();
        let raw = vec![
            candle(45, 2.0),
            candle(30, 2.0),
            candle(0, 2.0),
            candle(15, 0.5), // high < low
            candle(30, 2.0),
        ];
        let page = normalize_page(raw, Some(before), 5);
        let minutes: Vec<_> = page.iter().map(|c| c.open_time.format("%M").to_string()).collect();
        assert_eq!(minutes, vec!["00", "30"]);

        let trimmed = normalize_page(vec![candle(0, 2.0), candle(15, 2.0), candle(30, 2.0)], None, 2);
        assert_eq!(trimmed.len(), 2);
        assert_eq!(trimmed[0].open_time.format("%M").to_string(), "15");
    }

    fn at_minute(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
    }

    /// 每 15 分钟一根，缺少 `gaps` 中的序号
    fn windowed(count: i64, gaps: &[i64], end: DateTime<Utc>, span: chrono::Duration) -> Vec<Candle> {
        (0..count)
            .filter(|i| !gaps.contains(i))
            .map(|i| Candle {
                open_time: at_minute(i * 15),
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 1.0,
            })
            .filter(|c| c.open_time < end && c.open_time >= end - span)
            .collect()
    }

    #[tokio::test]
    async fn test_collect_windows_fills_limit_across_gaps() {
        let span = chrono::Duration::minutes(15 * 10);
        let mut calls = 0;
        let page = collect_windows(at_minute(100 * 15), span, 10, |end| {
            calls += 1;
            async move { Ok(Some(windowed(100, &[95, 97], end, span))) }
        })
        .await
        .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(page.len(), 10);
        assert_eq!(page[0].open_time, at_minute(88 * 15));
    }

    #[tokio::test]
    async fn test_collect_windows_walks_past_quiet_stretch() {
        let span = chrono::Duration::minutes(15 * 10);
        // 只有前 5 根，之后长时间无成交
        let page = collect_windows(at_minute(40 * 15), span, 10, |end| async move {
            Ok(Some(windowed(5, &[], end, span)))
        })
        .await
        .unwrap();

        assert_eq!(page.len(), 5);
        assert_eq!(page[0].open_time, at_minute(0));
    }

    #[tokio::test]
    async fn test_collect_windows_stops_at_history_limit() {
        let span = chrono::Duration::minutes(15 * 10);
        let mut calls = 0;
        let page = collect_windows(at_minute(100 * 15), span, 10, |_| {
            calls += 1;
            async { Ok(None) }
        })
        .await
        .unwrap();

        assert!(page.is_empty());
        assert_eq!(calls, 1);
    }
}
