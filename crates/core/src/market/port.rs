use crate::common::TimeFrame;
use crate::market::entity::{Candle, ExchangeMarket, ListedMarket};
use crate::market::error::MarketError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// # Summary
/// 单个交易所的行情数据提供者接口。
///
/// # Invariants
/// - 每个交易所实现一次，探测逻辑不针对具体交易所分支。
/// - `fetch_candles` 返回的 K 线按时间升序排列 (最旧在前)。
/// - 实现者只发起请求，不负责重试；重试由调用方的策略统一处理。
#[async_trait]
pub trait ExchangeProvider: Send + Sync {
    /// # Summary
    /// 交易所唯一标识 (例如: binance)。
    fn id(&self) -> &str;

    /// # Summary
    /// 单次 K 线请求的最大条数。
    fn page_limit(&self) -> usize;

    /// # Summary
    /// 列出交易所的现货市场目录。
    ///
    /// # Logic
    /// 1. 请求交易所的交易对目录接口。
    /// 2. 规范化 base/quote；暂停交易或已下线的交易对保留在目录中，其历史 K 线仍可查询。
    ///
    /// # Returns
    /// 成功返回目录条目列表，失败返回 MarketError。
    async fn list_markets(&self) -> Result<Vec<ListedMarket>, MarketError>;

    /// # Summary
    /// 获取开盘时间严格早于 `before` 的最近 `limit` 根 K 线。
    ///
    /// # Logic
    /// 1. `before` 为 None 时返回最新一页。
    /// 2. 将交易所原始返回统一转换为升序的 Candle 列表。
    /// 3. 丢弃不满足 OHLC 不变式的数据行。
    ///
    /// # Arguments
    /// * `market`: 已确认的交易所市场。
    /// * `timeframe`: K 线周期。
    /// * `before`: 开区间上界。
    /// * `limit`: 最大条数，超过 `page_limit` 时按 `page_limit` 截断。
    ///
    /// # Returns
    /// 成功返回 K 线列表 (可能为空)。
    async fn fetch_candles(
        &self,
        market: &ExchangeMarket,
        timeframe: TimeFrame,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketError>;
}
