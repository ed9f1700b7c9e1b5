//! 测试替身：可编排的交易所与元数据服务实现，仅在 `test-utils` 特性下编译。

use crate::common::{MarketPair, TimeFrame};
use crate::market::entity::{Candle, ExchangeMarket, ListedMarket};
use crate::market::error::MarketError;
use crate::market::port::ExchangeProvider;
use crate::token::entity::{TokenDetails, TokenMatch};
use crate::token::port::TokenDirectory;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// # Summary
/// 可编排的交易所实现，按时间过滤内存中的完整历史。
///
/// # Invariants
/// - `history` 与 `daily` 按时间升序保存。
/// - 预置的失败按先进先出顺序在正常响应之前返回。
pub struct ScriptedProvider {
    id: String,
    page_limit: usize,
    catalog: Vec<ListedMarket>,
    history: Vec<Candle>,
    daily: Vec<Candle>,
    delay: Duration,
    // 早于该时间的数据不可达，模拟交易所历史深度限制
    reachable_from: Option<DateTime<Utc>>,
    // 按时间窗口而非条数分页，模拟只接受时间窗口的交易所
    time_windows: bool,
    catalog_failures: Mutex<VecDeque<MarketError>>,
    candle_failures: Mutex<VecDeque<MarketError>>,
    catalog_calls: AtomicUsize,
    candle_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            page_limit: 100,
            catalog: Vec::new(),
            history: Vec::new(),
            daily: Vec::new(),
            delay: Duration::ZERO,
            reachable_from: None,
            time_windows: false,
            catalog_failures: Mutex::new(VecDeque::new()),
            candle_failures: Mutex::new(VecDeque::new()),
            catalog_calls: AtomicUsize::new(0),
            candle_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = limit;
        self
    }

    /// 上架一个交易对，原生代码为 `BASEQUOTE`。
    pub fn with_market(mut self, base: &str, quote: &str) -> Self {
        let pair = MarketPair::new(base, quote);
        self.catalog.push(ListedMarket {
            symbol: format!("{}{}", pair.base, pair.quote),
            pair,
            listed_at: None,
        });
        self
    }

    /// 上架一个公开上线时间的交易对。
    pub fn with_listed_market(mut self, base: &str, quote: &str, listed_at: DateTime<Utc>) -> Self {
        let pair = MarketPair::new(base, quote);
        self.catalog.push(ListedMarket {
            symbol: format!("{}{}", pair.base, pair.quote),
            pair,
            listed_at: Some(listed_at),
        });
        self
    }

    pub fn with_history(mut self, mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.open_time);
        self.history = candles;
        self
    }

    pub fn with_daily(mut self, mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.open_time);
        self.daily = candles;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_reachable_from(mut self, from: DateTime<Utc>) -> Self {
        self.reachable_from = Some(from);
        self
    }

    /// 有上界时只返回 `[before - limit 个周期, before)` 内存在的 K 线，缺失的周期不补齐。
    pub fn with_time_windows(mut self) -> Self {
        self.time_windows = true;
        self
    }

    pub fn with_catalog_failures(self, failures: Vec<MarketError>) -> Self {
        Self {
            catalog_failures: Mutex::new(failures.into()),
            ..self
        }
    }

    pub fn with_candle_failures(self, failures: Vec<MarketError>) -> Self {
        Self {
            candle_failures: Mutex::new(failures.into()),
            ..self
        }
    }

    pub fn catalog_calls(&self) -> usize {
        self.catalog_calls.load(Ordering::SeqCst)
    }

    pub fn candle_calls(&self) -> usize {
        self.candle_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn page_limit(&self) -> usize {
        self.page_limit
    }

    async fn list_markets(&self) -> Result<Vec<ListedMarket>, MarketError> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.catalog_failures.lock().await.pop_front() {
            return Err(err);
        }
        Ok(self.catalog.clone())
    }

    async fn fetch_candles(
        &self,
        _market: &ExchangeMarket,
        timeframe: TimeFrame,
        before: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketError> {
        self.candle_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(err) = self.candle_failures.lock().await.pop_front() {
            return Err(err);
        }

        let source = match timeframe {
            TimeFrame::Minute15 => &self.history,
            TimeFrame::Day1 => &self.daily,
        };
        let limit = limit.min(self.page_limit);
        let window_start = match before {
            Some(b) if self.time_windows => {
                Some(b - timeframe.duration() * i32::try_from(limit).unwrap_or(i32::MAX))
            }
            _ => None,
        };
        let visible: Vec<&Candle> = source
            .iter()
            .filter(|c| before.is_none_or(|b| c.open_time < b))
            .filter(|c| window_start.is_none_or(|w| c.open_time >= w))
            .filter(|c| self.reachable_from.is_none_or(|f| c.open_time >= f))
            .collect();
        let skip = visible.len().saturating_sub(limit);
        Ok(visible.into_iter().skip(skip).cloned().collect())
    }
}

/// # Summary
/// 固定返回值的元数据服务实现。
pub struct StaticDirectory {
    matches: Vec<TokenMatch>,
    details: HashMap<String, TokenDetails>,
    search_error: Option<MarketError>,
    search_calls: AtomicUsize,
}

impl StaticDirectory {
    pub fn new(matches: Vec<TokenMatch>) -> Self {
        Self {
            matches,
            details: HashMap::new(),
            search_error: None,
            search_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: MarketError) -> Self {
        Self {
            search_error: Some(error),
            ..Self::new(Vec::new())
        }
    }

    pub fn with_details(mut self, id: &str, details: TokenDetails) -> Self {
        self.details.insert(id.to_string(), details);
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenDirectory for StaticDirectory {
    async fn search(&self, _query: &str) -> Result<Vec<TokenMatch>, MarketError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        match &self.search_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.matches.clone()),
        }
    }

    async fn details(&self, id: &str) -> Result<TokenDetails, MarketError> {
        self.details.get(id).cloned().ok_or(MarketError::NotFound)
    }
}
