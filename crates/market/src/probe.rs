use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use tgescan_core::common::{MarketPair, TimeFrame};
use tgescan_core::config::ProbeConfig;
use tgescan_core::market::entity::{Candle, DayOneStats, ExchangeMarket, ExchangeResult, ListedMarket};
use tgescan_core::market::error::MarketError;
use tgescan_core::market::port::ExchangeProvider;
use tgescan_core::token::entity::TokenCandidate;
use tracing::{debug, info, warn};

const PROBE_TIMEFRAME: TimeFrame = TimeFrame::Minute15;

/// # Summary
/// 单交易所探测器：确认市场存在并定位最早一页 15 分钟 K 线。
///
/// # Invariants
/// - 不针对具体交易所分支，所有差异由 `ExchangeProvider` 吸收。
/// - `probe` 永不返回错误，所有结果编码在 `ExchangeResult::status` 中。
#[derive(Debug, Clone)]
pub struct ExchangeProbe {
    policy: RetryPolicy,
    max_search_steps: u32,
    history_floor: DateTime<Utc>,
}

impl ExchangeProbe {
    pub fn new(policy: RetryPolicy, max_search_steps: u32, history_floor: DateTime<Utc>) -> Self {
        Self {
            policy,
            max_search_steps: max_search_steps.max(1),
            history_floor,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(
            RetryPolicy::from_config(config),
            config.max_search_steps,
            config.history_floor,
        )
    }

    /// # Summary
    /// 对单个交易所执行完整探测。
    ///
    /// # Logic
    /// 1. 加载市场目录 (带重试)，失败记为 FetchError。
    /// 2. 按候选顺序选择第一个已上线的交易对，没有则记为 NoMarket。
    /// 3. 定位最早 K 线，空历史或交易对已不存在记为 NoData，其余失败记为 FetchError。
    /// 4. 找到后补充首日统计；预算耗尽或晚于预期 TGE 时改为附加备注。
    ///
    /// # Arguments
    /// * `provider`: 交易所数据源。
    /// * `candidate`: 待探测的候选代币。
    ///
    /// # Returns
    /// 该交易所的探测结果。
    pub async fn probe(
        &self,
        provider: &dyn ExchangeProvider,
        candidate: &TokenCandidate,
    ) -> ExchangeResult {
        let exchange_id = provider.id();

        let catalog = match self
            .policy
            .run("list_markets", move || provider.list_markets())
            .await
        {
            Ok(catalog) => catalog,
            Err(err) => {
                warn!(exchange = exchange_id, error = %err, "market catalog unavailable");
                return ExchangeResult::fetch_error(exchange_id, None, err.to_string());
            }
        };

        let Some(listing) = select_market(&catalog, &candidate.known_symbols) else {
            debug!(exchange = exchange_id, token = %candidate.canonical_id, "no candidate pair listed");
            return ExchangeResult::no_market(exchange_id);
        };
        let market = ExchangeMarket::from_listing(exchange_id, listing);
        debug!(exchange = exchange_id, symbol = %market.market_symbol, "market selected");

        let located = match self
            .locate_earliest(provider, &market, listing.listed_at)
            .await
        {
            Ok(Some(located)) => located,
            Ok(None) | Err(MarketError::NotFound) => return ExchangeResult::no_data(exchange_id, market),
            Err(err) => {
                warn!(exchange = exchange_id, symbol = %market.market_symbol, error = %err, "candle search failed");
                return ExchangeResult::fetch_error(exchange_id, Some(market), err.to_string());
            }
        };
        let earliest = located.candle;
        info!(
            exchange = exchange_id,
            symbol = %market.market_symbol,
            open_time = %earliest.open_time,
            confirmed = located.confirmed,
            "earliest candle located"
        );

        let mut result = ExchangeResult::found(exchange_id, market, earliest.clone());
        let late = candidate
            .expected_tge
            .is_some_and(|tge| earliest.open_time > tge + TimeFrame::Day1.duration());
        if !located.confirmed {
            result.note = Some("search budget exhausted, earlier candles may exist".to_string());
        } else if late {
            result.note = Some("exchange history starts after expected TGE".to_string());
        } else if let Some(market) = &result.market {
            result.day_one = self.day_one(provider, market, &earliest).await;
        }
        result
    }

    /// # Summary
    /// 定位最早可达的一根 15 分钟 K 线。
    ///
    /// # Logic
    /// 1. 若目录公开上线时间，先读取上线时间后的第一页并确认其之前没有数据。
    /// 2. 读取最新一页；为空则说明无数据。
    /// 3. 以倍增步长向过去回溯，直到遇到空页或历史下限。
    /// 4. 在空页边界与已知最早 K 线之间二分，直到区间不超过一页。
    /// 5. 读取最终一页，其首根即最早 K 线。
    /// 不足 `page_limit` 条的页只有在其之前确认为空时才视为历史起点。
    ///
    /// # Returns
    /// 找到返回 Some，历史为空返回 None。
    async fn locate_earliest(
        &self,
        provider: &dyn ExchangeProvider,
        market: &ExchangeMarket,
        listed_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Located>, MarketError> {
        let mut pager = Pager::new(provider, market, &self.policy, self.max_search_steps);
        let limit = pager.limit;
        let step = PROBE_TIMEFRAME.duration();
        let span = step * i32::try_from(limit).unwrap_or(i32::MAX);

        if let Some(listed) = listed_at {
            let page = pager.fetch(Some(listed + span)).await?;
            if let Some(first) = page.first() {
                match pager.boundary(first).await? {
                    Boundary::Start => return Ok(Some(Located::confirmed(first.clone()))),
                    Boundary::Unknown => return Ok(Some(Located::partial(first.clone()))),
                    Boundary::Older(_) => {}
                }
            }
            debug!(exchange = provider.id(), %listed, "listing time not usable, searching");
        }

        let latest = pager.fetch(None).await?;
        let Some(first) = latest.first() else {
            return Ok(None);
        };
        let mut known = first.clone();
        if latest.len() < limit {
            match pager.boundary(&known).await? {
                Boundary::Start => return Ok(Some(Located::confirmed(known))),
                Boundary::Unknown => return Ok(Some(Located::partial(known))),
                Boundary::Older(older) => known = older,
            }
        }

        // 倍增回溯，找到一个之前没有数据的上界 lo
        let mut gap = span;
        let lo = loop {
            let at = known.open_time - gap;
            if at <= self.history_floor {
                break self.history_floor;
            }
            if pager.exhausted() {
                warn!(exchange = provider.id(), "search budget exhausted while walking back");
                return Ok(Some(Located::partial(known)));
            }
            let page = pager.fetch(Some(at)).await?;
            let Some(first) = page.first() else {
                break at;
            };
            known = first.clone();
            if page.len() < limit {
                match pager.boundary(&known).await? {
                    Boundary::Start => return Ok(Some(Located::confirmed(known))),
                    Boundary::Unknown => return Ok(Some(Located::partial(known))),
                    Boundary::Older(older) => known = older,
                }
            }
            gap = gap * 2;
        };

        // 二分：lo 之前无数据，hi 之前有数据
        let mut lo = lo;
        let mut hi = known.open_time + step;
        while hi - lo > span {
            if pager.exhausted() {
                warn!(exchange = provider.id(), "search budget exhausted while bisecting");
                return Ok(Some(Located::partial(known)));
            }
            let mid = lo + (hi - lo) / 2;
            let page = pager.fetch(Some(mid)).await?;
            let Some(first) = page.first() else {
                lo = mid;
                continue;
            };
            let mut oldest = first.clone();
            if page.len() < limit {
                match pager.boundary(&oldest).await? {
                    Boundary::Start => return Ok(Some(Located::confirmed(oldest))),
                    Boundary::Unknown => return Ok(Some(Located::partial(oldest))),
                    Boundary::Older(older) => oldest = older,
                }
            }
            if oldest.open_time < known.open_time {
                known = oldest;
            }
            hi = (known.open_time + step).min(mid);
        }

        if pager.exhausted() {
            warn!(exchange = provider.id(), "search budget exhausted before final page");
            return Ok(Some(Located::partial(known)));
        }
        let page = pager.fetch(Some(hi)).await?;
        Ok(Some(Located::confirmed(match page.first() {
            Some(first) if first.open_time < known.open_time => first.clone(),
            _ => known,
        })))
    }

    /// # Summary
    /// 读取包含最早 K 线的日线，失败只记录告警。
    async fn day_one(
        &self,
        provider: &dyn ExchangeProvider,
        market: &ExchangeMarket,
        earliest: &Candle,
    ) -> Option<DayOneStats> {
        let day_start = earliest
            .open_time
            .date_naive()
            .and_hms_opt(0, 0, 0)?
            .and_utc();
        let before = day_start + TimeFrame::Day1.duration();

        let page = self
            .policy
            .run("fetch_day_candle", move || {
                provider.fetch_candles(market, TimeFrame::Day1, Some(before), 1)
            })
            .await;
        match page {
            Ok(page) => page
                .last()
                .filter(|c| c.open_time <= earliest.open_time)
                .map(DayOneStats::from_candle),
            Err(err) => {
                warn!(exchange = provider.id(), error = %err, "day-one candle unavailable");
                None
            }
        }
    }
}

/// # Summary
/// 按候选顺序选择第一个在目录中出现的交易对。
fn select_market<'a>(catalog: &'a [ListedMarket], candidates: &[MarketPair]) -> Option<&'a ListedMarket> {
    candidates
        .iter()
        .find_map(|pair| catalog.iter().find(|m| &m.pair == pair))
}

/// 最早 K 线的查找结果
struct Located {
    candle: Candle,
    // false 表示请求预算耗尽，之前可能还有数据
    confirmed: bool,
}

impl Located {
    fn confirmed(candle: Candle) -> Self {
        Self {
            candle,
            confirmed: true,
        }
    }

    fn partial(candle: Candle) -> Self {
        Self {
            candle,
            confirmed: false,
        }
    }
}

enum Boundary {
    // 之前没有数据
    Start,
    // 之前还有数据，附带更早的一根
    Older(Candle),
    // 预算耗尽，未能确认
    Unknown,
}

/// # Summary
/// 带重试与请求预算的分页读取器。
struct Pager<'a> {
    provider: &'a dyn ExchangeProvider,
    market: &'a ExchangeMarket,
    policy: &'a RetryPolicy,
    limit: usize,
    remaining: u32,
}

impl<'a> Pager<'a> {
    fn new(
        provider: &'a dyn ExchangeProvider,
        market: &'a ExchangeMarket,
        policy: &'a RetryPolicy,
        budget: u32,
    ) -> Self {
        Self {
            provider,
            market,
            policy,
            limit: provider.page_limit().max(1),
            remaining: budget,
        }
    }

    fn exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// # Summary
    /// 判断某页首根之前是否还有数据。
    ///
    /// # Logic
    /// 交易所可能省略无成交的周期或丢弃坏行，短页不一定是历史起点，
    /// 因此向前再读一页：为空即起点，否则返回更早的一根。预算耗尽时无法判断。
    async fn boundary(&mut self, first: &Candle) -> Result<Boundary, MarketError> {
        if self.exhausted() {
            return Ok(Boundary::Unknown);
        }
        let page = self.fetch(Some(first.open_time)).await?;
        Ok(match page.into_iter().next() {
            Some(older) => Boundary::Older(older),
            None => Boundary::Start,
        })
    }

    async fn fetch(&mut self, before: Option<DateTime<Utc>>) -> Result<Vec<Candle>, MarketError> {
        self.remaining = self.remaining.saturating_sub(1);
        let (provider, market, limit) = (self.provider, self.market, self.limit);
        debug!(exchange = provider.id(), before = ?before, "fetching candle page");
        self.policy
            .run("fetch_candles", move || {
                provider.fetch_candles(market, PROBE_TIMEFRAME, before, limit)
            })
            .await
    }
}
