use crate::probe::ExchangeProbe;
use futures::StreamExt;
use futures::stream;
use std::sync::Arc;
use std::time::Duration;
use tgescan_core::config::ProbeConfig;
use tgescan_core::market::entity::ExchangeResult;
use tgescan_core::market::port::ExchangeProvider;
use tgescan_core::token::entity::TokenCandidate;
use tokio::time::timeout;
use tracing::info;

/// # Summary
/// 跨交易所聚合器：并发探测并按输入顺序收集结果。
///
/// # Invariants
/// - 并发度不超过 `max_concurrency`。
/// - 输出顺序与调用方给定的交易所顺序一致，与完成先后无关。
/// - 单个交易所的失败或超时不影响其他交易所。
pub struct Aggregator {
    probe: ExchangeProbe,
    max_concurrency: usize,
    probe_timeout: Duration,
}

impl Aggregator {
    pub fn new(probe: ExchangeProbe, max_concurrency: usize, probe_timeout: Duration) -> Self {
        Self {
            probe,
            max_concurrency: max_concurrency.max(1),
            probe_timeout,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(
            ExchangeProbe::from_config(config),
            config.max_concurrency,
            config.probe_timeout(),
        )
    }

    /// # Summary
    /// 对一个候选代币探测全部交易所。
    ///
    /// # Logic
    /// 1. 为每个交易所生成带总时间预算的探测 Future。
    /// 2. 以 `buffer_unordered` 限流并发执行。
    /// 3. 按输入下标写回预分配的槽位。
    ///
    /// # Arguments
    /// * `candidate`: 候选代币。
    /// * `exchanges`: 交易所列表 (顺序即输出顺序)。
    ///
    /// # Returns
    /// 与 `exchanges` 一一对应的结果列表。
    pub async fn aggregate(
        &self,
        candidate: &TokenCandidate,
        exchanges: &[Arc<dyn ExchangeProvider>],
    ) -> Vec<ExchangeResult> {
        let mut slots: Vec<Option<ExchangeResult>> = vec![None; exchanges.len()];

        let mut results = stream::iter(exchanges.iter().enumerate().map(|(idx, provider)| {
            async move {
                let result = match timeout(
                    self.probe_timeout,
                    self.probe.probe(provider.as_ref(), candidate),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => ExchangeResult::fetch_error(provider.id(), None, "probe timed out"),
                };
                (idx, result)
            }
        }))
        .buffer_unordered(self.max_concurrency);

        while let Some((idx, result)) = results.next().await {
            info!(
                exchange = %result.exchange_id,
                token = %candidate.canonical_id,
                status = %result.status,
                "probe finished"
            );
            if let Some(slot) = slots.get_mut(idx) {
                *slot = Some(result);
            }
        }

        slots
            .into_iter()
            .zip(exchanges)
            .map(|(slot, provider)| {
                slot.unwrap_or_else(|| {
                    ExchangeResult::fetch_error(provider.id(), None, "probe did not complete")
                })
            })
            .collect()
    }
}
