use crate::aggregator::Aggregator;
use crate::resolver::SymbolResolver;
use crate::summary::summarize;
use std::fmt;
use std::sync::Arc;
use tgescan_core::market::entity::ConsolidatedReport;
use tgescan_core::market::port::ExchangeProvider;
use tgescan_core::token::error::ResolveError;
use tracing::info;

/// # Summary
/// 完整的探测流水线：解析 → 并发探测 → 汇总。
///
/// # Invariants
/// - 候选代币按解析顺序逐个处理，每个代币单独生成报告。
/// - 只有解析阶段的错误会返回 Err。
pub struct TgeScanner {
    resolver: SymbolResolver,
    aggregator: Aggregator,
    exchanges: Vec<Arc<dyn ExchangeProvider>>,
}

impl TgeScanner {
    pub fn new(
        resolver: SymbolResolver,
        aggregator: Aggregator,
        exchanges: Vec<Arc<dyn ExchangeProvider>>,
    ) -> Self {
        Self {
            resolver,
            aggregator,
            exchanges,
        }
    }

    /// # Summary
    /// 对一个代码执行完整探测。
    ///
    /// # Logic
    /// 1. 解析代码，失败直接返回。
    /// 2. 对每个候选代币运行聚合器。
    /// 3. 汇总为报告；没有任何数据时也生成空报告。
    ///
    /// # Arguments
    /// * `ticker`: 用户输入的代码。
    ///
    /// # Returns
    /// 每个候选代币一份报告。
    pub async fn scan(&self, ticker: &str) -> Result<Vec<ConsolidatedReport>, ResolveError> {
        let candidates = self.resolver.resolve(ticker).await?;

        let mut reports = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            info!(
                token = %candidate.canonical_id,
                pairs = candidate.known_symbols.len(),
                exchanges = self.exchanges.len(),
                "scanning exchanges"
            );
            let results = self.aggregator.aggregate(candidate, &self.exchanges).await;
            let report = summarize(&candidate.ticker, Some(candidate.identity()), results);
            match &report.earliest_overall {
                Some(earliest) => info!(
                    token = %candidate.canonical_id,
                    exchange = %earliest.exchange_id,
                    open_time = %earliest.candle.open_time,
                    "earliest listing found"
                ),
                None => info!(token = %candidate.canonical_id, "no market data found on any queried exchange"),
            }
            reports.push(report);
        }
        Ok(reports)
    }
}

/// # Summary
/// 一次运行的终态，决定进程退出码。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    // 至少一个代币找到了数据
    Found,
    // 代码解析成功但所有交易所都没有数据
    NoData,
    // 元数据服务没有匹配
    TokenNotFound,
    // 输入为空
    InvalidInput,
    // 基础设施故障
    Failed,
}

impl RunStatus {
    /// # Summary
    /// 由扫描结果推导终态。
    pub fn from_outcome(outcome: &Result<Vec<ConsolidatedReport>, ResolveError>) -> Self {
        match outcome {
            Ok(reports) if reports.iter().any(|r| !r.is_empty()) => RunStatus::Found,
            Ok(_) => RunStatus::NoData,
            Err(ResolveError::TokenNotFound(_)) => RunStatus::TokenNotFound,
            Err(ResolveError::InvalidInput) => RunStatus::InvalidInput,
            Err(ResolveError::Lookup(_)) => RunStatus::Failed,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            RunStatus::Found => 0,
            RunStatus::Failed => 1,
            RunStatus::TokenNotFound => 2,
            RunStatus::NoData => 3,
            RunStatus::InvalidInput => 4,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Found => "market data found",
            RunStatus::NoData => "no market data found on any queried exchange",
            RunStatus::TokenNotFound => "ticker not found",
            RunStatus::InvalidInput => "invalid ticker",
            RunStatus::Failed => "run failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let all = [
            RunStatus::Found,
            RunStatus::NoData,
            RunStatus::TokenNotFound,
            RunStatus::InvalidInput,
            RunStatus::Failed,
        ];
        let codes: std::collections::HashSet<u8> = all.iter().map(|s| s.exit_code()).collect();
        assert_eq!(codes.len(), all.len());
        assert_eq!(RunStatus::Found.exit_code(), 0);
    }

    #[test]
    fn test_status_from_errors() {
        assert_eq!(
            RunStatus::from_outcome(&Err(ResolveError::TokenNotFound("X".into()))),
            RunStatus::TokenNotFound
        );
        assert_eq!(
            RunStatus::from_outcome(&Err(ResolveError::Lookup("dns".into()))),
            RunStatus::Failed
        );
        assert_eq!(RunStatus::from_outcome(&Ok(vec![])), RunStatus::NoData);
    }
}
