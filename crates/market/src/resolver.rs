use std::collections::HashSet;
use std::sync::Arc;
use tgescan_core::common::MarketPair;
use tgescan_core::token::entity::{TokenCandidate, TokenDetails, TokenMatch, VenueTicker};
use tgescan_core::token::error::ResolveError;
use tgescan_core::token::port::TokenDirectory;
use tracing::{debug, info, warn};

// 场所名称包含这些片段时视为 DEX
const DEX_MARKERS: [&str; 4] = ["swap", "uniswap", "pancake", "sushiswap"];

/// # Summary
/// 代币解析器：把用户输入的代码解析为一个或多个候选代币。
///
/// # Invariants
/// - 不保留调用间的可变状态。
/// - 同名的不同代币全部返回，由调用方分别处理。
pub struct SymbolResolver {
    directory: Arc<dyn TokenDirectory>,
    fallback_quotes: Vec<String>,
}

impl SymbolResolver {
    pub fn new(directory: Arc<dyn TokenDirectory>, fallback_quotes: Vec<String>) -> Self {
        Self {
            directory,
            fallback_quotes,
        }
    }

    /// # Summary
    /// 解析代码。
    ///
    /// # Logic
    /// 1. 去除空白与前缀 `$`，为空则直接返回 InvalidInput，不发起网络请求。
    /// 2. 调用元数据服务搜索，仅保留代码完全一致 (忽略大小写) 的结果。
    /// 3. 按规范 ID 去重，没有结果返回 TokenNotFound。
    /// 4. 逐个查询详情并生成候选交易对列表。
    ///
    /// # Arguments
    /// * `ticker`: 用户输入。
    ///
    /// # Returns
    /// 候选代币列表 (保持元数据服务的顺序)。
    pub async fn resolve(&self, ticker: &str) -> Result<Vec<TokenCandidate>, ResolveError> {
        let ticker = normalize_ticker(ticker).ok_or(ResolveError::InvalidInput)?;

        let matches = self
            .directory
            .search(&ticker)
            .await
            .map_err(|e| ResolveError::Lookup(e.to_string()))?;
        let matches = exact_matches(&ticker, matches);
        if matches.is_empty() {
            return Err(ResolveError::TokenNotFound(ticker));
        }
        info!(ticker = %ticker, count = matches.len(), "token matches resolved");

        let mut candidates = Vec::with_capacity(matches.len());
        for token in matches {
            let details = match self.directory.details(&token.id).await {
                Ok(details) => details,
                Err(err) => {
                    warn!(token = %token.id, error = %err, "token details unavailable, using fallback pairs");
                    TokenDetails::default()
                }
            };
            let known_symbols = candidate_pairs(&ticker, &details.tickers, &self.fallback_quotes);
            debug!(token = %token.id, pairs = known_symbols.len(), "candidate pairs built");
            candidates.push(TokenCandidate {
                ticker: ticker.clone(),
                canonical_id: token.id,
                display_name: token.name,
                known_symbols,
                expected_tge: details.expected_tge,
            });
        }
        Ok(candidates)
    }
}

fn normalize_ticker(raw: &str) -> Option<String> {
    let ticker = raw.trim().trim_start_matches('$').trim();
    if ticker.is_empty() {
        None
    } else {
        Some(ticker.to_uppercase())
    }
}

fn exact_matches(ticker: &str, matches: Vec<TokenMatch>) -> Vec<TokenMatch> {
    let mut seen = HashSet::new();
    matches
        .into_iter()
        .filter(|m| m.symbol.trim().to_uppercase() == ticker)
        .filter(|m| seen.insert(m.id.clone()))
        .collect()
}

fn is_dex_venue(name: &str) -> bool {
    let name = name.to_lowercase();
    DEX_MARKERS.iter().any(|marker| name.contains(marker))
}

/// # Summary
/// 生成候选交易对列表。
///
/// # Logic
/// 1. 过滤 DEX 场所。
/// 2. 按上报成交量降序 (稳定排序)。
/// 3. 追加 `ticker/兜底计价币`。
/// 4. 保留首次出现的顺序去重。
fn candidate_pairs(ticker: &str, tickers: &[VenueTicker], fallback_quotes: &[String]) -> Vec<MarketPair> {
    let mut cex: Vec<&VenueTicker> = tickers.iter().filter(|t| !is_dex_venue(&t.venue)).collect();
    cex.sort_by(|a, b| b.volume.total_cmp(&a.volume));

    let mut seen = HashSet::new();
    cex.into_iter()
        .map(|t| MarketPair::new(&t.base, &t.quote))
        .chain(fallback_quotes.iter().map(|q| MarketPair::new(ticker, q)))
        .filter(|p| !p.base.is_empty() && !p.quote.is_empty())
        .filter(|p| seen.insert(p.clone()))
        .collect()
}
