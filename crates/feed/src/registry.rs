use crate::binance::BinanceProvider;
use crate::bybit::BybitProvider;
use crate::gate::GateProvider;
use crate::kucoin::KucoinProvider;
use crate::okx::OkxProvider;
use reqwest::Client;
use std::sync::Arc;
use tgescan_core::market::error::MarketError;
use tgescan_core::market::port::ExchangeProvider;

/// 支持的交易所标识，顺序即默认探测顺序。
pub const SUPPORTED_EXCHANGES: [&str; 5] = ["binance", "okx", "bybit", "gate", "kucoin"];

/// # Summary
/// 根据交易所标识构造提供者。
///
/// # Logic
/// 1. 标识大小写不敏感，兼容 `gateio` 别名。
/// 2. 未知标识返回 None。
pub fn build_provider(id: &str, client: Client) -> Option<Arc<dyn ExchangeProvider>> {
    let provider: Arc<dyn ExchangeProvider> = match id.trim().to_lowercase().as_str() {
        "binance" => Arc::new(BinanceProvider::new(client)),
        "okx" => Arc::new(OkxProvider::new(client)),
        "bybit" => Arc::new(BybitProvider::new(client)),
        "gate" | "gateio" => Arc::new(GateProvider::new(client)),
        "kucoin" => Arc::new(KucoinProvider::new(client)),
        _ => return None,
    };
    Some(provider)
}

/// # Summary
/// 按给定顺序构造全部提供者。
///
/// # Returns
/// 任一标识未知时返回 `MarketError::Exchange`，提示可用列表。
pub fn build_providers(
    ids: &[String],
    client: &Client,
) -> Result<Vec<Arc<dyn ExchangeProvider>>, MarketError> {
    ids.iter()
        .map(|id| {
            build_provider(id, client.clone()).ok_or_else(|| {
                MarketError::Exchange(format!(
                    "unsupported exchange '{}', expected one of {}",
                    id,
                    SUPPORTED_EXCHANGES.join(", ")
                ))
            })
        })
        .collect()
}
