//! # `tgescan-feed` - 外部数据源适配器
//!
//! 为 `tgescan-core` 中的端口提供基于 `reqwest` 的实现：
//! CoinGecko 元数据服务，以及 Binance、OKX、Bybit、Gate、KuCoin 的现货行情。

pub mod binance;
pub mod bybit;
pub mod coingecko;
pub mod gate;
pub mod http;
pub mod kucoin;
pub mod okx;
pub mod registry;
