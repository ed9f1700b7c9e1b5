//! # `tgescan-market` - 领域服务
//!
//! 解析代币、并发探测各交易所最早的 15 分钟 K 线，并生成成交量加权汇总。

pub mod aggregator;
pub mod probe;
pub mod resolver;
pub mod retry;
pub mod scanner;
pub mod summary;
