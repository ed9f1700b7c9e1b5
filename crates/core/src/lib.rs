//! # `tgescan-core` - 领域核心
//!
//! 定义代币上线探测所需的实体、错误类型与端口 (trait)。
//! 具体的 HTTP 适配器位于 `tgescan-feed`，领域服务位于 `tgescan-market`。

pub mod common;
pub mod config;
pub mod market;
pub mod report;
pub mod token;

#[cfg(feature = "test-utils")]
pub mod testing;
