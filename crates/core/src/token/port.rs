use crate::market::error::MarketError;
use crate::token::entity::{TokenDetails, TokenMatch};
use async_trait::async_trait;

/// # Summary
/// 代币元数据查询接口。
///
/// # Invariants
/// - 实现必须是 `Send` 和 `Sync`。
/// - 不在调用之间保留可变状态。
#[async_trait]
pub trait TokenDirectory: Send + Sync {
    /// # Summary
    /// 按代码搜索代币。
    ///
    /// # Arguments
    /// * `query` - 用户输入的代码。
    ///
    /// # Returns
    /// * 可能为空的匹配列表；传输失败返回 `MarketError`。
    async fn search(&self, query: &str) -> Result<Vec<TokenMatch>, MarketError>;

    /// # Summary
    /// 查询代币详情 (交易对、预期 TGE)。
    ///
    /// # Arguments
    /// * `id` - 规范 ID。
    async fn details(&self, id: &str) -> Result<TokenDetails, MarketError>;
}
