use thiserror::Error;

/// # Summary
/// 代币解析错误枚举。
///
/// # Invariants
/// - 只有解析阶段的错误会作为硬失败传递给调用方。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// 输入为空或只包含空白
    #[error("Invalid input: ticker must not be empty")]
    InvalidInput,

    /// 元数据服务没有匹配结果
    #[error("Token not found: {0}")]
    TokenNotFound(String),

    /// 无法访问元数据服务
    #[error("Token lookup failed: {0}")]
    Lookup(String),
}
