use thiserror::Error;

/// # Summary
/// 报告输出错误枚举。
#[derive(Error, Debug)]
pub enum ReportError {
    /// 文件或终端写入失败
    #[error("IO error: {0}")]
    Io(String),

    /// CSV 编码失败
    #[error("CSV error: {0}")]
    Csv(String),
}
