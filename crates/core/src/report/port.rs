use crate::market::entity::ConsolidatedReport;
use crate::report::error::ReportError;

/// # Summary
/// 报告输出端接口，只读消费汇总报告。
///
/// # Invariants
/// - 不修改报告内容，展示格式 (四舍五入等) 由实现自行决定。
pub trait ReportSink: Send + Sync {
    /// # Summary
    /// 输出一批报告 (每个代币身份一份)。
    ///
    /// # Arguments
    /// * `reports` - 本次运行生成的全部报告。
    ///
    /// # Returns
    /// * 成功返回 `Ok(())`，失败返回 `ReportError`。
    fn emit(&self, reports: &[ConsolidatedReport]) -> Result<(), ReportError>;
}
