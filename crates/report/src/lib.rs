//! 报告输出层：把汇总报告渲染为终端表格或导出为 CSV。

pub mod export;
pub mod table;
