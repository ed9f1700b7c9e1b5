use chrono::{DateTime, Utc};
use std::io::Write;
use tgescan_core::market::entity::{ConsolidatedReport, ExchangeResult};
use tgescan_core::report::error::ReportError;
use tgescan_core::report::port::ReportSink;

const COLUMNS: [&str; 11] = [
    "EXCHANGE",
    "PAIR",
    "STATUS",
    "TGE TIME",
    "15m QUOTE VOL",
    "OPEN",
    "HIGH",
    "DAY1 OPEN",
    "DAY1 HIGH",
    "HIGH/OPEN",
    "NOTE/ERROR",
];
const EMPTY_LINE: &str = "no market data found on any queried exchange";
const MISSING: &str = "-";

/// # Summary
/// 终端表格输出端，写入标准输出。
pub struct TableReportSink;

impl ReportSink for TableReportSink {
    fn emit(&self, reports: &[ConsolidatedReport]) -> Result<(), ReportError> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for report in reports {
            out.write_all(render(report).as_bytes())
                .map_err(|e| ReportError::Io(e.to_string()))?;
        }
        out.flush().map_err(|e| ReportError::Io(e.to_string()))
    }
}

/// # Summary
/// 把单个报告渲染为文本。
///
/// # Logic
/// 1. 标题行与代币身份。
/// 2. 最早上线行；没有任何数据时输出固定提示并结束。
/// 3. 逐交易所的表格 (按报告顺序)。
/// 4. 加权 HIGH/OPEN，非成交量加权时附加标记，最后是总成交额。
pub fn render(report: &ConsolidatedReport) -> String {
    let mut lines = vec![
        "=======================".to_string(),
        "   PRICE ACTION / TGE".to_string(),
        "=======================".to_string(),
    ];
    match &report.token {
        Some(token) => lines.push(format!(
            "Token: {} ({}) id {}",
            token.display_name, token.symbol, token.canonical_id
        )),
        None => lines.push(format!("Token: {}", report.ticker)),
    }

    match &report.earliest_overall {
        Some(earliest) => lines.push(format!(
            "Earliest listing: {} {}",
            earliest.exchange_id,
            format_time(earliest.candle.open_time)
        )),
        None => lines.push(EMPTY_LINE.to_string()),
    }

    if !report.per_exchange.is_empty() {
        lines.push(String::new());
        let rows: Vec<[String; 11]> = report.per_exchange.iter().map(row).collect();
        lines.extend(layout(&rows));
    }

    if !report.is_empty() {
        let marker = if report.volume_weighted {
            ""
        } else {
            " (unweighted mean)"
        };
        lines.push(String::new());
        lines.push(format!("Weighted HIGH: {}{}", format_price(report.weighted_high), marker));
        lines.push(format!("Weighted OPEN: {}{}", format_price(report.weighted_open), marker));
        lines.push(format!("Total first-15m quote volume: {:.4}", report.total_volume));
    }

    lines.push(String::new());
    lines.join("\n")
}

fn row(result: &ExchangeResult) -> [String; 11] {
    let candle = result.earliest_candle.as_ref();
    let day_one = result.day_one.as_ref();
    let remark = result
        .error
        .as_deref()
        .or(result.note.as_deref())
        .unwrap_or_default();
    [
        result.exchange_id.clone(),
        result
            .market
            .as_ref()
            .map_or_else(|| MISSING.to_string(), |m| m.pair().to_string()),
        result.status.to_string(),
        candle.map_or_else(|| MISSING.to_string(), |c| format_time(c.open_time)),
        candle
            .and_then(|c| c.quote_volume())
            .map_or_else(|| MISSING.to_string(), |v| format!("{:.4}", v)),
        candle.map_or_else(|| MISSING.to_string(), |c| format!("{:.6}", c.open)),
        candle.map_or_else(|| MISSING.to_string(), |c| format!("{:.6}", c.high)),
        day_one.map_or_else(|| MISSING.to_string(), |d| format!("{:.6}", d.open)),
        day_one.map_or_else(|| MISSING.to_string(), |d| format!("{:.6}", d.high)),
        day_one
            .and_then(|d| d.high_open_ratio)
            .map_or_else(|| MISSING.to_string(), |r| format!("{:.2}x", r)),
        remark.to_string(),
    ]
}

/// 按列宽对齐的 markdown 风格表格
fn layout(rows: &[[String; 11]]) -> Vec<String> {
    let mut widths = COLUMNS.map(|c| c.chars().count());
    for cells in rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
            .collect();
        format!("| {} |", padded.join(" | "))
    };

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(line(COLUMNS.to_vec()));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push(line(rule.iter().map(String::as_str).collect()));
    for cells in rows {
        out.push(line(cells.iter().map(String::as_str).collect()));
    }
    out
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_price(value: Option<f64>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| format!("{:.6}", v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_pads_columns() {
        let mut cells: [String; 11] = Default::default();
        cells[0] = "a-very-long-exchange".to_string();
        let lines = layout(&[cells]);
        assert_eq!(lines.len(), 3);
        let widths: Vec<usize> = lines.iter().map(|l| l.chars().count()).collect();
        assert!(widths.iter().all(|w| *w == widths[0]));
        assert!(lines[0].starts_with(&format!("| {:<20} |", "EXCHANGE")));
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(Some(1.2)), "1.200000");
        assert_eq!(format_price(None), "-");
    }
}
