use serde::Serialize;
use std::path::{Path, PathBuf};
use tgescan_core::market::entity::{Candle, ConsolidatedReport};
use tgescan_core::report::error::ReportError;
use tgescan_core::report::port::ReportSink;
use tracing::info;

const HEADER: [&str; 7] = ["exchange_id", "open_time", "open", "high", "low", "close", "volume"];
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// CSV 中的一行，对应一根参与汇总的首根 K 线。
#[derive(Debug, Serialize)]
struct CandleRow<'a> {
    exchange_id: &'a str,
    open_time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl<'a> CandleRow<'a> {
    fn new(exchange_id: &'a str, candle: &Candle) -> Self {
        Self {
            exchange_id,
            open_time: candle.open_time.format(TIME_FORMAT).to_string(),
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
        }
    }
}

/// # Summary
/// CSV 导出端，把所有 Found 交易所的首根 15 分钟 K 线写入一个文件。
///
/// # Invariants
/// - 表头总是写出，没有数据时文件只包含表头。
/// - 行顺序与报告中的交易所顺序一致。
pub struct CsvReportSink {
    path: PathBuf,
}

impl CsvReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for CsvReportSink {
    fn emit(&self, reports: &[ConsolidatedReport]) -> Result<(), ReportError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.path)
            .map_err(|e| ReportError::Csv(e.to_string()))?;
        writer
            .write_record(HEADER)
            .map_err(|e| ReportError::Csv(e.to_string()))?;

        let mut rows = 0usize;
        for (exchange_id, candle) in reports.iter().flat_map(|r| r.contributing_candles()) {
            writer
                .serialize(CandleRow::new(exchange_id, candle))
                .map_err(|e| ReportError::Csv(e.to_string()))?;
            rows += 1;
        }
        writer.flush().map_err(|e| ReportError::Io(e.to_string()))?;

        info!(path = %self.path.display(), rows, "csv report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_row_time_format() {
        let candle = Candle {
            open_time: Utc.with_ymd_and_hms(2024, 11, 5, 9, 15, 0).unwrap(),
            open: 1.0,
            high: 1.5,
            low: 0.9,
            close: 1.2,
            volume: 42.0,
        };
        let row = CandleRow::new("okx", &candle);
        assert_eq!(row.open_time, "2024-11-05T09:15:00Z");
        assert_eq!(row.exchange_id, "okx");
    }
}
