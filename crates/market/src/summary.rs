use std::cmp::Ordering;
use tgescan_core::market::entity::{Candle, ConsolidatedReport, EarliestListing, ExchangeResult};
use tgescan_core::token::entity::TokenIdentity;

/// # Summary
/// 由探测结果生成汇总报告。
///
/// # Logic
/// 1. 仅使用 Found 结果参与计算。
/// 2. 最早 K 线按开盘时间取最小；时间相同时取成交量更大者，再按交易所标识字典序。
/// 3. 成交量加权 HIGH/OPEN；总成交量为零时退化为算术平均并标记。
/// 4. 累加各首根 K 线的计价币成交额。
///
/// # Arguments
/// * `ticker`: 用户输入的代码。
/// * `token`: 对应的代币身份。
/// * `results`: 按交易所顺序排列的探测结果。
///
/// # Returns
/// 不可变的汇总报告。
pub fn summarize(
    ticker: &str,
    token: Option<TokenIdentity>,
    results: Vec<ExchangeResult>,
) -> ConsolidatedReport {
    let found: Vec<(&str, &Candle)> = results
        .iter()
        .filter(|r| r.is_found())
        .filter_map(|r| r.earliest_candle.as_ref().map(|c| (r.exchange_id.as_str(), c)))
        .collect();

    let earliest_overall = found
        .iter()
        .copied()
        .min_by(|a, b| earliest_order(*a, *b))
        .map(|(exchange_id, candle)| EarliestListing {
            exchange_id: exchange_id.to_string(),
            candle: candle.clone(),
        });

    let weights = Weights::collect(found.iter().map(|(_, c)| *c));
    let total_volume = found
        .iter()
        .filter_map(|(_, c)| c.quote_volume())
        .sum();

    ConsolidatedReport {
        ticker: ticker.to_string(),
        token,
        earliest_overall,
        weighted_high: weights.high(),
        weighted_open: weights.open(),
        volume_weighted: weights.is_volume_weighted(),
        total_volume,
        per_exchange: results,
    }
}

fn earliest_order(a: (&str, &Candle), b: (&str, &Candle)) -> Ordering {
    a.1.open_time
        .cmp(&b.1.open_time)
        .then_with(|| b.1.volume.total_cmp(&a.1.volume))
        .then_with(|| a.0.cmp(b.0))
}

/// 加权所需的累加量
#[derive(Default)]
struct Weights {
    count: f64,
    volume: f64,
    high_volume: f64,
    open_volume: f64,
    high_sum: f64,
    open_sum: f64,
}

impl Weights {
    fn collect<'a>(candles: impl Iterator<Item = &'a Candle>) -> Self {
        candles.fold(Self::default(), |mut acc, c| {
            acc.count += 1.0;
            acc.volume += c.volume;
            acc.high_volume += c.high * c.volume;
            acc.open_volume += c.open * c.volume;
            acc.high_sum += c.high;
            acc.open_sum += c.open;
            acc
        })
    }

    fn is_volume_weighted(&self) -> bool {
        self.volume > 0.0
    }

    fn average(&self, weighted: f64, plain: f64) -> Option<f64> {
        if self.count == 0.0 {
            None
        } else if self.is_volume_weighted() {
            Some(weighted / self.volume)
        } else {
            Some(plain / self.count)
        }
    }

    fn high(&self) -> Option<f64> {
        self.average(self.high_volume, self.high_sum)
    }

    fn open(&self) -> Option<f64> {
        self.average(self.open_volume, self.open_sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use tgescan_core::market::entity::{ExchangeMarket, ProbeStatus};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 5, hour, 0, 0).unwrap()
    }

    fn candle(time: DateTime<Utc>, open: f64, high: f64, volume: f64) -> Candle {
        Candle {
            open_time: time,
            open,
            high,
            low: open.min(high) * 0.5,
            close: open,
            volume,
        }
    }

    fn found(id: &str, candle: Candle) -> ExchangeResult {
        let market = ExchangeMarket {
            exchange_id: id.to_string(),
            base: "TKN".to_string(),
            quote: "USDT".to_string(),
            market_symbol: "TKNUSDT".to_string(),
        };
        ExchangeResult::found(id, market, candle)
    }

    #[test]
    fn test_scenario_a_single_found() {
        let c = Candle {
            open_time: at(10),
            open: 1.0,
            high: 1.2,
            low: 0.9,
            close: 1.1,
            volume: 1000.0,
        };
        let results = vec![ExchangeResult::no_market("x1"), found("x2", c.clone())];
        let report = summarize("TKN", None, results);

        let earliest = report.earliest_overall.as_ref().unwrap();
        assert_eq!(earliest.exchange_id, "x2");
        assert_eq!(earliest.candle, c);
        assert_eq!(report.weighted_high, Some(1.2));
        assert_eq!(report.weighted_open, Some(1.0));
        assert!(report.volume_weighted);
        assert_eq!(report.per_exchange[0].status, ProbeStatus::NoMarket);
        assert!((report.total_volume - 1100.0).abs() < 1e-9);
    }

    #[test]
    fn test_scenario_b_volume_weighting() {
        let results = vec![
            found("a", candle(at(10), 1.0, 2.0, 100.0)),
            found("b", candle(at(10), 1.0, 3.0, 300.0)),
        ];
        let report = summarize("TKN", None, results);
        assert!((report.weighted_high.unwrap() - 2.75).abs() < 1e-12);
        // 同一时间，成交量更大者胜出
        assert_eq!(report.earliest_overall.unwrap().exchange_id, "b");
    }

    #[test]
    fn test_scenario_c_no_found_is_empty_report() {
        let results = vec![
            ExchangeResult::no_market("a"),
            ExchangeResult::fetch_error("b", None, "HTTP 503"),
        ];
        let report = summarize("TKN", None, results);
        assert!(report.is_empty());
        assert_eq!(report.weighted_high, None);
        assert_eq!(report.weighted_open, None);
        assert!(!report.volume_weighted);
        assert_eq!(report.per_exchange.len(), 2);
        assert_eq!(report.total_volume, 0.0);
    }

    #[test]
    fn test_equal_volumes_match_arithmetic_mean() {
        let highs = [1.5, 2.5, 4.0, 0.5];
        let results: Vec<_> = highs
            .iter()
            .enumerate()
            .map(|(i, h)| found(&format!("x{}", i), candle(at(10), 0.4, *h, 42.0)))
            .collect();
        let report = summarize("TKN", None, results);
        let mean = highs.iter().sum::<f64>() / 4.0;
        assert!((report.weighted_high.unwrap() - mean).abs() < 1e-12);
        assert!((report.weighted_open.unwrap() - 0.4).abs() < 1e-12);
        assert!(report.volume_weighted);
    }

    #[test]
    fn test_zero_volume_falls_back_to_unweighted_mean() {
        let results = vec![
            found("a", candle(at(10), 1.0, 2.0, 0.0)),
            found("b", candle(at(11), 3.0, 4.0, 0.0)),
        ];
        let report = summarize("TKN", None, results);
        assert_eq!(report.weighted_high, Some(3.0));
        assert_eq!(report.weighted_open, Some(2.0));
        assert!(!report.volume_weighted);
    }

    #[test]
    fn test_earliest_is_order_independent() {
        let a = found("a", candle(at(12), 1.0, 2.0, 10.0));
        let b = found("b", candle(at(9), 1.0, 2.0, 1.0));
        let c = found("c", candle(at(11), 1.0, 2.0, 99.0));

        let orders = [
            vec![a.clone(), b.clone(), c.clone()],
            vec![c.clone(), a.clone(), b.clone()],
            vec![b, c, a],
        ];
        for results in orders {
            let report = summarize("TKN", None, results);
            assert_eq!(report.earliest_overall.unwrap().exchange_id, "b");
        }
    }

    #[test]
    fn test_full_tie_breaks_by_exchange_id() {
        let results = vec![
            found("okx", candle(at(10), 1.0, 2.0, 5.0)),
            found("binance", candle(at(10), 1.0, 2.0, 5.0)),
        ];
        let report = summarize("TKN", None, results);
        assert_eq!(report.earliest_overall.unwrap().exchange_id, "binance");
    }
}
