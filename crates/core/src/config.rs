use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    // 探测顺序即输出顺序
    pub exchanges: Vec<String>,
    pub probe: ProbeConfig,
    pub resolver: ResolverConfig,
    pub output: OutputConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    // 含首次请求在内的总尝试次数
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub request_timeout_secs: u64,
    // 单个交易所探测的总时间预算
    pub probe_timeout_secs: u64,
    pub max_concurrency: usize,
    // 向前回溯与二分查找的请求次数上限
    pub max_search_steps: u32,
    pub history_floor: DateTime<Utc>,
}

impl ProbeConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub base_url: String,
    // 附加在元数据交易对之后的兜底计价币
    pub fallback_quotes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub csv_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            exchanges: ["binance", "okx", "bybit", "gate", "kucoin"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            probe: ProbeConfig::default(),
            resolver: ResolverConfig::default(),
            output: OutputConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 500,
            request_timeout_secs: 10,
            probe_timeout_secs: 120,
            max_concurrency: 4,
            max_search_steps: 40,
            history_floor: Utc
                .with_ymd_and_hms(2010, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            fallback_quotes: vec!["USDT".to_string(), "USDC".to_string(), "USD".to_string()],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            csv_path: "trading_flow_15m.csv".to_string(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.exchanges[0], "binance");
        assert_eq!(config.exchanges.len(), 5);
        assert_eq!(config.probe.max_attempts, 3);
        assert_eq!(config.probe.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.resolver.fallback_quotes, vec!["USDT", "USDC", "USD"]);
        assert_eq!(config.output.csv_path, "trading_flow_15m.csv");
        assert_eq!(config.probe.history_floor.to_rfc3339(), "2010-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"probe": {"max_concurrency": 8}}"#).unwrap();
        assert_eq!(config.probe.max_concurrency, 8);
        assert_eq!(config.probe.max_attempts, 3);
        assert_eq!(config.exchanges.len(), 5);
    }
}
