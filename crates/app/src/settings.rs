use crate::cli::Cli;
use config::{Config, ConfigError, Environment, File};
use std::path::Path;
use tgescan_core::config::AppConfig;

// 未指定 --config 时在工作目录查找 tgescan.toml (可选)
const DEFAULT_CONFIG_NAME: &str = "tgescan";
const ENV_PREFIX: &str = "TGESCAN";

/// # Summary
/// 分层加载配置：内置默认值 → 配置文件 → 环境变量 `TGESCAN__SECTION__KEY`。
///
/// # Arguments
/// * `explicit`: 命令行指定的配置文件，指定时必须存在。
pub fn load(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    load_with_env(explicit, None)
}

fn load_with_env(
    explicit: Option<&Path>,
    env: Option<config::Map<String, String>>,
) -> Result<AppConfig, ConfigError> {
    let file = match explicit {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
    };
    let environment = Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("exchanges")
        .source(env);

    Config::builder()
        .add_source(Config::try_from(&AppConfig::default())?)
        .add_source(file)
        .add_source(environment)
        .build()?
        .try_deserialize()
}

/// 命令行参数优先于所有配置层。
pub fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(exchanges) = &cli.exchanges {
        config.exchanges = exchanges
            .iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
    }
    if let Some(concurrency) = cli.concurrency {
        config.probe.max_concurrency = concurrency.max(1);
    }
    if let Some(path) = &cli.output_csv {
        config.output.csv_path = path.display().to_string();
    }
}
