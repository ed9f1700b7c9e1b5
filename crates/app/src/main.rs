mod cli;
mod settings;

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tgescan_core::config::LogConfig;
use tgescan_core::report::port::ReportSink;
use tgescan_core::token::port::TokenDirectory;
use tgescan_feed::coingecko::CoinGeckoDirectory;
use tgescan_feed::http::build_client;
use tgescan_feed::registry::build_providers;
use tgescan_market::aggregator::Aggregator;
use tgescan_market::resolver::SymbolResolver;
use tgescan_market::scanner::{RunStatus, TgeScanner};
use tgescan_report::export::CsvReportSink;
use tgescan_report::table::TableReportSink;
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// # Summary
/// 应用启动入口，纯粹的装配层。
///
/// # Logic
/// 1. 解析命令行并分层加载配置。
/// 2. 初始化日志 (标准错误，非阻塞)。
/// 3. 实例化数据源、解析器、聚合器并组装扫描流水线。
/// 4. 执行扫描，输出表格与 CSV。
/// 5. 以运行终态作为进程退出码。
#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(RunStatus::Failed.exit_code())
        }
    }
}

async fn run() -> anyhow::Result<RunStatus> {
    let cli = cli::Cli::parse();
    let mut config = settings::load(cli.config.as_deref()).context("failed to load configuration")?;
    settings::apply_overrides(&mut config, &cli);

    let _guard = init_tracing(&config.log);
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("tls crypto provider already installed");
    }

    let ticker = {
        let stdin = std::io::stdin();
        cli::read_ticker(cli.ticker.clone(), &mut stdin.lock(), &mut std::io::stderr())
            .context("failed to read ticker")?
    };
    info!(ticker = %ticker, exchanges = ?config.exchanges, "tgescan starting");

    // 1. 基础设施层
    let client = build_client(config.probe.request_timeout())?;
    let exchanges = build_providers(&config.exchanges, &client)?;
    let directory: Arc<dyn TokenDirectory> = Arc::new(CoinGeckoDirectory::new(
        client,
        config.resolver.base_url.clone(),
    ));

    // 2. 领域层
    let resolver = SymbolResolver::new(directory, config.resolver.fallback_quotes.clone());
    let aggregator = Aggregator::from_config(&config.probe);
    let scanner = TgeScanner::new(resolver, aggregator, exchanges);

    // 3. 执行并输出
    let outcome = scanner.scan(&ticker).await;
    let status = RunStatus::from_outcome(&outcome);
    match outcome {
        Ok(reports) => {
            TableReportSink.emit(&reports)?;
            let csv = CsvReportSink::new(&config.output.csv_path);
            csv.emit(&reports)
                .with_context(|| format!("failed to write {}", csv.path().display()))?;
        }
        Err(err) => {
            error!(ticker = %ticker, error = %err, "ticker resolution failed");
            eprintln!("{}: {}", status, err);
        }
    }

    info!(status = %status, "tgescan finished");
    Ok(status)
}

/// # Summary
/// 初始化全局日志，`RUST_LOG` 优先于配置中的级别。
///
/// # Returns
/// 非阻塞写入器的守卫，需保持到进程结束以刷新缓冲。
fn init_tracing(log: &LogConfig) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    guard
}
