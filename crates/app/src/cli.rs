use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// 在所有主流中心化交易所上查找代币的最早 15 分钟 K 线 (TGE)。
#[derive(Debug, Parser)]
#[command(name = "tgescan", version, about = "Find a token's first traded 15m candle across exchanges")]
pub struct Cli {
    /// Token ticker, e.g. `ARB` or `$ARB`. Prompted on stdin when omitted.
    pub ticker: Option<String>,

    /// Where to write the raw first-candle CSV.
    #[arg(long)]
    pub output_csv: Option<PathBuf>,

    /// Configuration file (defaults to `tgescan.toml` when present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Comma-separated exchange ids, in output order.
    #[arg(long, value_delimiter = ',')]
    pub exchanges: Option<Vec<String>>,

    /// Maximum number of exchanges probed at once.
    #[arg(long)]
    pub concurrency: Option<usize>,
}

/// # Summary
/// 取得待查询的代码：优先命令行参数，否则在终端提示输入。
///
/// # Arguments
/// * `input`: 标准输入。
/// * `prompt`: 提示输出端 (标准错误，保证标准输出只包含报告)。
pub fn read_ticker(
    arg: Option<String>,
    input: &mut impl BufRead,
    prompt: &mut impl Write,
) -> std::io::Result<String> {
    if let Some(ticker) = arg {
        return Ok(ticker);
    }
    write!(prompt, "Enter token ticker (without $): ")?;
    prompt.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let cli = Cli::parse_from([
            "tgescan",
            "ARB",
            "--output-csv",
            "out.csv",
            "--exchanges",
            "okx,gate",
            "--concurrency",
            "2",
        ]);
        assert_eq!(cli.ticker.as_deref(), Some("ARB"));
        assert_eq!(cli.output_csv, Some(PathBuf::from("out.csv")));
        assert_eq!(cli.exchanges, Some(vec!["okx".to_string(), "gate".to_string()]));
        assert_eq!(cli.concurrency, Some(2));
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_ticker_is_optional() {
        let cli = Cli::parse_from(["tgescan"]);
        assert!(cli.ticker.is_none());
        assert!(cli.exchanges.is_none());
    }

    #[test]
    fn test_read_ticker_prefers_argument() {
        let mut input: &[u8] = b"IGNORED\n";
        let mut prompt = Vec::new();
        let ticker = read_ticker(Some("ARB".into()), &mut input, &mut prompt).unwrap();
        assert_eq!(ticker, "ARB");
        assert!(prompt.is_empty());
    }

    #[test]
    fn test_read_ticker_prompts() {
        let mut input: &[u8] = b"  op \n";
        let mut prompt = Vec::new();
        let ticker = read_ticker(None, &mut input, &mut prompt).unwrap();
        assert_eq!(ticker, "op");
        assert!(String::from_utf8(prompt).unwrap().contains("ticker"));
    }
}
