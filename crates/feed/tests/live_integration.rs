use std::time::Duration;
use tgescan_core::common::{MarketPair, TimeFrame};
use tgescan_core::market::entity::ExchangeMarket;
use tgescan_core::market::port::ExchangeProvider;
use tgescan_core::token::port::TokenDirectory;
use tgescan_feed::coingecko::CoinGeckoDirectory;
use tgescan_feed::http::build_client;
use tgescan_feed::registry::{build_provider, SUPPORTED_EXCHANGES};

fn client() -> reqwest::Client {
    rustls::crypto::ring::default_provider().install_default().ok();
    build_client(Duration::from_secs(15)).unwrap()
}

/// # Summary
/// 各交易所真实接口的冒烟测试 (需要外网，默认忽略)。
///
/// # Logic
/// 1. 加载目录并确认 BTC/USDT 存在。
/// 2. 抓取最新一页 15 分钟 K 线，断言升序且满足不变式。
#[tokio::test]
#[ignore = "requires network access"]
async fn test_live_btc_usdt_on_every_exchange() -> anyhow::Result<()> {
    let client = client();
    let pair = MarketPair::new("BTC", "USDT");

    for id in SUPPORTED_EXCHANGES {
        let provider = build_provider(id, client.clone()).unwrap();
        let catalog = provider.list_markets().await?;
        let listing = catalog
            .iter()
            .find(|m| m.pair == pair)
            .unwrap_or_else(|| panic!("{} has no BTC/USDT", id));
        let market = ExchangeMarket::from_listing(id, listing);

        let page = provider
            .fetch_candles(&market, TimeFrame::Minute15, None, 10)
            .await?;
        println!("{}: {} candles, last {:?}", id, page.len(), page.last());
        assert!(!page.is_empty(), "{} returned an empty page", id);
        assert!(page.len() <= 10);
        assert!(page.windows(2).all(|w| w[0].open_time < w[1].open_time));
        assert!(page.iter().all(|c| c.is_consistent()));
    }
    Ok(())
}

#[tokio::test]
#[ignore = "requires network access"]
async fn test_live_coingecko_search() -> anyhow::Result<()> {
    let directory = CoinGeckoDirectory::new(client(), "https://api.coingecko.com/api/v3");
    let matches = directory.search("btc").await?;
    assert!(matches.iter().any(|m| m.id == "bitcoin"));

    let details = directory.details("bitcoin").await?;
    assert!(details.expected_tge.is_some());
    Ok(())
}
