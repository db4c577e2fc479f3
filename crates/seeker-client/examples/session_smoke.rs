/// Smoke-test for `ChromeSession`.
///
/// Launches Chromium, submits one search and crawls a single page of results,
/// printing each record's overview.
///
/// Run with:
///   cargo run -p seeker-client --example session_smoke
///
/// Set `SEEKER_MODE=interactive` to watch the browser.
use seeker_client::ChromeSessionFactory;
use seeker_core::{BrowserSession, PaginationEngine, SeekerConfig, SessionFactory, TracingCrawlReporter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = SeekerConfig::from_env()?;
    println!("Launching {} browser…", config.session_mode);
    let mut session = ChromeSessionFactory::new(&config).open().await?;

    let engine = PaginationEngine::from_config(&config);
    let crawled = engine
        .crawl(
            &mut session,
            "Software Developer",
            "Toronto, ON",
            1,
            &TracingCrawlReporter,
        )
        .await;
    session.close().await;
    let report = crawled?;

    assert!(report.pages_actual <= 1, "crawled past the page budget");
    for record in &report.records {
        println!("{}", record.overview());
    }
    println!(
        "OK: {} record(s), stopped on {}",
        report.records.len(),
        report.stop
    );
    Ok(())
}
