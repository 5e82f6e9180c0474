//! Accept a device and drive its WebView.
//!
//! Demonstrates:
//! - Building a Driver from `FAKEWEB_*` environment variables
//! - Waiting for a device to connect and identify
//! - Streaming network logs through a hook
//! - Navigating, waiting for the page, and running a script
//! - Reading cookies
//!
//! Usage:
//!   cargo run --example accept_device
//!   cargo run --example accept_device -- --debug
//!   cargo run --example accept_device -- https://example.org

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use fakeweb::{Driver, LoadState, Result, ServerOptions, WebViewSettings};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_URL: &str = "https://example.com";
const PAGE_TIMEOUT: Duration = Duration::from_secs(30);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let debug = args.iter().any(|a| a == "--debug");
    let url = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map_or(DEFAULT_URL, String::as_str)
        .to_string();

    init_logging(debug);

    if let Err(e) = run(&url).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let filter = if debug { "fakeweb=debug" } else { "fakeweb=info" };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

async fn run(url: &str) -> Result<()> {
    println!("=== fakeweb: accept device ===\n");

    // ========================================================================
    // Create Driver
    // ========================================================================

    let driver = Driver::builder()
        .options(ServerOptions::from_env()?)
        .build()
        .await?;
    println!("[Driver] Devices connect to {}", driver.ws_url());

    // ========================================================================
    // Accept Device
    // ========================================================================

    let webview = driver.accept().await?;
    println!(
        "[Device] {} connected ({})",
        webview.device_id().as_deref().unwrap_or("<unknown>"),
        webview.connection_id()
    );

    webview.hook_network(|log| println!("        [net] {log}"));

    // ========================================================================
    // Navigate
    // ========================================================================

    webview
        .settings(&WebViewSettings::new().with_package_name("com.android.chrome"))
        .await?;
    webview.start(url).await?;
    println!("[Page] Loading {url}...");

    match webview.loaded(Some(PAGE_TIMEOUT)).await? {
        LoadState::Finished => println!("        ✓ Page finished"),
        LoadState::TimedOut => println!("        ✗ No page event within {PAGE_TIMEOUT:?}"),
    }

    // ========================================================================
    // Script & Cookies
    // ========================================================================

    let title = webview
        .execute_js("document.title", Some(COMMAND_TIMEOUT))
        .await?;
    println!("[Script] Title: {}", title.as_deref().unwrap_or("<no reply>"));

    let cookies = webview.get_cookies(url, Some(COMMAND_TIMEOUT)).await?;
    println!("[Cookies] {}", cookies.as_deref().unwrap_or("<no reply>"));

    webview.close().await?;
    driver.shutdown();

    println!("\n=== Done ===");
    Ok(())
}
