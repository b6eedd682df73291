//! Basic CDP example - connecting, getting browser version, watching targets

use cdp_router::cdp::domains::browser;
use cdp_router::cdp::CDPEvent;
use cdp_router::{CDPClient, RouterEvent};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Connect to Chrome
    let cdp_url = "ws://localhost:9222/devtools/browser";
    println!("Connecting to Chrome at: {}", cdp_url);

    let client = CDPClient::connect(cdp_url).await?;
    println!("Connected!");

    let version = client.execute(&browser::GetVersion {}, None).await?;
    println!("Browser version: {} ({})", version.product, version.protocol_version);

    // Raw listener on every session
    client.subscribe(
        "Target.targetCreated",
        Arc::new(|event: &CDPEvent| {
            println!("Target created: {}", event.params["targetInfo"]["url"]);
        }),
    );

    let mut lifecycle = client.lifecycle();
    tokio::spawn(async move {
        while let Ok(event) = lifecycle.recv().await {
            if let RouterEvent::Diagnostic(diagnostic) = &event {
                println!("Diagnostic: {:?}", diagnostic);
            } else {
                println!("Lifecycle: {:?}", event);
            }
        }
    });

    for target in client.discover_targets().await? {
        println!("  {} [{}] {}", target.target_id, target.target_type, target.url);
    }

    // Keep alive for a bit to see events
    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

    // Clean shutdown
    client.close().await?;
    println!("Disconnected");

    Ok(())
}
