//! Session management example - contexts, tabs and per-session events

use cdp_router::cdp::domains::{page, runtime};
use cdp_router::{CDPClient, CDPSession, RouterConfig};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = RouterConfig::default()
        .with_ws_url("ws://localhost:9222/devtools/browser")
        .with_protocol_timeout(Some(Duration::from_secs(30)));
    println!("Connecting ({})", config.id);
    let client = CDPClient::connect_with_config(config).await?;

    // Isolated context with one tab
    let context = client.create_browser_context().await?;
    let target = client.create_target("about:blank", Some(context.clone())).await?;
    println!("📄 Created tab {} in context {}", target, context);

    let tab = CDPSession::attach(client.clone(), target.clone(), &["Page", "Runtime"]).await?;
    tab.on_event::<page::LoadEventFired, _>(|event| {
        println!("🧭 Load event at {}", event.timestamp);
    });
    tab.on_closed(|info| println!("🛑 Session {} closed", info.session_id))?;

    tab.execute(&page::Navigate {
        url: "https://www.rust-lang.org".to_string(),
    })
    .await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let title = tab
        .execute(&runtime::Evaluate {
            expression: "document.title".to_string(),
            return_by_value: Some(true),
            await_promise: None,
        })
        .await?;
    println!("🔍 Page title via JS: {}", title.result["value"]);

    for session in client.sessions() {
        println!("  {} -> {} ({:?})", session.session_id, session.target_id, session.state);
    }

    // Disposing the context tears down the tab's session
    client.dispose_browser_context(&context).await?;
    println!("Session state after dispose: {:?}", tab.state());

    client.close().await?;
    Ok(())
}
