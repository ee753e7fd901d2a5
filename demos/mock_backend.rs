//! A stand-in application instance for trying the balancer locally.
//!
//! ```text
//! cargo run --example mock_backend -- 127.0.0.1:3001 alpha
//! LB_INSTANCES=127.0.0.1:3001 cargo run
//! ```

use axum::{routing::get, Router};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let addr: SocketAddr = args.next().as_deref().unwrap_or("127.0.0.1:3001").parse()?;
    let name = args.next().unwrap_or_else(|| addr.to_string());

    let greeting = format!("Hello from instance {}\n", name);
    let app = Router::new()
        .route("/", get(move || {
            let greeting = greeting.clone();
            async move { greeting }
        }))
        .route("/health", get(|| async { "ok" }));

    println!("Mock instance {} listening on http://{}", name, addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
