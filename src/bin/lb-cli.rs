use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use url::Url;

#[derive(Parser)]
#[command(name = "lb-cli")]
#[command(about = "Management CLI for the traffic director", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: Url,

    #[arg(short, long, env = "LB_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full snapshot: instances, global metrics, recommendations
    Status,
    /// List instances with health and load
    Instances,
    /// Current scaling recommendations
    Recommendations,
    /// Register an instance at runtime
    Register {
        /// host:port
        address: String,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        weight: Option<u32>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Remove an instance
    Unregister { id: String },
    /// Drop every sticky session mapping
    FlushSessions,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = match cli.command {
        Commands::Status => client.get(cli.url.join("admin/status")?),
        Commands::Instances => client.get(cli.url.join("admin/instances")?),
        Commands::Recommendations => client.get(cli.url.join("admin/recommendations")?),
        Commands::Register { address, id, weight, tags } => client
            .post(cli.url.join("admin/instances")?)
            .json(&json!({ "address": address, "id": id, "weight": weight, "tags": tags })),
        Commands::Unregister { id } => {
            let mut url = cli.url.join("admin/instances/")?;
            url.path_segments_mut()
                .map_err(|_| "admin URL cannot be a base")?
                .pop_if_empty()
                .push(&id);
            client.delete(url)
        }
        Commands::FlushSessions => client.delete(cli.url.join("admin/sessions")?),
    }
    .headers(headers)
    .send()
    .await?;

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
