use std::sync::Arc;

use log::*;

#[derive(clap::Parser)]
#[command(name = "plantnode-authority")]
#[command(about = "Development registration authority for plantnode sensors")]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,
    /// Device identity to report as registered, repeatable
    #[arg(long = "allow")]
    allow: Vec<String>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli: Cli = clap::Parser::parse();

    let allow = match plantnode_authority::Allowlist::parse(&cli.allow) {
        Ok(allow) => allow,
        Err(e) => {
            eprintln!("Invalid --allow entry: {e}");
            std::process::exit(1);
        }
    };
    if allow.is_empty() {
        warn!("allow list is empty, every device will be told it is not registered");
    }

    let listener = match tokio::net::TcpListener::bind(&cli.addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("failed to bind to {}: {e}", cli.addr);
            std::process::exit(1);
        }
    };
    info!("Listening on http://{}, {} device(s) allowed", cli.addr, allow.len());

    plantnode_authority::http::run_server(listener, Arc::new(allow)).await;
}
