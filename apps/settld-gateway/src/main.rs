use anyhow::Result;
use clap::Parser;
use settld_gateway::config::Config;

/// Reverse-proxy gateway that sits in front of x402-speaking tools, quoting
/// and settling escrowed payment each time a protected response is verified.
#[derive(Debug, Parser)]
#[command(name = "settld-gateway", version)]
struct Cli {
    /// Override the bind address from SETTLD_BIND_ADDR.
    #[arg(long)]
    bind_addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .json()
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(bind_addr) = cli.bind_addr {
        config.bind_addr = bind_addr.parse()?;
    }

    settld_gateway::serve(config).await
}
