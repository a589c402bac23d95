#![forbid(unsafe_code)]

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;

use crate::{config::Config, server::build_router, state::AppState};

pub mod config;
pub mod error;
pub mod proxy;
pub mod server;
pub mod state;
pub mod webhook;

pub async fn build_app(config: Config) -> Result<axum::Router> {
    Ok(build_router(AppState::build(config).await?))
}

pub async fn serve(config: Config) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(
        service = %config.service_name,
        bind_addr = %config.bind_addr,
        "gateway listening"
    );
    axum::serve(listener, build_app(config).await?).await?;
    Ok(())
}
