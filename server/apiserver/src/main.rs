/*
 * SPDX-FileCopyrightText: Copyright 2024 LG Electronics Inc.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The Mirage API server binary.
//!
//! Serves AWS-compatible EC2/RDS endpoints so that infrastructure-as-code
//! test runs can provision against a local process instead of a real
//! cloud account.

use anyhow::Result;
use apiserver::{route, AppState};
use clap::Parser;
use common::setting;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// API server command line arguments
#[derive(Parser, Debug)]
#[command(name = "apiserver")]
#[command(about = "Mirage API server - local AWS emulator for IaC test runs")]
struct Args {
    /// HTTP server bind address
    #[arg(long)]
    bind_address: Option<String>,

    /// HTTP server bind port
    #[arg(long)]
    bind_port: Option<u16>,

    /// AWS region the emulator reports
    #[arg(long)]
    region: Option<String>,

    /// Additional access keys accepted by the SigV4 admission check
    #[arg(long = "access-key")]
    access_keys: Vec<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("apiserver={},warn", level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let settings = setting::get_config();
    let bind_address = args
        .bind_address
        .unwrap_or_else(|| settings.host.bind_address.clone());
    let bind_port = args.bind_port.unwrap_or(settings.host.bind_port);
    let region = args.region.unwrap_or_else(|| settings.region.clone());
    let mut access_keys = settings.access_keys.clone();
    access_keys.extend(args.access_keys);

    info!("Starting Mirage API server");
    info!("Region: {}", region);

    let state = AppState::new(&region, &access_keys, settings.delays.clone());
    let app = route::app(state.clone());

    let addr = format!("{}:{}", bind_address, bind_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);
    info!("Registered services: {}", state.services.len());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cancel every scheduled transition before the process exits.
    state.states.shutdown();
    info!("Shutting down Mirage API server");

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        info!("ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
}
