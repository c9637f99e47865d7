use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{load_settings, ProjectionUpdate, TelemetryClient};
use shared::domain::Namespace;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// TOML settings file; missing files fall back to defaults.
    #[arg(long, default_value = "monitor.toml")]
    config: PathBuf,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    namespace: Option<String>,
    /// Draw the connect-time (0, 0) plot seed instead of waiting for the server.
    #[arg(long)]
    render_placeholder_seed: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings(Some(&args.config))?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(namespace) = args.namespace {
        settings.namespace = Namespace::parse(namespace).context("invalid --namespace")?;
    }
    if args.render_placeholder_seed {
        settings.plot.render_placeholder_seed = true;
    }

    let mut client = TelemetryClient::new(settings)?;
    let renderer = tokio::spawn(render_updates(client.subscribe_updates()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; disconnecting");
        }
        let _ = shutdown_tx.send(true);
    });

    client.run(shutdown_rx).await?;

    let snapshot = client.snapshot();
    info!(
        console_bytes = snapshot.console.len(),
        ensemble = %snapshot.ensemble_label,
        plot_points = snapshot.plot.len(),
        "final projection state"
    );
    drop(client);
    let _ = renderer.await;
    Ok(())
}

async fn render_updates(mut updates: broadcast::Receiver<ProjectionUpdate>) {
    loop {
        match updates.recv().await {
            Ok(update) => println!("{}", render_line(&update)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "renderer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn render_line(update: &ProjectionUpdate) -> String {
    match update {
        ProjectionUpdate::Console { text } => format!("[serial] {}", text.trim_end()),
        ProjectionUpdate::Ensemble {
            ensemble_label,
            status_label,
        } => format!("[ensemble] #{ensemble_label} (status #{status_label})"),
        ProjectionUpdate::PlotSeeded { points } => {
            let rendered: Vec<String> = points
                .iter()
                .map(|p| format!("({}, {})", p.x, p.y))
                .collect();
            format!("[volt] seeded {}", rendered.join(" "))
        }
        ProjectionUpdate::PlotAppended { point } => {
            format!("[volt] {} -> {:.2} V", point.x, point.y)
        }
    }
}
