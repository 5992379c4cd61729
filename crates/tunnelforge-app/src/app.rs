//! Command dispatch.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{Cli, Commands};
use crate::config::{self, GatewayConfig};
use crate::control::{self, ControlClient, ControlServer, ControlState, FollowRequest};
use crate::web::{EventHub, GatewayServer};

pub async fn run(cli: Cli) -> Result<()> {
    let control_dir = config::control_dir(cli.control_dir.clone());
    let client = ControlClient::new(control::socket_path(&control_dir));

    match cli.command.clone().unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&cli, control_dir).await,
        Commands::Forward {
            session_id,
            command,
        } => {
            let line = command.join(" ");
            client.forward(&session_id, &line).await?;
            println!("{} sent to {}", "✓".green(), session_id.bold());
            Ok(())
        }
        Commands::Status => {
            let status = client.status().await?;
            println!("{} TunnelForge is running", "●".green());
            if let Some(url) = status.url {
                println!("  URL:     {url}");
            }
            if let Some(version) = status.version {
                println!("  Version: {version}");
            }
            match status.follow_mode {
                Some(follow) if follow.enabled => println!(
                    "  Follow:  {} ({})",
                    follow.branch.unwrap_or_default().cyan(),
                    follow.repo_path.unwrap_or_default()
                ),
                _ => println!("  Follow:  {}", "off".dimmed()),
            }
            Ok(())
        }
        Commands::Follow { branch, repo } => {
            let response = client
                .follow(FollowRequest {
                    branch,
                    repo_path: Some(repo_path(repo)?),
                    enable: true,
                })
                .await?;
            if !response.success {
                anyhow::bail!(response
                    .error
                    .unwrap_or_else(|| "follow mode was not enabled".to_string()));
            }
            println!(
                "{} following {}",
                "✓".green(),
                response.current_branch.unwrap_or_default().cyan()
            );
            Ok(())
        }
        Commands::Unfollow { repo } => {
            client
                .follow(FollowRequest {
                    branch: None,
                    repo_path: Some(repo_path(repo)?),
                    enable: false,
                })
                .await?;
            println!("{} follow mode disabled", "✓".green());
            Ok(())
        }
        Commands::GitEvent { kind, repo } => {
            client.git_event(repo_path(repo)?, kind).await?;
            Ok(())
        }
        Commands::Version => {
            println!("tunnelforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn repo_path(repo: Option<PathBuf>) -> Result<String> {
    let path = match repo {
        Some(path) => path,
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    Ok(path.display().to_string())
}

/// Run the gateway and control socket until ctrl-c.
async fn serve(cli: &Cli, control_dir: PathBuf) -> Result<()> {
    let gateway_config = GatewayConfig::from_args(&cli.serve)?;
    let events = Arc::new(EventHub::new(gateway_config.event_streams.clone()));
    let public_url = gateway_config.public_url();
    let port = gateway_config.bind_addr.port();

    let gateway = GatewayServer::new(gateway_config, Arc::clone(&events))?;
    let control_state = Arc::new(ControlState::new(
        port,
        public_url.clone(),
        gateway.state().backend.clone(),
        events,
    ));
    let control_server = ControlServer::bind(control::socket_path(&control_dir), control_state)
        .context("failed to open control socket")?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(target: "tunnelforge", "shutdown requested");
        }
        signal.cancel();
    });

    println!("{} TunnelForge gateway on {}", "▶".green(), public_url.bold());

    let control_task = tokio::spawn(control_server.run(shutdown.clone()));
    let gateway_shutdown = shutdown.clone();
    let result = gateway
        .run(async move { gateway_shutdown.cancelled().await })
        .await;

    shutdown.cancel();
    match control_task.await {
        Ok(Err(err)) => warn!(target: "tunnelforge", error = %err, "control socket cleanup failed"),
        Err(err) => warn!(target: "tunnelforge", error = %err, "control task panicked"),
        Ok(Ok(())) => {}
    }
    result
}
