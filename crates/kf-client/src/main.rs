//! k-Forward client
//!
//! Connects to an SSH server, opens the configured local forwards, and
//! optionally enables X11 forwarding for a remote command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use russh::ChannelMsg;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kf_client::transport::{SshClient, SshConnector};
use kf_client::{ForwardHandle, ForwardSession};
use kf_core::config::{self, ClientConfig};
use kf_core::ForwardSpec;

#[derive(Parser)]
#[command(name = "kf")]
#[command(about = "k-Forward - TCP and X11 forwarding over SSH")]
#[command(version)]
struct Args {
    /// SSH server to connect to (host or host:port)
    #[arg(short, long, env = "KF_SERVER")]
    server: Option<String>,

    /// Username on the server
    #[arg(short, long)]
    user: Option<String>,

    /// Path to private key
    #[arg(short, long)]
    key: Option<PathBuf>,

    /// Local forward: [bind_host:]port:remote_host:remote_port (repeatable)
    #[arg(short = 'L', long = "local")]
    local: Vec<ForwardSpec>,

    /// Enable X11 forwarding
    #[arg(short = 'X', long)]
    x11: bool,

    /// Command to run on the server (X11 applications need this)
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Path to configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the merged configuration to the config file and exit
    #[arg(long)]
    write_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&args)?;
    config.validate().context("Invalid configuration")?;

    if args.write_config {
        let path = args.config.clone().unwrap_or_else(config::default_config_path);
        config::save_config(&path, &config)
            .with_context(|| format!("Failed to write config to {:?}", path))?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let connector = SshConnector::new(config.clone()).context("Failed to load private key")?;
    let client = Arc::new(
        connector
            .connect()
            .await
            .with_context(|| format!("Failed to connect to {}", config.server_address))?,
    );

    let session = ForwardSession::new(Arc::clone(&client))
        .with_relay_config(config.relay.clone())
        .with_max_field_len(config.x11.max_field_len);

    let mut forwards = Vec::with_capacity(config.local_forwards.len());
    for spec in &config.local_forwards {
        let handle = session
            .forward_spec(spec.clone())
            .await
            .with_context(|| format!("Failed to start forward {}", spec))?;
        forwards.push(handle);
    }

    let exit_code = if config.x11.enabled || args.command.is_some() {
        run_session(&session, &client, config.x11.enabled, args.command.as_deref()).await?
    } else {
        wait_for_shutdown(&forwards).await;
        0
    };

    for handle in &forwards {
        handle.shutdown();
    }
    if let Err(e) = client.disconnect().await {
        tracing::debug!("Disconnect failed: {}", e);
    }

    std::process::exit(exit_code);
}

/// Merge the config file with command-line overrides
fn load_config(args: &Args) -> Result<ClientConfig> {
    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);

    let mut config = if config_path.exists() {
        config::load_config(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        if args.config.is_some() && !args.write_config {
            anyhow::bail!("Config file {:?} does not exist", config_path);
        }
        ClientConfig::default()
    };

    if let Some(server) = &args.server {
        config.server_address = if server.contains(':') {
            server.clone()
        } else {
            format!("{}:22", server)
        };
    }
    if let Some(user) = &args.user {
        config.username = user.clone();
    }
    if let Some(key) = &args.key {
        config.private_key_path = key.clone();
    }
    if args.x11 {
        config.x11.enabled = true;
    }
    config.local_forwards.extend(args.local.iter().cloned());

    Ok(config)
}

/// Open a session channel, set up X11 if asked, and run the command
async fn run_session(
    session: &ForwardSession<SshClient>,
    client: &SshClient,
    x11: bool,
    command: Option<&str>,
) -> Result<i32> {
    let channel = client
        .open_session()
        .await
        .context("Failed to open session channel")?;

    if x11 {
        session
            .enable_display_forward(&channel)
            .await
            .context("Failed to enable X11 forwarding")?;
    }

    let Some(command) = command else {
        tokio::signal::ctrl_c().await.ok();
        return Ok(0);
    };

    let mut channel = channel.into_inner();
    channel
        .exec(true, command)
        .await
        .context("Failed to run remote command")?;

    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    let mut exit_code = 0;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                let _ = channel.close().await;
                return Ok(130);
            }

            msg = channel.wait() => {
                match msg {
                    Some(ChannelMsg::Data { data }) => {
                        stdout.write_all(&data).await?;
                        stdout.flush().await?;
                    }
                    Some(ChannelMsg::ExtendedData { data, .. }) => {
                        stderr.write_all(&data).await?;
                        stderr.flush().await?;
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        exit_code = exit_status as i32;
                    }
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                }
            }
        }
    }

    Ok(exit_code)
}

/// Block until Ctrl-C or until every forward's accept loop has ended
async fn wait_for_shutdown(forwards: &[ForwardHandle]) {
    if forwards.is_empty() {
        tracing::warn!("Nothing to forward; waiting for Ctrl-C");
    }

    let mut poll = tokio::time::interval(std::time::Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                return;
            }
            _ = poll.tick() => {
                if !forwards.is_empty() && forwards.iter().all(ForwardHandle::is_finished) {
                    tracing::warn!("All forward listeners have stopped");
                    return;
                }
            }
        }
    }
}
