use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use filedrop::logging;
use filedrop::{send_with_retry, RetryPolicy, TransferConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "filedrop")]
#[command(about = "Send files to a filedrop receiver over TCP")]
struct Cli {
    /// More output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// TOML config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send each file in its own connection, one after another
    Send {
        #[arg(required = true, help = "Files to send")]
        paths: Vec<PathBuf>,

        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        #[arg(long, help = "Body chunk size in bytes")]
        chunk_size: Option<usize>,

        #[arg(long, help = "Connect timeout in seconds")]
        connect_timeout: Option<u64>,

        #[arg(long, help = "Wait for the receiver's one-byte acknowledgment")]
        ack: bool,

        #[arg(long, default_value_t = 0, help = "Retries per file after the first attempt")]
        retries: u32,

        #[arg(long, help = "Log failed files and continue with the rest")]
        keep_going: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.verbose) {
        eprintln!("Error: failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns Ok(false) when at least one file failed
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = TransferConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Send {
            paths,
            host,
            port,
            chunk_size,
            connect_timeout,
            ack,
            retries,
            keep_going,
        } => {
            // CLI flags sit on top of file and env layers
            if let Some(host) = host {
                config.endpoint.host = host;
            }
            if let Some(port) = port {
                config.endpoint.port = port;
            }
            if let Some(chunk_size) = chunk_size {
                config.chunk_size = chunk_size;
            }
            if let Some(secs) = connect_timeout {
                config.connect_timeout_secs = secs;
            }
            config.await_ack |= ack;
            config.validate()?;

            let policy = RetryPolicy::with_attempts(retries.saturating_add(1));
            let cancel = CancellationToken::new();
            spawn_ctrl_c(cancel.clone());

            send_all(&paths, &config, &policy, &cancel, keep_going).await
        }
    }
}

async fn send_all(
    paths: &[PathBuf],
    config: &TransferConfig,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    keep_going: bool,
) -> anyhow::Result<bool> {
    let mut failed = 0usize;

    for path in paths {
        if cancel.is_cancelled() {
            break;
        }

        // fail fast on no file, before touching the network
        if !path.is_file() {
            tracing::error!(path = %path.display(), "not a readable file");
            failed += 1;
            if keep_going {
                continue;
            }
            break;
        }

        match send_with_retry(path, config, policy, cancel).await {
            Ok(ack) => {
                println!("{}  {} bytes  sha256:{}", ack.name, ack.bytes_sent, ack.sha256);
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "transfer failed");
                failed += 1;
                if !keep_going {
                    break;
                }
            }
        }
    }

    if failed > 0 {
        eprintln!("{failed} of {} file(s) failed", paths.len());
    }
    Ok(failed == 0)
}

fn spawn_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling transfer");
            cancel.cancel();
        }
    });
}
