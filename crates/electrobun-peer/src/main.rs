//! electrobun-peer: stand-in for a view process.
//!
//! Opens the view end of a channel prefix, answers `ping` and `echo`, logs
//! every fire-and-forget message, and exits when the controller closes the
//! channel. Useful for exercising a controller without a native host.

mod handlers;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use electrobun_common::{ElectrobunError, ViewId};
use electrobun_config::ElectrobunConfig;
use electrobun_ipc::transport::{ChannelPaths, Side};
use electrobun_ipc::{Rpc, TransportManager};

#[derive(Parser)]
#[command(name = "electrobun-peer", about = "View-side RPC peer for an Electrobun channel")]
struct Args {
    /// Channel prefix; `<prefix>_in` and `<prefix>_out` are used.
    #[arg(short, long)]
    prefix: PathBuf,

    /// Id of the view this peer stands in for.
    #[arg(long, default_value_t = 1)]
    view_id: u32,

    /// Request deadline in milliseconds. Defaults to the config value.
    #[arg(long)]
    max_request_time_ms: Option<u64>,

    /// Config file to read instead of the built-in defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => electrobun_config::toml_loader::load_from_path(path),
        None => Ok(ElectrobunConfig::default()),
    };

    let level = config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("electrobun={level}").into()),
        )
        .init();

    let result = match config {
        Ok(config) => run(args, config).await,
        Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
        tracing::error!(error = %e, "electrobun-peer failed");
        std::process::exit(1);
    }
}

async fn run(args: Args, config: ElectrobunConfig) -> Result<(), ElectrobunError> {
    let view_id = ViewId(args.view_id);
    let paths = ChannelPaths::new(&args.prefix);
    let max_request_time = args
        .max_request_time_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.rpc.max_request_time());

    let transport = Arc::new(TransportManager::open(view_id, &paths, Side::View, None).await?);
    let rpc: handlers::PeerRpc = Rpc::bind(Arc::clone(&transport), max_request_time);
    handlers::install(&rpc);

    tracing::info!(%view_id, prefix = %paths.prefix().display(), "electrobun-peer ready");

    tokio::select! {
        _ = transport.closed() => tracing::info!(%view_id, "controller closed the channel"),
        _ = tokio::signal::ctrl_c() => tracing::info!(%view_id, "interrupted"),
    }

    transport.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use electrobun_ipc::Untyped;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn serves_until_controller_closes() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("electrobun_ipc_pipe_test_0000abcd_1");
        let paths = ChannelPaths::new(&prefix);

        let controller = Arc::new(
            TransportManager::open(ViewId(1), &paths, Side::Controller, None)
                .await
                .unwrap(),
        );
        let rpc: Rpc<Untyped, Untyped> = Rpc::bind(Arc::clone(&controller), Duration::from_secs(2));

        let args = Args {
            prefix,
            view_id: 1,
            max_request_time_ms: Some(500),
            config: None,
        };
        let peer = tokio::spawn(run(args, ElectrobunConfig::default()));

        assert_eq!(rpc.request_raw("ping", Value::Null).await.unwrap(), json!("pong"));
        rpc.send_raw("log", json!("hello")).await;
        assert_eq!(
            rpc.request_raw("echo", json!([1, 2])).await.unwrap(),
            json!([1, 2])
        );

        controller.close().await;
        tokio::time::timeout(Duration::from_secs(5), peer)
            .await
            .expect("peer should exit after close")
            .unwrap()
            .unwrap();
    }

    #[test]
    fn args_parse() {
        let args = Args::try_parse_from([
            "electrobun-peer",
            "--prefix",
            "/tmp/electrobun_ipc_pipe_x_1",
            "--view-id",
            "4",
            "--max-request-time-ms",
            "250",
        ])
        .unwrap();
        assert_eq!(args.view_id, 4);
        assert_eq!(args.max_request_time_ms, Some(250));
        assert!(args.config.is_none());
    }
}
