//! Messaging bridge host over stdio.
//!
//! Reads one JSON request per line from stdin and writes one JSON response per
//! line to stdout as each callback fires. Logs go to stderr.

mod loopback;
mod protocol;

use std::sync::Arc;

use anyhow::Context;
use tokio::{
    io::{AsyncWriteExt, BufReader},
    runtime::Handle,
    sync::mpsc,
};

use mcb_core::{bridge::MessagingBridge, config::Config, logging};

use loopback::{LoopbackClient, LoopbackRegistry};
use protocol::{HostResponse, Outstanding};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load().context("load config")?;
    logging::init("mcb_host", &cfg).context("init logging")?;
    tracing::info!(
        cancel_superseded = cfg.cancel_superseded,
        latency_ms = cfg.loopback_latency.as_millis() as u64,
        "messaging bridge host running on stdio"
    );

    let client = Arc::new(LoopbackClient::new(cfg.loopback_latency));
    let registry = Arc::new(LoopbackRegistry::default());
    let bridge = MessagingBridge::new(&cfg, client.clone(), registry.clone(), Handle::current());

    let (tx, rx) = mpsc::unbounded_channel::<HostResponse>();
    let writer = tokio::spawn(write_responses(rx));
    let outstanding = Arc::new(Outstanding::default());

    let served = protocol::serve(
        BufReader::new(tokio::io::stdin()),
        &bridge,
        &outstanding,
        &tx,
    )
    .await;
    if let Err(e) = &served {
        tracing::error!("stdin read failed: {e}");
    }

    if tokio::time::timeout(cfg.drain_timeout, outstanding.drained())
        .await
        .is_err()
    {
        tracing::warn!(
            pending = outstanding.count(),
            "drain timeout reached, cancelling outstanding operations"
        );
    }

    // Cancelled operations still answer; the writer ends once every sender is gone.
    drop(bridge);
    drop(tx);
    writer.await.context("join response writer")??;
    served.context("read stdin")?;

    tracing::info!(
        acknowledged = client.acknowledged(),
        modules = ?registry.modules(),
        "stdin closed, host exiting"
    );
    Ok(())
}

async fn write_responses(mut rx: mpsc::UnboundedReceiver<HostResponse>) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(resp) = rx.recv().await {
        let mut out = serde_json::to_vec(&resp)?;
        out.push(b'\n');
        stdout.write_all(&out).await.context("write stdout")?;
        stdout.flush().await.context("flush stdout")?;
    }
    Ok(())
}
