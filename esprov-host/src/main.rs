//! JSON-lines shell around the provisioning bridges.
//!
//! Reads one request per line on stdin, writes one response per line on
//! stdout. Requests are handled concurrently so a blocking call (say, a
//! pending permission dialog) never stalls the pipe; responses carry the
//! request id and may arrive out of order.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use esprov_bridge::Dispatcher;
use esprov_bridge::sim::{PlatformEvent, SimBluetooth, SimConfig, SimLocation, SimSdk, SimWorld};
use esprov_proto::{ErrorCode, Fault, Request, Response};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "esprov-host", about = "ESP Wi-Fi provisioning bridge host")]
struct Args {
    /// Simulated world description (JSON). Defaults to an empty permissive
    /// world with no devices.
    #[arg(long)]
    config: Option<PathBuf>,
}

type SimDispatcher = Dispatcher<SimSdk, SimBluetooth, SimLocation>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => SimConfig::default(),
    };

    let (world, platform_events) = SimWorld::new(config);
    let dispatcher = Arc::new(SimDispatcher::new(world.sdk, world.bluetooth, world.location));

    tokio::spawn(forward_platform_events(Arc::clone(&dispatcher), platform_events));

    let (replies, mut reply_rx) = mpsc::unbounded_channel::<Response>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(response) = reply_rx.recv().await {
            let mut line = match serde_json::to_string(&response) {
                Ok(line) => line,
                Err(e) => {
                    log::error!("failed to serialize response: {e}");
                    continue;
                }
            };
            line.push('\n');
            if stdout.write_all(line.as_bytes()).await.is_err() {
                return;
            }
            let _ = stdout.flush().await;
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                let fault = Fault::new(ErrorCode::NotImplemented, format!("invalid request: {e}"));
                let _ = replies.send(Response::err(0, fault));
                continue;
            }
        };
        let dispatcher = Arc::clone(&dispatcher);
        let replies = replies.clone();
        tokio::spawn(async move {
            let _ = replies.send(dispatcher.handle(request).await);
        });
    }

    drop(replies);
    writer.await?;
    Ok(())
}

/// Routes simulated OS dialog outcomes into the bridge callbacks, the same
/// way a real embedder would route activity results.
async fn forward_platform_events(
    dispatcher: Arc<SimDispatcher>,
    mut events: mpsc::UnboundedReceiver<PlatformEvent>,
) {
    while let Some(event) = events.recv().await {
        log::debug!("platform event: {event:?}");
        match event {
            PlatformEvent::BluetoothEnableResult => {
                dispatcher.bluetooth.on_enable_result();
            }
            PlatformEvent::BluetoothPermissionResult(granted) => {
                dispatcher.bluetooth.on_permission_result(granted);
            }
            PlatformEvent::LocationEnableResult(accepted) => {
                dispatcher.location.on_enable_result(accepted);
            }
            PlatformEvent::LocationPermissionResult(granted) => {
                dispatcher.location.on_permission_result(granted);
            }
        }
    }
}
