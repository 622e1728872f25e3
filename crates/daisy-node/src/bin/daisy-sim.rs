//! Daisy simulation binary
//!
//! Spins up a neighborhood of in-memory devices, lets them self-assemble
//! into a chain, floods one message from the first device, and prints a
//! JSON summary. `DAISY_SIM_DEVICES` sets the neighborhood size.

use std::sync::Arc;
use std::time::{Duration, Instant};

use daisy_node::{ChainNode, NodeConfig, NodeHandle};
use daisy_topology::EndpointId;
use daisy_transport::RadioHub;
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let devices: usize = std::env::var("DAISY_SIM_DEVICES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5);

    info!(devices, "starting simulated neighborhood");
    let hub = RadioHub::new();
    let mut handles: Vec<NodeHandle> = Vec::with_capacity(devices);
    for i in 0..devices {
        let identity = EndpointId::from(format!("device-{i:02}"));
        let (radio, events) = hub.join(identity.clone());
        handles.push(ChainNode::spawn(
            NodeConfig::new(identity),
            Arc::new(radio),
            events,
        ));
        // Staggered arrivals, the way devices wander into range.
        sleep(Duration::from_millis(25)).await;
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while !handles.iter().all(|h| h.current_size() == devices) {
        if Instant::now() >= deadline {
            warn!("neighborhood did not converge before the deadline");
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }
    for handle in &handles {
        info!(identity = %handle.identity(), size = handle.current_size(), "converged");
    }

    let mut inboxes: Vec<_> = handles[1..]
        .iter()
        .map(|h| h.subscribe_messages())
        .collect();
    handles[0].send_text("hello from the end of the chain")?;

    let mut deliveries = 0;
    for inbox in &mut inboxes {
        match tokio::time::timeout(Duration::from_secs(2), inbox.recv()).await {
            Ok(Ok(delivery)) => {
                info!(%delivery, "displayed");
                deliveries += 1;
            }
            _ => warn!("a device missed the message"),
        }
    }

    println!(
        "{}",
        serde_json::json!({
            "devices": devices,
            "links": hub.link_snapshot().len(),
            "sizes": handles.iter().map(|h| h.current_size()).collect::<Vec<_>>(),
            "deliveries": deliveries,
        })
    );

    for handle in handles {
        handle.shutdown().await;
    }
    Ok(())
}
