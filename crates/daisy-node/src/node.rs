//! The per-device actor and its application handle.

use std::sync::Arc;

use bytes::Bytes;
use daisy_protocol::{Delivery, Envelope, FloodStats, MessageRouter, TopologyController};
use daisy_topology::EndpointId;
use daisy_transport::{Transport, TransportEvent};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::NodeConfig;
use crate::error::{Error, Result};

/// Application commands consumed by the actor.
#[derive(Debug)]
enum Command {
    SendText(String),
    Stats(oneshot::Sender<FloodStats>),
    Shutdown,
}

/// One device's protocol actor.
///
/// Owns the [`TopologyController`] and [`MessageRouter`] exclusively and
/// consumes the transport event queue and the application command queue one
/// item at a time. Every handler runs to completion before the next item,
/// which is the whole concurrency story: a disconnect can never interleave
/// with a reachable-set update for the same slot.
pub struct ChainNode {
    controller: TopologyController,
    router: MessageRouter,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    size_tx: watch::Sender<usize>,
    delivery_tx: broadcast::Sender<Delivery>,
}

impl ChainNode {
    /// Spawns the actor onto the current runtime and returns the handle the
    /// application keeps.
    pub fn spawn(
        config: NodeConfig,
        transport: Arc<dyn Transport>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> NodeHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (size_tx, size_rx) = watch::channel(1);
        let (delivery_tx, _) = broadcast::channel(config.delivery_buffer);
        let identity = config.identity;

        let node = ChainNode {
            controller: TopologyController::new(identity.clone(), transport.clone()),
            router: MessageRouter::new(identity.clone(), transport),
            events,
            commands: command_rx,
            size_tx,
            delivery_tx: delivery_tx.clone(),
        };
        let task = tokio::spawn(node.run());

        NodeHandle {
            identity,
            commands: command_tx,
            size: size_rx,
            deliveries: delivery_tx,
            task,
        }
    }

    async fn run(mut self) {
        self.controller.start();
        loop {
            tokio::select! {
                Some(command) = self.commands.recv() => {
                    match command {
                        Command::SendText(text) => {
                            self.router.send_text(self.controller.links(), text);
                        }
                        Command::Stats(reply) => {
                            let _ = reply.send(self.router.stats());
                        }
                        Command::Shutdown => break,
                    }
                }
                Some(event) = self.events.recv() => {
                    self.handle_event(event);
                    self.publish_size();
                }
                else => {
                    // Both queues closed: the radio and the application are
                    // gone, nothing left to do.
                    debug!("all queues closed; stopping");
                    break;
                }
            }
        }
        self.controller.stop();
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::PayloadReceived { peer, bytes } => self.handle_payload(peer, bytes),
            TransportEvent::PayloadDelivered { payload, timestamp_ms } => {
                self.router.on_payload_delivered(payload, timestamp_ms);
            }
            other => self.controller.handle_event(other),
        }
    }

    fn handle_payload(&mut self, from: EndpointId, bytes: Bytes) {
        match Envelope::decode(&bytes) {
            Ok(Envelope::ControlUpdate(ids)) => {
                self.controller.on_reachable_set_received(from, ids);
            }
            Ok(Envelope::DataMessage { origin, text }) => {
                let delivery =
                    self.router
                        .on_data_received(self.controller.links(), from, origin, text);
                if let Some(delivery) = delivery {
                    // No subscribers is fine; the chain forwards regardless.
                    let _ = self.delivery_tx.send(delivery);
                }
            }
            Err(err) => warn!(%from, %err, "undecodable payload dropped"),
        }
    }

    fn publish_size(&self) {
        let size = self.controller.network_size();
        self.size_tx.send_if_modified(|current| {
            if *current == size {
                false
            } else {
                *current = size;
                true
            }
        });
    }
}

/// The application's grip on a running [`ChainNode`].
#[derive(Debug)]
pub struct NodeHandle {
    identity: EndpointId,
    commands: mpsc::UnboundedSender<Command>,
    size: watch::Receiver<usize>,
    deliveries: broadcast::Sender<Delivery>,
    task: JoinHandle<()>,
}

impl NodeHandle {
    pub fn identity(&self) -> &EndpointId {
        &self.identity
    }

    /// Flood `text` into the chain with this device as origin.
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.commands
            .send(Command::SendText(text.into()))
            .map_err(|_| Error::NotRunning)
    }

    /// Watch the network size; updated after every topology change.
    pub fn network_size(&self) -> watch::Receiver<usize> {
        self.size.clone()
    }

    /// The most recently published network size.
    pub fn current_size(&self) -> usize {
        *self.size.borrow()
    }

    /// Subscribe to messages this device displays. Each flooded message
    /// appears exactly once; `Delivery` formats as `"origin: text"`.
    pub fn subscribe_messages(&self) -> broadcast::Receiver<Delivery> {
        self.deliveries.subscribe()
    }

    /// Current flood counters.
    pub async fn flood_stats(&self) -> Result<FloodStats> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Stats(tx))
            .map_err(|_| Error::NotRunning)?;
        rx.await.map_err(|_| Error::NotRunning)
    }

    /// Stop searching, drop all links, and end the actor task.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daisy_transport::RadioHub;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    fn spawn_device(hub: &RadioHub, name: &str) -> NodeHandle {
        let identity = EndpointId::from(name);
        let (radio, events) = hub.join(identity.clone());
        ChainNode::spawn(NodeConfig::new(identity), Arc::new(radio), events)
    }

    async fn wait_for_size(handle: &NodeHandle, size: usize) {
        let mut rx = handle.network_size();
        timeout(Duration::from_secs(5), async {
            while *rx.borrow_and_update() != size {
                rx.changed().await.expect("node ended early");
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "{} never reached size {size} (at {})",
                handle.identity(),
                handle.current_size()
            )
        });
    }

    #[tokio::test]
    async fn solo_node_reports_size_one_and_shuts_down() {
        let hub = RadioHub::new();
        let handle = spawn_device(&hub, "ash");
        assert_eq!(handle.current_size(), 1);
        timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("shutdown hung");
    }

    #[tokio::test]
    async fn pair_links_and_exchanges_text() {
        let hub = RadioHub::new();
        let ash = spawn_device(&hub, "ash");
        sleep(Duration::from_millis(20)).await;
        let bee = spawn_device(&hub, "bee");

        wait_for_size(&ash, 2).await;
        wait_for_size(&bee, 2).await;

        let mut inbox = bee.subscribe_messages();
        ash.send_text("first light").unwrap();
        let delivery = timeout(Duration::from_secs(5), inbox.recv())
            .await
            .expect("no delivery")
            .unwrap();
        assert_eq!(delivery.to_string(), "ash: first light");

        let stats = ash.flood_stats().await.unwrap();
        assert_eq!(stats.originated, 1);

        ash.shutdown().await;
        wait_for_size(&bee, 1).await;
        bee.shutdown().await;
    }

    #[tokio::test]
    async fn commands_fail_after_shutdown() {
        let hub = RadioHub::new();
        let handle = spawn_device(&hub, "ash");
        let commands = handle.commands.clone();
        handle.shutdown().await;
        // The actor dropped its receiver on the way out.
        assert!(commands.send(Command::SendText("late".into())).is_err());
    }
}
