//! Shared helpers for multi-device scenarios.
//!
//! Scenarios assemble real [`ChainNode`] actors over one [`RadioHub`] and
//! assert on what emerges: chain shape, size convergence, message delivery.
//! Convergence is asynchronous, so every assertion waits behind a deadline
//! rather than expecting instant quiescence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use daisy_node::{ChainNode, NodeConfig, NodeHandle};
use daisy_protocol::Delivery;
use daisy_topology::EndpointId;
use daisy_transport::RadioHub;
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout, Instant};

pub const CONVERGENCE: Duration = Duration::from_secs(10);

/// Joins the hub under `name` and spawns the device's actor.
pub fn spawn_device(hub: &RadioHub, name: &str) -> NodeHandle {
    let identity = EndpointId::from(name);
    let (radio, events) = hub.join(identity.clone());
    ChainNode::spawn(NodeConfig::new(identity), Arc::new(radio), events)
}

/// Spawns `names` staggered, the way devices wander into range one by one.
pub async fn spawn_neighborhood(hub: &RadioHub, names: &[&str]) -> Vec<NodeHandle> {
    let mut handles = Vec::with_capacity(names.len());
    for name in names {
        handles.push(spawn_device(hub, name));
        sleep(Duration::from_millis(30)).await;
    }
    handles
}

/// Waits until every handle reports `size`, panicking past the deadline.
pub async fn wait_for_sizes(handles: &[&NodeHandle], size: usize) {
    let deadline = Instant::now() + CONVERGENCE;
    while !handles.iter().all(|h| h.current_size() == size) {
        if Instant::now() >= deadline {
            let sizes: Vec<(String, usize)> = handles
                .iter()
                .map(|h| (h.identity().to_string(), h.current_size()))
                .collect();
            panic!("sizes never converged to {size}: {sizes:?}");
        }
        sleep(Duration::from_millis(20)).await;
    }
}

/// Waits until the hub's link set stops changing for a quiet period.
/// Transient extra links form while devices join; this outlasts them.
pub async fn wait_for_stable_links(hub: &RadioHub) -> Vec<(EndpointId, EndpointId)> {
    let deadline = Instant::now() + CONVERGENCE;
    let mut snapshot = hub.link_snapshot();
    let mut quiet_since = Instant::now();
    loop {
        sleep(Duration::from_millis(50)).await;
        let next = hub.link_snapshot();
        if next != snapshot {
            snapshot = next;
            quiet_since = Instant::now();
        } else if quiet_since.elapsed() >= Duration::from_millis(400) {
            return snapshot;
        }
        if Instant::now() >= deadline {
            panic!("links never stabilized: {snapshot:?}");
        }
    }
}

/// Receives one delivery, panicking if none arrives in time.
pub async fn expect_delivery(inbox: &mut broadcast::Receiver<Delivery>) -> Delivery {
    timeout(Duration::from_secs(5), inbox.recv())
        .await
        .expect("no delivery arrived")
        .expect("delivery channel closed or lagged")
}

/// Asserts the link graph is a forest of simple paths: every device holds
/// at most two links and no component contains a cycle.
pub fn assert_forest_of_paths(links: &[(EndpointId, EndpointId)]) {
    let mut index: HashMap<&EndpointId, usize> = HashMap::new();
    let mut ids: Vec<&EndpointId> = Vec::new();
    for (a, b) in links {
        for id in [a, b] {
            if !index.contains_key(id) {
                index.insert(id, ids.len());
                ids.push(id);
            }
        }
    }

    let mut degree = vec![0usize; ids.len()];
    for (a, b) in links {
        degree[index[a]] += 1;
        degree[index[b]] += 1;
    }
    for (i, d) in degree.iter().enumerate() {
        assert!(*d <= 2, "{} holds {d} links", ids[i]);
    }

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }
    let mut parent: Vec<usize> = (0..ids.len()).collect();
    for (a, b) in links {
        let (ra, rb) = (find(&mut parent, index[a]), find(&mut parent, index[b]));
        assert_ne!(ra, rb, "cycle through {a} - {b}");
        parent[ra] = rb;
    }
}
