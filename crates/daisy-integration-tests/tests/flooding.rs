//! Message flooding scenarios: exactly-once delivery along the chain.

use std::time::Duration;

use daisy_integration_tests::{
    expect_delivery, spawn_neighborhood, wait_for_sizes, wait_for_stable_links,
};
use daisy_transport::RadioHub;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::{sleep, timeout};

#[tokio::test]
async fn flood_reaches_everyone_exactly_once() {
    let hub = RadioHub::new();
    let names = ["ash", "bee", "cedar", "dune", "elm"];
    let handles = spawn_neighborhood(&hub, &names).await;
    wait_for_sizes(&handles.iter().collect::<Vec<_>>(), names.len()).await;
    wait_for_stable_links(&hub).await;

    let mut origin_inbox = handles[0].subscribe_messages();
    let mut inboxes: Vec<_> = handles[1..]
        .iter()
        .map(|h| h.subscribe_messages())
        .collect();

    handles[0].send_text("meet at the crossroad").unwrap();

    for inbox in &mut inboxes {
        let delivery = expect_delivery(inbox).await;
        assert_eq!(delivery.to_string(), "ash: meet at the crossroad");
    }

    // Nobody hears it twice, and it never comes back to its origin.
    sleep(Duration::from_millis(300)).await;
    for inbox in &mut inboxes {
        assert!(matches!(inbox.try_recv(), Err(TryRecvError::Empty)));
    }
    assert!(matches!(origin_inbox.try_recv(), Err(TryRecvError::Empty)));

    let stats = handles[0].flood_stats().await.unwrap();
    assert_eq!(stats.originated, 1);
    assert_eq!(stats.loops_broken, 0);

    for handle in handles {
        handle.shutdown().await;
    }
}

#[tokio::test]
async fn messages_flow_both_directions() {
    let hub = RadioHub::new();
    let handles = spawn_neighborhood(&hub, &["ash", "bee", "cedar"]).await;
    wait_for_sizes(&handles.iter().collect::<Vec<_>>(), 3).await;

    let mut inbox_ash = handles[0].subscribe_messages();
    let mut inbox_cedar = handles[2].subscribe_messages();

    handles[0].send_text("from ash").unwrap();
    handles[2].send_text("from cedar").unwrap();

    assert_eq!(expect_delivery(&mut inbox_cedar).await.to_string(), "ash: from ash");
    assert_eq!(expect_delivery(&mut inbox_ash).await.to_string(), "cedar: from cedar");

    for handle in handles {
        handle.shutdown().await;
    }
}

#[tokio::test]
async fn flood_survives_a_heal() {
    let hub = RadioHub::new();
    let names = ["ash", "bee", "cedar", "dune"];
    let mut handles = spawn_neighborhood(&hub, &names).await;
    wait_for_sizes(&handles.iter().collect::<Vec<_>>(), names.len()).await;

    // Lose an interior device abruptly, let the chain re-merge, then flood.
    let links = hub.link_snapshot();
    let middle = handles
        .iter()
        .position(|h| {
            links
                .iter()
                .filter(|(a, b)| a == h.identity() || b == h.identity())
                .count()
                == 2
        })
        .expect("a four-device chain has interior devices");
    let lost = handles.remove(middle);
    hub.power_off(lost.identity());
    wait_for_sizes(&handles.iter().collect::<Vec<_>>(), names.len() - 1).await;
    wait_for_stable_links(&hub).await;

    let sender = &handles[0];
    let mut inboxes: Vec<_> = handles[1..]
        .iter()
        .map(|h| h.subscribe_messages())
        .collect();
    sender.send_text("still here").unwrap();
    for inbox in &mut inboxes {
        let delivery = timeout(Duration::from_secs(5), expect_delivery(inbox))
            .await
            .expect("delivery after heal");
        assert!(delivery.to_string().ends_with("still here"));
    }

    lost.shutdown().await;
    for handle in handles {
        handle.shutdown().await;
    }
}
