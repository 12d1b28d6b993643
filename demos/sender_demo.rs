//! In-process handoff demo: a sender streaming a partition to a scriptable
//! receiver over loopback TCP.

use handoff::testing::{MemoryStore, MockReceiver, PairModule, ReceiverBehavior};
use handoff::{
    HandoffConfig, HandoffSender, LoggingEventListener, LoggingStatusSink, NodeName, PartitionId,
    StaticResolver, TransferRequest,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter("handoff=debug,info")
        .init();

    // Partition with 5000 items on the "source node".
    let partition = PartitionId::from_u64(42);
    let store = Arc::new(MemoryStore::new());
    for i in 0..5000 {
        store.insert(partition, format!("user:{:06}", i), format!("profile-{}", i));
    }

    // Scriptable receiver standing in for the target node's listener.
    let receiver = MockReceiver::spawn(ReceiverBehavior::well_behaved()).await;
    println!("receiver listening on {}", receiver.addr());

    let node = NodeName::new("store@127.0.0.1");
    let resolver = Arc::new(StaticResolver::new());
    resolver.add_listener(node.clone(), receiver.addr().port());

    let request = TransferRequest::new(node, partition, partition);
    let config = HandoffConfig::new()
        .with_ack_threshold(1000)
        .with_status_interval(Duration::from_millis(500));

    let summary = HandoffSender::new(
        request,
        config,
        resolver,
        store,
        Arc::new(PairModule::new()),
    )
    .with_status_sink(Arc::new(LoggingStatusSink))
    .with_event_listener(Arc::new(LoggingEventListener))
    .run()
    .await?;

    println!(
        "handed off {} items ({} bytes) in {:?}",
        summary.total_sent, summary.bytes_sent, summary.duration
    );
    println!(
        "receiver saw module={:?} objects={} syncs={}",
        receiver.log().module(),
        receiver.log().objects(),
        receiver.log().syncs()
    );

    Ok(())
}
