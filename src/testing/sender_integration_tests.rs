//! End-to-end sender tests against a scriptable socket receiver.
//!
//! Every test drives the full pipeline: resolve, connect over a real
//! loopback socket, handshake, stream, final sync, outcome classification.

#[cfg(test)]
mod tests {
    use crate::cluster::{FailureKind, HandoffEvent, StaticResolver};
    use crate::config::{HandoffConfig, TlsOptions};
    use crate::error::{Error, NetworkError};
    use crate::metrics::HandoffMetrics;
    use crate::testing::{
        BrokenStore, MemoryStore, MockReceiver, PairModule, ReceiverBehavior, RecordingListener,
        RecordingSink,
    };
    use crate::transfer::{HandoffSender, TransferRequest};
    use crate::types::{NodeName, PartitionId, TransferKind};
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        resolver: Arc<StaticResolver>,
        store: Arc<MemoryStore>,
        listener: Arc<RecordingListener>,
        sink: Arc<RecordingSink>,
        metrics: Arc<HandoffMetrics>,
        node: NodeName,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                resolver: Arc::new(StaticResolver::new()),
                store: Arc::new(MemoryStore::new()),
                listener: Arc::new(RecordingListener::new()),
                sink: Arc::new(RecordingSink::new()),
                metrics: Arc::new(HandoffMetrics::new()),
                node: NodeName::new("store@127.0.0.1"),
            }
        }

        fn populate(&self, partition: PartitionId, count: usize) {
            for i in 0..count {
                self.store
                    .insert(partition, format!("key{:05}", i), format!("value{:05}", i));
            }
        }

        fn sender(&self, request: TransferRequest, config: HandoffConfig) -> HandoffSender {
            HandoffSender::new(
                request,
                config,
                self.resolver.clone(),
                self.store.clone(),
                Arc::new(PairModule::new()),
            )
            .with_event_listener(self.listener.clone())
            .with_status_sink(self.sink.clone())
            .with_metrics(self.metrics.clone())
        }

        fn register(&self, receiver: &MockReceiver) {
            self.resolver
                .add_listener(self.node.clone(), receiver.addr().port());
        }
    }

    #[tokio::test]
    async fn test_full_transfer_with_keepalives() {
        let fixture = Fixture::new();
        let partition = PartitionId::from_u64(42);
        fixture.populate(partition, 2500);

        let receiver = MockReceiver::spawn(ReceiverBehavior::well_behaved()).await;
        fixture.register(&receiver);

        let request = TransferRequest::new(fixture.node.clone(), partition, partition);
        let config = HandoffConfig::new()
            .with_ack_threshold(1000)
            .with_recv_timeout(Duration::from_secs(5));

        let summary = fixture.sender(request, config).run().await.unwrap();

        assert_eq!(summary.total_sent, 2500);
        assert_eq!(summary.objects_sent, 2500);

        let log = receiver.log();
        assert_eq!(log.module().as_deref(), Some("memstore"));
        assert_eq!(log.partition().as_deref(), Some(&partition.to_be_bytes()[..]));
        assert_eq!(log.objects(), 2500);
        // Two mid-stream keep-alives plus the final sync.
        assert_eq!(log.syncs(), 3);

        let events = fixture.listener.events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            HandoffEvent::Complete {
                module: "memstore".to_string(),
                src_partition: partition,
                dst_partition: partition,
                total_sent: 2500,
            }
        );
        assert_eq!(fixture.metrics.sends_completed.get(), 1);
        assert_eq!(fixture.metrics.senders_active.get(), 0);
    }

    #[tokio::test]
    async fn test_rejection_distinct_from_timeout() {
        let fixture = Fixture::new();
        let partition = PartitionId::from_u64(1);
        fixture.populate(partition, 10);

        let receiver = MockReceiver::spawn(ReceiverBehavior::rejecting()).await;
        fixture.register(&receiver);

        let request = TransferRequest::new(fixture.node.clone(), partition, partition);
        let err = fixture
            .sender(request, HandoffConfig::new())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Rejected));
        assert_eq!(fixture.metrics.sends_rejected.get(), 1);
        assert_eq!(fixture.metrics.timeouts.get(), 0);
        // Rejection is quiet: no coordinator event.
        assert!(fixture.listener.events().is_empty());
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let fixture = Fixture::new();
        let partition = PartitionId::from_u64(1);
        fixture.populate(partition, 10);

        let receiver = MockReceiver::spawn(ReceiverBehavior::silent()).await;
        fixture.register(&receiver);

        let request = TransferRequest::new(fixture.node.clone(), partition, partition);
        let config = HandoffConfig::new().with_recv_timeout(Duration::from_millis(200));
        let err = fixture.sender(request, config).run().await.unwrap_err();

        assert!(matches!(err, Error::Timeout));
        assert_eq!(fixture.metrics.timeouts.get(), 1);
        assert_eq!(fixture.metrics.sends_rejected.get(), 0);
        assert!(fixture.listener.events().is_empty());
    }

    #[tokio::test]
    async fn test_receiver_stalls_mid_stream() {
        let fixture = Fixture::new();
        let partition = PartitionId::from_u64(9);
        fixture.populate(partition, 2500);

        // Handshake and the first keep-alive are acknowledged, then silence.
        let receiver = MockReceiver::spawn(ReceiverBehavior::acks_then_silent(1)).await;
        fixture.register(&receiver);

        let request = TransferRequest::new(fixture.node.clone(), partition, partition);
        let config = HandoffConfig::new()
            .with_ack_threshold(1000)
            .with_recv_timeout(Duration::from_millis(300));
        let err = fixture.sender(request, config).run().await.unwrap_err();

        assert!(matches!(err, Error::Timeout));
        assert_eq!(fixture.metrics.timeouts.get(), 1);

        // Let the receiver drain what was written before the stall.
        tokio::time::sleep(Duration::from_millis(250)).await;
        let log = receiver.log();
        assert_eq!(log.objects(), 2000);
        assert_eq!(log.syncs(), 2);
    }

    #[tokio::test]
    async fn test_repair_transfer_raises_no_event() {
        let fixture = Fixture::new();
        let partition = PartitionId::from_u64(5);
        fixture.populate(partition, 10);

        let receiver = MockReceiver::spawn(ReceiverBehavior::well_behaved()).await;
        fixture.register(&receiver);

        let request = TransferRequest::new(fixture.node.clone(), partition, partition)
            .with_kind(TransferKind::Repair);
        let summary = fixture
            .sender(request, HandoffConfig::new())
            .run()
            .await
            .unwrap();

        assert_eq!(summary.total_sent, 10);
        assert_eq!(fixture.metrics.sends_completed.get(), 1);
        assert!(fixture.listener.events().is_empty());
    }

    #[tokio::test]
    async fn test_filtered_items_reconcile() {
        let fixture = Fixture::new();
        let partition = PartitionId::from_u64(3);
        fixture.populate(partition, 100);

        let receiver = MockReceiver::spawn(ReceiverBehavior::well_behaved()).await;
        fixture.register(&receiver);

        let request = TransferRequest::new(fixture.node.clone(), partition, partition)
            .with_filter(Arc::new(|key: &[u8]| {
                key.last().map_or(false, |b| b % 2 == 0)
            }));
        let summary = fixture
            .sender(request, HandoffConfig::new())
            .run()
            .await
            .unwrap();

        // Skipped items count toward the total but never cross the wire,
        // so receiver-side reconciliation must exclude them.
        assert_eq!(summary.total_sent, 100);
        assert_eq!(summary.objects_sent, 50);
        assert_eq!(receiver.log().objects(), 50);

        match &fixture.listener.events()[..] {
            [HandoffEvent::Complete { total_sent, .. }] => assert_eq!(*total_sent, 100),
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fold_engine_failure_is_unexpected() {
        let fixture = Fixture::new();
        let partition = PartitionId::from_u64(2);

        let receiver = MockReceiver::spawn(ReceiverBehavior::well_behaved()).await;
        fixture.register(&receiver);

        let request = TransferRequest::new(fixture.node.clone(), partition, partition);
        let sender = HandoffSender::new(
            request,
            HandoffConfig::new(),
            fixture.resolver.clone(),
            Arc::new(BrokenStore),
            Arc::new(PairModule::new()),
        )
        .with_event_listener(fixture.listener.clone())
        .with_metrics(fixture.metrics.clone());

        let err = sender.run().await.unwrap_err();

        assert!(matches!(err, Error::FoldEngine(_)));
        assert_eq!(fixture.metrics.sends_failed.get(), 1);
        match &fixture.listener.events()[..] {
            [HandoffEvent::Error { kind, .. }] => assert_eq!(*kind, FailureKind::Unexpected),
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_refused_is_failure() {
        let fixture = Fixture::new();
        let partition = PartitionId::from_u64(2);
        fixture.populate(partition, 1);

        // Allocate a port nothing listens on.
        let free = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = free.local_addr().unwrap().port();
        drop(free);
        fixture.resolver.add_listener(fixture.node.clone(), port);

        let request = TransferRequest::new(fixture.node.clone(), partition, partition);
        let err = fixture
            .sender(request, HandoffConfig::new())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Network(NetworkError::ConnectFailed { .. })
        ));
        match &fixture.listener.events()[..] {
            [HandoffEvent::Error { kind, .. }] => assert_eq!(*kind, FailureKind::Unexpected),
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unresolvable_node_aborts_early() {
        let fixture = Fixture::new();
        let partition = PartitionId::from_u64(2);

        let request = TransferRequest::new(NodeName::new("ghost@127.0.0.1"), partition, partition);
        let err = fixture
            .sender(request, HandoffConfig::new())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Resolve { .. }));
        assert_eq!(fixture.metrics.sends_failed.get(), 1);
    }

    #[tokio::test]
    async fn test_unusable_tls_material_falls_back_to_tcp() {
        let fixture = Fixture::new();
        let partition = PartitionId::from_u64(6);
        fixture.populate(partition, 25);

        let receiver = MockReceiver::spawn(ReceiverBehavior::well_behaved()).await;
        fixture.register(&receiver);

        let request = TransferRequest::new(fixture.node.clone(), partition, partition);
        let config = HandoffConfig::new().with_tls(TlsOptions::new(
            "/nonexistent/cert.pem",
            "/nonexistent/key.pem",
        ));

        let summary = fixture.sender(request, config).run().await.unwrap();
        assert_eq!(summary.total_sent, 25);
    }

    #[tokio::test]
    async fn test_progress_snapshots_cumulative() {
        let fixture = Fixture::new();
        let partition = PartitionId::from_u64(8);
        fixture.populate(partition, 50);

        let receiver = MockReceiver::spawn(ReceiverBehavior::well_behaved()).await;
        fixture.register(&receiver);

        let request = TransferRequest::new(fixture.node.clone(), partition, partition);
        let config = HandoffConfig::new().with_status_interval(Duration::ZERO);

        fixture.sender(request, config).run().await.unwrap();

        let snapshots = fixture.sink.snapshots();
        assert!(!snapshots.is_empty());
        for pair in snapshots.windows(2) {
            assert!(pair[1].bytes >= pair[0].bytes);
            assert!(pair[1].objects >= pair[0].objects);
        }
        assert_eq!(snapshots.last().unwrap().objects, 50);

        let (identity, _) = &fixture.sink.reports()[0];
        assert_eq!(identity.module, "memstore");
        assert_eq!(identity.src_partition, partition);
    }
}
