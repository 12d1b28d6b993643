//! Test support for the handoff engine.
//!
//! Provides an in-memory fold engine, a bincode-backed data module, a
//! scriptable transport double, a scriptable TCP receiver, and recording
//! sinks/listeners. The fixtures are public so embedders can reuse them in
//! their own integration suites.

mod sender_integration_tests;

use crate::cluster::{HandoffEvent, HandoffEventListener};
use crate::error::{Error, NetworkError, Result};
use crate::network::wire::{self, Frame};
use crate::network::Transport;
use crate::transfer::{
    DataModule, ItemVisitor, PartitionStore, ProgressSnapshot, StatusSink, TransferIdentity,
};
use crate::types::PartitionId;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// In-memory partition store for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryStore {
    partitions: Mutex<HashMap<PartitionId, BTreeMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one item into a partition.
    pub fn insert(
        &self,
        partition: PartitionId,
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) {
        self.partitions
            .lock()
            .entry(partition)
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Number of items in a partition.
    pub fn len(&self, partition: PartitionId) -> usize {
        self.partitions
            .lock()
            .get(&partition)
            .map_or(0, |items| items.len())
    }

    /// Check if a partition is empty or absent.
    pub fn is_empty(&self, partition: PartitionId) -> bool {
        self.len(partition) == 0
    }
}

#[async_trait]
impl PartitionStore for MemoryStore {
    async fn fold(
        &self,
        partition: PartitionId,
        visitor: &mut (dyn ItemVisitor + Send),
    ) -> Result<()> {
        let items: Vec<(Vec<u8>, Vec<u8>)> = self
            .partitions
            .lock()
            .get(&partition)
            .map(|items| items.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        for (key, value) in &items {
            visitor.visit(key, value).await;
        }
        Ok(())
    }
}

/// A fold engine that fails without visiting anything.
#[derive(Debug, Default)]
pub struct BrokenStore;

#[async_trait]
impl PartitionStore for BrokenStore {
    async fn fold(
        &self,
        _partition: PartitionId,
        _visitor: &mut (dyn ItemVisitor + Send),
    ) -> Result<()> {
        Err(Error::Config("fold engine crashed".to_string()))
    }
}

#[derive(Serialize)]
struct EncodedPair<'a> {
    key: &'a [u8],
    value: &'a [u8],
}

/// Data module that encodes items as bincode (key, value) pairs.
pub struct PairModule {
    name: String,
    poison_key: Option<Vec<u8>>,
}

impl PairModule {
    /// Create a module named `memstore`.
    pub fn new() -> Self {
        Self {
            name: "memstore".to_string(),
            poison_key: None,
        }
    }

    /// Make encoding fail for one specific key.
    pub fn with_poison_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.poison_key = Some(key.into());
        self
    }
}

impl Default for PairModule {
    fn default() -> Self {
        Self::new()
    }
}

impl DataModule for PairModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, key: &[u8], value: &[u8]) -> Result<Bytes> {
        if self.poison_key.as_deref() == Some(key) {
            return Err(Error::Encoding("poisoned key".to_string()));
        }
        let encoded = bincode::serialize(&EncodedPair { key, value })
            .map_err(|e| Error::Encoding(e.to_string()))?;
        Ok(Bytes::from(encoded))
    }
}

/// Failure kinds a scripted transport can inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    /// The operation exceeds its bound.
    Timeout,
    /// The peer closed the connection.
    Closed,
    /// A generic I/O failure.
    Io,
}

impl ScriptedFailure {
    fn to_send_error(self) -> Error {
        match self {
            ScriptedFailure::Timeout => Error::Timeout,
            ScriptedFailure::Closed => NetworkError::ConnectionClosed.into(),
            ScriptedFailure::Io => NetworkError::SendFailed("injected failure".to_string()).into(),
        }
    }

    fn to_recv_error(self) -> Error {
        match self {
            ScriptedFailure::Timeout => Error::Timeout,
            ScriptedFailure::Closed => NetworkError::ConnectionClosed.into(),
            ScriptedFailure::Io => {
                NetworkError::ReceiveFailed("injected failure".to_string()).into()
            }
        }
    }
}

/// Transport double driven by a failure script.
///
/// Every send attempt is recorded, including failed ones. Receives are
/// answered with the acknowledgment matching the last sync-type frame
/// sent, until the configured ack budget runs out.
pub struct ScriptedTransport {
    sent: Vec<(u8, Vec<u8>)>,
    send_rules: Vec<(u8, usize, ScriptedFailure)>,
    ack_budget: Option<usize>,
    exhausted_failure: ScriptedFailure,
    pending_ack: Option<u8>,
}

impl ScriptedTransport {
    /// A transport that acknowledges everything.
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            send_rules: Vec::new(),
            ack_budget: None,
            exhausted_failure: ScriptedFailure::Timeout,
            pending_ack: None,
        }
    }

    /// Fail the `occurrence`-th (1-based) send of frames tagged `tag`.
    pub fn fail_send(mut self, tag: u8, occurrence: usize, failure: ScriptedFailure) -> Self {
        self.send_rules.push((tag, occurrence, failure));
        self
    }

    /// Acknowledge only the first `n` receives, then fail with `failure`.
    pub fn limit_acks(mut self, n: usize, failure: ScriptedFailure) -> Self {
        self.ack_budget = Some(n);
        self.exhausted_failure = failure;
        self
    }

    /// Number of recorded send attempts for a tag.
    pub fn sent_count(&self, tag: u8) -> usize {
        self.sent.iter().filter(|(t, _)| *t == tag).count()
    }

    /// All recorded send attempts.
    pub fn sent(&self) -> &[(u8, Vec<u8>)] {
        &self.sent
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_frame(&mut self, tag: u8, payload: &[u8]) -> Result<()> {
        self.sent.push((tag, payload.to_vec()));
        let occurrence = self.sent_count(tag);

        if let Some(&(_, _, failure)) = self
            .send_rules
            .iter()
            .find(|&&(t, o, _)| t == tag && o == occurrence)
        {
            return Err(failure.to_send_error());
        }

        if tag == wire::OLDSYNC || tag == wire::SYNC {
            self.pending_ack = Some(tag);
        }
        Ok(())
    }

    async fn recv_frame(&mut self) -> Result<Frame> {
        if let Some(budget) = &mut self.ack_budget {
            if *budget == 0 {
                return Err(self.exhausted_failure.to_recv_error());
            }
            *budget -= 1;
        }

        let tag = self.pending_ack.take().unwrap_or(wire::SYNC);
        Ok(Frame {
            tag,
            payload: Bytes::from_static(wire::SYNC_ACK),
        })
    }
}

/// Status sink that records every snapshot.
#[derive(Default)]
pub struct RecordingSink {
    reports: Mutex<Vec<(TransferIdentity, ProgressSnapshot)>>,
}

impl RecordingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded snapshots, in delivery order.
    pub fn snapshots(&self) -> Vec<ProgressSnapshot> {
        self.reports.lock().iter().map(|(_, s)| *s).collect()
    }

    /// Recorded reports with their identities.
    pub fn reports(&self) -> Vec<(TransferIdentity, ProgressSnapshot)> {
        self.reports.lock().clone()
    }
}

impl StatusSink for RecordingSink {
    fn report(&self, identity: &TransferIdentity, snapshot: ProgressSnapshot) {
        self.reports.lock().push((identity.clone(), snapshot));
    }
}

/// Event listener that records every event.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<HandoffEvent>>,
}

impl RecordingListener {
    /// Create an empty listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events, in delivery order.
    pub fn events(&self) -> Vec<HandoffEvent> {
        self.events.lock().clone()
    }
}

impl HandoffEventListener for RecordingListener {
    fn on_event(&self, event: HandoffEvent) {
        self.events.lock().push(event);
    }
}

/// How a [`MockReceiver`] reacts to the sender.
#[derive(Debug, Clone)]
pub struct ReceiverBehavior {
    /// Acknowledge the module handshake.
    pub respond_handshake: bool,
    /// Close the connection right after reading the handshake.
    pub close_after_handshake: bool,
    /// Acknowledge at most this many sync exchanges; `None` is unlimited.
    pub max_sync_acks: Option<usize>,
}

impl ReceiverBehavior {
    /// Acknowledge everything.
    pub fn well_behaved() -> Self {
        Self {
            respond_handshake: true,
            close_after_handshake: false,
            max_sync_acks: None,
        }
    }

    /// Refuse the transfer by closing after the handshake message, the way
    /// a receiver at its concurrency cap does.
    pub fn rejecting() -> Self {
        Self {
            close_after_handshake: true,
            ..Self::well_behaved()
        }
    }

    /// Read everything, acknowledge nothing.
    pub fn silent() -> Self {
        Self {
            respond_handshake: false,
            ..Self::well_behaved()
        }
    }

    /// Acknowledge the handshake and the first `n` sync exchanges, then go
    /// silent.
    pub fn acks_then_silent(n: usize) -> Self {
        Self {
            max_sync_acks: Some(n),
            ..Self::well_behaved()
        }
    }
}

/// Counters observed by a [`MockReceiver`].
#[derive(Debug, Default)]
pub struct ReceiverLog {
    module: Mutex<Option<String>>,
    partition: Mutex<Option<Vec<u8>>>,
    objects: AtomicU64,
    syncs: AtomicU64,
}

impl ReceiverLog {
    /// Module name announced in the handshake.
    pub fn module(&self) -> Option<String> {
        self.module.lock().clone()
    }

    /// Raw partition id bytes from the init message.
    pub fn partition(&self) -> Option<Vec<u8>> {
        self.partition.lock().clone()
    }

    /// Data items received.
    pub fn objects(&self) -> u64 {
        self.objects.load(Ordering::Relaxed)
    }

    /// Sync requests received (keep-alives and final sync).
    pub fn syncs(&self) -> u64 {
        self.syncs.load(Ordering::Relaxed)
    }
}

/// Scriptable in-process handoff receiver listening on a real socket.
pub struct MockReceiver {
    addr: SocketAddr,
    log: Arc<ReceiverLog>,
    handle: JoinHandle<()>,
}

impl MockReceiver {
    /// Bind an ephemeral port and serve one connection with the given
    /// behavior.
    pub async fn spawn(behavior: ReceiverBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log = Arc::new(ReceiverLog::default());
        let task_log = log.clone();

        let handle = tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let _ = Self::serve(stream, behavior, task_log).await;
        });

        Self { addr, log, handle }
    }

    /// Address the receiver listens on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Observed traffic.
    pub fn log(&self) -> &ReceiverLog {
        &self.log
    }

    /// Stop serving.
    pub fn abort(&self) {
        self.handle.abort();
    }

    async fn serve(
        mut stream: TcpStream,
        behavior: ReceiverBehavior,
        log: Arc<ReceiverLog>,
    ) -> Result<()> {
        let mut acks_sent = 0usize;
        loop {
            let Some(frame) = wire::read_frame(&mut stream, wire::MAX_FRAME_LEN).await? else {
                return Ok(());
            };
            match frame.tag {
                wire::OLDSYNC => {
                    *log.module.lock() =
                        Some(String::from_utf8_lossy(&frame.payload).into_owned());
                    if behavior.close_after_handshake {
                        return Ok(());
                    }
                    if behavior.respond_handshake {
                        wire::write_frame(&mut stream, wire::OLDSYNC, wire::SYNC_ACK).await?;
                    }
                }
                wire::INIT => {
                    *log.partition.lock() = Some(frame.payload.to_vec());
                }
                wire::OBJ => {
                    log.objects.fetch_add(1, Ordering::Relaxed);
                }
                wire::SYNC => {
                    log.syncs.fetch_add(1, Ordering::Relaxed);
                    let allowed = behavior.max_sync_acks.map_or(true, |max| acks_sent < max);
                    if behavior.respond_handshake && allowed {
                        acks_sent += 1;
                        wire::write_frame(&mut stream, wire::SYNC, wire::SYNC_ACK).await?;
                    }
                }
                other => {
                    return Err(
                        NetworkError::Protocol(format!("unknown tag {}", other)).into()
                    );
                }
            }
        }
    }
}

impl Drop for MockReceiver {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
