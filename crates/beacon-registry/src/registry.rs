//! Multi-source instance registry
//!
//! All writes go through a single worker task that owns mutation of the
//! instance table: one mutation (holder update, notification fan-out and
//! metric calls) is fully applied before the next one starts, so every
//! subscriber observes notifications in the same global order.
//!
//! Readers never join that queue. `for_snapshot` reads the concurrent table
//! directly. `for_interest` hands its subscription to the worker, which
//! emits the initial `Add`s and starts live delivery at the same point in
//! the mutation sequence; the caller gets its stream back immediately.

use std::{
    any::Any,
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    task::{Context, Poll},
};

use dashmap::DashMap;
use futures::Stream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use beacon_common::{BeaconError, Result};

use crate::config::RegistryConfig;
use crate::holder::{MultiSourcedHolder, RemoveOutcome};
use crate::interest::Interest;
use crate::metrics::{NoopRegistryMetrics, RegistryMetrics};
use crate::model::InstanceInfo;
use crate::notification::{ChangeNotification, SourcedChangeNotification};
use crate::source::{Source, SourceMatcher};

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Message handled by the registry worker
enum RegistryMessage {
    Register {
        record: InstanceInfo,
        source: Source,
        ack: oneshot::Sender<bool>,
    },
    Unregister {
        record: InstanceInfo,
        source: Source,
        ack: oneshot::Sender<bool>,
    },
    Subscribe {
        id: u64,
        interest: Interest,
        matcher: SourceMatcher,
        sender: mpsc::UnboundedSender<ChangeNotification>,
    },
    Shutdown,
}

struct Subscriber {
    interest: Interest,
    matcher: SourceMatcher,
    sender: mpsc::UnboundedSender<ChangeNotification>,
}

/// State shared between registry handles, the worker and interest streams
struct RegistryShared {
    config: RegistryConfig,
    /// Key: instance id; written only by the worker
    table: DashMap<String, MultiSourcedHolder>,
    /// Key: subscriber id
    subscribers: DashMap<u64, Subscriber>,
    metrics: Arc<dyn RegistryMetrics>,
    shutdown: AtomicBool,
    pending: AtomicUsize,
    next_subscriber_id: AtomicU64,
}

impl RegistryShared {
    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Decrement the pending mutation count without wrapping below zero
    fn release_pending(&self) -> usize {
        let previous = self
            .pending
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |pending| {
                Some(pending.saturating_sub(1))
            })
            .unwrap_or_else(|pending| pending);
        previous.saturating_sub(1)
    }

    /// Call the metrics collaborator; errors and panics are logged, never propagated
    fn record_metric<F>(&self, metric: &str, call: F)
    where
        F: FnOnce(&dyn RegistryMetrics) -> anyhow::Result<()>,
    {
        match panic::catch_unwind(AssertUnwindSafe(|| call(self.metrics.as_ref()))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                "[{}] Failed to record registry metric {}: {}",
                self.config.name, metric, e
            ),
            Err(payload) => warn!(
                "[{}] Registry metric {} panicked: {}",
                self.config.name,
                metric,
                panic_message(payload.as_ref())
            ),
        }
    }

    fn apply_register(&self, record: InstanceInfo, source: Source) -> bool {
        let origin = source.origin;
        let id = record.id.clone();

        let mut created = false;
        let notification = {
            let mut holder = self.table.entry(id.clone()).or_insert_with(|| {
                created = true;
                MultiSourcedHolder::new(id.clone())
            });
            holder.put(source, record)
        };

        debug!(
            "[{}] Registered {} from {} (new: {}, change: {:?})",
            self.config.name,
            id,
            origin,
            created,
            notification.as_ref().map(|n| n.kind())
        );

        self.record_metric("registration_counter", |metrics| {
            metrics.increment_registration_counter(origin)
        });
        if created {
            self.record_metric("registry_size", |metrics| {
                metrics.set_registry_size(self.table.len())
            });
        }

        if let Some(notification) = notification {
            self.dispatch(&notification);
        }
        true
    }

    fn apply_unregister(&self, record: InstanceInfo, source: Source) -> bool {
        let outcome = match self.table.get_mut(&record.id) {
            Some(mut holder) => holder.remove(&source),
            None => RemoveOutcome::Absent,
        };

        if !outcome.is_removed() {
            debug!(
                "[{}] Ignoring unregister of {} from {}: no such copy",
                self.config.name, record.id, source
            );
            return false;
        }

        let holder_removed = self
            .table
            .remove_if(&record.id, |_, holder| holder.is_empty())
            .is_some();

        debug!(
            "[{}] Unregistered {} from {} (holder removed: {})",
            self.config.name, record.id, source, holder_removed
        );

        self.record_metric("unregistration_counter", |metrics| {
            metrics.increment_unregistration_counter(source.origin)
        });
        if holder_removed {
            self.record_metric("registry_size", |metrics| {
                metrics.set_registry_size(self.table.len())
            });
        }

        if let Some(notification) = outcome.into_notification() {
            self.dispatch(&notification);
        }
        true
    }

    fn apply_subscribe(
        &self,
        id: u64,
        interest: Interest,
        matcher: SourceMatcher,
        sender: mpsc::UnboundedSender<ChangeNotification>,
    ) {
        if self.is_shutdown() || sender.is_closed() {
            return;
        }

        let mut initial = 0usize;
        for entry in self.table.iter() {
            let holder = entry.value();
            let (Some(source), Some(record)) = (holder.active_source(), holder.active_copy())
            else {
                continue;
            };
            if !interest.matches(record) || !matcher.matches(source) {
                continue;
            }
            if sender.send(ChangeNotification::add(record.clone())).is_err() {
                debug!("[{}] Subscriber {} cancelled during replay", self.config.name, id);
                return;
            }
            initial += 1;
        }

        debug!(
            "[{}] Subscriber {} joined for {} with {} initial records",
            self.config.name, id, interest, initial
        );

        self.subscribers.insert(
            id,
            Subscriber {
                interest,
                matcher,
                sender,
            },
        );

        // Shutdown or cancellation may have raced with the insert
        let closed = self
            .subscribers
            .get(&id)
            .map(|subscriber| subscriber.sender.is_closed())
            .unwrap_or(false);
        if closed || self.is_shutdown() {
            self.subscribers.remove(&id);
        }
    }

    /// Deliver a notification to every subscriber whose interest and source matcher accept it
    fn dispatch(&self, change: &SourcedChangeNotification) {
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            let subscriber = entry.value();
            if !subscriber.interest.matches(change.data())
                || !subscriber.matcher.matches(&change.source)
            {
                continue;
            }
            if subscriber.sender.send(change.notification.clone()).is_err() {
                closed.push(*entry.key());
            }
        }

        for id in closed {
            debug!("[{}] Dropping closed subscriber {}", self.config.name, id);
            self.subscribers.remove(&id);
        }
    }

    /// Complete every live stream by dropping its sender
    fn complete_subscribers(&self) {
        let count = self.subscribers.len();
        self.subscribers.clear();
        if count > 0 {
            info!("[{}] Completed {} interest streams", self.config.name, count);
        }
    }
}

/// Registry accepting copies from multiple sources and serving merged views
///
/// Cheap to clone; all clones share the same table and worker. The worker
/// stops on `shutdown()` or once every handle has been dropped.
#[derive(Clone)]
pub struct SourcedRegistry {
    shared: Arc<RegistryShared>,
    sender: mpsc::UnboundedSender<RegistryMessage>,
}

impl SourcedRegistry {
    /// Create a registry with default configuration
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(metrics: Arc<dyn RegistryMetrics>) -> Self {
        Self::with_config(RegistryConfig::default(), metrics)
    }

    pub fn with_config(config: RegistryConfig, metrics: Arc<dyn RegistryMetrics>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        let shared = Arc::new(RegistryShared {
            config,
            table: DashMap::new(),
            subscribers: DashMap::new(),
            metrics,
            shutdown: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            next_subscriber_id: AtomicU64::new(1),
        });

        let registry = Self { shared, sender };
        registry.start_worker(receiver);
        registry
    }

    /// Start the worker that applies mutations one at a time
    fn start_worker(&self, mut receiver: mpsc::UnboundedReceiver<RegistryMessage>) {
        let shared = self.shared.clone();

        tokio::spawn(async move {
            info!("[{}] Registry worker started", shared.config.name);

            while let Some(msg) = receiver.recv().await {
                match msg {
                    RegistryMessage::Register {
                        record,
                        source,
                        ack,
                    } => {
                        Self::mutation_dequeued(&shared);
                        if shared.is_shutdown() {
                            continue;
                        }
                        let _ = ack.send(shared.apply_register(record, source));
                    }
                    RegistryMessage::Unregister {
                        record,
                        source,
                        ack,
                    } => {
                        Self::mutation_dequeued(&shared);
                        if shared.is_shutdown() {
                            continue;
                        }
                        let _ = ack.send(shared.apply_unregister(record, source));
                    }
                    RegistryMessage::Subscribe {
                        id,
                        interest,
                        matcher,
                        sender,
                    } => {
                        shared.apply_subscribe(id, interest, matcher, sender);
                    }
                    RegistryMessage::Shutdown => break,
                }
            }

            // Reject whatever is still queued; dropped acks resolve to RegistryShutdown
            shared.shutdown.store(true, Ordering::Release);
            receiver.close();
            let mut rejected = 0usize;
            while let Ok(msg) = receiver.try_recv() {
                if matches!(
                    msg,
                    RegistryMessage::Register { .. } | RegistryMessage::Unregister { .. }
                ) {
                    rejected += 1;
                }
            }
            shared.pending.store(0, Ordering::Relaxed);

            shared.complete_subscribers();
            shared.table.clear();

            info!(
                "[{}] Registry worker stopped ({} queued mutations rejected)",
                shared.config.name, rejected
            );
        });
    }

    fn mutation_dequeued(shared: &RegistryShared) {
        let pending = shared.release_pending();
        shared.record_metric("pending_mutations", |metrics| {
            metrics.set_pending_mutations(pending)
        });
    }

    fn submit(&self, msg: RegistryMessage) {
        let pending = self.shared.pending.fetch_add(1, Ordering::Relaxed) + 1;
        if pending == self.shared.config.queue_warn_threshold {
            warn!(
                "[{}] Registry mutation queue reached {} pending mutations",
                self.shared.config.name, pending
            );
        }

        if self.sender.send(msg).is_err() {
            // Worker is gone; the returned message (and its ack) is dropped here.
            // The worker may already have reset the counter on its way out.
            self.shared.release_pending();
        }
    }

    /// Register a copy of `record` written by `source`
    ///
    /// The returned ack resolves once the worker has applied the mutation;
    /// dropping it does not cancel the registration.
    pub fn register(&self, record: InstanceInfo, source: Source) -> MutationAck {
        let (ack, receiver) = oneshot::channel();
        if !self.is_shutdown() {
            self.submit(RegistryMessage::Register {
                record,
                source,
                ack,
            });
        }
        MutationAck { receiver }
    }

    /// Remove the copy of `record.id` written by `source`
    ///
    /// Resolves to `false` when no such copy exists.
    pub fn unregister(&self, record: InstanceInfo, source: Source) -> MutationAck {
        let (ack, receiver) = oneshot::channel();
        if !self.is_shutdown() {
            self.submit(RegistryMessage::Unregister {
                record,
                source,
                ack,
            });
        }
        MutationAck { receiver }
    }

    /// Live stream of notifications matching `interest` and `matcher`
    ///
    /// The stream starts with one `Add` per matching active copy, then
    /// carries every later matching notification. After shutdown the stream
    /// is returned already completed.
    pub fn for_interest(&self, interest: Interest, matcher: SourceMatcher) -> InterestStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self
            .shared
            .next_subscriber_id
            .fetch_add(1, Ordering::Relaxed);

        let stream = InterestStream {
            id,
            receiver,
            shared: Arc::downgrade(&self.shared),
            cancelled: false,
        };

        if self.is_shutdown() {
            debug!(
                "[{}] Registry shut down, returning completed stream",
                self.shared.config.name
            );
            return stream;
        }

        let _ = self.sender.send(RegistryMessage::Subscribe {
            id,
            interest,
            matcher,
            sender,
        });
        stream
    }

    /// `for_interest` without source filtering
    pub fn for_interest_all(&self, interest: Interest) -> InterestStream {
        self.for_interest(interest, SourceMatcher::Any)
    }

    /// Active copies currently matching `interest`
    ///
    /// Reads the table without waiting for queued mutations; concurrent
    /// changes may or may not be reflected.
    pub fn for_snapshot(&self, interest: &Interest) -> Vec<InstanceInfo> {
        self.shared
            .table
            .iter()
            .filter_map(|entry| {
                entry
                    .value()
                    .active_copy()
                    .filter(|record| interest.matches(record))
                    .cloned()
            })
            .collect()
    }

    /// Active copy for an instance id
    pub fn get(&self, id: &str) -> Option<InstanceInfo> {
        self.shared
            .table
            .get(id)
            .and_then(|holder| holder.active_copy().cloned())
    }

    /// Number of copies held for an instance id
    pub fn copy_count(&self, id: &str) -> usize {
        self.shared
            .table
            .get(id)
            .map(|holder| holder.size())
            .unwrap_or(0)
    }

    /// Number of distinct instance ids
    pub fn size(&self) -> usize {
        self.shared.table.len()
    }

    /// Number of live interest streams
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.len()
    }

    /// Number of mutations submitted but not yet applied
    pub fn pending_mutations(&self) -> usize {
        self.shared.pending.load(Ordering::Relaxed)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutdown()
    }

    /// Complete all interest streams and stop the worker
    ///
    /// Idempotent; later calls do nothing.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("[{}] Shutting down registry", self.shared.config.name);
        self.shared.complete_subscribers();
        let _ = self.sender.send(RegistryMessage::Shutdown);
    }
}

impl Default for SourcedRegistry {
    fn default() -> Self {
        Self::new(Arc::new(NoopRegistryMetrics))
    }
}

/// Completion signal for a submitted mutation
///
/// Resolves to whether the mutation changed the registry, or to
/// `BeaconError::RegistryShutdown` when it was rejected.
#[derive(Debug)]
pub struct MutationAck {
    receiver: oneshot::Receiver<bool>,
}

impl Future for MutationAck {
    type Output = Result<bool>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.map_err(|_| BeaconError::RegistryShutdown))
    }
}

/// Live, cancelable stream of change notifications
///
/// Ends only when the registry shuts down or the stream is cancelled.
/// Dropping the stream cancels it.
pub struct InterestStream {
    id: u64,
    receiver: mpsc::UnboundedReceiver<ChangeNotification>,
    shared: Weak<RegistryShared>,
    cancelled: bool,
}

impl InterestStream {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Stop delivery to this stream; idempotent
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.receiver.close();
        if let Some(shared) = self.shared.upgrade() {
            shared.subscribers.remove(&self.id);
        }
    }

    /// Next notification if one is already buffered
    pub fn try_next(&mut self) -> Option<ChangeNotification> {
        if self.cancelled {
            return None;
        }
        self.receiver.try_recv().ok()
    }
}

impl Stream for InterestStream {
    type Item = ChangeNotification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancelled {
            return Poll::Ready(None);
        }
        self.receiver.poll_recv(cx)
    }
}

impl Drop for InterestStream {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for InterestStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterestStream")
            .field("id", &self.id)
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::model::InstanceStatus;
    use crate::notification::ChangeKind;

    fn instance(id: &str, app: &str) -> InstanceInfo {
        InstanceInfo::builder(id, app)
            .with_status(InstanceStatus::Up)
            .build()
    }

    #[tokio::test]
    async fn test_register_creates_holder() {
        let registry = SourcedRegistry::default();
        let original = instance("i-1", "discovery");

        assert!(registry.register(original.clone(), Source::local()).await.unwrap());
        assert_eq!(registry.size(), 1);
        assert_eq!(registry.copy_count("i-1"), 1);
        assert_eq!(registry.get("i-1"), Some(original));
    }

    #[tokio::test]
    async fn test_register_as_update() {
        let registry = SourcedRegistry::default();
        let original = instance("i-1", "discovery");
        registry.register(original.clone(), Source::local()).await.unwrap();

        let updated = original
            .to_builder()
            .with_status(InstanceStatus::OutOfService)
            .build();
        registry.register(updated.clone(), Source::local()).await.unwrap();

        assert_eq!(registry.size(), 1);
        assert_eq!(registry.copy_count("i-1"), 1);
        assert_eq!(registry.get("i-1"), Some(updated));
    }

    #[tokio::test]
    async fn test_unregister_unknown_id_is_noop() {
        let registry = SourcedRegistry::default();
        let removed = registry
            .unregister(instance("ghost", "discovery"), Source::local())
            .await
            .unwrap();
        assert!(!removed);
        assert_eq!(registry.size(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_filters_by_interest() {
        let registry = SourcedRegistry::default();
        registry.register(instance("d-1", "discovery"), Source::local()).await.unwrap();
        registry.register(instance("d-2", "discovery"), Source::local()).await.unwrap();
        registry.register(instance("z-1", "zuul"), Source::local()).await.unwrap();

        let discovery = registry.for_snapshot(&Interest::for_applications(&["discovery"]));
        assert_eq!(discovery.len(), 2);
        assert!(discovery.iter().all(|r| r.app == "discovery"));

        let all = registry.for_snapshot(&Interest::FullRegistry);
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_interest_stream_replays_then_goes_live() {
        let registry = SourcedRegistry::default();
        let existing = instance("d-1", "discovery");
        registry.register(existing.clone(), Source::local()).await.unwrap();

        let mut stream = registry.for_interest_all(Interest::for_applications(&["discovery"]));
        assert_eq!(stream.next().await, Some(ChangeNotification::add(existing)));

        let later = instance("d-2", "discovery");
        registry.register(instance("z-1", "zuul"), Source::local()).await.unwrap();
        registry.register(later.clone(), Source::local()).await.unwrap();
        assert_eq!(stream.next().await, Some(ChangeNotification::add(later)));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent_and_immediate() {
        let registry = SourcedRegistry::default();
        let mut stream = registry.for_interest_all(Interest::FullRegistry);
        registry.register(instance("i-1", "discovery"), Source::local()).await.unwrap();
        assert_eq!(registry.subscriber_count(), 1);

        stream.cancel();
        stream.cancel();
        assert!(stream.is_cancelled());
        assert_eq!(stream.next().await, None);
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_stream_is_removed() {
        let registry = SourcedRegistry::default();
        let stream = registry.for_interest_all(Interest::FullRegistry);
        registry.register(instance("i-1", "discovery"), Source::local()).await.unwrap();
        assert_eq!(registry.subscriber_count(), 1);

        drop(stream);
        assert_eq!(registry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_mutation_after_shutdown_is_rejected() {
        let registry = SourcedRegistry::default();
        registry.shutdown();

        let result = registry.register(instance("i-1", "discovery"), Source::local()).await;
        assert!(matches!(result, Err(BeaconError::RegistryShutdown)));
        assert!(registry.is_shutdown());
    }

    #[tokio::test]
    async fn test_pending_count_does_not_wrap_when_worker_is_gone() {
        let registry = SourcedRegistry::default();
        registry.shutdown();
        registry.sender.closed().await;

        let (ack, receiver) = oneshot::channel();
        registry.submit(RegistryMessage::Register {
            record: instance("i-1", "discovery"),
            source: Source::local(),
            ack,
        });

        assert_eq!(registry.pending_mutations(), 0);
        assert_eq!(registry.shared.release_pending(), 0);
        assert_eq!(registry.pending_mutations(), 0);
        let result = MutationAck { receiver }.await;
        assert!(matches!(result, Err(BeaconError::RegistryShutdown)));
    }

    #[tokio::test]
    async fn test_for_interest_after_shutdown_is_completed() {
        let registry = SourcedRegistry::default();
        registry.register(instance("i-1", "discovery"), Source::local()).await.unwrap();
        registry.shutdown();

        let mut stream = registry.for_interest_all(Interest::FullRegistry);
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_delete_notification_on_last_copy() {
        let registry = SourcedRegistry::default();
        let original = instance("i-1", "discovery");
        registry.register(original.clone(), Source::local()).await.unwrap();

        let mut stream = registry.for_interest(
            Interest::FullRegistry,
            Source::matcher_for(crate::source::Origin::Local),
        );
        registry.unregister(original.clone(), Source::local()).await.unwrap();

        let add = stream.next().await.unwrap();
        assert_eq!(add.kind, ChangeKind::Add);
        let delete = stream.next().await.unwrap();
        assert_eq!(delete.kind, ChangeKind::Delete);
        assert_eq!(delete.data, original);
        assert_eq!(registry.size(), 0);
        assert!(registry.for_snapshot(&Interest::FullRegistry).is_empty());
    }
}
