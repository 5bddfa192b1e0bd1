//! Shared service state
//!
//! Owned by the request handler, the HTTP API and the pool refresh task.

use chaos_common::config::ConfigStore;
use chaos_common::events::{ChaosEvent, EventBus, QueueChangeTrigger};
use chaos_pool::{MapPool, PoolGeneration};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::error::Result;
use crate::queue::{QueuedSong, RequestQueue};

/// Buffered events per subscriber before it starts lagging
const EVENT_CAPACITY: usize = 100;

/// Shared state accessible by all components
pub struct SharedState {
    pub pool: Arc<MapPool>,

    /// Validation and insertion happen under this lock
    pub queue: Mutex<RequestQueue>,

    pub config: ConfigStore,

    pub events: EventBus,
}

impl SharedState {
    pub fn new(pool: Arc<MapPool>, config: ConfigStore) -> Self {
        let queue_size = config.current().request.queue_size;
        Self {
            pool,
            queue: Mutex::new(RequestQueue::new(queue_size)),
            config,
            events: EventBus::new(EVENT_CAPACITY),
        }
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: ChaosEvent) {
        self.events.emit_lossy(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<ChaosEvent> {
        self.events.subscribe()
    }

    /// Reload configuration and rebuild the map pool
    ///
    /// Emits `PoolRebuilt` or `PoolRebuildFailed`.
    pub async fn rebuild_pool(&self) -> Result<Arc<PoolGeneration>> {
        let config = self.config.reload().await;
        let started = Instant::now();

        match self.pool.rebuild(&config.filter).await {
            Ok(generation) => {
                self.broadcast_event(ChaosEvent::PoolRebuilt {
                    generation: generation.generation(),
                    valid_count: generation.valid_count(),
                    requestable_count: generation.requestable_count(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                    timestamp: chrono::Utc::now(),
                });
                Ok(generation)
            }
            Err(e) => {
                self.broadcast_event(ChaosEvent::PoolRebuildFailed {
                    reason: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                Err(e.into())
            }
        }
    }

    /// Snapshot of the queue in order
    pub async fn queue_entries(&self) -> Vec<QueuedSong> {
        self.queue.lock().await.entries().cloned().collect()
    }

    /// Hand the head entry to a consumer
    pub async fn pop_next(&self) -> Option<QueuedSong> {
        let mut queue = self.queue.lock().await;
        let song = queue.pop_next()?;
        self.queue_changed(&queue, QueueChangeTrigger::Consumed);
        Some(song)
    }

    pub async fn remove_entry(&self, queue_entry_id: Uuid) -> Option<QueuedSong> {
        let mut queue = self.queue.lock().await;
        let song = queue.remove(queue_entry_id)?;
        self.queue_changed(&queue, QueueChangeTrigger::Removed);
        Some(song)
    }

    /// Empty the queue, returning how many entries were dropped
    pub async fn clear_queue(&self) -> usize {
        let mut queue = self.queue.lock().await;
        let dropped = queue.len();
        queue.clear();
        if dropped > 0 {
            self.queue_changed(&queue, QueueChangeTrigger::Cleared);
        }
        dropped
    }

    pub(crate) fn queue_changed(&self, queue: &RequestQueue, trigger: QueueChangeTrigger) {
        self.broadcast_event(ChaosEvent::QueueChanged {
            queue: queue.entry_ids(),
            trigger,
            timestamp: chrono::Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaos_common::config::ChaosConfig;
    use chaos_common::Difficulty;
    use chaos_pool::{PoolFilter, SongCatalog, StaticLibrary};

    fn create_state(queue_size: usize) -> SharedState {
        let mut config = ChaosConfig::default();
        config.request.queue_size = queue_size;

        let filter = PoolFilter::new(
            Arc::new(StaticLibrary::default()),
            Arc::new(SongCatalog::with_songs(Vec::new())),
        );
        SharedState::new(Arc::new(MapPool::new(filter)), ConfigStore::fixed(config))
    }

    fn song(n: u8) -> QueuedSong {
        let hash = format!("{:040X}", n);
        QueuedSong::new(format!("custom_level_{}", hash), &hash, Difficulty::Hard, "viewer")
    }

    #[tokio::test]
    async fn test_queue_capacity_from_config() {
        let state = create_state(3);
        assert_eq!(state.queue.lock().await.capacity(), 3);
    }

    #[tokio::test]
    async fn test_pop_next_emits_queue_changed() {
        let state = create_state(4);
        let mut rx = state.subscribe_events();

        {
            let mut queue = state.queue.lock().await;
            queue.enqueue(song(1)).unwrap();
            queue.enqueue(song(2)).unwrap();
        }

        let popped = state.pop_next().await.unwrap();
        assert_eq!(popped.hash, format!("{:040X}", 1));

        match rx.try_recv().unwrap() {
            ChaosEvent::QueueChanged { queue, trigger, .. } => {
                assert_eq!(queue.len(), 1);
                assert_eq!(trigger, QueueChangeTrigger::Consumed);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pop_and_remove_on_empty_queue() {
        let state = create_state(4);
        let mut rx = state.subscribe_events();

        assert!(state.pop_next().await.is_none());
        assert!(state.remove_entry(Uuid::new_v4()).await.is_none());
        assert_eq!(state.clear_queue().await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_clear_queue() {
        let state = create_state(4);
        state.queue.lock().await.enqueue(song(1)).unwrap();

        assert_eq!(state.clear_queue().await, 1);
        assert!(state.queue_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_empty_library_publishes_empty_pool() {
        let state = create_state(4);
        let mut rx = state.subscribe_events();

        let generation = state.rebuild_pool().await.unwrap();
        assert_eq!(generation.generation(), 1);
        assert_eq!(generation.valid_count(), 0);

        match rx.try_recv().unwrap() {
            ChaosEvent::PoolRebuilt { generation, .. } => assert_eq!(generation, 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
