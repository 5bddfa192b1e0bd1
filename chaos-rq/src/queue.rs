//! Request queue
//!
//! Bounded FIFO of validated chat requests. Entries stay here until a
//! downstream consumer takes them; nothing is persisted.

use chaos_common::level_id::normalize_hash;
use chaos_common::Difficulty;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use thiserror::Error;
use uuid::Uuid;

/// A validated request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueuedSong {
    pub queue_entry_id: Uuid,
    /// Level to play (`custom_level_<HASH>`)
    pub level_id: String,
    /// Uppercase content hash
    pub hash: String,
    pub difficulty: Difficulty,
    /// Start offset override in seconds
    pub start_time_secs: Option<u32>,
    /// Insert position override (append when unset)
    pub position: Option<usize>,
    /// Requesting chat user
    pub source: String,
    pub requested_at: DateTime<Utc>,
}

impl QueuedSong {
    pub fn new(
        level_id: impl Into<String>,
        hash: &str,
        difficulty: Difficulty,
        source: impl Into<String>,
    ) -> Self {
        Self {
            queue_entry_id: Uuid::new_v4(),
            level_id: level_id.into(),
            hash: normalize_hash(hash),
            difficulty,
            start_time_secs: None,
            position: None,
            source: source.into(),
            requested_at: Utc::now(),
        }
    }

    pub fn with_start_time(mut self, start_time_secs: Option<u32>) -> Self {
        self.start_time_secs = start_time_secs;
        self
    }

    pub fn with_position(mut self, position: Option<usize>) -> Self {
        self.position = position;
        self
    }
}

/// Queue-side rejection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is full")]
    Full,

    #[error("song is already queued")]
    Duplicate,
}

/// Bounded request queue
#[derive(Debug, Clone)]
pub struct RequestQueue {
    capacity: usize,
    entries: VecDeque<QueuedSong>,
}

impl RequestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(256)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change capacity; existing entries above it are kept
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Number of entries requested by `source`
    pub fn count_from(&self, source: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.source.eq_ignore_ascii_case(source))
            .count()
    }

    /// True if an entry already targets `hash`
    pub fn contains_hash(&self, hash: &str) -> bool {
        let hash = normalize_hash(hash);
        self.entries.iter().any(|e| e.hash == hash)
    }

    /// Add a request
    ///
    /// Appends unless the entry carries a position override.
    pub fn enqueue(&mut self, song: QueuedSong) -> Result<(), QueueError> {
        if self.is_full() {
            return Err(QueueError::Full);
        }

        if self.contains_hash(&song.hash) {
            return Err(QueueError::Duplicate);
        }

        match song.position {
            Some(position) => {
                let index = position.min(self.entries.len());
                self.entries.insert(index, song);
            }
            None => self.entries.push_back(song),
        }

        Ok(())
    }

    /// Take the head entry
    pub fn pop_next(&mut self) -> Option<QueuedSong> {
        self.entries.pop_front()
    }

    /// Remove a specific entry; `None` if not queued
    pub fn remove(&mut self, queue_entry_id: Uuid) -> Option<QueuedSong> {
        let index = self
            .entries
            .iter()
            .position(|e| e.queue_entry_id == queue_entry_id)?;
        self.entries.remove(index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> impl Iterator<Item = &QueuedSong> {
        self.entries.iter()
    }

    /// Entry ids in queue order
    pub fn entry_ids(&self) -> Vec<Uuid> {
        self.entries.iter().map(|e| e.queue_entry_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_entry(id: u8, source: &str) -> QueuedSong {
        let hash = format!("{:040X}", id);
        let mut song = QueuedSong::new(format!("custom_level_{}", hash), &hash, Difficulty::Hard, source);
        song.queue_entry_id = Uuid::from_bytes([id; 16]);
        song
    }

    #[test]
    fn test_queue_creation() {
        let queue = RequestQueue::new(4);
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.capacity(), 4);
    }

    #[test]
    fn test_enqueue_and_pop_in_order() {
        let mut queue = RequestQueue::new(4);
        queue.enqueue(create_test_entry(1, "a")).unwrap();
        queue.enqueue(create_test_entry(2, "b")).unwrap();
        queue.enqueue(create_test_entry(3, "a")).unwrap();

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.count_from("a"), 2);
        assert_eq!(queue.count_from("A"), 2);
        assert_eq!(queue.count_from("c"), 0);

        assert_eq!(queue.pop_next().unwrap().queue_entry_id, Uuid::from_bytes([1; 16]));
        assert_eq!(queue.pop_next().unwrap().queue_entry_id, Uuid::from_bytes([2; 16]));
        assert_eq!(queue.pop_next().unwrap().queue_entry_id, Uuid::from_bytes([3; 16]));
        assert!(queue.pop_next().is_none());
    }

    #[test]
    fn test_enqueue_full() {
        let mut queue = RequestQueue::new(2);
        queue.enqueue(create_test_entry(1, "a")).unwrap();
        queue.enqueue(create_test_entry(2, "a")).unwrap();
        assert!(queue.is_full());
        assert_eq!(
            queue.enqueue(create_test_entry(3, "a")),
            Err(QueueError::Full)
        );
    }

    #[test]
    fn test_enqueue_duplicate_by_hash() {
        let mut queue = RequestQueue::new(4);
        queue.enqueue(create_test_entry(1, "a")).unwrap();

        let mut again = create_test_entry(1, "b");
        again.queue_entry_id = Uuid::new_v4();
        again.hash = again.hash.to_ascii_lowercase();
        assert!(queue.contains_hash(&again.hash));
        assert_eq!(queue.enqueue(again), Err(QueueError::Duplicate));
    }

    #[test]
    fn test_position_override() {
        let mut queue = RequestQueue::new(4);
        queue.enqueue(create_test_entry(1, "a")).unwrap();
        queue.enqueue(create_test_entry(2, "a")).unwrap();
        queue
            .enqueue(create_test_entry(3, "a").with_position(Some(0)))
            .unwrap();
        queue
            .enqueue(create_test_entry(4, "a").with_position(Some(99)))
            .unwrap();

        let ids = queue.entry_ids();
        assert_eq!(ids[0], Uuid::from_bytes([3; 16]));
        assert_eq!(ids[3], Uuid::from_bytes([4; 16]));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut queue = RequestQueue::new(4);
        queue.enqueue(create_test_entry(1, "a")).unwrap();
        queue.enqueue(create_test_entry(2, "a")).unwrap();

        assert!(queue.remove(Uuid::from_bytes([9; 16])).is_none());
        let removed = queue.remove(Uuid::from_bytes([1; 16])).unwrap();
        assert_eq!(removed.source, "a");
        assert_eq!(queue.len(), 1);

        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_shrinking_capacity_keeps_entries() {
        let mut queue = RequestQueue::new(4);
        queue.enqueue(create_test_entry(1, "a")).unwrap();
        queue.enqueue(create_test_entry(2, "a")).unwrap();

        queue.set_capacity(1);
        assert_eq!(queue.len(), 2);
        assert!(queue.is_full());
    }
}
