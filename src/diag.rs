//! Process-wide diagnostic ring buffer.
//!
//! A bounded, in-memory log of protocol and reconciliation events intended
//! for a debug-panel collaborator. The logger is an explicit service that is
//! constructed once at process start and passed by reference, never accessed
//! through ambient globals. Subscribers are notified of new entries through
//! a broadcast channel and can lag without blocking the writer.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default number of retained entries when none is configured.
pub const DEFAULT_DIAG_CAPACITY: usize = 512;

/// Category of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagLevel {
    /// Audio/transport lifecycle events
    Audio,
    /// Function-call lifecycle events
    Function,
    /// Raw/parsed JSON payloads
    Json,
    /// Item mutations applied to the list
    Items,
    /// Errors of any kind
    Error,
}

/// A single diagnostic entry.
#[derive(Debug, Clone, Serialize)]
pub struct DiagEntry {
    /// Unique entry ID
    pub id: Uuid,
    /// Wall-clock time the entry was recorded
    #[serde(skip)]
    pub timestamp: SystemTime,
    /// Entry category
    pub level: DiagLevel,
    /// Human-readable message
    pub message: String,
    /// Optional structured payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Bounded diagnostic logger with subscriber notification.
pub struct DiagLogger {
    capacity: usize,
    entries: Mutex<VecDeque<DiagEntry>>,
    tx: broadcast::Sender<DiagEntry>,
}

impl DiagLogger {
    /// Create a logger retaining at most `capacity` entries.
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Arc::new(Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            tx,
        })
    }

    /// Record an entry, evicting the oldest when at capacity.
    pub fn log(&self, level: DiagLevel, message: impl Into<String>, data: Option<serde_json::Value>) {
        let entry = DiagEntry {
            id: Uuid::new_v4(),
            timestamp: SystemTime::now(),
            level,
            message: message.into(),
            data,
        };

        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        drop(entries);

        // Lagging or absent subscribers are fine
        let _ = self.tx.send(entry);
    }

    /// Snapshot of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<DiagEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Drop all retained entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Subscribe to new entries.
    pub fn subscribe(&self) -> broadcast::Receiver<DiagEntry> {
        self.tx.subscribe()
    }

    /// Export the retained entries as pretty-printed JSON.
    pub fn export_json(&self) -> String {
        serde_json::to_string_pretty(&self.entries()).unwrap_or_else(|_| "[]".to_string())
    }
}
