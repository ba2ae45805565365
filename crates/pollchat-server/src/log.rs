//! Shared append-only message log.
//!
//! Every chat line the relay has seen, in append order. Indices are assigned
//! once and never change; the log only grows. Clients catch up by fetching
//! index after index until they reach the end.

use pollchat_core::{ChatError, ChatResult};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

/// Thread-safe, index-addressable store of chat lines.
#[derive(Debug, Default)]
pub struct MessageLog {
    lines: RwLock<Vec<String>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line and return its index (the size before the append).
    pub fn append(&self, text: impl Into<String>) -> usize {
        let text = text.into();
        let index = {
            let mut lines = self.write();
            lines.push(text.clone());
            lines.len() - 1
        };
        info!(target: "pollchat::log", index, "{text}");
        index
    }

    /// The line at `index`, or `OutOfRange` past the end.
    pub fn get(&self, index: usize) -> ChatResult<String> {
        let lines = self.read();
        lines.get(index).cloned().ok_or(ChatError::OutOfRange {
            index,
            size: lines.len(),
        })
    }

    /// Bounds check and read under one lock acquisition.
    pub fn get_if_present(&self, index: usize) -> Option<String> {
        self.read().get(index).cloned()
    }

    pub fn size(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    // Nothing in this module panics while holding the lock, so a poisoned
    // guard still protects a consistent vector.
    fn read(&self) -> RwLockReadGuard<'_, Vec<String>> {
        self.lines.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<String>> {
        self.lines.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn sequential_indices() {
        let log = MessageLog::new();
        assert!(log.is_empty());
        assert_eq!(log.append("a"), 0);
        assert_eq!(log.append("b"), 1);
        assert_eq!(log.append("c"), 2);
        assert_eq!(log.size(), 3);
        assert_eq!(log.get(0).unwrap(), "a");
        assert_eq!(log.get(2).unwrap(), "c");
    }

    #[test]
    fn get_past_end_is_out_of_range() {
        let log = MessageLog::new();
        log.append("only");
        assert!(matches!(
            log.get(1),
            Err(ChatError::OutOfRange { index: 1, size: 1 })
        ));
        assert!(log.get(99).is_err());
        assert_eq!(log.get_if_present(1), None);
        assert_eq!(log.get_if_present(0).as_deref(), Some("only"));
    }

    #[test]
    fn concurrent_appends_each_land_once() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;

        let log = Arc::new(MessageLog::new());
        let done = Arc::new(AtomicBool::new(false));

        let watcher = {
            let log = log.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut last = 0;
                while !done.load(Ordering::Acquire) {
                    let size = log.size();
                    assert!(size >= last, "log shrank from {last} to {size}");
                    last = size;
                }
            })
        };

        let writers: Vec<_> = (0..THREADS)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for m in 0..PER_THREAD {
                        log.append(format!("{t}:{m}"));
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        done.store(true, Ordering::Release);
        watcher.join().unwrap();

        assert_eq!(log.size(), THREADS * PER_THREAD);
        let seen: HashSet<String> = (0..log.size()).map(|i| log.get(i).unwrap()).collect();
        assert_eq!(seen.len(), THREADS * PER_THREAD);
        for t in 0..THREADS {
            for m in 0..PER_THREAD {
                assert!(seen.contains(&format!("{t}:{m}")));
            }
        }
    }
}
