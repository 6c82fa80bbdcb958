//! Bounded history of raw packets, the passive observation path.

use msgtap_common::{Host, MessageKind, RawEntry};
use std::collections::VecDeque;

/// Single observer slot, invoked once per accepted packet. Runs on the
/// packet-processing path, so it must not block materially.
pub type LogCallback = Box<dyn FnMut(&RawEntry) + Send>;

/// Size-bounded FIFO of [`RawEntry`] plus an optional observer.
///
/// Nothing here can fail: malformed or empty input is simply not recorded.
/// Raw capture must never throw on garbage bytes.
pub struct MessageLog {
    max_size: usize,
    entries: VecDeque<RawEntry>,
    callback: Option<LogCallback>,
}

impl MessageLog {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: VecDeque::new(),
            callback: None,
        }
    }

    /// Sets the retention bound, trimming the oldest entries immediately.
    /// `0` is a valid "store nothing but keep firing the callback" state.
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        while self.entries.len() > self.max_size {
            self.entries.pop_front();
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Installs or clears the observer. One slot only, last write wins;
    /// this is deliberately not a multi-subscriber bus.
    pub fn set_callback(&mut self, callback: Option<LogCallback>) {
        self.callback = callback;
    }

    /// Records one packet. Empty payloads are dropped without a trace. The
    /// callback fires before the entry is appended, and fires even when
    /// `max_size` is zero.
    pub fn log(&mut self, kind: MessageKind, from: Host, to: Host, payload: &[u8]) {
        if payload.is_empty() {
            return;
        }
        let entry = RawEntry::new(kind, from, to, payload);
        if let Some(callback) = self.callback.as_mut() {
            callback(&entry);
        }
        if self.max_size == 0 {
            return;
        }
        self.entries.push_back(entry);
        while self.entries.len() > self.max_size {
            self.entries.pop_front();
        }
    }

    /// Snapshot copy of the current contents, oldest first. Callers never
    /// observe later mutation.
    pub fn snapshot(&self) -> Vec<RawEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn host(port: u16) -> Host {
        Host::new(Ipv4Addr::new(10, 0, 0, 1), port)
    }

    fn log_n(log: &mut MessageLog, n: u8) {
        for i in 0..n {
            log.log(MessageKind::Template, host(9000), host(9001), &[i]);
        }
    }

    #[test]
    fn test_bounded_retention_keeps_newest() {
        let mut log = MessageLog::new(5);
        log_n(&mut log, 10);
        let snap = log.snapshot();
        assert_eq!(snap.len(), 5);
        let payloads: Vec<u8> = snap.iter().map(|e| e.data[0]).collect();
        assert_eq!(payloads, vec![5, 6, 7, 8, 9], "newest entries, arrival order");
    }

    #[test]
    fn test_set_max_size_trims_immediately() {
        let mut log = MessageLog::new(10);
        log_n(&mut log, 10);
        log.set_max_size(3);
        assert_eq!(log.len(), 3);
        assert_eq!(log.snapshot()[0].data[0], 7);
    }

    #[test]
    fn test_empty_payload_never_recorded() {
        let mut log = MessageLog::new(5);
        log.log(MessageKind::Template, host(9000), host(9001), &[]);
        assert!(log.is_empty(), "zero-length capture must be dropped");
    }

    #[test]
    fn test_callback_fires_even_when_not_storing() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let mut log = MessageLog::new(0);
        log.set_callback(Some(Box::new(move |_entry| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));
        log_n(&mut log, 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert!(log.is_empty(), "max_size 0 stores nothing");
    }

    #[test]
    fn test_callback_skipped_for_empty_payload() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let mut log = MessageLog::new(5);
        log.set_callback(Some(Box::new(move |_entry| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));
        log.log(MessageKind::Template, host(9000), host(9001), &[]);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut log = MessageLog::new(5);
        log_n(&mut log, 2);
        let snap = log.snapshot();
        log_n(&mut log, 3);
        assert_eq!(snap.len(), 2, "snapshot must not track later appends");
    }
}
