//! Append-only log of served requests.

use super::types::MappingId;
use crate::request::CapturedRequest;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// One inbound request and the mapping that served it, if any.
#[derive(Debug)]
pub struct CallRecord {
    pub sequence: u64,
    pub request: Arc<CapturedRequest>,
    pub matched: Option<MappingId>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
struct RecorderState {
    next_sequence: u64,
    records: Vec<Arc<CallRecord>>,
}

#[derive(Default)]
pub struct CallRecorder {
    state: RwLock<RecorderState>,
}

impl CallRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        request: Arc<CapturedRequest>,
        matched: Option<MappingId>,
    ) -> Arc<CallRecord> {
        let mut state = self.state.write();
        let record = Arc::new(CallRecord {
            sequence: state.next_sequence,
            request,
            matched,
            timestamp: Utc::now(),
        });
        state.next_sequence += 1;
        state.records.push(Arc::clone(&record));
        record
    }

    /// Snapshot of every record, oldest first.
    pub fn all(&self) -> Vec<Arc<CallRecord>> {
        self.state.read().records.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_for(&self, id: MappingId) -> usize {
        self.state
            .read()
            .records
            .iter()
            .filter(|r| r.matched == Some(id))
            .count()
    }

    pub fn matched_ids(&self) -> HashSet<MappingId> {
        self.state
            .read()
            .records
            .iter()
            .filter_map(|r| r.matched)
            .collect()
    }

    /// Requests that no mapping served.
    pub fn unmatched_requests(&self) -> Vec<Arc<CallRecord>> {
        self.state
            .read()
            .records
            .iter()
            .filter(|r| r.matched.is_none())
            .cloned()
            .collect()
    }

    /// Drop all records. Sequence numbers keep increasing.
    pub fn clear(&self) {
        self.state.write().records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hyper::{HeaderMap, Method};

    fn request(path: &str) -> Arc<CapturedRequest> {
        Arc::new(CapturedRequest::new(
            Method::GET,
            path.parse().unwrap(),
            HeaderMap::new(),
            Bytes::new(),
        ))
    }

    #[test]
    fn test_record_and_count() {
        let recorder = CallRecorder::new();
        recorder.record(request("/a"), Some(MappingId(1)));
        recorder.record(request("/a"), Some(MappingId(1)));
        recorder.record(request("/missing"), None);

        assert_eq!(recorder.len(), 3);
        assert_eq!(recorder.count_for(MappingId(1)), 2);
        assert_eq!(recorder.count_for(MappingId(2)), 0);
        assert_eq!(recorder.unmatched_requests().len(), 1);
        assert_eq!(
            recorder.matched_ids(),
            [MappingId(1)].into_iter().collect::<HashSet<_>>()
        );
    }

    #[test]
    fn test_sequence_survives_clear() {
        let recorder = CallRecorder::new();
        recorder.record(request("/"), None);
        recorder.clear();
        assert!(recorder.is_empty());

        let record = recorder.record(request("/"), None);
        assert_eq!(record.sequence, 1);
    }

    #[test]
    fn test_concurrent_recording() {
        let recorder = Arc::new(CallRecorder::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let recorder = Arc::clone(&recorder);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        recorder.record(request("/"), None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let records = recorder.all();
        assert_eq!(records.len(), 400);
        let sequences: HashSet<u64> = records.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences.len(), 400);
    }
}
