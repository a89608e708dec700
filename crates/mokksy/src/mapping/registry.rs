//! Mapping registry: storage, priority ordering and request matching.
//!
//! Mappings live in a copy-on-write vector kept sorted by
//! `(priority, id)`. Matching clones the current snapshot and releases the
//! lock before evaluating any matcher, so registrations never wait for a
//! scan and a scan never sees a half-written list. The first mapping in
//! snapshot order whose specification passes wins: lowest priority value
//! first, earliest registration among equals.

use super::recorder::{CallRecord, CallRecorder};
use super::types::{Mapping, MappingId, MappingOptions, MappingSummary, Responder};
use crate::request::{CapturedRequest, MatcherFailure, RequestSpecification};
use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

pub type MappingList = Arc<Vec<Arc<Mapping>>>;

struct RegistryState {
    next_id: u64,
    mappings: MappingList,
}

/// A mapping that nearly matched, for 404 diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(flatten)]
    pub mapping: MappingSummary,
    pub failures: Vec<MatcherFailure>,
}

pub struct MappingRegistry {
    state: RwLock<RegistryState>,
    recorder: CallRecorder,
}

impl Default for MappingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                next_id: 1,
                mappings: Arc::new(Vec::new()),
            }),
            recorder: CallRecorder::new(),
        }
    }

    /// Add a mapping. Id and timestamp are assigned under the write lock.
    pub fn register(
        &self,
        specification: RequestSpecification,
        options: MappingOptions,
        responder: Responder,
    ) -> Arc<Mapping> {
        let mut state = self.state.write();
        let mapping = Arc::new(Mapping {
            id: MappingId(state.next_id),
            specification,
            responder,
            options,
            registered_at: Utc::now(),
        });
        state.next_id += 1;

        // New ids are always the largest, so insert after every mapping
        // with priority <= ours.
        let mut next = Vec::with_capacity(state.mappings.len() + 1);
        next.extend(state.mappings.iter().cloned());
        let position = next.partition_point(|m| m.priority() <= mapping.priority());
        next.insert(position, Arc::clone(&mapping));
        state.mappings = Arc::new(next);

        debug!("Registered mapping {}", mapping);
        mapping
    }

    /// Current mappings in match order.
    pub fn snapshot(&self) -> MappingList {
        Arc::clone(&self.state.read().mappings)
    }

    pub fn len(&self) -> usize {
        self.state.read().mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: MappingId) -> Option<Arc<Mapping>> {
        self.snapshot().iter().find(|m| m.id == id).cloned()
    }

    /// Remove a mapping. Returns whether it was present.
    pub fn remove(&self, id: MappingId) -> bool {
        let mut state = self.state.write();
        let Some(position) = state.mappings.iter().position(|m| m.id == id) else {
            return false;
        };
        let mut next = state.mappings.as_ref().clone();
        next.remove(position);
        state.mappings = Arc::new(next);
        true
    }

    /// Best mapping for `request`, or `None` when nothing matches.
    ///
    /// A winning mapping with `remove_after_match` is removed before it is
    /// returned; if a concurrent request removed it first, the scan restarts
    /// so each one-shot mapping serves exactly one request.
    pub fn find_match(&self, request: &CapturedRequest) -> Option<Arc<Mapping>> {
        loop {
            let snapshot = self.snapshot();
            let winner = snapshot
                .iter()
                .find(|m| m.specification.matches(request))?;

            if !winner.options.remove_after_match {
                return Some(Arc::clone(winner));
            }

            let mut state = self.state.write();
            if let Some(position) = state.mappings.iter().position(|m| Arc::ptr_eq(m, winner)) {
                let mut next = state.mappings.as_ref().clone();
                next.remove(position);
                state.mappings = Arc::new(next);
                debug!("Removed one-shot mapping {}", winner);
                return Some(Arc::clone(winner));
            }
        }
    }

    /// Mappings ordered by fewest failed matchers, then match order.
    pub fn closest_candidates(&self, request: &CapturedRequest, limit: usize) -> Vec<Candidate> {
        let snapshot = self.snapshot();
        let mut reports: Vec<(usize, Candidate)> = snapshot
            .iter()
            .map(|m| {
                let report = m.specification.evaluate(request);
                (
                    report.failed_count(),
                    Candidate {
                        mapping: m.summary(),
                        failures: report.failures,
                    },
                )
            })
            .collect();
        // Stable sort keeps match order among equal failure counts.
        reports.sort_by_key(|(failed, _)| *failed);
        reports
            .into_iter()
            .take(limit)
            .map(|(_, candidate)| candidate)
            .collect()
    }

    pub fn summaries(&self) -> Vec<MappingSummary> {
        self.snapshot().iter().map(|m| m.summary()).collect()
    }

    pub fn record_call(
        &self,
        request: Arc<CapturedRequest>,
        matched: Option<MappingId>,
    ) -> Arc<CallRecord> {
        self.recorder.record(request, matched)
    }

    pub fn calls(&self) -> Vec<Arc<CallRecord>> {
        self.recorder.all()
    }

    pub fn match_count(&self, id: MappingId) -> usize {
        self.recorder.count_for(id)
    }

    /// Live mappings that have not served any request.
    pub fn unmatched_mappings(&self) -> Vec<Arc<Mapping>> {
        let matched = self.recorder.matched_ids();
        self.snapshot()
            .iter()
            .filter(|m| !matched.contains(&m.id))
            .cloned()
            .collect()
    }

    pub fn unmatched_requests(&self) -> Vec<Arc<CallRecord>> {
        self.recorder.unmatched_requests()
    }

    /// Forget every recorded call; mappings stay registered.
    pub fn reset_match_counts(&self) {
        self.recorder.clear();
    }

    /// Drop all mappings and recorded calls.
    pub fn clear(&self) {
        self.state.write().mappings = Arc::new(Vec::new());
        self.recorder.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponseDefinition;
    use bytes::Bytes;
    use hyper::{HeaderMap, Method};

    fn responder(tag: &'static str) -> Responder {
        Arc::new(move |_: &CapturedRequest| ResponseDefinition::ok().body(tag))
    }

    fn spec(path: &str, priority: i32) -> RequestSpecification {
        RequestSpecification::builder()
            .path(path)
            .priority(priority)
            .build()
            .unwrap()
    }

    fn get(path: &str) -> CapturedRequest {
        CapturedRequest::new(Method::GET, path.parse().unwrap(), HeaderMap::new(), Bytes::new())
    }

    #[test]
    fn test_lower_priority_value_wins_regardless_of_order() {
        let registry = MappingRegistry::new();
        let low = registry.register(spec("/x", 5), MappingOptions::default(), responder("low"));
        let high = registry.register(spec("/x", 1), MappingOptions::default(), responder("high"));

        let winner = registry.find_match(&get("/x")).unwrap();
        assert_eq!(winner.id, high.id);
        assert_ne!(winner.id, low.id);
    }

    #[test]
    fn test_fifo_among_equal_priorities() {
        let registry = MappingRegistry::new();
        let ids: Vec<MappingId> = (0..3)
            .map(|_| {
                registry
                    .register(spec("/x", 0), MappingOptions::default(), responder("x"))
                    .id
            })
            .collect();

        assert_eq!(registry.find_match(&get("/x")).unwrap().id, ids[0]);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_specificity_is_ignored() {
        let registry = MappingRegistry::new();
        let broad = registry.register(
            RequestSpecification::any(),
            MappingOptions::default(),
            responder("broad"),
        );
        registry.register(
            RequestSpecification::builder()
                .get()
                .path("/x")
                .build()
                .unwrap(),
            MappingOptions::default(),
            responder("specific"),
        );

        assert_eq!(registry.find_match(&get("/x")).unwrap().id, broad.id);
    }

    #[test]
    fn test_no_match_returns_none() {
        let registry = MappingRegistry::new();
        registry.register(spec("/x", 0), MappingOptions::default(), responder("x"));
        assert!(registry.find_match(&get("/y")).is_none());
    }

    #[test]
    fn test_one_shot_mapping_is_removed() {
        let registry = MappingRegistry::new();
        let once = registry.register(spec("/x", 0), MappingOptions::once(), responder("once"));
        let fallback = registry.register(spec("/x", 0), MappingOptions::default(), responder("again"));

        assert_eq!(registry.find_match(&get("/x")).unwrap().id, once.id);
        assert_eq!(registry.find_match(&get("/x")).unwrap().id, fallback.id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_one_shot_serves_single_request_under_contention() {
        let registry = Arc::new(MappingRegistry::new());
        let once = registry.register(spec("/x", 0), MappingOptions::once(), responder("once"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.find_match(&get("/x")).map(|m| m.id))
            })
            .collect();
        let winners: Vec<MappingId> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(winners, vec![once.id]);
    }

    #[test]
    fn test_concurrent_registration_assigns_distinct_ids() {
        let registry = Arc::new(MappingRegistry::new());
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..20)
                        .map(|_| {
                            registry
                                .register(spec("/x", 0), MappingOptions::default(), responder("x"))
                                .id
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut ids: Vec<MappingId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        assert_eq!(registry.len(), 200);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 200);

        // List order agrees with id order for equal priorities.
        let snapshot = registry.snapshot();
        assert!(snapshot.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_unmatched_mappings_and_reset() {
        let registry = MappingRegistry::new();
        let m1 = registry.register(spec("/one", 0), MappingOptions::default(), responder("1"));
        let m2 = registry.register(spec("/two", 0), MappingOptions::default(), responder("2"));

        registry.record_call(Arc::new(get("/one")), Some(m1.id));
        let unmatched: Vec<MappingId> =
            registry.unmatched_mappings().iter().map(|m| m.id).collect();
        assert_eq!(unmatched, vec![m2.id]);
        assert_eq!(registry.match_count(m1.id), 1);

        registry.reset_match_counts();
        assert_eq!(registry.unmatched_mappings().len(), 2);
        assert_eq!(registry.match_count(m1.id), 0);
    }

    #[test]
    fn test_closest_candidates_sorted_by_failures() {
        let registry = MappingRegistry::new();
        registry.register(
            RequestSpecification::builder()
                .post()
                .path("/a")
                .build()
                .unwrap(),
            MappingOptions::default(),
            responder("far"),
        );
        let near = registry.register(spec("/b", 0), MappingOptions::default(), responder("near"));

        let candidates = registry.closest_candidates(&get("/c"), 1);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].mapping.id, near.id);
        assert_eq!(
            candidates[0].failures[0].message,
            "Path '/c' should be equal to '/b'"
        );
    }

    #[test]
    fn test_remove() {
        let registry = MappingRegistry::new();
        let m = registry.register(spec("/x", 0), MappingOptions::default(), responder("x"));
        assert!(registry.remove(m.id));
        assert!(!registry.remove(m.id));
        assert!(registry.get(m.id).is_none());
    }
}
