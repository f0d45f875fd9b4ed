#![cfg(test)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use maplit::hashmap;

use crate::error::{FetchError, FetchResult, StoreError};
use crate::fetcher::Fetcher;
use crate::flag::Flag;
use crate::store::FlagStore;

pub struct TestFlags {
    flags: HashMap<String, Flag>,
}

impl TestFlags {
    pub fn new() -> Self {
        Self {
            flags: hashmap! {
                "full".to_string() => serde_json::from_str(r##"{
                        "id": 100,
                        "key": "full",
                        "description": "every field populated",
                        "createdBy": "alice",
                        "updatedBy": "bob",
                        "enabled": true,
                        "snapshotId": 12,
                        "notes": "some notes",
                        "dataRecordsEnabled": true,
                        "entityType": "user",
                        "updatedAt": "2024-05-01T10:00:00Z",
                        "segments": [{
                            "id": 1001,
                            "flagId": 100,
                            "description": "ANZ",
                            "rank": 0,
                            "rolloutPercent": 100,
                            "constraints": [
                                {"id": 1, "segmentId": 1001, "property": "country", "operator": "IN", "value": "NZ,AU"}
                            ],
                            "distributions": [
                                {"id": 1, "segmentId": 1001, "variantId": 201, "variantKey": "red", "percent": 50},
                                {"id": 2, "segmentId": 1001, "variantId": 202, "variantKey": "blue", "percent": 50}
                            ]
                        }],
                        "variants": [
                            {"id": 201, "flagId": 100, "key": "red", "attachment": {"hex": "#ff0000"}},
                            {"id": 202, "flagId": 100, "key": "blue", "attachment": {"hex": "#0000ff"}}
                        ],
                        "tags": [{"id": 1, "value": "checkout"}]
                    }"##).unwrap(),
                "two-variants".to_string() => serde_json::from_str(r#"{
                        "id": 2,
                        "key": "two-variants",
                        "enabled": true,
                        "segments": [{
                            "id": 20,
                            "flagId": 2,
                            "rank": 0,
                            "rolloutPercent": 100,
                            "constraints": [],
                            "distributions": [
                                {"id": 1, "segmentId": 20, "variantId": 21, "variantKey": "control", "percent": 50},
                                {"id": 2, "segmentId": 20, "variantId": 22, "variantKey": "treatment", "percent": 50}
                            ]
                        }],
                        "variants": [
                            {"id": 21, "flagId": 2, "key": "control"},
                            {"id": 22, "flagId": 2, "key": "treatment"}
                        ]
                    }"#).unwrap(),
                "disabled".to_string() => serde_json::from_str(r#"{
                        "id": 3,
                        "key": "disabled",
                        "enabled": false,
                        "segments": [{
                            "id": 30,
                            "rolloutPercent": 100,
                            "distributions": [{"variantId": 31, "percent": 100}]
                        }],
                        "variants": [{"id": 31, "key": "on"}]
                    }"#).unwrap(),
                "no-segments".to_string() => serde_json::from_str(r#"{
                        "id": 4,
                        "key": "no-segments",
                        "enabled": true,
                        "variants": [{"id": 41, "key": "on"}]
                    }"#).unwrap(),
                "ranked".to_string() => serde_json::from_str(r#"{
                        "id": 5,
                        "key": "ranked",
                        "enabled": true,
                        "segments": [
                            {
                                "id": 52,
                                "rank": 10,
                                "rolloutPercent": 100,
                                "distributions": [{"variantId": 51, "percent": 100}]
                            },
                            {
                                "id": 51,
                                "rank": 1,
                                "rolloutPercent": 100,
                                "constraints": [{"property": "plan", "operator": "EQ", "value": "pro"}],
                                "distributions": [{"variantId": 52, "percent": 100}]
                            },
                            {
                                "id": 53,
                                "rank": 1,
                                "rolloutPercent": 100,
                                "distributions": [{"variantId": 53, "percent": 100}]
                            }
                        ],
                        "variants": [
                            {"id": 51, "key": "fallback"},
                            {"id": 52, "key": "premium"},
                            {"id": 53, "key": "tie"}
                        ]
                    }"#).unwrap(),
                "rollout-zero".to_string() => serde_json::from_str(r#"{
                        "id": 6,
                        "key": "rollout-zero",
                        "enabled": true,
                        "segments": [{
                            "id": 60,
                            "rank": 0,
                            "rolloutPercent": 0,
                            "distributions": [{"variantId": 61, "percent": 100}]
                        }],
                        "variants": [{"id": 61, "key": "on"}]
                    }"#).unwrap(),
                "no-distribution".to_string() => serde_json::from_str(r#"{
                        "id": 7,
                        "key": "no-distribution",
                        "enabled": true,
                        "segments": [
                            {"id": 70, "rank": 0, "rolloutPercent": 100},
                            {
                                "id": 71,
                                "rank": 1,
                                "rolloutPercent": 100,
                                "constraints": [{"property": "plan", "operator": "EQ", "value": "pro"}],
                                "distributions": [{"variantId": 71, "percent": 100}]
                            }
                        ],
                        "variants": [{"id": 71, "key": "on"}]
                    }"#).unwrap(),
                "constraint-miss".to_string() => serde_json::from_str(r#"{
                        "id": 8,
                        "key": "constraint-miss",
                        "enabled": true,
                        "segments": [
                            {
                                "id": 80,
                                "rank": 0,
                                "rolloutPercent": 100,
                                "constraints": [{"property": "plan", "operator": "EQ", "value": "pro"}],
                                "distributions": [{"variantId": 81, "percent": 100}]
                            },
                            {
                                "id": 81,
                                "rank": 1,
                                "rolloutPercent": 100,
                                "constraints": [{"property": "country", "operator": "EQ", "value": "NZ"}],
                                "distributions": [{"variantId": 81, "percent": 100}]
                            }
                        ],
                        "variants": [{"id": 81, "key": "on"}]
                    }"#).unwrap(),
            },
        }
    }

    pub fn flag(&self, key: &str) -> &Flag {
        self.flags
            .get(key)
            .unwrap_or_else(|| panic!("no test flag named {}", key))
    }

    pub fn all(&self) -> impl Iterator<Item = &Flag> {
        self.flags.values()
    }
}

/// A fetcher whose result can be swapped, or made to fail, between refreshes.
pub struct TestFetcher {
    flags: Mutex<Vec<Flag>>,
    failing: AtomicBool,
    fetches: AtomicUsize,
}

impl TestFetcher {
    pub fn new(flags: Vec<Flag>) -> Self {
        Self {
            flags: Mutex::new(flags),
            failing: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn set_flags(&self, flags: Vec<Flag>) {
        *self.flags.lock().unwrap() = flags;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for TestFetcher {
    async fn fetch(&self) -> FetchResult<Vec<Flag>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Store(StoreError::new("test fetch failure")));
        }
        Ok(self.flags.lock().unwrap().clone())
    }
}

/// A fetcher that takes `delay` to answer and records how many fetches overlapped.
pub struct SlowFetcher {
    delay: Duration,
    flags: Vec<Flag>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetches: AtomicUsize,
}

impl SlowFetcher {
    pub fn new(delay: Duration, flags: Vec<Flag>) -> Self {
        Self {
            delay,
            flags,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for SlowFetcher {
    async fn fetch(&self) -> FetchResult<Vec<Flag>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.flags.clone())
    }
}

/// An in-memory flag store.
pub struct StaticStore {
    result: Result<Vec<Flag>, String>,
}

impl StaticStore {
    pub fn new(flags: Vec<Flag>) -> Self {
        Self { result: Ok(flags) }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
        }
    }
}

#[async_trait]
impl FlagStore for StaticStore {
    async fn find_all_flags(&self) -> Result<Vec<Flag>, StoreError> {
        self.result.clone().map_err(StoreError::new)
    }
}
