//! Progress tracking properties against the in-memory store

use async_trait::async_trait;
use chrono::Utc;
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use therapy_progress::*;
use uuid::Uuid;

fn catalog() -> Arc<InMemoryCatalog> {
    Arc::new(InMemoryCatalog::default())
}

fn tracker_with(store: Arc<dyn ProgressStore>) -> ProgressTracker {
    ProgressTracker::new(store, catalog())
}

fn attempt(completed: bool) -> ItemAttempt {
    ItemAttempt {
        completed,
        average_score: if completed { 1.0 } else { 0.3 },
        trial_detail: TrialDetail {
            trial_id: Uuid::new_v4(),
            composite_score: if completed { 1.0 } else { 0.3 },
            transcription: String::new(),
            fallback: false,
            recorded_at: Utc::now(),
        },
    }
}

/// Store that sleeps between load and save so unserialized writers would
/// interleave. Counts how many load-to-save cycles overlap.
struct SlowStore {
    inner: InMemoryProgressStore,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SlowStore {
    fn new(delay_ms: u64) -> Self {
        Self {
            inner: InMemoryProgressStore::new(),
            delay: Duration::from_millis(delay_ms),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProgressStore for SlowStore {
    async fn load_progress(&self, user_id: &str, key: &ModuleKey) -> Result<Option<ProgressRecord>, StoreError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let record = self.inner.load_progress(user_id, key).await;
        tokio::time::sleep(self.delay).await;
        record
    }

    async fn save_progress(&self, record: &ProgressRecord) -> Result<(), StoreError> {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.save_progress(record).await
    }

    async fn list_progress(&self, user_id: &str) -> Result<Vec<ProgressRecord>, StoreError> {
        self.inner.list_progress(user_id).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<u64, StoreError> {
        self.inner.delete_user(user_id).await
    }
}

#[tokio::test]
async fn test_concurrent_attempts_on_one_level_are_both_kept() {
    let store = Arc::new(SlowStore::new(20));
    let tracker = Arc::new(tracker_with(store.clone()));
    let key = ModuleKey::articulation("s");

    let handles: Vec<_> = [0u32, 1]
        .into_iter()
        .map(|item_index| {
            let tracker = Arc::clone(&tracker);
            let key = key.clone();
            tokio::spawn(async move { tracker.record_item_attempt("u1", &key, 2, item_index, attempt(true)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let record = store.load_progress("u1", &key).await.unwrap().unwrap();
    let level = record.level(2).unwrap();
    assert_eq!(level.items.len(), 2);
    assert_eq!(level.completed_item_count, 2);
    assert!(!level.is_complete, "articulation level 2 needs three items");
}

#[tokio::test]
async fn test_delete_waits_for_in_flight_write() {
    let store = Arc::new(SlowStore::new(100));
    let tracker = Arc::new(tracker_with(store.clone()));
    let key = ModuleKey::fluency();

    let first = {
        let tracker = Arc::clone(&tracker);
        let key = key.clone();
        tokio::spawn(async move { tracker.record_item_attempt("u1", &key, 1, 0, attempt(true)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let delete = {
        let tracker = Arc::clone(&tracker);
        tokio::spawn(async move { tracker.delete_user("u1").await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;

    let second = {
        let tracker = Arc::clone(&tracker);
        let key = key.clone();
        tokio::spawn(async move { tracker.record_item_attempt("u1", &key, 1, 1, attempt(true)).await })
    };

    first.await.unwrap().unwrap();
    let removed = delete.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    // the first write landed before the delete and was erased by it
    assert_eq!(removed, 1);
    assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);

    let record = store.load_progress("u1", &key).await.unwrap().unwrap();
    let level = record.level(1).unwrap();
    assert_eq!(level.items.keys().copied().collect::<Vec<_>>(), vec![1]);
    assert_eq!(level.completed_item_count, 1);
}

#[tokio::test]
async fn test_delete_leaves_nothing_behind() {
    let store = Arc::new(SlowStore::new(100));
    let tracker = Arc::new(tracker_with(store.clone()));
    let key = ModuleKey::articulation("k");

    let write = {
        let tracker = Arc::clone(&tracker);
        let key = key.clone();
        tokio::spawn(async move { tracker.record_item_attempt("u1", &key, 1, 0, attempt(true)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let removed = tracker.delete_user("u1").await.unwrap();
    write.await.unwrap().unwrap();

    assert_eq!(removed, 1);
    assert!(store.load_progress("u1", &key).await.unwrap().is_none());
    assert!(tracker.list_progress("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_last_level_untouched_returns_its_first_item() {
    let tracker = tracker_with(Arc::new(InMemoryProgressStore::new()));
    let key = ModuleKey::fluency();
    let required = [5u32, 5, 5, 3];

    for (level, count) in (1u32..).zip(required) {
        for item_index in 0..count {
            tracker.record_item_attempt("u1", &key, level, item_index, attempt(true)).await.unwrap();
        }
    }

    let position = tracker.current_position("u1", &key).await.unwrap();
    assert_eq!(position, Position::At { level: 5, item_index: 0 });
}

#[tokio::test]
async fn test_all_levels_complete_reports_module_complete() {
    let tracker = tracker_with(Arc::new(InMemoryProgressStore::new()));
    let key = ModuleKey::articulation("th");

    for (level, count) in (1u32..).zip([1u32, 3, 2, 2, 2]) {
        for item_index in 0..count {
            tracker.record_item_attempt("u1", &key, level, item_index, attempt(true)).await.unwrap();
        }
    }

    let position = tracker.current_position("u1", &key).await.unwrap();
    assert_eq!(position, Position::ModuleComplete { total_levels: 5 });
    assert_eq!(position.level(), 6);
    assert_eq!(position.item_index(), 0);
    assert!(position.is_module_complete());
}

#[tokio::test]
async fn test_resaving_loaded_record_changes_nothing() {
    let store = Arc::new(InMemoryProgressStore::new());
    let tracker = tracker_with(store.clone());
    let key = ModuleKey::expressive();

    tracker.record_item_attempt("u1", &key, 1, 0, attempt(true)).await.unwrap();
    tracker.record_item_attempt("u1", &key, 1, 3, attempt(false)).await.unwrap();

    let loaded = store.load_progress("u1", &key).await.unwrap().unwrap();
    store.save_progress(&loaded).await.unwrap();
    let reloaded = store.load_progress("u1", &key).await.unwrap().unwrap();

    assert_eq!(loaded, reloaded);
    assert_eq!(reloaded.completed_item_count(1), 1);
    assert!(!reloaded.is_level_complete(1));
}

#[tokio::test]
async fn test_modules_and_users_are_independent() {
    let store = Arc::new(InMemoryProgressStore::new());
    let tracker = tracker_with(store.clone());

    tracker.record_item_attempt("u1", &ModuleKey::articulation("s"), 1, 0, attempt(true)).await.unwrap();

    let other_sound = tracker.current_position("u1", &ModuleKey::articulation("r")).await.unwrap();
    assert_eq!(other_sound, Position::At { level: 1, item_index: 0 });
    let other_user = tracker.current_position("u2", &ModuleKey::articulation("s")).await.unwrap();
    assert_eq!(other_user, Position::At { level: 1, item_index: 0 });
    assert_eq!(tracker.list_progress("u1").await.unwrap().len(), 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn completed_count_is_derived_from_items(
        ops in proptest::collection::vec((1u32..=3, 0u32..10, any::<bool>()), 1..40)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let store = Arc::new(InMemoryProgressStore::new());
            let tracker = tracker_with(store.clone());
            let key = ModuleKey::receptive();

            for (level, item_index, completed) in ops {
                tracker.record_item_attempt("u1", &key, level, item_index, attempt(completed)).await.unwrap();
            }

            let record = store.load_progress("u1", &key).await.unwrap().unwrap();
            for (level, state) in &record.levels {
                let flagged = state.items.values().filter(|item| item.completed).count() as u32;
                assert_eq!(state.completed_item_count, flagged);
                assert_eq!(state.is_complete, flagged >= catalog().required_item_count(ModuleType::ReceptiveLanguage, *level));
            }
        });
    }
}
