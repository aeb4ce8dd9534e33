//! Property-Based Tests for the Background-Refresh Cache
//!
//! **Property 1: Request coalescing**
//!
//! For any number of concurrent first reads of one key, exactly one fetch
//! runs and every caller receives the identical value.
//!
//! **Property 2: Stale-while-revalidate**
//!
//! For any staleness window, a read past the window returns the previous
//! value without waiting and starts exactly one background fetch, however
//! many reads arrive before it completes.

use classi_storage::{ManualClock, ReadOrigin, RefreshCache};
use classi_test_utils::ClassiResult;
use futures_util::future::join_all;
use proptest::prelude::*;
use std::future::{ready, Ready};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

const KEY: &str = "taxonomy:categories";

/// Single-threaded so background refreshes only run when the test awaits.
fn test_runtime() -> Result<Runtime, TestCaseError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

/// Fetch returning "v1", "v2", ... on successive calls.
fn versioned(calls: &Arc<AtomicUsize>) -> impl FnOnce() -> Ready<ClassiResult<String>> {
    let calls = Arc::clone(calls);
    move || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        ready(Ok(format!("v{}", n)))
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_concurrent_first_reads_fetch_once(readers in 1usize..32) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let cache: RefreshCache<String> = RefreshCache::new();
            let calls = Arc::new(AtomicUsize::new(0));

            let reads = (0..readers).map(|_| cache.get(KEY, Duration::from_secs(60), versioned(&calls)));
            let values: Vec<Arc<String>> = join_all(reads)
                .await
                .into_iter()
                .collect::<ClassiResult<_>>()
                .map_err(|e| TestCaseError::fail(e.to_string()))?;

            prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
            for value in &values {
                prop_assert!(Arc::ptr_eq(&values[0], value));
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_stale_reads_start_one_refresh(
        window_ms in 1u64..10_000,
        overshoot_ms in 0u64..10_000,
        stale_readers in 1usize..16,
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let clock = ManualClock::new();
            let cache: RefreshCache<String> = RefreshCache::with_clock(Arc::new(clock.clone()));
            let calls = Arc::new(AtomicUsize::new(0));
            let window = Duration::from_millis(window_ms);

            cache.get(KEY, window, versioned(&calls)).await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            clock.advance(window + Duration::from_millis(overshoot_ms));

            for _ in 0..stale_readers {
                let read = cache.read(KEY, window, versioned(&calls)).await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert_eq!(read.origin(), ReadOrigin::Stale);
                prop_assert_eq!(read.value().as_str(), "v1");
            }

            cache.wait_for_refresh(KEY).await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(calls.load(Ordering::SeqCst), 2);

            let fresh = cache.read(KEY, window, versioned(&calls)).await
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(fresh.origin(), ReadOrigin::Fresh);
            prop_assert_eq!(fresh.value().as_str(), "v2");
            Ok::<(), TestCaseError>(())
        })?;
    }
}

#[tokio::test]
async fn wrapped_fetch_follows_100ms_scenario() {
    let clock = ManualClock::new();
    let cache: RefreshCache<String> = RefreshCache::with_clock(Arc::new(clock.clone()));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let wrapped = cache.wrap(KEY, Duration::from_millis(100), move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        ready(Ok::<_, classi_test_utils::ClassiError>(format!("v{}", n)))
    });

    assert_eq!(wrapped.get().await.unwrap().as_str(), "v1");

    clock.advance(Duration::from_millis(150));
    assert_eq!(wrapped.get().await.unwrap().as_str(), "v1");
    cache.wait_for_refresh(KEY).await.unwrap();

    clock.advance(Duration::from_millis(50));
    assert_eq!(wrapped.get().await.unwrap().as_str(), "v2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
