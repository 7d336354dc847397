//! Single-flight behavior under a multi-threaded runtime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flightcache_cache::{CacheResolver, ResolveError, ResolveOptions};
use tokio::sync::Barrier;
use tokio_test::{assert_err, assert_ok};

type Resolver = CacheResolver<Arc<String>, String>;

async fn explode() -> Result<Arc<String>, String> {
    panic!("producer exploded")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_callers_run_producer_once() {
    let resolver = Resolver::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(32));

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let resolver = resolver.clone();
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                resolver
                    .get_or_resolve("shared", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(Arc::new(format!("caller-{i}")))
                    })
                    .await
            })
        })
        .collect();

    let mut values = Vec::new();
    for task in tasks {
        values.push(assert_ok!(task.await.expect("task panicked")));
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(values.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_keys_compute_independently() {
    let resolver = Resolver::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let resolver = resolver.clone();
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                resolver
                    .get_or_resolve(format!("key-{i}"), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Arc::new(i.to_string()))
                    })
                    .await
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let value = assert_ok!(task.await.expect("task panicked"));
        assert_eq!(*value, i.to_string());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 16);
    assert_eq!(resolver.len(), 16);
}

#[tokio::test]
async fn test_dropped_callers_do_not_cancel_computation() {
    let resolver = Resolver::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();

    {
        let calls = Arc::clone(&calls);
        let pending = resolver.get_or_resolve("k", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = done_tx.send(());
            Ok(Arc::new("finished".to_string()))
        });
        drop(pending);
    }

    assert_ok!(done_rx.await);
    let value = assert_ok!(
        resolver
            .get_or_resolve("k", || async { Ok(Arc::new("recomputed".to_string())) })
            .await
    );
    assert_eq!(*value, "finished");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_producer_may_resolve_other_keys() {
    let resolver = Resolver::new();
    let inner = resolver.clone();

    let value = assert_ok!(
        resolver
            .get_or_resolve("outer", move || async move {
                let dependency = inner
                    .get_or_resolve("inner", || async { Ok(Arc::new("dep".to_string())) })
                    .await
                    .map_err(|err| err.to_string())?;
                Ok::<_, String>(Arc::new(format!("outer+{dependency}")))
            })
            .await
    );

    assert_eq!(*value, "outer+dep");
    assert!(resolver.contains_key("outer"));
    assert!(resolver.contains_key("inner"));
}

#[tokio::test]
async fn test_panicking_producer_is_reported_and_evicted() {
    let resolver = Resolver::new();

    let err = assert_err!(
        resolver
            .get_or_resolve("k", explode)
            .await
    );
    assert!(matches!(err, ResolveError::ProducerPanicked { ref key } if key == "k"));
    assert!(!resolver.contains_key("k"));

    let value = assert_ok!(
        resolver
            .get_or_resolve("k", || async { Ok(Arc::new("recovered".to_string())) })
            .await
    );
    assert_eq!(*value, "recovered");
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_is_superseded_not_swept() {
    let resolver = Resolver::new();

    let options = ResolveOptions::new()
        .key("k")
        .producer(|| async { Ok(Arc::new("v1".to_string())) })
        .ttl_seconds(0.01);
    assert_ok!(resolver.resolve(options).await);

    tokio::time::advance(Duration::from_millis(50)).await;
    assert!(resolver.contains_key("k"));
    assert_eq!(resolver.len(), 1);

    let value = assert_ok!(
        resolver
            .get_or_resolve("k", || async { Ok(Arc::new("v2".to_string())) })
            .await
    );
    assert_eq!(*value, "v2");
    assert_eq!(resolver.len(), 1);
}

#[tokio::test]
async fn test_independent_resolvers_do_not_share_entries() {
    let first = Resolver::new();
    let second = Resolver::new();

    assert_ok!(first.get_or_resolve("k", || async { Ok(Arc::new("first".to_string())) }).await);
    let value = assert_ok!(
        second
            .get_or_resolve("k", || async { Ok(Arc::new("second".to_string())) })
            .await
    );

    assert_eq!(*value, "second");
    first.flush();
    assert!(first.is_empty());
    assert_eq!(second.len(), 1);
}
