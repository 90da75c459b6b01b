//! Async mutex and keyed lock behavior.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;
use mission_objects::lock::LockError;
use mission_objects::{AsyncMutex, Error, LockManager, UsageError};

#[tokio::test]
async fn critical_sections_start_in_submission_order() {
    let mutex = AsyncMutex::new("ordered");
    let log = Arc::new(Mutex::new(Vec::new()));

    let calls = [(1, 30u64), (2, 1), (3, 10)].map(|(n, millis)| {
        let log = Arc::clone(&log);
        let mutex = &mutex;
        async move {
            mutex
                .acquire(move |release| {
                    log.lock().unwrap().push(format!("start {}", n));
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(millis)).await;
                        log.lock().unwrap().push(format!("end {}", n));
                        release.release(Ok(n));
                    });
                    Ok(())
                })
                .await
        }
    });

    let results = join_all(calls).await;
    let values: Vec<i32> = results.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(values, vec![1, 2, 3]);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["start 1", "end 1", "start 2", "end 2", "start 3", "end 3"]
    );
}

#[tokio::test]
async fn failing_section_does_not_stall_the_queue() {
    let mutex = Arc::new(AsyncMutex::new("failing"));

    let failing = {
        let mutex = Arc::clone(&mutex);
        tokio::spawn(async move {
            mutex
                .acquire::<(), _>(|_release| Err(UsageError::NotLoaded.into()))
                .await
        })
    };
    let next = {
        let mutex = Arc::clone(&mutex);
        tokio::spawn(async move { mutex.run_exclusive(|| async { "ran" }).await })
    };

    assert!(matches!(
        failing.await.unwrap(),
        Err(Error::Usage(UsageError::NotLoaded))
    ));
    assert_eq!(next.await.unwrap(), "ran");
    assert!(!mutex.is_locked());
}

#[tokio::test]
async fn dropped_release_handle_is_reported() {
    let mutex = AsyncMutex::new("dropped");
    let result: Result<(), Error> = mutex
        .acquire(|release| {
            drop(release);
            Ok(())
        })
        .await;
    assert!(matches!(result, Err(Error::Lock(LockError::Abandoned(_)))));
}

#[tokio::test]
async fn keyed_locks_share_per_key_and_not_across_keys() {
    let locks = LockManager::new();
    let a = locks.get_lock("a");
    assert!(Arc::ptr_eq(&a, &locks.get_lock("a")));

    let b = locks.get_lock("b");
    let both = a
        .run_exclusive(|| async {
            assert!(a.is_locked());
            b.run_exclusive(|| async { b.is_locked() }).await
        })
        .await;
    assert!(both);
    assert_eq!(locks.len(), 2);
}
