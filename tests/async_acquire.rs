use esox_resourcepool::{ObjectPool, PoolConfiguration, PoolError};
use std::sync::Arc;
use std::time::Duration;

fn open_pool() -> ObjectPool<u32> {
    ObjectPool::new(PoolConfiguration::new().with_open_on_create(true))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn waiters_are_served_by_adds() {
    let pool = open_pool();
    let mut waiters = Vec::new();
    for _ in 0..3 {
        let pool = pool.clone();
        waiters.push(tokio::spawn(async move { pool.acquire_async().await }));
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    for id in 0..3 {
        pool.add(Arc::new(id)).unwrap();
    }

    let mut served = Vec::new();
    for waiter in waiters {
        let resource = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter was not woken")
            .unwrap()
            .unwrap();
        served.push(*resource);
    }
    served.sort_unstable();
    assert_eq!(served, vec![0, 1, 2]);
    assert_eq!(pool.busy_count(), 3);
}

#[tokio::test]
async fn dropped_wait_leaves_pool_untouched() {
    let pool = open_pool();
    let resource = Arc::new(1);
    pool.add(Arc::clone(&resource)).unwrap();
    let held = pool.acquire().unwrap();

    assert_eq!(pool.acquire_async_timeout(Duration::from_millis(10)).await, Ok(None));
    assert_eq!(pool.busy_count(), 1);
    assert_eq!(pool.available_count(), 0);

    pool.release(&held).unwrap();
    let reacquired = pool.acquire_async().await.unwrap();
    assert!(Arc::ptr_eq(&reacquired, &resource));
}

#[tokio::test]
async fn async_acquire_on_closed_pool() {
    let pool = ObjectPool::<u32>::default();
    pool.add(Arc::new(1)).unwrap();

    assert_eq!(pool.acquire_async().await, Err(PoolError::NotOpen));
    assert_eq!(
        pool.acquire_async_timeout(Duration::from_secs(1)).await,
        Err(PoolError::NotOpen)
    );
}

#[tokio::test]
async fn graceful_close_fails_async_waiters() {
    let pool = open_pool();
    let held = {
        pool.add(Arc::new(1)).unwrap();
        pool.acquire().unwrap()
    };

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire_async().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let closer = {
        let pool = pool.clone();
        tokio::task::spawn_blocking(move || pool.close())
    };

    assert_eq!(waiter.await.unwrap(), Err(PoolError::NotOpen));
    pool.release(&held).unwrap();
    assert_eq!(closer.await.unwrap(), Ok(()));
    assert!(!pool.is_open());
}
