//! Async usage examples

use esox_resourcepool::{ObjectPool, PoolConfiguration};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    println!("=== EsoxSolutions.ResourcePool - Async Examples ===\n");

    // Example 1: Async acquire
    async_acquire().await;

    // Example 2: Async with timeout
    async_with_timeout().await;

    // Example 3: Concurrent access
    concurrent_access().await;
}

fn open_pool(resources: Vec<i32>) -> ObjectPool<i32> {
    ObjectPool::with_resources(
        resources.into_iter().map(Arc::new),
        PoolConfiguration::new().with_open_on_create(true),
    )
}

async fn async_acquire() {
    println!("1. Async Acquire:");
    let pool = open_pool(vec![1, 2, 3]);

    let resource = pool.acquire_async().await.unwrap();
    println!("   Got resource asynchronously: {}", resource);
    pool.release(&resource).unwrap();

    println!();
}

async fn async_with_timeout() {
    println!("2. Async with Timeout:");
    let pool = open_pool(vec![42]);

    // Take the only resource
    let _held = pool.acquire().unwrap();

    match pool.acquire_async_timeout(Duration::from_millis(100)).await {
        Ok(Some(resource)) => println!("   Got resource: {}", resource),
        Ok(None) => println!("   Timed out"),
        Err(e) => println!("   Error: {}", e),
    }

    println!();
}

async fn concurrent_access() {
    println!("3. Concurrent Access:");
    let pool = open_pool(vec![1, 2]);

    let mut handles = vec![];
    for i in 0..5 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            match pool.acquire_async().await {
                Ok(resource) => {
                    println!("   Task {} got resource {}", i, resource);
                    sleep(Duration::from_millis(20)).await;
                    let _ = pool.release(&resource);
                }
                Err(e) => println!("   Task {} failed: {}", i, e),
            }
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    let metrics = pool.get_metrics();
    println!("   Total acquired: {}", metrics.total_acquired);
    println!("   Total released: {}", metrics.total_released);
}
