//! Basic usage examples for ObjectPool

use esox_resourcepool::{ObjectPool, PoolConfiguration};
use std::sync::Arc;
use std::time::Duration;

fn main() {
    println!("=== EsoxSolutions.ResourcePool - Basic Examples ===\n");

    // Example 1: Simple pool with integers
    simple_pool();

    // Example 2: Leases
    leases();

    // Example 3: Timed and non-blocking acquisition
    timed_acquire();

    // Example 4: Metrics and health
    metrics_and_health();
}

fn simple_pool() {
    println!("1. Simple Pool:");
    let pool = ObjectPool::new(PoolConfiguration::default());
    pool.add(Arc::new(1)).unwrap();
    pool.add(Arc::new(2)).unwrap();

    println!("   Acquire before open: {:?}", pool.acquire().err());
    pool.open();

    let resource = pool.acquire().unwrap();
    println!("   Got resource: {}", resource);
    pool.release(&resource).unwrap();

    println!("   Available after release: {}\n", pool.available_count());
}

fn leases() {
    println!("2. Leases:");
    let pool = ObjectPool::with_resources(
        vec![Arc::new("buffer-a".to_string()), Arc::new("buffer-b".to_string())],
        PoolConfiguration::new().with_open_on_create(true),
    );

    {
        let first = pool.lease().unwrap();
        let second = pool.lease().unwrap();
        println!("   Leased: {} and {}", *first, *second);
        println!("   Busy: {}, Available: {}", pool.busy_count(), pool.available_count());
        // Both released when dropped
    }

    println!("   After drop - Available: {}\n", pool.available_count());
}

fn timed_acquire() {
    println!("3. Timed Acquisition:");
    let pool = ObjectPool::with_resources(
        vec![Arc::new(42)],
        PoolConfiguration::new().with_open_on_create(true),
    );

    let held = pool.acquire().unwrap();
    println!("   Holding: {}", held);

    let attempt = pool.acquire_timeout(Duration::from_millis(50)).unwrap();
    println!("   Timed attempt: {}", if attempt.is_some() { "Success" } else { "Timed out" });

    let attempt = pool.try_acquire().unwrap();
    println!("   Non-blocking attempt: {}", if attempt.is_some() { "Success" } else { "Empty" });

    pool.release(&held).unwrap();
    let attempt = pool.try_acquire().unwrap();
    println!("   After release: {}\n", if attempt.is_some() { "Success" } else { "Empty" });
}

fn metrics_and_health() {
    println!("4. Metrics and Health:");
    let pool = ObjectPool::with_resources(
        (1..=5).map(Arc::new),
        PoolConfiguration::new().with_open_on_create(true),
    );

    {
        let _first = pool.lease().unwrap();
        let _second = pool.lease().unwrap();

        let health = pool.get_health_status();
        println!("   Health: {}", if health.is_healthy { "Healthy" } else { "Unhealthy" });
        println!("   Utilization: {:.1}%", health.utilization * 100.0);
        println!("   Busy: {}, Available: {}", health.busy_resources, health.available_resources);
    }

    let metrics = pool.export_metrics();
    println!("\n   Metrics:");
    for (key, value) in metrics {
        println!("     {}: {}", key, value);
    }
}
