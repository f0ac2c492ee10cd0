//! Advanced features: removal of borrowed resources, close semantics, cancellation

use esox_resourcepool::{ObjectPool, PoolConfiguration, ReleasePolicy};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct Connection {
    id: usize,
    data: String,
}

impl Connection {
    fn new(id: usize) -> Arc<Self> {
        Arc::new(Self {
            id,
            data: format!("Connection-{}", id),
        })
    }
}

fn connection_pool(connections: &[Arc<Connection>]) -> ObjectPool<Connection> {
    ObjectPool::with_resources(
        connections.iter().cloned(),
        PoolConfiguration::new().with_name("connections").with_open_on_create(true),
    )
}

fn main() {
    println!("=== EsoxSolutions.ResourcePool - Advanced Features ===\n");

    // Example 1: Retiring a borrowed resource
    retire_borrowed();

    // Example 2: Graceful and forced close
    close_semantics();

    // Example 3: Cancellation
    cancellation();

    // Example 4: Strict release policy
    strict_release();

    // Example 5: Prometheus metrics
    prometheus_export();
}

fn retire_borrowed() {
    println!("1. Retiring a Borrowed Resource:");
    let connections = [Connection::new(1), Connection::new(2)];
    let pool = connection_pool(&connections);

    let borrowed = pool.acquire().unwrap();
    println!("   Borrowed {}", borrowed.data);

    let remover = {
        let pool = pool.clone();
        let target = Arc::clone(&borrowed);
        thread::spawn(move || pool.remove(&target))
    };

    thread::sleep(Duration::from_millis(50));
    println!("   Pending removals: {}", pool.pending_removal_count());
    pool.release(&borrowed).unwrap();

    println!("   Removed: {:?}", remover.join().unwrap());
    println!("   Still tracked: {}", pool.contains(&borrowed));
    println!("   Available: {}\n", pool.available_count());
}

fn close_semantics() {
    println!("2. Graceful and Forced Close:");
    let connections = [Connection::new(1)];
    let pool = connection_pool(&connections);

    let borrowed = pool.acquire().unwrap();
    let closer = {
        let pool = pool.clone();
        thread::spawn(move || pool.close())
    };

    thread::sleep(Duration::from_millis(50));
    println!("   Open while close waits: {}", pool.is_open());
    pool.release(&borrowed).unwrap();
    println!("   Close result: {:?}", closer.join().unwrap());

    pool.open();
    pool.add(Connection::new(2)).unwrap();
    let _abandoned = pool.acquire().unwrap();
    pool.close_now();
    println!("   After close_now - busy: {}, open: {}\n", pool.busy_count(), pool.is_open());
}

fn cancellation() {
    println!("3. Cancellation:");
    let pool = connection_pool(&[]);
    let token = pool.cancel_token();

    let waiter = {
        let pool = pool.clone();
        let token = token.clone();
        thread::spawn(move || pool.acquire_cancellable(&token))
    };

    thread::sleep(Duration::from_millis(50));
    token.cancel();
    match waiter.join().unwrap() {
        Ok(connection) => println!("   Got connection {}", connection.id),
        Err(e) => println!("   Waiter stopped: {}", e),
    }
    println!();
}

fn strict_release() {
    println!("4. Strict Release Policy:");
    let pool = ObjectPool::with_resources(
        [Connection::new(7)],
        PoolConfiguration::new()
            .with_open_on_create(true)
            .with_release_policy(ReleasePolicy::Reject),
    );

    let borrowed = pool.acquire().unwrap();
    println!("   First release: {:?}", pool.release(&borrowed));
    println!("   Second release: {:?}\n", pool.release(&borrowed));
}

fn prometheus_export() {
    println!("5. Prometheus Metrics:");
    let connections = [Connection::new(1), Connection::new(2), Connection::new(3)];
    let pool = connection_pool(&connections);

    let _lease = pool.lease().unwrap();

    let mut tags = HashMap::new();
    tags.insert("service".to_string(), "api".to_string());

    match pool.export_metrics_prometheus("connections", Some(&tags)) {
        Ok(output) => println!("{}", output),
        Err(e) => println!("   Export failed: {}", e),
    }
}
