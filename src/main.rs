// EsoxSolutions.ResourcePool
// Thread-safe resource pool with explicit open/close lifecycle

// This is just a binary wrapper - the actual library is in lib.rs
// Run examples with: cargo run --example basic
// Set RUST_LOG=trace to see every pool transition

use esox_resourcepool::{ObjectPool, PoolConfiguration};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();

    println!("=== EsoxSolutions.ResourcePool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    println!("Quick Demo:");
    let pool = ObjectPool::with_resources(
        vec![Arc::new("connection-1".to_string())],
        PoolConfiguration::new().with_name("demo"),
    );
    pool.open();

    let borrowed = match pool.acquire() {
        Ok(resource) => resource,
        Err(error) => {
            eprintln!("  Acquire failed: {error}");
            return;
        }
    };
    println!("  Got resource: {borrowed}");

    let closer = {
        let pool = pool.clone();
        thread::spawn(move || pool.close())
    };

    thread::sleep(Duration::from_millis(50));
    println!("  Releasing while close() waits");
    if let Err(error) = pool.release(&borrowed) {
        eprintln!("  Release failed: {error}");
    }

    match closer.join() {
        Ok(Ok(())) => println!("  Closed, open: {}, resources: {}", pool.is_open(), pool.available_count()),
        Ok(Err(error)) => eprintln!("  Close failed: {error}"),
        Err(_) => eprintln!("  Close thread panicked"),
    }
}
