//! Run a binary that is already in memory, with lifecycle hooks attached.
//!
//! Run with: `cargo run --example run_embedded`
//!
//! Set `MEMRUN_BINARY` to load something other than `/bin/sh`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use memrun::{Config, Session};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("memrun=debug")
        .with_target(false)
        .init();

    let path = std::env::var("MEMRUN_BINARY").unwrap_or_else(|_| "/bin/sh".to_string());
    println!("Reading binary from: {path}");
    let binary = std::fs::read(&path)?;

    let runs = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&runs);

    let session = Session::new(
        Config::builder()
            .binary(binary)
            .arg0("sh")
            .on_start(|| println!("  [hook] starting"))
            .on_stop(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                println!("  [hook] stopped (run #{n})");
            })
            .on_background(|| println!("  [hook] background task"))
            .build(),
    )?;
    println!();

    // Example 1: Blocking run
    println!("=== Example 1: Blocking run ===");
    let output = session.run(["-c", "echo hello from memory"])?;
    println!("Output: {}", output.stdout_lossy().trim_end());
    println!("Duration: {:?}", output.duration);
    println!();

    // Example 2: A failing run with an error handler
    println!("=== Example 2: Error handler ===");
    let result = session.run_with_handler(["-c", "echo oops >&2; exit 3"], |error| {
        println!("  [handler] {error}");
    });
    if let Err(error) = result {
        println!("Run failed: {error}");
    }
    println!();

    // Example 3: Background run
    println!("=== Example 3: Background run ===");
    let (tx, rx) = std::sync::mpsc::channel();
    session.run_async(["-c", "sleep 0.1; echo done in background"], move |result| {
        let _ = tx.send(result);
    });
    println!("run_async returned immediately");
    let output = rx.recv()??;
    println!("Output: {}", output.stdout_lossy().trim_end());
    println!();

    session.close()?;
    println!("Session closed after {} runs", runs.load(Ordering::SeqCst));

    // Further runs are rejected.
    if let Err(error) = session.run(["-c", "true"]) {
        println!("Run after close: {error}");
    }

    let stats = session.stats();
    println!(
        "Stats: {} runs, {} failed, {:?} total",
        stats.run_count, stats.failed_runs, stats.total_run_time
    );

    Ok(())
}
