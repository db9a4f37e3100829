//! Demo driver: reads one JSON `SyncRequest` from stdin, executes it
//! against an in-memory database, and prints the JSON `SyncResponse`.
//!
//! ```sh
//! echo '{"tasks":[{"task":"create","container":"items",
//!   "entities":[{"value":{"id":"a"}}]},
//!   {"task":"read","container":"items","ids":["a"]}]}' | demo
//! ```

use std::io::Read;
use std::sync::Arc;

use anyhow::Context;

use synchub_core::SyncRequest;
use synchub_server::{Database, EchoHandler, TaskExecutor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("read request from stdin")?;
    let request: SyncRequest = serde_json::from_str(&input).context("parse sync request")?;

    let executor = TaskExecutor::new(Arc::new(Database::in_memory()));
    executor.dispatcher().register("std.Echo", Arc::new(EchoHandler));

    let response = executor.run_batch(request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
