use std::sync::Arc;

use log::info;

use pagedb::common::{DEFAULT_BUFFER_POOL_SIZE, DEFAULT_DATA_ROOT, DEFAULT_DB, DEFAULT_PORT};
use pagedb::engine::Engine;
use pagedb::server;

fn main() {
    env_logger::init();

    let engine = Arc::new(
        Engine::mount(DEFAULT_DATA_ROOT, DEFAULT_DB, DEFAULT_BUFFER_POOL_SIZE)
            .expect("failed to mount database"),
    );
    info!(
        "mounted database '{}' under {}",
        engine.mounted_db(),
        DEFAULT_DATA_ROOT
    );

    let addr = format!("0.0.0.0:{DEFAULT_PORT}");
    server::run(engine, &addr).expect("server terminated");
}
