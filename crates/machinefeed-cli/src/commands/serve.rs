use std::time::Duration;

use machinefeed_server::ServerConfig;

pub fn run(data_dir: &str, host: &str, port: u16, interval_ms: u64, queue: usize) {
    let store = super::load_store(data_dir);

    if interval_ms == 0 {
        log::warn!("--interval-ms 0 is not a valid tick interval, using 1 ms");
    }
    let config = ServerConfig {
        host: host.to_string(),
        port,
        tick_interval: Duration::from_millis(interval_ms.max(1)),
        queue_depth: queue,
    };

    let base = format!("ws://{host}:{port}");

    println!("🏭 machinefeed v{}", machinefeed_core::VERSION);
    println!("   {base}");
    println!(
        "   {} machines, {} rows, tick every {} ms",
        store.len(),
        store.total_rows(),
        config.tick_interval.as_millis()
    );
    println!();
    println!("   Endpoints:");
    println!("     WS  /  or /ws         init roster, then one update per tick");
    println!("     GET /machines         Machine roster with row counts");
    println!("     GET /health           Consumer and tick counts");
    println!();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: cannot start runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(machinefeed_server::run_server(store, &config)) {
        eprintln!("Error: server on {host}:{port} failed: {e}");
        std::process::exit(1);
    }
}
