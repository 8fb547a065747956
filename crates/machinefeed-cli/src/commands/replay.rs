use std::io::Write;
use std::time::Duration;

use machinefeed_core::{FeedMessage, ReplayEngine, now_millis};

pub fn run(data_dir: &str, ticks: u64, interval_ms: u64, realtime: bool) {
    let store = super::load_store(data_dir);
    let mut engine = ReplayEngine::new(store);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let pace = realtime.then(|| Duration::from_millis(interval_ms));

    if let Err(e) = write_updates(&mut engine, ticks, now_millis(), interval_ms, pace, &mut out) {
        if e.kind() != std::io::ErrorKind::BrokenPipe {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Write `ticks` update messages as JSON lines, timestamped `start`,
/// `start + interval_ms`, ...
fn write_updates(
    engine: &mut ReplayEngine,
    ticks: u64,
    start: u64,
    interval_ms: u64,
    pace: Option<Duration>,
    out: &mut impl Write,
) -> std::io::Result<()> {
    for i in 0..ticks {
        if i > 0 {
            if let Some(pace) = pace {
                std::thread::sleep(pace);
            }
        }
        let batch = engine.tick(start + i * interval_ms);
        let line = FeedMessage::update(batch)
            .to_json()
            .map_err(std::io::Error::other)?;
        writeln!(out, "{line}")?;
        out.flush()?;
    }
    Ok(())
}
