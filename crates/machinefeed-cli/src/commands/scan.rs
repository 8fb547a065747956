use std::fmt::Write;

use machinefeed_core::RecordStore;

pub fn run(data_dir: &str) {
    let store = super::load_store(data_dir);
    print!("{}", render(&store));
}

fn render(store: &RecordStore) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Found {} machine(s):\n", store.len());
    for machine in store.iter() {
        let _ = writeln!(out, "  {:<30} {:>8} rows", machine.id(), machine.len());
    }
    let _ = writeln!(out, "\n{} rows total", store.total_rows());
    out
}
