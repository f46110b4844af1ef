use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{Context, Result};
use covidboard::data::load_dir;
use covidboard::engine::{ControlEvent, Dashboard};
use covidboard::logging::{self, json_log, log, log_dataset_loaded, obj, v_str, Domain, Level};
use covidboard::state::Config;
use serde_json::json;

/// Reads control events (one JSON object per line) from stdin and writes
/// the republished snapshot for each accepted event to stdout.
fn main() -> Result<()> {
    let result = run();
    logging::flush();
    result
}

fn run() -> Result<()> {
    let cfg = Config::from_env();
    json_log(
        "startup",
        obj(&[
            ("data_dir", v_str(&cfg.data_dir)),
            ("region1", v_str(&cfg.default_region1)),
            ("region2", v_str(&cfg.default_region2)),
            ("smoothing_options", json!(cfg.smoothing_options)),
        ]),
    );

    let inputs = load_dir(Path::new(&cfg.data_dir)).with_context(|| format!("loading {}", cfg.data_dir))?;
    let mut dash = Dashboard::from_inputs(inputs, cfg)?;
    let store = dash.store();
    log_dataset_loaded(
        store.rows().len(),
        store.region_spans().len(),
        store.forecast_rows().len(),
        store.groups().len(),
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", serde_json::to_string(dash.current_snapshot())?)?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: ControlEvent = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(err) => {
                log(
                    Level::Warn,
                    Domain::Cascade,
                    "bad_event_json",
                    obj(&[("error", v_str(&err.to_string())), ("line", v_str(&line))]),
                );
                continue;
            }
        };
        match dash.dispatch(event) {
            Ok(snapshot) => writeln!(out, "{}", serde_json::to_string(snapshot)?)?,
            // Rejections are logged by the engine; the previous snapshot stands.
            Err(_) => continue,
        }
        out.flush()?;
    }

    log(Level::Info, Domain::System, "shutdown", obj(&[("seq", json!(dash.current_snapshot().seq))]));
    Ok(())
}
