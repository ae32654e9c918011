//! metabric-check: run every harness check against the configured cohort csv
//!
//! reads `DATA_PATH`, `FIG_DIR`, `FONT_PATH`; logs via `RUST_LOG` (default info);
//! exits 1 when any check fails.

use std::process;

use log::info;

use metabric_survival::{checks, render, HarnessConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = HarnessConfig::from_env();
    info!("data: {}", config.data_path.display());
    info!("figures: {}", config.fig_dir.display());
    render::register_font(config.font_path.as_deref());

    let summary = checks::run_checks(&config);
    if summary.n_failed() > 0 {
        process::exit(1);
    }
}
