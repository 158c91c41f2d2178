#![cfg(not(target_arch = "wasm32"))]

use std::backtrace::Backtrace;
use std::fs::File;
use std::io::Write;
use std::panic;
use std::path::PathBuf;

use anyhow::Context;
use log::{error, info, LevelFilter};

use frustum_cull::AppConfig;

const CRASH_LOG: &str = "cull_crash.log";

fn main() {
    setup_diagnostics();

    info!("Starting frustum culling demo...");

    match panic::catch_unwind(run) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            error!("{err:#}");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Terminated abruptly: {:?}", e);
            std::process::exit(1);
        }
    }
}

/// Usage: `frustum_cull [config.json]`
fn run() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("loading configuration")?;
    frustum_cull::run_native(config).context("running the demo")?;
    Ok(())
}

/// Sets up logging and crash dumping
fn setup_diagnostics() {
    env_logger::Builder::new()
        .filter_level(if cfg!(debug_assertions) {
            LevelFilter::Debug
        } else {
            LevelFilter::Warn
        })
        .format_timestamp_millis()
        .format_target(false)
        .parse_default_env()
        .init();

    panic::set_hook(Box::new(|panic_info| {
        let backtrace = Backtrace::force_capture();

        let msg = match panic_info.payload().downcast_ref::<&'static str>() {
            Some(s) => *s,
            None => match panic_info.payload().downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<dyn Any>",
            },
        };

        let location = panic_info.location().map_or("Unknown location".to_string(), |loc| {
            format!("{}:{}", loc.file(), loc.line())
        });

        let crash_msg = format!(
            "=== CULLING DEMO CRASH ===\nReason: {}\nLocation: {}\n\nStack Trace:\n{}",
            msg, location, backtrace
        );

        eprintln!("\x1b[31;1m{}\x1b[0m", crash_msg);

        if let Ok(mut file) = File::create(CRASH_LOG) {
            let _ = file.write_all(crash_msg.as_bytes());
            eprintln!("Crash report saved to {CRASH_LOG}");
        }
    }));
}
