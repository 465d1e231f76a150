//! Panic reporting
//!
//! Release builds write a human-panic crash dump and print the color-eyre report. Debug builds
//! print a full better-panic backtrace instead. Either way the report also lands in the log
//! file, since realtime sessions usually run unattended.

use std::panic::PanicHookInfo;

use color_eyre::{
    config::{HookBuilder, PanicHook},
    eyre::Result,
};

use super::paths::{get_data_dir, LOG_FILE};

pub fn initialize_panic_handler() -> Result<()> {
    let log_path = get_data_dir().join(LOG_FILE.as_str());
    let (panic_hook, eyre_hook) = HookBuilder::default()
        .panic_section(format!(
            "This is a bug. Please report it with the log at {}",
            log_path.display()
        ))
        .capture_span_trace_by_default(false)
        .display_location_section(false)
        .display_env_section(false)
        .into_hooks();
    eyre_hook.install()?;

    std::panic::set_hook(Box::new(move |info| {
        let report = panic_hook.panic_report(info).to_string();
        tracing::error!("Panic: {}", strip_ansi_escapes::strip_str(&report));
        if cfg!(debug_assertions) {
            print_backtrace(info);
        } else {
            print_crash_report(&panic_hook, info);
        }
        std::process::exit(libc::EXIT_FAILURE);
    }));
    Ok(())
}

fn print_crash_report(panic_hook: &PanicHook, info: &PanicHookInfo<'_>) {
    use human_panic::{handle_dump, print_msg, Metadata};

    let meta = Metadata::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        .authors(env!("CARGO_PKG_AUTHORS").replace(':', ", "));
    let dump = handle_dump(&meta, info);
    if print_msg(dump, &meta).is_err() {
        eprintln!("Could not print the crash report");
    }
    eprintln!("{}", panic_hook.panic_report(info));
}

fn print_backtrace(info: &PanicHookInfo<'_>) {
    better_panic::Settings::auto()
        .most_recent_first(false)
        .lineno_suffix(true)
        .verbosity(better_panic::Verbosity::Full)
        .create_panic_handler()(info);
}
