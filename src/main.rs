#[macro_use]
extern crate slog;

use std::thread;

use clap::App;
use clap::Arg;

use fleetwatch::broadcaster::notifier;
use fleetwatch::config::Config;
use fleetwatch::logging;
use fleetwatch::registry::AppContext;
use fleetwatch::scheduler;

/// Parses the command line, loads configuration, and runs forever.
fn run() -> fleetwatch::Result<()> {
    let version = format!(
        "{} [{}; {}]",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_BUILD_HASH"),
        env!("GIT_BUILD_TAINT"),
    );
    let cli_args = App::new("fleetwatch")
        .version(version.as_ref())
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .default_value("fleetwatch.yaml")
                .help("Specifies the configuration file to use")
                .takes_value(true),
        )
        .get_matches();

    let logger = logging::starter();
    info!(logger, "Starting fleetwatch"; "git-taint" => env!("GIT_BUILD_TAINT"));

    let config_location = cli_args.value_of("config").unwrap();
    info!(logger, "Loading configuration ..."; "config" => config_location);
    let config = Config::from_file(config_location)?;

    let logger = logging::configure(config.logging.clone());
    debug!(logger, "Logging configured");

    // Driver and notifier kinds register themselves with their global
    // factories exactly once, before any configuration is resolved
    // against them.
    scheduler::factory::register_builtins();
    notifier::register_builtins();

    info!(logger, "Initialising sub-systems ...");
    let context = AppContext::new(config, logger.clone())?;
    info!(logger, "fleetwatch ready");

    // The Updater and every Manager run on their own background threads;
    // the main thread has nothing left to do but stay alive. `AppContext`
    // has no shutdown API (see DESIGN.md), matching the core's "runs
    // until process exit" concurrency note.
    let _context = context;
    loop {
        thread::park();
    }
}

fn main() {
    if let Err(error) = run() {
        eprintln!("fleetwatch failed: {}", error);
        std::process::exit(1);
    }
}
