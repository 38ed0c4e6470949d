//! recio-replay: replay a recorded log through virtual devices.

use clap::Parser;
use std::path::PathBuf;
use std::process;

/// Replay a recorded device log through uinput virtual devices.
#[derive(Parser)]
#[command(name = "recio-replay", version)]
#[command(about = "Replay a recorded device log through virtual devices")]
struct Cli {
    /// Log file to replay; reads stdin when omitted
    input: Option<PathBuf>,

    /// Pacing multiplier: 1.0 replays at the recorded speed, 2.0 at double
    /// speed
    #[arg(short, long, default_value_t = 1.0)]
    speed: f64,

    /// Dump the parsed device table to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn init_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

#[cfg(target_os = "linux")]
fn run(cli: Cli) -> recio::Result<()> {
    use recio::backend::evdev::EvdevBackend;
    use recio::{ReplayOptions, replay};
    use std::fs::File;
    use std::io::{self, BufReader};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.store(true, Ordering::SeqCst))
        .map_err(|e| recio::Error::Resource(format!("could not install signal handler: {e}")))?;

    let options = ReplayOptions { speed: cli.speed };
    match cli.input {
        Some(path) => {
            let file = File::open(&path)?;
            replay(&EvdevBackend, BufReader::new(file), &options, &cancel)
        }
        None => replay(&EvdevBackend, io::stdin().lock(), &options, &cancel),
    }
}

#[cfg(not(target_os = "linux"))]
fn run(_cli: Cli) -> recio::Result<()> {
    Err(recio::Error::Resource(
        "recio-replay only supports Linux".into(),
    ))
}
