//! recio-record: capture input devices to a text log.

use clap::Parser;
use std::path::PathBuf;
use std::process;

/// Record input device events to a replayable log.
#[derive(Parser)]
#[command(name = "recio-record", version)]
#[command(about = "Record input device events to a replayable log")]
struct Cli {
    /// Mouse input device node, for example /dev/input/event12
    #[arg(short, long)]
    mouse: Option<PathBuf>,

    /// Mouse initial X axis offset, for example 100 or -100
    #[arg(short = 'x', long = "mouse-x", default_value_t = 0, allow_negative_numbers = true)]
    mouse_x: i32,

    /// Mouse initial Y axis offset, for example 100 or -100
    #[arg(short = 'y', long = "mouse-y", default_value_t = 0, allow_negative_numbers = true)]
    mouse_y: i32,

    /// Other input device node path; repeat to record multiple devices
    #[arg(short, long = "device")]
    devices: Vec<PathBuf>,

    /// Write the log to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log debug detail to stderr
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
    use recio::{CapturePlan, MouseCapture, capture};
    use std::fs::File;
    use std::io::{self, BufWriter};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.store(true, Ordering::SeqCst))
        .map_err(|e| recio::Error::Resource(format!("could not install signal handler: {e}")))?;

    let plan = CapturePlan {
        mouse: cli.mouse.map(|path| MouseCapture {
            path,
            x: cli.mouse_x,
            y: cli.mouse_y,
        }),
        devices: cli.devices,
    };

    log::info!("recording {} devices, stop with Ctrl-C", plan.device_count());
    match cli.output {
        Some(path) => {
            let file = File::create(&path)?;
            capture(&EvdevBackend, &plan, BufWriter::new(file), &cancel)
        }
        None => capture(&EvdevBackend, &plan, io::stdout().lock(), &cancel),
    }
}

#[cfg(not(target_os = "linux"))]
fn run(_cli: Cli) -> recio::Result<()> {
    Err(recio::Error::Resource(
        "recio-record only supports Linux".into(),
    ))
}
