//! Lists the input device nodes recio can record.
//!
//! Run with: cargo run --example list_devices

fn main() {
    #[cfg(target_os = "linux")]
    match recio::backend::evdev::discover() {
        Ok(paths) => {
            for path in paths {
                println!("{}", path.display());
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }

    #[cfg(not(target_os = "linux"))]
    {
        eprintln!("list_devices only supports Linux");
        std::process::exit(1);
    }
}
