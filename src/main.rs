use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tray_bridge::toolkit::{platform, HeadlessToolkit};
use tray_bridge::{Event, TrayBridge, TrayConfig, TrayService};

const USAGE: &str = "\
Usage: tray-bridge [--config <path>] [--headless] [toolkit args...]

Shows a tray icon described by a TOML file and prints each activation or
menu selection as a JSON line on stdout.

Options:
  --config <path>  Tray description (default: <config dir>/tray-bridge/tray.toml)
  --headless       Run without a display, using the simulated toolkit
  -h, --help       Show this help";

#[derive(Debug, Default, PartialEq)]
struct Options {
    config: Option<PathBuf>,
    headless: bool,
    toolkit_args: Vec<String>,
}

/// Returns `None` when help was requested.
fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Option<Options>> {
    let mut options = Options::default();
    options.toolkit_args.extend(args.next());

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config requires a path")?;
                options.config = Some(PathBuf::from(path));
            }
            "--headless" => options.headless = true,
            "-h" | "--help" => return Ok(None),
            _ => options.toolkit_args.push(arg),
        }
    }

    Ok(Some(options))
}

fn print_event(event: &Event) -> Result<()> {
    let line = serde_json::to_string(event)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", line)?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let Some(options) = parse_args(std::env::args())? else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = match &options.config {
        Some(path) => TrayConfig::load_from(path)?,
        None => TrayConfig::load()?,
    };

    log::info!("Starting tray bridge for {:?}", config.identity);

    let bridge = Arc::new(TrayBridge::new());
    config.apply_to(&bridge)?;

    let service = if options.headless {
        TrayService::spawn(bridge, HeadlessToolkit::new, options.toolkit_args)?
    } else {
        TrayService::spawn(bridge, platform::native_toolkit, options.toolkit_args)?
    };
    let bridge = Arc::clone(service.bridge());

    let mut ticker = tokio::time::interval(config.poll_interval());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                log::info!("Interrupted, shutting down...");
                break;
            }
            _ = ticker.tick() => {
                for event in bridge.drain_events() {
                    print_event(&event)?;
                    if event.payload() == Some(config.quit_id.as_str()) {
                        log::info!("Quit item selected");
                        bridge.request_quit_safe();
                    }
                }
                if service.is_finished() {
                    break;
                }
            }
        }
    }

    let code = service.stop()?;
    for event in bridge.drain_events() {
        print_event(&event)?;
    }

    log::info!("Tray bridge exited with code {}", code);
    Ok(())
}
