mod config;
mod console;
mod decoder;
mod keymap;
mod serializer;
mod server;
mod session;
mod sink;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::serializer::Serializer;
use crate::sink::{HidGadgetSink, KeySink, TraceSink};

const USAGE: &str = "\
keybridge - multiplex console and remote keystrokes onto one HID keyboard

Usage: keybridge [OPTIONS]

Options:
      --listen <ADDR>     Bind address for remote sessions
      --device <PATH>     HID gadget device (default /dev/hidg0)
      --dwell-ms <MS>     Press hold time before release
      --settle-ms <MS>    Gap after release
      --no-console        Do not attach the local console
      --dry-run           Log key frames instead of writing to the device
      --init-config       Write the default config file and exit
  -h, --help              Print help
";

#[derive(Clone, Default)]
struct Args {
    listen: Option<String>,
    device: Option<String>,
    dwell_ms: Option<u64>,
    settle_ms: Option<u64>,
    no_console: bool,
    dry_run: bool,
    init_config: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut iter = env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--listen" => {
                args.listen = Some(
                    iter.next()
                        .ok_or_else(|| anyhow::anyhow!("--listen requires an address"))?,
                );
            }
            "--device" => {
                args.device = Some(
                    iter.next()
                        .ok_or_else(|| anyhow::anyhow!("--device requires a path"))?,
                );
            }
            "--dwell-ms" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--dwell-ms requires a value"))?;
                args.dwell_ms = Some(value.parse()?);
            }
            "--settle-ms" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--settle-ms requires a value"))?;
                args.settle_ms = Some(value.parse()?);
            }
            "--no-console" => {
                args.no_console = true;
            }
            "--dry-run" => {
                args.dry_run = true;
            }
            "--init-config" => {
                args.init_config = true;
            }
            "-h" | "--help" => {
                print!("{USAGE}");
                std::process::exit(0);
            }
            other => {
                anyhow::bail!("unknown argument: {other}\n\n{USAGE}");
            }
        }
    }

    Ok(args)
}

/// Apply CLI overrides on top of the on-disk config.
fn merge(mut config: Config, args: &Args) -> Config {
    if let Some(listen) = &args.listen {
        config.listen_addr = listen.clone();
    }
    if let Some(device) = &args.device {
        config.hid_device = device.into();
    }
    if let Some(dwell) = args.dwell_ms {
        config.dwell_ms = dwell;
    }
    if let Some(settle) = args.settle_ms {
        config.settle_ms = settle;
    }
    if args.no_console {
        config.console = false;
    }
    config
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;
    init_tracing();

    let config = merge(Config::load()?, &args);

    if args.init_config {
        config.save()?;
        info!(path = %Config::config_path().display(), "wrote config");
        return Ok(());
    }

    let mut sink: Box<dyn KeySink> = if args.dry_run {
        info!("dry run: key frames are logged, not sent");
        Box::new(TraceSink)
    } else {
        Box::new(HidGadgetSink::new(config.hid_device.clone()))
    };
    if !sink.is_ready() {
        warn!(
            device = %config.hid_device.display(),
            "output sink not ready; keystrokes will be dropped until it appears"
        );
    }

    let serializer = Arc::new(Serializer::new(
        sink,
        Duration::from_millis(config.dwell_ms),
        Duration::from_millis(config.settle_ms),
    ));

    let listener = server::bind(&config.listen_addr).await?;
    let listener_task = tokio::spawn(server::serve(listener, serializer.clone()));

    if config.console {
        console::setup_panic_handler();
        // Console detach (or stdin EOF) ends the process; remote sessions
        // only outlive it in --no-console mode.
        console::run(serializer).await?;
    } else {
        info!("running headless, Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
    }

    listener_task.abort();
    Ok(())
}
