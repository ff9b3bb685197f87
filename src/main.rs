mod cli;

use std::process::ExitCode;

use clap::Parser;
use kqwatch::conf::Config;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
fn run(cli: Cli, config: Config) -> kqwatch::Result<()> {
    use std::io::{self, Write};

    use kqwatch::conf::WatchConf;
    use kqwatch::{Event, KqueueWatcher, Watcher};
    use tracing::info;

    let (tx, rx) = crossbeam_channel::bounded(config.channel_capacity);
    let watcher = KqueueWatcher::new(tx)?;

    let extra = cli.paths.into_iter().map(|path| WatchConf {
        path,
        events: Event::all(),
    });
    for watch in config.watch.into_iter().chain(extra) {
        watcher.watch(&watch.path, watch.events)?;
        info!(path = %watch.path.display(), events = ?watch.events, "watching");
    }

    // The monitor owns the only sender, so this ends when it stops.
    let mut out = io::stdout().lock();
    for event in rx.iter() {
        serde_json::to_writer(&mut out, &event)?;
        writeln!(out)?;
        out.flush()?;
    }
    watcher.join()
}

#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
)))]
fn run(_cli: Cli, _config: Config) -> kqwatch::Result<()> {
    Err(kqwatch::Error::Unsupported)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("kqwatch: {}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
