// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod cli;
mod config;
mod console;

use clap::Parser;
use log::{debug, error, info, warn};
use skyspy_client::poll::PollerCommand;
use skyspy_client::{EntityTable, HttpFeed, Poller};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use cli::Opts;
use config::AppConfig;
use console::{parse_command, ConsoleInput, ConsoleView, HELP};

/// Read console commands until quit, EOF or shutdown.
///
/// Runs on its own thread: a blocking stdin read must not hold up runtime
/// shutdown.
fn read_commands(commands: mpsc::Sender<PollerCommand>, cancel: CancellationToken) {
    for line in std::io::stdin().lines() {
        if cancel.is_cancelled() {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read stdin: {e}");
                return;
            }
        };

        match parse_command(&line) {
            Ok(Some(ConsoleInput::Command(command))) => {
                if commands.blocking_send(command).is_err() {
                    return;
                }
            }
            Ok(Some(ConsoleInput::Help)) => println!("{HELP}"),
            Ok(Some(ConsoleInput::Quit)) => {
                cancel.cancel();
                return;
            }
            Ok(None) => {}
            Err(e) => println!("{e}"),
        }
    }
    debug!("stdin closed, console commands disabled");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::parse();

    // RUST_LOG, when set, refines the -v level
    env_logger::Builder::new()
        .filter_level(opts.log_level())
        .parse_default_env()
        .init();

    let loaded = match &opts.config {
        Some(path) => AppConfig::load_path(path),
        None => AppConfig::load(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config, using defaults: {e}");
            AppConfig::default()
        }
    };
    opts.apply(&mut config);

    if opts.save_config {
        config.save(opts.config.as_deref())?;
        match &opts.config {
            Some(path) => info!("Saved configuration to {}", path.display()),
            None => {
                if let Ok(path) = AppConfig::get_config_path() {
                    info!("Saved configuration to {}", path.display());
                }
            }
        }
    }

    info!("Feed at {}", config.feed_url);

    let feed = HttpFeed::new(config.feed_url.clone());
    let table = EntityTable::new(config.tracker_config());
    let poller = Poller::new(feed, table, config.poller_config());

    let cancel = CancellationToken::new();
    let (commands, rx) = mpsc::channel(32);

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, shutting down");
                ctrl_c.cancel();
            }
            Err(e) => error!("Failed to listen for ctrl-c: {e}"),
        }
    });
    let stdin_cancel = cancel.clone();
    std::thread::spawn(move || read_commands(commands, stdin_cancel));

    let mut view = ConsoleView::new(std::io::stdout(), &config, opts.json);
    let poller = poller.run(&mut view, rx, cancel).await;

    let status = poller.status();
    info!(
        "Stopped with {} entities tracked, {} ticks skipped",
        poller.table().len(),
        status.skipped_ticks
    );
    Ok(())
}
