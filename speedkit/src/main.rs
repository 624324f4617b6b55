mod bundump;
mod probe;

use std::{path::PathBuf, str::FromStr};

use bundump::{bundump, Bundump};
use clap::{Parser, Subcommand};
use speedkit_bundle::game::Game;
use tracing::{error, info, metadata::LevelFilter};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Subcommand)]
enum Command {
    /// Read data from a bundle.
    ///
    /// Bundle files include .BUN archives as well as the GLOBAL and STREAM packages;
    /// they all use the same chunk container format.
    Bundump {
        /// Bundle to read from.
        filename: PathBuf,

        /// Game whose format dialect the bundle uses.
        #[clap(long, value_parser = Game::from_str)]
        game: Game,

        /// Which part to dump into stdout.
        #[clap(subcommand)]
        what: Bundump,
    },

    /// Detect which game is installed in a directory.
    Detect {
        /// Root directory of the game installation.
        directory: PathBuf,
    },

    /// Detect the installed game and list the bundles it ships.
    Scan {
        /// Root directory of the game installation.
        directory: PathBuf,
    },
}

#[derive(Parser)]
struct Args {
    /// Tool to run.
    #[clap(subcommand)]
    command: Command,
}

fn fallible_main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Bundump {
            filename,
            game,
            what,
        } => bundump(&filename, game, what)?,
        Command::Detect { directory } => probe::detect(&directory)?,
        Command::Scan { directory } => probe::scan(&directory)?,
    }

    Ok(())
}

fn main() {
    let subscriber = tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::DEBUG.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().without_time());
    tracing::subscriber::set_global_default(subscriber)
        .expect("cannot set default tracing subscriber");

    info!("Speed toolkit version {}", env!("CARGO_PKG_VERSION"));

    match fallible_main() {
        Ok(_) => (),
        Err(err) => {
            error!("in fallible_main: {err:?}");
        }
    }
}
