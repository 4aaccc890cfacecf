use phase2_coordinator::{
    commands::{DEFAULT_BEACON_ITERATIONS, DEFAULT_FINAL_NAME},
    environment::{Environment, Settings},
};

use std::{path::PathBuf, time::Duration};
use structopt::{clap::AppSettings, StructOpt};

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Serve the ceremony to participants.
    Serve(ServeOptions),
    /// Apply the public beacon to the last accepted artifact and verify the chain end to end.
    Finalize(FinalizeOptions),
}

#[derive(StructOpt, Debug)]
#[structopt(
    name = "Phase 2 Coordinator",
    author = "The Aleo Team <hello@aleo.org>",
    setting(AppSettings::ColoredHelp),
    setting(AppSettings::DisableHelpSubcommand),
    setting(AppSettings::DisableVersion),
    setting(AppSettings::SubcommandRequiredElseHelp)
)]
pub struct Options {
    #[structopt(subcommand)]
    pub subcommand: Command,
}

#[derive(StructOpt, Debug)]
pub struct ServeOptions {
    /// The ceremony root directory.
    #[structopt(long = "base-directory", parse(from_os_str), default_value = "./ceremony")]
    pub base_directory: PathBuf,

    /// The port to listen on.
    #[structopt(long, default_value = "3000")]
    pub port: u16,

    /// The number of seconds a participant has to submit once granted a turn.
    #[structopt(long = "turn-timeout", default_value = "900")]
    pub turn_timeout: u64,

    /// Log at debug verbosity.
    #[structopt(long)]
    pub development: bool,
}

impl ServeOptions {
    pub fn environment(&self) -> Environment {
        let settings = Settings::new(&self.base_directory)
            .with_port(self.port)
            .with_turn_timeout(Duration::from_secs(self.turn_timeout));
        match self.development {
            true => Environment::Development(settings),
            false => Environment::Production(settings),
        }
    }
}

#[derive(StructOpt, Debug)]
pub struct FinalizeOptions {
    /// The ceremony root directory.
    #[structopt(long = "base-directory", parse(from_os_str), default_value = "./ceremony")]
    pub base_directory: PathBuf,

    /// The public beacon, hex encoded.
    #[structopt(long)]
    pub beacon: String,

    /// The exponent of the number of beacon hash iterations.
    #[structopt(long, default_value = "10")]
    pub iterations: u32,

    /// The display name of the final contribution.
    #[structopt(long, default_value = "Final Beacon phase2")]
    pub name: String,
}

impl FinalizeOptions {
    pub fn environment(&self) -> Environment {
        Environment::Production(Settings::new(&self.base_directory))
    }
}
