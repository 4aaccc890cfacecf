mod cli;

use cli::{Command, FinalizeOptions, Options, ServeOptions};
use phase2_coordinator::{
    apis::{routes, Sessions},
    commands::{Beacon, FinalizationOptions, Snarkjs},
    logger::initialize_logger,
    notifications::Dummy,
    Coordinator,
};

use anyhow::Context;
use std::{net::SocketAddr, sync::Arc};
use structopt::StructOpt;
use tracing::{error, info};

async fn serve(options: ServeOptions) -> anyhow::Result<()> {
    let environment = options.environment();
    initialize_logger(&environment);

    let verifier = Arc::new(Snarkjs::new(&environment)?);
    let sessions = Sessions::default();
    let coordinator = Coordinator::new(environment.clone(), verifier, Arc::new(sessions.clone()))?;

    // Sweep for lapsed turns in the background.
    let sweeper = coordinator.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweeper.environment().update_interval());
        loop {
            interval.tick().await;
            if let Err(error) = sweeper.update() {
                error!("Unable to update the coordinator: {}", error);
            }
        }
    });

    let address = SocketAddr::from(([0, 0, 0, 0], environment.port()));
    let (address, server) =
        warp::serve(routes(coordinator, sessions)).bind_with_graceful_shutdown(address, async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down the ceremony server");
            }
        });

    info!("Starting ceremony server on {}", address);
    server.await;
    Ok(())
}

async fn finalize(options: FinalizeOptions) -> anyhow::Result<()> {
    let environment = options.environment();
    initialize_logger(&environment);

    let finalization = FinalizationOptions::new(Beacon::parse(&options.beacon)?, options.iterations, &options.name)?;

    let verifier = Arc::new(Snarkjs::new(&environment)?);
    // Opening the ceremony root fails while a server still owns it.
    let coordinator = Coordinator::new(environment, verifier, Arc::new(Dummy))
        .context("unable to open the ceremony, stop the ceremony server before finalizing")?;

    let record = coordinator.finalize(finalization).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = Options::from_args();

    match options.subcommand {
        Command::Serve(options) => serve(options).await,
        Command::Finalize(options) => finalize(options).await,
    }
}
