//! Peril game server: pause control and the game log.

use clap::Parser;

use peril::cli::{self, ServerArgs};
use peril::{FileSink, GameServer, TracingSink};
use peril_transport::{AmqpBroker, Broker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    cli::init_tracing();
    let args = ServerArgs::parse();
    let config = args.config()?;

    println!("Starting Peril server...");
    let broker = AmqpBroker::connect(&config.amqp_url, config.prefetch).await?;
    println!("Connection was successful");

    let started = match &config.game_log_path {
        Some(path) => match FileSink::open(path) {
            Ok(sink) => GameServer::start(broker.clone(), sink).await,
            Err(e) => Err(e.into()),
        },
        None => GameServer::start(broker.clone(), TracingSink).await,
    };
    let server = match started {
        Ok(server) => server,
        Err(e) => {
            broker.close().await?;
            return Err(e.into());
        }
    };
    println!("Type 'help' for commands.");

    let mut lines = cli::stdin_lines();
    let console = cli::run_console(&server, &mut lines).await;

    println!("Shutting down...");
    server.shutdown().await?;
    console?;
    Ok(())
}
