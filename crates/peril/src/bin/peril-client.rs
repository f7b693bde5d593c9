//! Interactive Peril player.

use clap::Parser;

use peril::cli::{self, ClientArgs};
use peril::PlayerClient;
use peril_transport::{AmqpBroker, Broker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    cli::init_tracing();
    let args = ClientArgs::parse();
    let config = args.config()?;

    println!("Starting Peril client...");
    let broker = AmqpBroker::connect(&config.amqp_url, config.prefetch).await?;
    println!("Connection was successful");

    let mut lines = cli::stdin_lines();
    let username = match &args.username {
        Some(name) => cli::validate_username(name).map(Some),
        None => cli::prompt_username(&mut lines).await,
    };
    let username = match username {
        Ok(Some(name)) => name,
        Ok(None) => {
            broker.close().await?;
            return Ok(());
        }
        Err(e) => {
            broker.close().await?;
            return Err(e.into());
        }
    };

    let client = match PlayerClient::start(broker.clone(), username).await {
        Ok(client) => client,
        Err(e) => {
            broker.close().await?;
            return Err(e.into());
        }
    };
    println!("Welcome, {}! Type 'help' for commands.", client.owner());

    let console = cli::run_console(&client, &mut lines).await;

    println!("Shutting down...");
    client.shutdown().await?;
    console?;
    Ok(())
}
