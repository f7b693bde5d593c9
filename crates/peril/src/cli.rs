//! Command-line plumbing shared by the `peril-client` and `peril-server`
//! binaries: flags, logging setup and the interactive console loop.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use peril_game::GameError;
use peril_transport::Broker;

use crate::client::{PlayerClient, Reply};
use crate::server::GameServer;
use crate::{PerilConfig, PerilError};

/// Broker flags understood by both binaries.
#[derive(Args, Debug, Clone, Default)]
pub struct BrokerArgs {
    /// AMQP URL of the broker [env: PERIL_AMQP_URL]
    #[arg(long)]
    pub amqp_url: Option<String>,

    /// Unsettled deliveries per consumer [env: PERIL_PREFETCH]
    #[arg(long)]
    pub prefetch: Option<u16>,
}

impl BrokerArgs {
    /// Layers the flags over `config`.
    pub fn apply(&self, mut config: PerilConfig) -> PerilConfig {
        if let Some(url) = &self.amqp_url {
            config = config.amqp_url(url.clone());
        }
        if let Some(prefetch) = self.prefetch {
            config = config.prefetch(prefetch);
        }
        config
    }
}

/// Join a game of Peril as a player
#[derive(Parser, Debug)]
#[command(name = "peril-client", version)]
pub struct ClientArgs {
    /// Player name; asked for on the console when omitted
    #[arg(short, long)]
    pub username: Option<String>,

    #[command(flatten)]
    pub broker: BrokerArgs,
}

impl ClientArgs {
    pub fn config(&self) -> Result<PerilConfig, PerilError> {
        Ok(self.broker.apply(PerilConfig::from_env()?))
    }
}

/// Run the Peril game server
#[derive(Parser, Debug)]
#[command(name = "peril-server", version)]
pub struct ServerArgs {
    /// Append game logs to this file instead of the process log
    /// [env: PERIL_GAME_LOG]
    #[arg(long)]
    pub game_log: Option<PathBuf>,

    #[command(flatten)]
    pub broker: BrokerArgs,
}

impl ServerArgs {
    pub fn config(&self) -> Result<PerilConfig, PerilError> {
        let mut config = self.broker.apply(PerilConfig::from_env()?);
        if let Some(path) = &self.game_log {
            config = config.game_log_path(path.clone());
        }
        Ok(config)
    }
}

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides the
/// default `info` level. Logs go to stderr so they don't mix with the
/// console prompt.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

/// Line reader over standard input.
pub type ConsoleLines = Lines<BufReader<Stdin>>;

pub fn stdin_lines() -> ConsoleLines {
    BufReader::new(tokio::io::stdin()).lines()
}

/// Player names become routing-key words, so they must be a single word
/// without topic wildcards.
pub fn validate_username(name: &str) -> Result<String, PerilError> {
    let name = name.trim();
    let valid = !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '.' | '*' | '#'));
    if valid {
        Ok(name.to_string())
    } else {
        Err(GameError::Usage("a username is one word without '.', '*' or '#'").into())
    }
}

/// Resolves on the first SIGINT or SIGTERM (Ctrl-C elsewhere).
pub async fn shutdown_signal() -> Result<(), PerilError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigint.recv() => tracing::info!("received SIGINT"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("received Ctrl-C");
    }

    Ok(())
}

/// Asks for a username until a valid one is entered.
///
/// Returns `None` if input ends or a shutdown signal arrives first.
pub async fn prompt_username<R>(lines: &mut Lines<R>) -> Result<Option<String>, PerilError>
where
    R: AsyncBufRead + Unpin,
{
    prompt_username_until(lines, shutdown_signal()).await
}

/// [`prompt_username`] that gives up when `shutdown` resolves.
pub async fn prompt_username_until<R, S>(
    lines: &mut Lines<R>,
    shutdown: S,
) -> Result<Option<String>, PerilError>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = Result<(), PerilError>>,
{
    tokio::pin!(shutdown);
    loop {
        print_prompt("Please enter your username: ")?;
        let line = tokio::select! {
            biased;
            result = &mut shutdown => {
                result?;
                println!();
                return Ok(None);
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            return Ok(None);
        };
        match validate_username(&line) {
            Ok(name) => return Ok(Some(name)),
            Err(e) => println!("{e}"),
        }
    }
}

fn print_prompt(prompt: &str) -> Result<(), PerilError> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    Ok(())
}

/// Something that runs console lines.
pub trait Console {
    fn execute_line(
        &self,
        line: &str,
    ) -> impl Future<Output = Result<Option<Reply>, PerilError>>;
}

impl<B: Broker> Console for PlayerClient<B> {
    async fn execute_line(&self, line: &str) -> Result<Option<Reply>, PerilError> {
        PlayerClient::execute_line(self, line).await
    }
}

impl<B: Broker> Console for GameServer<B> {
    async fn execute_line(&self, line: &str) -> Result<Option<Reply>, PerilError> {
        GameServer::execute_line(self, line).await
    }
}

/// Reads commands until `quit`, end of input, or a shutdown signal.
///
/// Command errors are printed and the loop continues; only a failure to
/// read the console ends it with an error. Either way the caller still
/// owns the runtime and should shut it down.
pub async fn run_console<C, R>(console: &C, lines: &mut Lines<R>) -> Result<(), PerilError>
where
    C: Console,
    R: AsyncBufRead + Unpin,
{
    run_console_until(console, lines, shutdown_signal()).await
}

/// [`run_console`] that stops when `shutdown` resolves.
pub async fn run_console_until<C, R, S>(
    console: &C,
    lines: &mut Lines<R>,
    shutdown: S,
) -> Result<(), PerilError>
where
    C: Console,
    R: AsyncBufRead + Unpin,
    S: Future<Output = Result<(), PerilError>>,
{
    tokio::pin!(shutdown);
    loop {
        print_prompt("> ")?;
        let line = tokio::select! {
            biased;
            result = &mut shutdown => {
                result?;
                println!();
                return Ok(());
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            return Ok(());
        };

        match console.execute_line(&line).await {
            Ok(Some(Reply::Print(text))) => println!("{text}"),
            Ok(Some(Reply::Quit)) => return Ok(()),
            Ok(None) => {}
            Err(e) if e.is_user_error() => println!("{e}"),
            Err(e) => {
                tracing::warn!(error = %e, "command failed");
                println!("command failed: {e}");
            }
        }
    }
}
