//! LAN Broadcast Chat - Entry Point
//!
//! `serve` runs the server alone, `join` runs a client against a running
//! server, and `host` runs both in one process with the local user as the
//! owner session.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use lanchat::config::{DEFAULT_LINES, DEFAULT_PORT, DEFAULT_WIDTH};
use lanchat::{
    connect, AppError, ChatLog, ClientConfig, DuplexSession, Server, ServerConfig, SessionEnd,
    TerminalDisplay, TerminalInput,
};

#[derive(Parser, Debug)]
#[command(name = "lanchat")]
#[command(about = "LAN broadcast chat server and terminal client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the chat server only
    Serve {
        #[command(flatten)]
        server: ServerArgs,
    },
    /// Join a running chat server
    Join {
        /// Server host name or address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Server port
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        #[command(flatten)]
        client: ClientArgs,
    },
    /// Run the server and join it as the owner session
    Host {
        #[command(flatten)]
        server: ServerArgs,

        #[command(flatten)]
        client: ClientArgs,
    },
}

#[derive(Args, Debug)]
struct ServerArgs {
    /// Keep serving after the owner leaves, until everyone has left
    #[arg(short = 'p', long)]
    persistent: bool,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

impl ServerArgs {
    fn config(&self) -> ServerConfig {
        ServerConfig::default()
            .with_addr(SocketAddr::new(self.bind, self.port))
            .with_persistent(self.persistent)
    }
}

#[derive(Args, Debug)]
struct ClientArgs {
    /// Display name (prompted for when omitted)
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Display width in columns
    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: usize,

    /// Display height in lines
    #[arg(long, default_value_t = DEFAULT_LINES)]
    lines: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=lanchat=trace
    let default_filter = match cli.command {
        Command::Serve { .. } => "lanchat=info",
        _ => "lanchat=warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { server } => {
            let reason = Server::bind(server.config())?.run().await?;
            info!("Server finished: {}", reason);
        }
        Command::Join { host, port, client } => {
            let server = resolve(&host, port).await?;
            let Some(config) = client_config(server, client)? else {
                return Ok(());
            };
            run_client(config).await?;
        }
        Command::Host { server, client } => {
            let persistent = server.persistent;
            let chat_server = Server::bind(server.config())?;
            let bound = chat_server.local_addr()?;
            let local = if bound.ip().is_unspecified() {
                SocketAddr::new([127, 0, 0, 1].into(), bound.port())
            } else {
                bound
            };
            if persistent {
                println!("Running server in persistent mode...");
            }
            let server_task = tokio::spawn(chat_server.run());

            let Some(config) = client_config(local, client)? else {
                server_task.abort();
                return Ok(());
            };
            if let Err(e) = run_client(config).await {
                error!("Client error: {}", e);
                if !persistent {
                    // No owner session will ever end; stop serving
                    server_task.abort();
                    return Err(e.into());
                }
            }

            if persistent {
                println!(
                    "Waiting for remaining clients to leave the chat (CTRL + C to force shutdown!)"
                );
            }
            let reason = server_task.await??;
            info!("Server finished: {}", reason);
        }
    }

    Ok(())
}

/// Resolve a host/port pair to the first matching socket address
async fn resolve(host: &str, port: u16) -> Result<SocketAddr, AppError> {
    tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| AppError::InvalidAddress(format!("{}:{}", host, port)))
}

/// Build the client config, asking for a name if none was given
///
/// Returns None if the user closed the prompt.
fn client_config(server: SocketAddr, args: ClientArgs) -> Result<Option<ClientConfig>, AppError> {
    let name = match args.name {
        Some(name) => name,
        None => {
            let mut input = TerminalInput::new()?;
            match input.prompt("What is your name: ")? {
                Some(name) => name.trim().to_string(),
                None => return Ok(None),
            }
        }
    };
    println!("Hello {}!", name);
    Ok(Some(
        ClientConfig::new(server, name).with_display(args.width, args.lines),
    ))
}

/// Connect, then run the duplex session on the terminal
async fn run_client(config: ClientConfig) -> Result<SessionEnd, AppError> {
    let stream = connect(&config).await?;
    println!("Multi-Client Terminal Chat >> {}", config.name);

    let log = ChatLog::shared(config.log_capacity());
    let session = DuplexSession::new(stream, &config, log, Arc::new(TerminalDisplay));
    session.run(TerminalInput::new).await
}
