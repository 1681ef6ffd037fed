//! `hybrid-chat` command line.
//!
//! Run `hybrid-chat listen` on one side and `hybrid-chat connect` on the
//! other. Lines typed on stdin are encrypted and sent; lines from the peer
//! are printed as `Peer: <text>`. Typing the exit command (`quit`) ends the
//! session on both sides.

use std::{
    io::{self, BufRead},
    process::ExitCode,
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
    time::Duration,
};

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hybrid_chat::{
    protocol::chat::fit_to_record, ChatConfig, ChatEvent, ChatSession, Initiator, Responder,
    Result, SymmetricKey, TcpTransport,
};

/// Console tick between inbound checks
const TICK: Duration = Duration::from_millis(100);

/// Two-party chat over a DES channel keyed through an RSA handshake
#[derive(Parser, Debug)]
#[command(name = "hybrid-chat")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Address to listen on or connect to
    #[arg(long, global = true, default_value = "127.0.0.1:8888")]
    addr: String,

    /// Wait bound for each handshake record, in seconds
    #[arg(long, global = true, default_value_t = 5)]
    handshake_timeout_secs: u64,

    /// Largest chat record in bytes (multiple of 8)
    #[arg(long, global = true, default_value_t = 512)]
    max_message_size: usize,

    /// Skip the handshake and use this 8-character key on both sides
    #[arg(long, global = true)]
    preshared_key: Option<String>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Wait for a peer, generate a key pair and receive the session key
    Listen,

    /// Connect to a listening peer and send it a fresh session key
    Connect,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Session ended with an error");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = ChatConfig::new()
        .with_address(cli.addr)
        .with_handshake_timeout(Duration::from_secs(cli.handshake_timeout_secs))
        .with_max_message_size(cli.max_message_size);
    let preshared = cli
        .preshared_key
        .map(|key| SymmetricKey::from_slice(key.as_bytes()))
        .transpose()?;

    let session = match (cli.command, preshared) {
        (Commands::Listen, None) => Responder::new(config)?.listen()?,
        (Commands::Connect, None) => Initiator::new(config)?.connect()?,
        (Commands::Listen, Some(key)) => {
            let responder = Responder::new(config)?;
            let listener = responder.bind()?;
            let transport = TcpTransport::accept(&listener, responder.config().accept_timeout)?;
            ChatSession::preshared(transport, key, responder.config())?
        }
        (Commands::Connect, Some(key)) => {
            config.validate()?;
            let transport = TcpTransport::connect(&config.address, config.connect_timeout)?;
            ChatSession::preshared(transport, key, &config)?
        }
    };

    info!("Session established, type 'quit' to leave");
    chat_loop(session, spawn_stdin_reader())
}

fn chat_loop(mut session: ChatSession<TcpTransport>, lines: Receiver<String>) -> Result<()> {
    let max_message_size = session.channel().max_message_size();

    loop {
        let event = session.next_event(TICK);
        match event {
            Some(ChatEvent::Message(message)) => {
                println!("Peer: {}", String::from_utf8_lossy(&message));
            }
            Some(ChatEvent::PeerExited) => {
                println!("Peer exited");
                break;
            }
            Some(ChatEvent::Disconnected) => {
                println!("Peer disconnected");
                break;
            }
            Some(ChatEvent::Error(err)) if !err.is_fatal() => {}
            Some(ChatEvent::Error(err)) => return Err(err),
            None if !session.is_open() => break,
            None => {}
        }

        match lines.try_recv() {
            Ok(line) => {
                let line = line.trim_end_matches('\r');
                let text = fit_to_record(line, max_message_size);
                if text.len() < line.len() {
                    warn!(kept = text.len(), dropped = line.len() - text.len(), "Line truncated to fit one record");
                }
                session.send(text.as_bytes())?;
                if !session.is_open() {
                    break;
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                // stdin closed: leave the way typing the exit command would.
                let exit = session.channel().exit_command().to_vec();
                session.send(&exit)?;
                break;
            }
        }
    }

    session.close();
    Ok(())
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Failed to read stdin");
                    break;
                }
            }
        }
    });
    rx
}

/// Initializes the tracing subscriber on stderr.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(io::stderr))
        .with(filter)
        .try_init()
        .ok();
}
