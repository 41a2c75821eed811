//! roomlink chat client.
//!
//! # Usage
//!
//! ```bash
//! # Join #general on a local server
//! roomlink --username alice
//!
//! # Join #random on a TLS server with a tighter retry budget
//! roomlink --host chat.example.com --secure --username alice --room random --max-retries 3
//! ```

use std::{
    io::{self, Write},
    time::Duration,
};

use clap::Parser;
use roomlink_client::{
    ClientConfig, Command, HttpCatalog, Runtime, RuntimeError, SystemEnv, Wake, WsTransport,
};
use roomlink_core::ConnectionError;
use roomlink_proto::{DEFAULT_HOST, InboundMessage, MessageKind};
use roomlink_session::{DEFAULT_ROOM, NoticeLevel, SessionNotice};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type ClientRuntime = Runtime<WsTransport, HttpCatalog, SystemEnv>;

/// Line-oriented chat client
#[derive(Parser, Debug)]
#[command(name = "roomlink")]
#[command(about = "Chat client with automatic reconnection")]
#[command(version)]
struct Args {
    /// Chat server address (host:port)
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Connect with wss/https
    #[arg(long)]
    secure: bool,

    /// Display name
    #[arg(short, long)]
    username: String,

    /// Room to join
    #[arg(short, long, default_value = DEFAULT_ROOM)]
    room: String,

    /// Reconnect attempts after the connection drops
    #[arg(long, default_value = "5")]
    max_retries: u32,

    /// Delay between reconnect attempts in milliseconds
    #[arg(long, default_value = "3000")]
    retry_delay_ms: u64,

    /// Time allowed to connect in milliseconds
    #[arg(long, default_value = "10000")]
    connect_timeout_ms: u64,

    /// Time allowed for a room list request in milliseconds
    #[arg(long, default_value = "5000")]
    catalog_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// What the main loop woke up for.
enum Input {
    Line(io::Result<Option<String>>),
    Wake(Wake),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let config = ClientConfig::new(args.host)
        .with_secure(args.secure)
        .with_max_retries(args.max_retries)
        .with_retry_delay(Duration::from_millis(args.retry_delay_ms))
        .with_connect_timeout(Duration::from_millis(args.connect_timeout_ms))
        .with_catalog_timeout(Duration::from_millis(args.catalog_timeout_ms));

    let catalog = HttpCatalog::new(&config.endpoint, config.catalog_timeout)?;
    let mut runtime = Runtime::new(&config, WsTransport::new(), catalog, SystemEnv::new());
    subscribe(&mut runtime);

    tracing::info!(host = %config.endpoint.host, "roomlink starting");
    runtime.login(&args.username, &args.room).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut unsent: Option<String> = None;

    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line),
            wake = runtime.wait() => Input::Wake(wake),
        };

        match input {
            Input::Wake(wake) => {
                runtime.dispatch(wake).await?;
            },
            Input::Line(Ok(Some(line))) => {
                let Some(command) = Command::parse(&line) else {
                    continue;
                };
                if !run_command(&mut runtime, command, &mut unsent).await? {
                    break;
                }
            },
            Input::Line(Ok(None)) => break,
            Input::Line(Err(e)) => return Err(e.into()),
        }
    }

    runtime.logout().await;
    Ok(())
}

/// Execute one command. Returns false when the user asked to quit.
async fn run_command(
    runtime: &mut ClientRuntime,
    command: Command,
    unsent: &mut Option<String>,
) -> Result<bool, RuntimeError> {
    match command {
        Command::Say(text) => {
            if runtime.send_message(&text) {
                *unsent = None;
            } else {
                *unsent = Some(text);
                say("(message kept, /retry to resend)")?;
            }
        },
        Command::Retry => match unsent.take() {
            Some(text) => {
                if !runtime.send_message(&text) {
                    *unsent = Some(text);
                }
            },
            None => say("nothing to resend")?,
        },
        Command::Join(room) => {
            if let Err(e) = runtime.create_or_join_room(&room).await {
                tracing::debug!(error = %e, %room, "join failed");
            }
        },
        Command::Rooms => {
            runtime.refresh_catalog().await;
            let session = runtime.session();
            let active = session.active_room().unwrap_or_default();
            for room in session.rooms_to_display() {
                let unread = session.state().map_or(0, |state| state.unread(&room.room_id));
                let marker = if room.room_id == active { "*" } else { " " };
                let members = room.members.iter().cloned().collect::<Vec<_>>().join(", ");
                say(&format!("{marker} #{} ({unread} unread) [{members}]", room.room_id))?;
            }
        },
        Command::Read(room) => {
            let room = room.or_else(|| runtime.session().active_room().map(str::to_string));
            if let Some(room) = room {
                runtime.mark_room_as_read(&room);
            }
        },
        Command::Status => {
            let session = runtime.session();
            say(&format!(
                "{} as {} in #{} ({} unread)",
                session.status(),
                session.identity().unwrap_or("-"),
                session.active_room().unwrap_or("-"),
                session.total_unread(),
            ))?;
        },
        Command::Help => say(Command::HELP)?,
        Command::Usage(usage) => say(usage)?,
        Command::Unknown(name) => say(&format!("unknown command /{name}, try /help"))?,
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

fn subscribe(runtime: &mut ClientRuntime) {
    let connection = runtime.session_mut().connection_mut();
    connection.on_message(|message: &InboundMessage| say(&render(message)).map_err(Into::into));
    connection.on_status(|status: &str| say(&format!("-- {status}")).map_err(Into::into));
    // Exhaustion and send failures also arrive as session notices.
    connection.on_error(|error: &ConnectionError| match error {
        ConnectionError::RetryExhausted { .. }
        | ConnectionError::NotConnected
        | ConnectionError::SendFailure(_) => Ok(()),
        other => say(&format!("!! {other}")).map_err(Into::into),
    });

    runtime.session_mut().on_notice(|notice: &SessionNotice| {
        let prefix = match notice.level {
            NoticeLevel::Info => "--",
            NoticeLevel::Error => "!!",
        };
        say(&format!("{prefix} {notice}")).map_err(Into::into)
    });
}

fn render(message: &InboundMessage) -> String {
    let room = message.room().unwrap_or("?");
    match message.kind {
        MessageKind::Message => format!("[#{room}] {}: {}", message.sender, message.body),
        MessageKind::System | MessageKind::UserJoin | MessageKind::UserLeave => {
            format!("[#{room}] * {}", message.body)
        },
    }
}

fn say(line: &str) -> io::Result<()> {
    writeln!(io::stdout().lock(), "{line}")
}
