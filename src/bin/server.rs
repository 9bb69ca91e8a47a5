use clap::{App, Arg};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, info, warn};

use domebus::controller::DomeController;
use domebus::protocol::ProtocolHandler;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "5000";

/// Period of the polling cycle that advances simulated motion and drives
/// the power scheduler.
const POLL_INTERVAL_MS: u64 = 1000;

fn current_tai() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let matches = App::new("domebus-server")
        .version("0.1.0")
        .about("Dome lower-level controller simulator")
        .arg(
            Arg::with_name("host")
                .long("host")
                .value_name("HOST")
                .help("Address to listen on")
                .takes_value(true)
                .default_value(DEFAULT_HOST),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Port to listen on")
                .takes_value(true)
                .default_value(DEFAULT_PORT),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port: u16 = matches
        .value_of("port")
        .unwrap_or(DEFAULT_PORT)
        .parse()
        .map_err(|_| "port must be a number")?;

    let controller = Arc::new(Mutex::new(DomeController::new(current_tai())));

    // Polling task: advances every subsystem's simulated motion and asks
    // the scheduler for the next admissible command.
    let poll_controller = Arc::clone(&controller);
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_millis(POLL_INTERVAL_MS));
        loop {
            interval.tick().await;
            let mut guard = poll_controller.lock().await;
            guard.tick(current_tai());
        }
    });

    let listener = TcpListener::bind((host, port)).await?;
    info!(host, port, "listening for one client at a time");

    // One active client: a reconnect replaces the prior connection.
    let mut active_client: Option<JoinHandle<()>> = None;
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!(%addr, "client connected");
                if let Some(previous) = active_client.take() {
                    warn!("new connection replaces the previous client");
                    previous.abort();
                }
                let client_controller = Arc::clone(&controller);
                active_client = Some(tokio::spawn(async move {
                    if let Err(error) = handle_client(stream, client_controller).await {
                        warn!(%addr, %error, "client connection ended with error");
                    }
                    info!(%addr, "client disconnected");
                }));
            }
            Err(error) => {
                error!(%error, "failed to accept connection");
            }
        }
    }
}

/// Serve one client: for every received line, write exactly one CR+LF
/// terminated reply before reading the next line.
async fn handle_client(
    stream: TcpStream,
    controller: Arc<Mutex<DomeController>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (reader, mut writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);
    let mut handler = ProtocolHandler::new();

    let mut line = String::new();
    loop {
        line.clear();
        match buf_reader.read_line(&mut line).await {
            Ok(0) => break, // client disconnected
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let reply = {
                    let mut guard = controller.lock().await;
                    guard.handle_line(trimmed, &mut handler, current_tai())
                };
                let encoded = handler.encode_reply(&reply)?;
                writer.write_all(encoded.as_bytes()).await?;
            }
            Err(error) => {
                warn!(%error, "error reading from client");
                break;
            }
        }
    }
    Ok(())
}
