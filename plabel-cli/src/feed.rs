use std::{
    io::{self, BufRead, BufReader, Write},
    net::{Shutdown, TcpStream, ToSocketAddrs},
    sync::Arc,
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use plabel_core::{
    error::Error,
    sync::{FeedConfig, FeedEvent, FeedEvents, FeedTransport},
};
use serde_json::json;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(8);
const CLOSED_BY_PEER: i32 = 1;

#[derive(Default)]
struct Connection {
    stream: Option<TcpStream>,
    generation: u64,
}

/// Feed transport speaking newline-delimited JSON over plain TCP.  The first
/// line sent carries the credentials, every line received is one message of
/// the subscribed topic.
#[derive(Default)]
pub struct TcpLineFeed {
    connection: Arc<Mutex<Connection>>,
}

impl TcpLineFeed {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeedTransport for TcpLineFeed {
    fn connect(&mut self, config: &FeedConfig, events: FeedEvents) {
        let generation = {
            let mut connection = self.connection.lock();
            connection.generation += 1;
            connection.generation
        };
        let connection = self.connection.clone();
        let config = config.clone();
        thread::spawn(move || {
            let stream = match open(&config) {
                Ok(stream) => stream,
                Err(err) => {
                    events.send(FeedEvent::ConnectFailed(err));
                    return;
                }
            };
            let reader = match stream.try_clone() {
                Ok(reader) => reader,
                Err(err) => {
                    events.send(FeedEvent::ConnectFailed(err.into()));
                    return;
                }
            };
            {
                let mut connection = connection.lock();
                if connection.generation != generation {
                    // Superseded or disconnected while we were connecting.
                    let _ = stream.shutdown(Shutdown::Both);
                    return;
                }
                connection.stream = Some(stream);
            }
            if !events.send(FeedEvent::Connected) {
                return;
            }
            let result = forward_lines(reader, &events);

            let mut connection = connection.lock();
            if connection.generation != generation {
                // Closed by `disconnect`, nobody is waiting for this one.
                return;
            }
            connection.stream = None;
            let message = match result {
                Ok(()) => "connection closed by server".to_string(),
                Err(err) => err.to_string(),
            };
            events.send(FeedEvent::ConnectionLost {
                code: CLOSED_BY_PEER,
                message,
            });
        });
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), Error> {
        let mut connection = self.connection.lock();
        let stream = connection.stream.as_mut().ok_or_else(|| {
            Error::IoError(io::Error::new(
                io::ErrorKind::NotConnected,
                "feed is not connected",
            ))
        })?;
        let line = json!({ "op": "subscribe", "topic": topic });
        writeln!(stream, "{}", line)?;
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut connection = self.connection.lock();
        connection.generation += 1;
        if let Some(stream) = connection.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

fn open(config: &FeedConfig) -> Result<TcpStream, Error> {
    let addr = (config.host.as_str(), config.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            Error::ConfigError(format!("cannot resolve feed host {}", config.host))
        })?;
    let mut stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;
    let hello = json!({
        "op": "connect",
        "username": config.username,
        "password": config.password,
    });
    writeln!(stream, "{}", hello)?;
    Ok(stream)
}

fn forward_lines(stream: TcpStream, events: &FeedEvents) -> io::Result<()> {
    for line in BufReader::new(stream).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if !events.send(FeedEvent::Message(line.into_bytes())) {
            break;
        }
    }
    Ok(())
}
