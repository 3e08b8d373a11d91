//! The same echo server as `basic`, but wired up with a custom [`Logger`]
//! so the crate's internal diagnostics (pings, decode failures, upgrade
//! attempts) flow through `env_logger` at debug level.

use std::convert::Infallible;
use std::sync::Arc;

use engineio::{Config, Event, LogCrateLogger, Server};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let config = Config::builder().logger(LogCrateLogger).build();
    let (server, mut events) = Server::new(config);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                Event::Connect { sid } => println!("client {sid} connected"),
                Event::Message { sid, data, .. } => {
                    println!("message from {sid}: {}", String::from_utf8_lossy(&data));
                }
                Event::Disconnect { sid, reason } => {
                    println!("client {sid} disconnected. Reason: {reason}");
                }
            }
        }
    });

    let listener = TcpListener::bind("127.0.0.1:8080").await.expect("failed to bind 127.0.0.1:8080");
    println!("listening on http://127.0.0.1:8080/engine.io/");

    loop {
        let (stream, _addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                eprintln!("failed to accept connection: {error}");
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let server = Arc::clone(&server);

        let service = service_fn(move |request| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle(request).await) }
        });

        tokio::spawn(async move {
            if let Err(error) = http1::Builder::new().timer(TokioTimer::new()).serve_connection(io, service).await {
                eprintln!("connection error: {error}");
            }
        });
    }
}
