//! A minimal engine.io server: echoes `"Hello"` back to every client that
//! connects and prints every message and disconnect it sees.
//!
//! Mirrors the accept loop in `via`'s `server::serve`, trimmed to a single
//! connection at a time since this is a demonstration, not a production
//! listener.

use std::convert::Infallible;
use std::sync::Arc;

use engineio::{Config, Event, Server};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    let (server, mut events) = Server::new(Config::default());

    tokio::spawn({
        let server = Arc::clone(&server);

        async move {
            while let Some(event) = events.recv().await {
                match event {
                    Event::Connect { sid } => {
                        println!("client {sid} connected");
                        let _ = server.send(&sid, false, &b"Hello"[..]).await;
                    }
                    Event::Message { sid, data, .. } => {
                        println!("message from {sid}: {}", String::from_utf8_lossy(&data));
                    }
                    Event::Disconnect { sid, reason } => {
                        println!("client {sid} disconnected: {reason}");
                    }
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
