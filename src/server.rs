use crate::client::handle_client;
use crate::lobby_coordinator::lobby_coordinator;
use crate::messages::CoordinatorMessage;
use anyhow::{Context, anyhow};
use socket2::{Domain, Protocol, Socket, Type};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::{TcpListener, lookup_host};
use tokio::sync::mpsc;
use tracing::{info, warn};

pub async fn resolve(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    lookup_host((host, port))
        .await
        .with_context(|| format!("resolving {}:{}", host, port))?
        .next()
        .ok_or_else(|| anyhow!("{} did not resolve to any address", host))
}

/// Listening socket with an explicit accept backlog.
pub fn bind_listener(addr: SocketAddr, backlog: i32) -> anyhow::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("binding {}", addr))?;
    socket.listen(backlog)?;
    Ok(TcpListener::from_std(socket.into())?)
}

/// Accepts connections until `shutdown` resolves, one task per connection.
pub async fn run(listener: TcpListener, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
    // Create the lobby coordinator
    let (coordinator_tx, coordinator_rx) = mpsc::unbounded_channel::<CoordinatorMessage>();
    tokio::spawn(lobby_coordinator(coordinator_rx));

    info!("Listening on {}", listener.local_addr()?);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, addr) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                };

                // Split the socket for reading and writing
                let (reader, writer) = socket.into_split();
                tokio::spawn(handle_client(reader, writer, addr, coordinator_tx.clone()));
            }
            _ = &mut shutdown => {
                info!("Shutting down, no longer accepting connections");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
    use tokio::net::TcpStream;
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::time::timeout;

    struct TestClient {
        lines: Lines<BufReader<OwnedReadHalf>>,
        writer: OwnedWriteHalf,
    }

    impl TestClient {
        async fn connect(addr: SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (reader, writer) = stream.into_split();
            Self {
                lines: BufReader::new(reader).lines(),
                writer,
            }
        }

        async fn send(&mut self, value: Value) {
            self.send_raw(&format!("{}\n", value)).await;
        }

        async fn send_raw(&mut self, text: &str) {
            self.writer.write_all(text.as_bytes()).await.unwrap();
        }

        async fn recv(&mut self) -> Value {
            let line = timeout(Duration::from_secs(5), self.lines.next_line())
                .await
                .expect("timed out waiting for a frame")
                .unwrap()
                .expect("connection closed");
            serde_json::from_str(&line).unwrap()
        }

        async fn recv_eof(&mut self) {
            let line = timeout(Duration::from_secs(5), self.lines.next_line())
                .await
                .expect("timed out waiting for close")
                .unwrap();
            assert_eq!(line, None);
        }

        async fn identify(&mut self, name: &str, version: &str) {
            self.send(json!({"action": "identify", "name": name, "game_version": version}))
                .await;
            assert_eq!(
                self.recv().await,
                json!({"action": "message", "message": format!("Hi {} using {}", name, version)})
            );
        }

        async fn create(&mut self, name: &str) -> String {
            self.send(json!({"action": "create"})).await;
            assert_eq!(self.recv().await, json!({"action": "connect", "name": name}));
            let code = self.recv().await;
            assert_eq!(code["action"], "code");
            code["code"].as_str().unwrap().to_string()
        }
    }

    async fn start_server() -> SocketAddr {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap(), 128).unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(run(listener, std::future::pending()));
        addr
    }

    #[tokio::test]
    async fn test_two_player_session() {
        let addr = start_server().await;
        let mut x = TestClient::connect(addr).await;
        let mut y = TestClient::connect(addr).await;

        x.identify("Alice", "v1").await;
        let code = x.create("Alice").await;
        assert_eq!(code.len(), 4);
        assert!(code.chars().all(|c| c.is_ascii_uppercase()));

        y.identify("Bob", "v1").await;
        y.send(json!({"action": "join", "code": code})).await;
        assert_eq!(x.recv().await, json!({"action": "connect", "name": "Bob"}));
        assert_eq!(y.recv().await, json!({"action": "connect", "name": "Alice"}));
        assert_eq!(y.recv().await, json!({"action": "connect", "name": "Bob"}));

        x.send(json!({"action": "turn", "move": 5})).await;
        assert_eq!(
            y.recv().await,
            json!({"action": "turn", "move": 5, "name": "Alice"})
        );

        y.send(json!({"action": "turn", "board": {"cells": [0, 1]}})).await;
        assert_eq!(
            x.recv().await,
            json!({"action": "turn", "board": {"cells": [0, 1]}, "name": "Bob"})
        );

        drop(y);
        assert_eq!(x.recv().await, json!({"action": "disconnect", "name": "Bob"}));
        drop(x);

        // Lobby is gone once both have left
        let mut z = TestClient::connect(addr).await;
        z.identify("Carol", "v1").await;
        let mut removed = false;
        for _ in 0..50 {
            z.send(json!({"action": "join", "code": code})).await;
            let reply = z.recv().await;
            if reply == json!({"action": "error", "type": "lobby_doesnt_exist"}) {
                removed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(removed);
    }

    #[tokio::test]
    async fn test_errors_keep_connection_open() {
        let addr = start_server().await;
        let mut a = TestClient::connect(addr).await;

        a.send(json!({"action": "create"})).await;
        assert_eq!(a.recv().await, json!({"action": "error", "type": "unidentified"}));

        a.send(json!({"action": "teleport"})).await;
        assert_eq!(a.recv().await, json!({"action": "error", "type": "unknown_action"}));

        a.identify("Alice", "v1").await;
        a.send(json!({"action": "turn", "move": 1})).await;
        assert_eq!(a.recv().await, json!({"action": "error", "type": "not_in_lobby"}));

        // Two frames in one write
        a.send_raw("{\"action\":\"nope\"}\n{\"action\":\"join\",\"code\":\"zzzz\"}\n")
            .await;
        assert_eq!(a.recv().await, json!({"action": "error", "type": "unknown_action"}));
        assert_eq!(
            a.recv().await,
            json!({"action": "error", "type": "lobby_doesnt_exist"})
        );
    }

    #[tokio::test]
    async fn test_full_lobby_and_version_mismatch() {
        let addr = start_server().await;
        let mut a = TestClient::connect(addr).await;
        let mut b = TestClient::connect(addr).await;
        let mut c = TestClient::connect(addr).await;

        a.identify("Alice", "v1").await;
        let code = a.create("Alice").await;

        c.identify("Carol", "v2").await;
        c.send(json!({"action": "join", "code": code})).await;
        assert_eq!(
            c.recv().await,
            json!({"action": "error", "type": "mismatched_version", "message": "v1"})
        );

        b.identify("Bob", "v1").await;
        b.send(json!({"action": "join", "code": code})).await;
        assert_eq!(a.recv().await, json!({"action": "connect", "name": "Bob"}));

        c.identify("Carol", "v1").await;
        c.send(json!({"action": "join", "code": code})).await;
        assert_eq!(c.recv().await, json!({"action": "error", "type": "lobby_full"}));
    }

    #[tokio::test]
    async fn test_malformed_frame_closes_only_that_connection() {
        let addr = start_server().await;
        let mut a = TestClient::connect(addr).await;
        let mut b = TestClient::connect(addr).await;

        a.identify("Alice", "v1").await;
        let code = a.create("Alice").await;
        b.identify("Bob", "v1").await;
        b.send(json!({"action": "join", "code": code})).await;
        assert_eq!(a.recv().await, json!({"action": "connect", "name": "Bob"}));

        b.send_raw("this is not json\n").await;
        assert_eq!(a.recv().await, json!({"action": "disconnect", "name": "Bob"}));

        // Drain Bob's queued connect frames, then the server closes his stream
        assert_eq!(b.recv().await, json!({"action": "connect", "name": "Alice"}));
        assert_eq!(b.recv().await, json!({"action": "connect", "name": "Bob"}));
        b.recv_eof().await;

        // Alice is unaffected and can rejoin Bob's slot as him
        let mut bob_again = TestClient::connect(addr).await;
        bob_again.identify("Bob", "v1").await;
        bob_again.send(json!({"action": "join", "code": code})).await;
        assert_eq!(a.recv().await, json!({"action": "connect", "name": "Bob"}));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_joins_never_overfill_a_lobby() {
        const JOINERS: usize = 20;

        let addr = start_server().await;
        let mut host = TestClient::connect(addr).await;
        host.identify("Host", "v1").await;
        let code = host.create("Host").await;

        let barrier = Arc::new(tokio::sync::Barrier::new(JOINERS));
        let mut tasks = Vec::new();
        for i in 0..JOINERS {
            let code = code.clone();
            let barrier = barrier.clone();
            tasks.push(tokio::spawn(async move {
                let name = format!("Joiner{}", i);
                let mut client = TestClient::connect(addr).await;
                client.identify(&name, "v1").await;
                barrier.wait().await;
                client.send(json!({"action": "join", "code": code})).await;
                // First frame is either the refusal or the roster entry for Host
                let reply = client.recv().await;
                (client, reply)
            }));
        }

        let mut joined = 0;
        let mut full = 0;
        let mut clients = Vec::new();
        for task in tasks {
            let (client, reply) = task.await.unwrap();
            if reply == json!({"action": "connect", "name": "Host"}) {
                joined += 1;
            } else {
                assert_eq!(reply, json!({"action": "error", "type": "lobby_full"}));
                full += 1;
            }
            clients.push(client);
        }

        assert_eq!(joined, 1);
        assert_eq!(full, JOINERS - 1);

        // Host heard about exactly one newcomer
        let notice = host.recv().await;
        assert_eq!(notice["action"], "connect");
        host.send(json!({"action": "turn", "ping": true})).await;
        let mut relayed = 0;
        for client in clients.iter_mut() {
            while let Ok(Ok(Some(line))) =
                timeout(Duration::from_millis(200), client.lines.next_line()).await
            {
                let frame: Value = serde_json::from_str(&line).unwrap();
                if frame["action"] == "turn" {
                    relayed += 1;
                }
            }
        }
        assert_eq!(relayed, 1);
    }
}
