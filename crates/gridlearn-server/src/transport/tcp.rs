//! Live channel: line-delimited JSON over TCP
//!
//! Each connection is an observer. The server pushes [`LiveEvent`]s; the
//! client may send [`LiveCommand`]s (`play`, `pause`, `set_speed`).

use std::net::SocketAddr;
use std::sync::Arc;

use gridlearn_core::{GridLearnError, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::events::{LiveCommand, LiveEvent};
use crate::simulation::Simulation;

/// Bind the live-channel listener
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| GridLearnError::IpcError(format!("Failed to bind {}: {}", addr, e)))?;
    info!(addr = %addr, "Live channel listening");
    Ok(listener)
}

/// Accept observers until the listener fails
pub async fn serve(simulation: Arc<Simulation>, listener: TcpListener) -> Result<()> {
    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| GridLearnError::IpcError(format!("Failed to accept: {}", e)))?;
        let simulation = simulation.clone();
        tokio::spawn(async move {
            info!(%peer, "Observer connected");
            handle_connection(simulation, stream).await;
            info!(%peer, "Observer disconnected");
        });
    }
}

async fn handle_connection(simulation: Arc<Simulation>, stream: TcpStream) {
    let (read_half, mut write_half) = stream.into_split();
    let observer = simulation.observers().attach();
    let observer_id = observer.id;
    let mut events = observer.events;

    let writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let mut json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize live event: {}", e);
                    continue;
                }
            };
            json.push('\n');
            if let Err(e) = write_half.write_all(json.as_bytes()).await {
                debug!("Observer write failed: {}", e);
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<LiveCommand>(line) {
                    Ok(command) => {
                        debug!(?command, "Live command");
                        simulation.handle_command(command).await;
                    }
                    Err(e) => {
                        warn!("Ignoring malformed live command: {}", e);
                        let reply = LiveEvent::Error {
                            message: format!("malformed command: {}", e),
                        };
                        simulation.observers().send_to(observer_id, reply);
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Observer read failed: {}", e);
                break;
            }
        }
    }

    simulation.observers().detach(observer_id);
    writer.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    async fn start() -> (Arc<Simulation>, SocketAddr) {
        let simulation = Arc::new(
            Simulation::new(&ServerConfig {
                seed: Some(9),
                ..Default::default()
            })
            .unwrap(),
        );
        let listener = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(simulation.clone(), listener));
        (simulation, addr)
    }

    async fn wait_for_observers(simulation: &Simulation, n: usize) {
        for _ in 0..100 {
            if simulation.observers().len() == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("observer count never reached {}", n);
    }

    #[tokio::test]
    async fn test_commands_and_updates() {
        let (simulation, addr) = start().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        wait_for_observers(&simulation, 1).await;

        write_half
            .write_all(b"{\"action\":\"set_speed\",\"speed\":1}\n{\"action\":\"play\"}\n")
            .await
            .unwrap();

        let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let event: LiveEvent = serde_json::from_str(&line).unwrap();
        assert!(matches!(event, LiveEvent::Update(_)));
        assert_eq!(simulation.query().await.speed_ms, 1);

        write_half.write_all(b"{\"action\":\"pause\"}\n").await.unwrap();
        drop(write_half);
        wait_for_observers(&simulation, 0).await;
    }

    #[tokio::test]
    async fn test_malformed_command_reports_error() {
        let (simulation, addr) = start().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        wait_for_observers(&simulation, 1).await;

        write_half.write_all(b"{\"action\":\"jump\"}\n").await.unwrap();
        let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "error");
    }
}
