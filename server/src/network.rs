//! Server network layer handling UDP communications
//!
//! Inbound datagrams are decoded into [`ClientPacket`]s and handed to the main
//! loop, which turns them into lobby calls through the [`Coordinator`]. Each
//! session gets its own forwarder task draining its event channel, so a
//! client receives events in exactly the order the lobby emitted them.

use crate::connection::ConnectionManager;
use crate::coordinator::Coordinator;
use log::{debug, error, info, warn};
use shared::{decode, encode, ClientPacket, ServerEvent, SessionId};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Largest datagram the server accepts
const RECV_BUFFER_SIZE: usize = 4096;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: ClientPacket,
        addr: SocketAddr,
    },
    ConnectionTimeout {
        session_id: SessionId,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// UDP front end for the lobby
pub struct Server {
    socket: Arc<UdpSocket>,
    connections: Arc<RwLock<ConnectionManager>>,
    coordinator: Coordinator,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        coordinator: Coordinator,
        max_clients: usize,
        connection_timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            connections: Arc::new(RwLock::new(ConnectionManager::new(
                max_clients,
                connection_timeout,
            ))),
            coordinator,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; RECV_BUFFER_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode::<ClientPacket>(&buffer[0..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that evicts peers that stopped sending heartbeats
    async fn spawn_timeout_checker(&self) {
        let connections = Arc::clone(&self.connections);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut guard = connections.write().await;
                    guard.check_timeouts()
                };

                for session_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ConnectionTimeout { session_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    /// Spawns the task that delivers one session's events in order. It ends
    /// when the lobby drops the session.
    fn spawn_session_forwarder(
        &self,
        session_id: SessionId,
        addr: SocketAddr,
        mut events: mpsc::UnboundedReceiver<ServerEvent>,
    ) {
        let socket = Arc::clone(&self.socket);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = Self::send_event_impl(&socket, &event, addr).await {
                    error!("Failed to send to session {} at {}: {}", session_id, addr, e);
                }
            }
            debug!("Forwarder for session {} finished", session_id);
        });
    }

    async fn send_event_impl(
        socket: &UdpSocket,
        event: &ServerEvent,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let data = encode(event)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    /// Processes one decoded packet
    async fn handle_packet(&mut self, packet: ClientPacket, addr: SocketAddr) {
        match packet {
            ClientPacket::Hello { user_id, username } => {
                info!("User {} ({}) connecting from {}", user_id, username, addr);

                // Replace an existing connection from the same address
                let existing = {
                    let mut connections = self.connections.write().await;
                    connections.remove(addr)
                };
                if let Some(session_id) = existing {
                    self.coordinator.disconnect(session_id).await;
                }

                let full = {
                    let connections = self.connections.read().await;
                    connections.is_full()
                };
                if full {
                    let event = ServerEvent::Error {
                        message: "Server full".to_string(),
                    };
                    if let Err(e) = Self::send_event_impl(&self.socket, &event, addr).await {
                        error!("Failed to refuse {}: {}", addr, e);
                    }
                    return;
                }

                let (tx, rx) = mpsc::unbounded_channel();
                let session_id = self.coordinator.connect(user_id, username, tx).await;
                {
                    let mut connections = self.connections.write().await;
                    connections.register(addr, session_id);
                }
                self.spawn_session_forwarder(session_id, addr, rx);
            }

            ClientPacket::Heartbeat => {
                let mut connections = self.connections.write().await;
                if !connections.touch(addr) {
                    debug!("Heartbeat from unknown peer {}", addr);
                }
            }

            ClientPacket::Command(command) => {
                let session_id = {
                    let mut connections = self.connections.write().await;
                    connections.touch(addr);
                    connections.session_for(addr)
                };

                match session_id {
                    Some(session_id) => self.coordinator.dispatch(session_id, command).await,
                    None => warn!("Command from unknown peer {}", addr),
                }
            }

            ClientPacket::Disconnect => {
                let session_id = {
                    let mut connections = self.connections.write().await;
                    connections.remove(addr)
                };

                if let Some(session_id) = session_id {
                    self.coordinator.disconnect(session_id).await;
                }
            }
        }
    }

    /// Main server loop
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver().await;
        self.spawn_timeout_checker().await;

        info!("Server started successfully");

        loop {
            match self.server_rx.recv().await {
                Some(ServerMessage::PacketReceived { packet, addr }) => {
                    self.handle_packet(packet, addr).await;
                }
                Some(ServerMessage::ConnectionTimeout { session_id }) => {
                    info!("Session {} timed out", session_id);
                    self.coordinator.disconnect(session_id).await;
                }
                Some(ServerMessage::Shutdown) | None => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::lobby::Lobby;
    use crate::store::MemoryStore;
    use shared::Command;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::time::timeout;

    async fn test_server(max_clients: usize) -> Server {
        let lobby = Lobby::new(ServerConfig::default(), Arc::new(MemoryStore::new()));
        Server::new(
            "127.0.0.1:0",
            Coordinator::new(lobby),
            max_clients,
            Duration::from_secs(30),
        )
        .await
        .unwrap()
    }

    async fn recv_event(socket: &UdpSocket) -> ServerEvent {
        let mut buffer = [0u8; RECV_BUFFER_SIZE];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .expect("event arrives in time")
            .unwrap();
        decode(&buffer[..len]).unwrap()
    }

    #[test]
    fn test_server_message_creation() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080);
        let msg = ServerMessage::PacketReceived {
            packet: ClientPacket::Heartbeat,
            addr,
        };

        match msg {
            ServerMessage::PacketReceived { packet, addr: a } => {
                assert_eq!(a, addr);
                assert_eq!(packet, ClientPacket::Heartbeat);
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[tokio::test]
    async fn test_hello_registers_session() {
        let mut server = test_server(4).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client.local_addr().unwrap();

        server
            .handle_packet(
                ClientPacket::Hello {
                    user_id: 9,
                    username: "nine".to_string(),
                },
                client_addr,
            )
            .await;

        assert!(matches!(
            recv_event(&client).await,
            ServerEvent::Welcome { user_id: 9, .. }
        ));
        assert_eq!(server.connections.read().await.len(), 1);

        server
            .handle_packet(ClientPacket::Command(Command::Ready), client_addr)
            .await;
        assert!(matches!(
            recv_event(&client).await,
            ServerEvent::Warning { .. }
        ));

        server
            .handle_packet(ClientPacket::Disconnect, client_addr)
            .await;
        assert!(server.connections.read().await.is_empty());
        let sessions = server.coordinator.with_lobby(|l| l.sessions_len()).await;
        assert_eq!(sessions, 0);
    }

    #[tokio::test]
    async fn test_full_server_refuses_hello() {
        let mut server = test_server(0).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client.local_addr().unwrap();

        server
            .handle_packet(
                ClientPacket::Hello {
                    user_id: 1,
                    username: "late".to_string(),
                },
                client_addr,
            )
            .await;

        assert_eq!(
            recv_event(&client).await,
            ServerEvent::Error {
                message: "Server full".to_string()
            }
        );
        let sessions = server.coordinator.with_lobby(|l| l.sessions_len()).await;
        assert_eq!(sessions, 0);
    }
}
