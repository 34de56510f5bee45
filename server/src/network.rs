//! Server network layer handling TCP connections and game loop coordination
//!
//! Every connection gets a reader task that forwards decoded packets to the
//! main loop and a writer task that drains the connection's outbound
//! channel. The main loop owns the `GameState`, so canonical mutations never
//! race each other.

use crate::client_manager::ClientManager;
use crate::game::{GameState, Outbound};
use log::{debug, error, info, warn};
use shared::codec::{read_frame, write_frame, FrameError};
use shared::{GameConfig, Packet, PROTOCOL_VERSION};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    /// A connection was accepted and its writer task is running
    Accepted {
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<Packet>,
    },
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ConnectionClosed {
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: u32,
    },
}

/// Main server coordinating networking and game simulation
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    tick_duration: Duration,
    /// Accepted connections that have not completed the handshake
    pending: HashMap<SocketAddr, mpsc::UnboundedSender<Packet>>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        config: GameConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            game_state: GameState::new(config),
            tick_duration,
            pending: HashMap::new(),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// World access for seeding pickups before `run`
    pub fn game_mut(&mut self) -> &mut GameState {
        &mut self.game_state
    }

    /// Spawns task that accepts connections and starts their reader and writer
    fn spawn_acceptor(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = self.listener.take().ok_or("Server is already running")?;
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        tokio::spawn(serve_connection(stream, addr, server_tx.clone()));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });

        Ok(())
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );
                self.handle_connect(client_version, addr).await;
            }

            Packet::Rpc(envelope) => {
                let mut clients = self.clients.write().await;
                match clients.find_client_by_addr(addr) {
                    Some(client_id) => {
                        if !clients.add_rpc(client_id, envelope) {
                            debug!("Dropped duplicate call from client {}", client_id);
                        }
                    }
                    None => warn!("Call from {} before handshake", addr),
                }
            }

            Packet::Disconnect => self.drop_connection(addr).await,

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        let Some(outbound) = self.pending.remove(&addr) else {
            warn!("Duplicate handshake from {}", addr);
            return;
        };

        if client_version != PROTOCOL_VERSION {
            let _ = outbound.send(Packet::Disconnected {
                reason: format!(
                    "Protocol mismatch: server {}, client {}",
                    PROTOCOL_VERSION, client_version
                ),
            });
            return;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr, outbound.clone())
        };

        let Some(client_id) = client_id else {
            let _ = outbound.send(Packet::Disconnected {
                reason: "Server full".to_string(),
            });
            return;
        };

        self.game_state.add_player(client_id);

        let _ = outbound.send(Packet::Connected {
            client_id,
            config: self.game_state.config.clone(),
        });
        let _ = outbound.send(self.game_state.snapshot());
    }

    async fn drop_connection(&mut self, addr: SocketAddr) {
        self.pending.remove(&addr);

        let removed = {
            let mut clients = self.clients.write().await;
            match clients.find_client_by_addr(addr) {
                Some(client_id) => {
                    clients.remove_client(&client_id);
                    Some(client_id)
                }
                None => None,
            }
        };

        if let Some(client_id) = removed {
            self.game_state.remove_player(&client_id);
        }
    }

    /// Executes queued calls in per-client order
    async fn process_rpcs(&mut self) {
        let rpcs = {
            let mut clients = self.clients.write().await;
            clients.drain_rpcs()
        };

        for (client_id, rpc) in rpcs {
            if let Err(rejection) = self.game_state.handle_rpc(client_id, rpc) {
                debug!("Call from client {} rejected: {}", client_id, rejection);
            }
        }
    }

    /// Moves packets queued by the world onto the client channels
    async fn route_outbound(&mut self) {
        let outbound = self.game_state.drain_outbound();
        if outbound.is_empty() {
            return;
        }

        let clients = self.clients.read().await;
        for message in outbound {
            match message {
                Outbound::To { client, packet } => {
                    clients.send_to(client, packet);
                }
                Outbound::Multicast(packet) => clients.multicast(&packet),
            }
        }
    }

    async fn broadcast_game_state(&mut self) {
        let clients = self.clients.read().await;
        if clients.is_empty() {
            return;
        }
        clients.multicast(&self.game_state.snapshot());
    }

    async fn tick(&mut self, dt: Duration) {
        self.process_rpcs().await;
        self.game_state.update(dt);
        self.route_outbound().await;
        self.broadcast_game_state().await;

        if self.game_state.tick % 300 == 0 {
            let client_count = self.clients.read().await.len();
            if client_count > 0 {
                debug!(
                    "Tick {}: {} clients, {:.1}Hz",
                    self.game_state.tick,
                    client_count,
                    1.0 / dt.as_secs_f32().max(f32::EPSILON)
                );
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor()?;
        self.spawn_timeout_checker();
        self.game_state.log_actors();

        let mut tick_interval = interval(self.tick_duration);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Accepted { addr, outbound }) => {
                            debug!("Accepted connection from {}", addr);
                            self.pending.insert(addr, outbound);
                        },
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ConnectionClosed { addr }) => {
                            self.drop_connection(addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            self.game_state.remove_player(&client_id);
                        },
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick);
                    last_tick = now;

                    self.tick(dt).await;
                },
            }
        }

        Ok(())
    }
}

/// Reader side of one connection; the writer runs on its own task
async fn serve_connection(
    stream: TcpStream,
    addr: SocketAddr,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", addr, e);
    }

    let (mut reader, mut writer) = stream.into_split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Packet>();

    if server_tx
        .send(ServerMessage::Accepted {
            addr,
            outbound: outbound_tx,
        })
        .is_err()
    {
        return;
    }

    tokio::spawn(async move {
        while let Some(packet) = outbound_rx.recv().await {
            if let Err(e) = write_frame(&mut writer, &packet).await {
                debug!("Failed to send packet to {}: {}", addr, e);
                break;
            }
        }
    });

    loop {
        match read_frame(&mut reader).await {
            Ok(packet) => {
                if server_tx
                    .send(ServerMessage::PacketReceived { packet, addr })
                    .is_err()
                {
                    return;
                }
            }
            Err(FrameError::Closed) => break,
            Err(e) => {
                warn!("Dropping connection {}: {}", addr, e);
                break;
            }
        }
    }

    let _ = server_tx.send(ServerMessage::ConnectionClosed { addr });
}
