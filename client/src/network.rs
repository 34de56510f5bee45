use crate::game::ClientGameState;
use crate::hud::LogHud;
use crate::input::{InputManager, InputSource};
use log::{error, info, warn};
use shared::codec::{read_frame, write_frame, FrameError};
use shared::{Packet, ServerRpc, PROTOCOL_VERSION};
use std::time::{Duration, Instant};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

pub struct Client {
    writer: OwnedWriteHalf,
    inbound: mpsc::UnboundedReceiver<Packet>,
    client_id: Option<u32>,
    connected: bool,

    game_state: ClientGameState,
    input_manager: InputManager,
    input: Box<dyn InputSource + Send>,

    fake_ping_ms: u64,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        fake_ping_ms: u64,
        input: Box<dyn InputSource + Send>,
        attack_duration: Option<f32>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = TcpStream::connect(server_addr).await?;
        stream.set_nodelay(true)?;
        let (mut reader, writer) = stream.into_split();

        // Reading a frame is not cancel safe, so it lives on its own task
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                match read_frame(&mut reader).await {
                    Ok(packet) => {
                        if fake_ping_ms > 0 {
                            sleep(Duration::from_millis(fake_ping_ms / 2)).await;
                        }
                        if inbound_tx.send(packet).is_err() {
                            break;
                        }
                    }
                    Err(FrameError::Closed) => break,
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        break;
                    }
                }
            }
        });

        let mut game_state = ClientGameState::new().with_hud(Box::new(LogHud::new()));
        game_state.set_attack_duration(attack_duration);

        Ok(Client {
            writer,
            inbound,
            client_id: None,
            connected: false,
            game_state,
            input_manager: InputManager::new(),
            input,
            fake_ping_ms,
        })
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&mut self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        write_frame(&mut self.writer, packet).await?;
        Ok(())
    }

    async fn send_rpcs(&mut self, rpcs: Vec<ServerRpc>) -> Result<(), Box<dyn std::error::Error>> {
        if !self.connected {
            return Ok(());
        }

        for rpc in rpcs {
            let envelope = self.input_manager.wrap(rpc);
            self.send_packet(&Packet::Rpc(envelope)).await?;
        }
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) {
        match &packet {
            Packet::Connected { client_id, .. } => {
                self.client_id = Some(*client_id);
                self.connected = true;
            }
            Packet::Disconnected { .. } => {
                self.connected = false;
                self.client_id = None;
            }
            _ => {}
        }

        self.game_state.handle_packet(packet);
    }

    /// Runs until the server disconnects us or sends us to another level
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut frame_interval = interval(FRAME_INTERVAL);
        let mut last_frame = Instant::now();

        loop {
            tokio::select! {
                packet = self.inbound.recv() => {
                    match packet {
                        Some(packet) => {
                            let was_connected = self.client_id.is_some();
                            self.handle_packet(packet);

                            if was_connected && self.client_id.is_none() {
                                break;
                            }
                            if let Some(level) = self.game_state.take_pending_level() {
                                info!("Travelling to {}", level);
                                break;
                            }
                        },
                        None => {
                            warn!("Connection to server lost");
                            self.connected = false;
                            break;
                        }
                    }
                },

                _ = frame_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_frame).as_secs_f32();
                    last_frame = now;

                    let frame = self.input.sample(dt);
                    let events = self.input_manager.update(&frame);

                    let mut rpcs = self.game_state.local_input(&frame, events, dt);
                    rpcs.extend(self.game_state.update(dt));

                    if let Err(e) = self.send_rpcs(rpcs).await {
                        error!("Error sending input: {}", e);
                        break;
                    }
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
