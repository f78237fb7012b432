use crate::game::ClientGameState;
use crate::input::{Controller, InputManager};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Clock, GameConfig, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

/// Frame period of the client loop.
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    connected: bool,
    rejected: Option<String>,
    room_id: Option<u32>,

    game_state: ClientGameState,
    input_manager: InputManager,
    controller: Box<dyn Controller>,
    clock: Arc<dyn Clock>,
    last_frame: Duration,
    snapshots_received: u64,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        config: GameConfig,
        controller: Box<dyn Controller>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            connected: false,
            rejected: None,
            room_id: None,
            game_state: ClientGameState::new(config),
            input_manager: InputManager::new(clock.clone()),
            controller,
            last_frame: clock.now(),
            clock,
            snapshots_received: 0,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn room_id(&self) -> Option<u32> {
        self.room_id
    }

    /// Reason given by the server if it refused or dropped us.
    pub fn rejection(&self) -> Option<&str> {
        self.rejected.as_deref()
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    pub fn snapshots_received(&self) -> u64 {
        self.snapshots_received
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected {
                client_id,
                room_id,
                team,
            } => {
                info!(
                    "Connected! Client ID: {}, room {}, team {:?}",
                    client_id, room_id, team
                );
                self.connected = true;
                self.room_id = Some(room_id);
                self.game_state.on_connected(client_id, team);
            }

            Packet::Snapshot(snapshot) => {
                if !self.connected {
                    return;
                }
                self.snapshots_received += 1;
                if let Some(result) = self.game_state.apply_snapshot(snapshot, self.clock.now_ms())
                {
                    if result.replayed > 0 {
                        debug!(
                            "Reconciled: error {:.1}, factor {}, replayed {}",
                            result.error, result.factor, result.replayed
                        );
                    }
                }
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.room_id = None;
                self.rejected = Some(reason);
                self.game_state.on_disconnected();
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    /// Samples the controller, sends the command and predicts it locally.
    async fn frame(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let now = self.clock.now();
        let frame_dt = now.saturating_sub(self.last_frame).as_secs_f32();
        self.last_frame = now;

        if !self.connected {
            return Ok(());
        }

        let command = self.input_manager.update(self.controller.sample());
        self.send_packet(&Packet::Input {
            command: command.clone(),
        })
        .await?;
        self.game_state.apply_local_input(&command, frame_dt);

        Ok(())
    }

    /// Runs until `duration` elapses, the server disconnects us, or forever.
    pub async fn run(
        &mut self,
        duration: Option<Duration>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut frame_interval = interval(FRAME_INTERVAL);
        let mut status_interval = interval(Duration::from_secs(5));
        status_interval.tick().await;

        let stop = async {
            match duration {
                Some(duration) => sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(stop);

        let mut buffer = [0u8; MAX_PACKET_SIZE];

        while self.rejected.is_none() {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => match deserialize::<Packet>(&buffer[..len]) {
                            Ok(packet) => self.handle_packet(packet),
                            Err(e) => warn!("Malformed packet from server: {}", e),
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = frame_interval.tick() => {
                    if let Err(e) = self.frame().await {
                        error!("Error sending input: {}", e);
                    }
                },

                _ = status_interval.tick() => {
                    if let Some(view) = self.game_state.render_view(self.clock.now_ms()) {
                        info!(
                            "{:?} {}-{} ({:.0}s left), controlling {:?}",
                            view.phase,
                            view.score_a,
                            view.score_b,
                            view.match_time_remaining,
                            self.game_state.controlled_id()
                        );
                    }
                },

                _ = &mut stop => break,
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
            self.connected = false;
        }

        Ok(())
    }
}
