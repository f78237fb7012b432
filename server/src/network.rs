//! Server network layer: UDP transport, session routing and room supervision

use crate::client_manager::ClientManager;
use crate::room::{Room, RoomCommand, RoomEvent};
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{Clock, GameConfig, Packet, SessionId, Team, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ClientTimeout {
        client_id: SessionId,
        room_id: Option<u32>,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    SendToClients {
        packet: Packet,
        client_ids: Vec<SessionId>,
    },
}

/// Router-side view of a running room task
struct RoomHandle {
    commands: mpsc::UnboundedSender<RoomCommand>,
    members: BTreeMap<SessionId, Team>,
}

impl RoomHandle {
    fn free_team(&self, config: &GameConfig) -> Option<Team> {
        if self.members.len() >= config.humans_per_room {
            return None;
        }
        [Team::A, Team::B]
            .into_iter()
            .find(|team| !self.members.values().any(|t| t == team))
    }

    fn send(&self, room_id: u32, command: RoomCommand) {
        if let Err(e) = self.commands.send(command) {
            warn!("Room {} is gone, dropping {:?}", room_id, e.0);
        }
    }
}

/// Accepts sessions, places them into rooms and relays packets
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    config: GameConfig,
    clock: Arc<dyn Clock>,
    rooms: BTreeMap<u32, RoomHandle>,
    next_room_id: u32,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
    room_tx: mpsc::UnboundedSender<RoomEvent>,
    room_rx: mpsc::UnboundedReceiver<RoomEvent>,
}

impl Server {
    pub async fn new(
        addr: &str,
        config: GameConfig,
        max_clients: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        config.validate()?;
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();
        let (room_tx, room_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients, clock.clone()))),
            config,
            clock,
            rooms: BTreeMap::new(),
            next_room_id: 1,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
            room_tx,
            room_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::SendToClients { packet, client_ids } => {
                        let addrs: Vec<(SessionId, SocketAddr)> = {
                            let clients_guard = clients.read().await;
                            client_ids
                                .iter()
                                .filter_map(|id| clients_guard.addr_of(*id).map(|addr| (*id, addr)))
                                .collect()
                        };

                        for (client_id, addr) in addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
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

                for (client_id, room_id) in timed_out {
                    if let Err(e) =
                        server_tx.send(ServerMessage::ClientTimeout { client_id, room_id })
                    {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Picks a room with a free team, opening a new one if all are full
    fn place_session(&mut self) -> (u32, Team) {
        let open = self
            .rooms
            .iter()
            .find_map(|(id, room)| room.free_team(&self.config).map(|team| (*id, team)));

        match open {
            Some(placement) => placement,
            None => (self.spawn_room(), Team::A),
        }
    }

    fn spawn_room(&mut self) -> u32 {
        let room_id = self.next_room_id;
        self.next_room_id += 1;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let room = Room::new(room_id, self.config.clone(), Arc::clone(&self.clock));
        tokio::spawn(room.run(command_rx, self.room_tx.clone()));

        self.rooms.insert(
            room_id,
            RoomHandle {
                commands,
                members: BTreeMap::new(),
            },
        );
        room_id
    }

    /// Tells the room `client_id` is gone; forgets a room once it is empty
    fn leave_room(&mut self, client_id: SessionId, room_id: Option<u32>) {
        let Some(room_id) = room_id else {
            return;
        };
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return;
        };

        room.members.remove(&client_id);
        room.send(room_id, RoomCommand::Leave { client_id });
        if room.members.is_empty() {
            self.rooms.remove(&room_id);
        }
    }

    /// Processes incoming packets
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    let reason = "Protocol version mismatch".to_string();
                    self.send_packet(Packet::Disconnected { reason }, addr);
                    return;
                }

                // Remove existing connection if present
                let existing = {
                    let mut clients = self.clients.write().await;
                    match clients.find_client_by_addr(addr) {
                        Some(id) => clients.remove_client(id),
                        None => None,
                    }
                };
                if let Some(client) = existing {
                    info!("Replacing existing client {} from {}", client.id, addr);
                    self.leave_room(client.id, client.room_id);
                }

                let client_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr)
                };
                let Some(client_id) = client_id else {
                    let reason = "Server full".to_string();
                    self.send_packet(Packet::Disconnected { reason }, addr);
                    return;
                };

                let (room_id, team) = self.place_session();
                if let Some(room) = self.rooms.get_mut(&room_id) {
                    room.members.insert(client_id, team);
                    room.send(room_id, RoomCommand::Join { client_id, team });
                }
                self.clients.write().await.assign_room(client_id, room_id);

                info!("Client {} placed in room {} on team {}", client_id, room_id, team);
                self.send_packet(
                    Packet::Connected {
                        client_id,
                        room_id,
                        team,
                    },
                    addr,
                );
            }

            Packet::Input { command } => {
                let route = {
                    let mut clients = self.clients.write().await;
                    clients.find_client_by_addr(addr).map(|id| {
                        clients.touch(id);
                        (id, clients.room_of(id))
                    })
                };

                if let Some((client_id, Some(room_id))) = route {
                    if let Some(room) = self.rooms.get(&room_id) {
                        room.send(room_id, RoomCommand::Input { client_id, command });
                    }
                }
            }

            Packet::Disconnect => {
                let removed = {
                    let mut clients = self.clients.write().await;
                    match clients.find_client_by_addr(addr) {
                        Some(id) => clients.remove_client(id),
                        None => None,
                    }
                };

                if let Some(client) = removed {
                    self.leave_room(client.id, client.room_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    fn handle_room_event(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::Snapshot {
                recipients,
                snapshot,
                ..
            } => {
                let message = GameMessage::SendToClients {
                    packet: Packet::Snapshot(snapshot),
                    client_ids: recipients,
                };
                if let Err(e) = self.game_tx.send(message) {
                    error!("Failed to queue snapshot: {}", e);
                }
            }
            RoomEvent::Closed { room_id } => {
                self.rooms.remove(&room_id);
                info!("Room {} closed, {} rooms open", room_id, self.rooms.len());
            }
        }
    }

    /// Main server loop
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id, room_id }) => {
                            info!("Client {} timed out", client_id);
                            self.leave_room(client_id, room_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                event = self.room_rx.recv() => {
                    if let Some(event) = event {
                        self.handle_room_event(event);
                    }
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MonotonicClock;
    use std::net::{IpAddr, Ipv4Addr};

    fn handle() -> RoomHandle {
        RoomHandle {
            commands: mpsc::unbounded_channel().0,
            members: BTreeMap::new(),
        }
    }

    async fn recv_packet(socket: &UdpSocket) -> Packet {
        let mut buffer = [0u8; MAX_PACKET_SIZE];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .unwrap()
            .unwrap();
        deserialize(&buffer[..len]).unwrap()
    }

    async fn connect(server: SocketAddr, version: u32) -> (UdpSocket, Packet) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let data = serialize(&Packet::Connect {
            client_version: version,
        })
        .unwrap();
        socket.send_to(&data, server).await.unwrap();
        let reply = recv_packet(&socket).await;
        (socket, reply)
    }

    #[test]
    fn test_client_timeout_message() {
        let msg = ServerMessage::ClientTimeout {
            client_id: 42,
            room_id: Some(3),
        };

        match msg {
            ServerMessage::ClientTimeout { client_id, room_id } => {
                assert_eq!(client_id, 42);
                assert_eq!(room_id, Some(3));
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[test]
    fn test_channel_communication() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080);

        tx.send(ServerMessage::PacketReceived {
            packet: Packet::Connect { client_version: 1 },
            addr,
        })
        .unwrap();

        match rx.try_recv().unwrap() {
            ServerMessage::PacketReceived { packet, addr: a } => {
                assert_eq!(a, addr);
                assert_eq!(packet, Packet::Connect { client_version: 1 });
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[test]
    fn test_room_handle_free_team() {
        let config = GameConfig::default();
        let mut room = handle();

        assert_eq!(room.free_team(&config), Some(Team::A));
        room.members.insert(1, Team::A);
        assert_eq!(room.free_team(&config), Some(Team::B));
        room.members.insert(2, Team::B);
        assert_eq!(room.free_team(&config), None);
        room.members.remove(&1);
        assert_eq!(room.free_team(&config), Some(Team::A));
    }

    #[tokio::test]
    async fn test_sessions_fill_rooms_in_order() {
        let mut server = Server::new(
            "127.0.0.1:0",
            GameConfig::default(),
            8,
            Arc::new(MonotonicClock::new()),
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let (_a, first) = connect(addr, PROTOCOL_VERSION).await;
        let (_b, second) = connect(addr, PROTOCOL_VERSION).await;
        let (_c, third) = connect(addr, PROTOCOL_VERSION).await;

        assert_eq!(
            first,
            Packet::Connected {
                client_id: 1,
                room_id: 1,
                team: Team::A
            }
        );
        assert_eq!(
            second,
            Packet::Connected {
                client_id: 2,
                room_id: 1,
                team: Team::B
            }
        );
        assert_eq!(
            third,
            Packet::Connected {
                client_id: 3,
                room_id: 2,
                team: Team::A
            }
        );
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let mut server = Server::new(
            "127.0.0.1:0",
            GameConfig::default(),
            8,
            Arc::new(MonotonicClock::new()),
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let (_socket, reply) = connect(addr, PROTOCOL_VERSION + 1).await;
        assert_eq!(
            reply,
            Packet::Disconnected {
                reason: "Protocol version mismatch".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_server_full_rejected() {
        let mut server = Server::new(
            "127.0.0.1:0",
            GameConfig::default(),
            1,
            Arc::new(MonotonicClock::new()),
        )
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let (_first, _) = connect(addr, PROTOCOL_VERSION).await;
        let (_second, reply) = connect(addr, PROTOCOL_VERSION).await;
        assert_eq!(
            reply,
            Packet::Disconnected {
                reason: "Server full".to_string()
            }
        );
    }
}
