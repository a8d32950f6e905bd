//! WebSocket Game Server
//!
//! Accepts WebSocket connections, turns text frames into simulation intents
//! and forwards every broadcast frame to every connection.
//!
//! Each connection gets two channels: an mpsc queue for direct replies and a
//! subscription to the shared broadcast channel. Heroes spawned over a
//! connection are removed when it closes.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::core::clock::now_ms;
use crate::game::error::SimError;
use crate::game::state::HeroId;
use crate::game::tick::Simulation;
use crate::network::broadcaster::ChannelBroadcaster;
use crate::network::protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage};

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection limit reached.
    #[error("Connection limit reached")]
    ConnectionLimitReached,
}

/// Connected client state.
struct ConnectedClient {
    addr: SocketAddr,
    connected_at: Instant,
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Shared simulation.
    simulation: Arc<Simulation>,
    /// Broadcast fan-out the simulation publishes into.
    broadcaster: Arc<ChannelBroadcaster>,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<Uuid, ConnectedClient>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    ///
    /// `broadcaster` must be the one the simulation was built with.
    pub fn new(config: ServerConfig, simulation: Arc<Simulation>, broadcaster: Arc<ChannelBroadcaster>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            simulation,
            broadcaster,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    #[instrument(skip(self), fields(addr = %self.config.bind_addr))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!("Game server listening on {}", self.config.bind_addr);
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Rejecting {}: {}", addr, GameServerError::ConnectionLimitReached);
                                Self::reject_connection(stream, addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Complete the handshake only to tell the client the server is full.
    fn reject_connection(stream: TcpStream, addr: SocketAddr) {
        tokio::spawn(async move {
            let Ok(mut ws) = accept_async(stream).await else {
                return;
            };
            let reply = ServerMessage::Error(ServerError::new(
                ErrorCode::ServerOverloaded,
                "Connection limit reached",
            ));
            if let Ok(text) = reply.to_json() {
                let _ = ws.send(Message::Text(text)).await;
            }
            let _ = ws.close(None).await;
            debug!("Closed rejected connection {}", addr);
        });
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let simulation = self.simulation.clone();
        let mut frames = self.broadcaster.subscribe();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let connection_id = Uuid::new_v4();
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            clients
                .write()
                .await
                .insert(connection_id, ConnectedClient { addr, connected_at: Instant::now() });

            // Direct replies and broadcast frames share the socket
            let sender_task = tokio::spawn(async move {
                loop {
                    let text = tokio::select! {
                        msg = msg_rx.recv() => match msg {
                            Some(msg) => match msg.to_json() {
                                Ok(text) => text,
                                Err(e) => {
                                    error!("Failed to serialize message: {}", e);
                                    continue;
                                }
                            },
                            None => break,
                        },
                        frame = frames.recv() => match frame {
                            Ok(frame) => frame.json.to_string(),
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!("Connection {} lagged, skipped {} frames", connection_id, skipped);
                                continue;
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        },
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            let mut owned_heroes = BTreeSet::new();

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let reply = match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => {
                                        Self::handle_client_message(&simulation, client_msg, &mut owned_heroes).await
                                    }
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        Some(ServerMessage::Error(ServerError::new(
                                            ErrorCode::MalformedMessage,
                                            "Invalid message format",
                                        )))
                                    }
                                };
                                if let Some(reply) = reply {
                                    if msg_tx.send(reply).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Cleanup
            sender_task.abort();
            for hero_id in owned_heroes {
                simulation.remove_hero(hero_id).await;
            }
            if let Some(client) = clients.write().await.remove(&connection_id) {
                info!(
                    "Client {} cleaned up after {:?}",
                    client.addr,
                    client.connected_at.elapsed()
                );
            }
        });
    }

    /// Apply one client message. Returns the direct reply, if any.
    ///
    /// `owned_heroes` tracks heroes spawned over the connection.
    pub async fn handle_client_message(
        simulation: &Simulation,
        msg: ClientMessage,
        owned_heroes: &mut BTreeSet<HeroId>,
    ) -> Option<ServerMessage> {
        match msg {
            ClientMessage::HeroSpawn(req) => {
                let hero_id = req.hero_id;
                match simulation.spawn_hero(req).await {
                    Ok(_) => {
                        owned_heroes.insert(hero_id);
                        None
                    }
                    Err(e) => error_reply("HeroSpawn", e),
                }
            }
            ClientMessage::HeroMoveIntent(intent) => {
                simulation.move_hero(&intent).await.err().and_then(|e| error_reply("HeroMoveIntent", e))
            }
            ClientMessage::ArrowShootIntent(intent) => {
                simulation.shoot(&intent).await.err().and_then(|e| error_reply("ArrowShootIntent", e))
            }
            ClientMessage::EnemySpawn(req) => {
                simulation.spawn_enemy(&req).await.err().and_then(|e| error_reply("EnemySpawn", e))
            }
            ClientMessage::EnemyHitboxReport(report) => simulation
                .report_enemy_hitbox(&report)
                .await
                .err()
                .and_then(|e| error_reply("EnemyHitboxReport", e)),
            ClientMessage::BowStateIntent(intent) => simulation
                .update_bow_state(&intent)
                .await
                .err()
                .and_then(|e| error_reply("BowStateIntent", e)),
            ClientMessage::Logout(req) => {
                owned_heroes.remove(&req.hero_id);
                let success = simulation.remove_hero(req.hero_id).await;
                Some(ServerMessage::LogoutAck { hero_id: req.hero_id, success })
            }
            ClientMessage::RequestCurrentPlayers => Some(ServerMessage::CurrentPlayers {
                players: simulation.current_players().await,
            }),
            ClientMessage::Ping(ping) => Some(ServerMessage::Pong {
                timestamp: ping.timestamp,
                server_time: now_ms(),
            }),
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Sender that fires the same shutdown, for tasks started outside the server.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

/// NotFound stays silent on the wire; everything else is reported back.
fn error_reply(intent: &str, e: SimError) -> Option<ServerMessage> {
    warn!("{} rejected: {}", intent, e);
    if e.is_not_found() {
        return None;
    }
    let code = match e {
        SimError::Config(_) => ErrorCode::InternalError,
        _ => ErrorCode::InvalidInput,
    };
    Some(ServerMessage::Error(ServerError::new(code, e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::config::SimulationConfig;
    use crate::game::collision::CollisionField;
    use crate::game::input::{BowStateIntentEvent, EnemySpawnRequest, HeroSpawnRequest};
    use crate::game::providers::ConfigHeroStats;
    use crate::network::protocol::{LogoutRequest, PingRequest};

    fn server() -> Arc<GameServer> {
        let config = SimulationConfig { rng_seed: Some(3), ..Default::default() };
        let broadcaster = Arc::new(ChannelBroadcaster::new(64));
        let stats = Arc::new(ConfigHeroStats::new(&config.hero));
        let simulation = Arc::new(Simulation::new(config, CollisionField::new(), broadcaster.clone(), stats));
        let server_config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        Arc::new(GameServer::new(server_config, simulation, broadcaster))
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = server();
        assert_eq!(server.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_spawn_logout_and_ping() {
        let server = server();
        let mut owned = BTreeSet::new();

        let reply = GameServer::handle_client_message(
            &server.simulation,
            ClientMessage::HeroSpawn(HeroSpawnRequest { hero_id: HeroId(9), ..Default::default() }),
            &mut owned,
        )
        .await;
        assert!(reply.is_none());
        assert!(owned.contains(&HeroId(9)));

        let players = GameServer::handle_client_message(&server.simulation, ClientMessage::RequestCurrentPlayers, &mut owned).await;
        assert!(matches!(players, Some(ServerMessage::CurrentPlayers { ref players }) if players.len() == 1));

        let ack = GameServer::handle_client_message(
            &server.simulation,
            ClientMessage::Logout(LogoutRequest { hero_id: HeroId(9) }),
            &mut owned,
        )
        .await;
        assert_eq!(ack, Some(ServerMessage::LogoutAck { hero_id: HeroId(9), success: true }));
        assert!(owned.is_empty());

        let pong = GameServer::handle_client_message(&server.simulation, ClientMessage::Ping(PingRequest { timestamp: 42 }), &mut owned).await;
        assert!(matches!(pong, Some(ServerMessage::Pong { timestamp: 42, .. })));
    }

    #[tokio::test]
    async fn test_invalid_argument_replies_and_not_found_is_silent() {
        let server = server();
        let mut owned = BTreeSet::new();

        let bad_enemy = GameServer::handle_client_message(
            &server.simulation,
            ClientMessage::EnemySpawn(EnemySpawnRequest { map_id: "Home".into(), enemy_name: "".into(), x: 1.0, y: 1.0 }),
            &mut owned,
        )
        .await;
        assert!(matches!(
            bad_enemy,
            Some(ServerMessage::Error(ServerError { code: ErrorCode::InvalidInput, .. }))
        ));

        let unknown_bow = GameServer::handle_client_message(
            &server.simulation,
            ClientMessage::BowStateIntent(BowStateIntentEvent { hero_id: HeroId(77), ..Default::default() }),
            &mut owned,
        )
        .await;
        assert!(unknown_bow.is_none());
    }

    #[tokio::test]
    async fn test_websocket_round_trip_and_cleanup() {
        let server = server();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let serving = server.clone();
        let handle = tokio::spawn(async move { serving.serve(listener).await });

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}")).await.unwrap();
        ws.send(Message::Text(
            r#"{"type":"HeroSpawn","payload":{"heroId":5,"x":1.0,"y":2.0}}"#.to_string(),
        ))
        .await
        .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next()).await.unwrap().unwrap().unwrap();
        let text = frame.into_text().unwrap();
        assert!(text.contains("\"HeroSpawned\""));
        assert!(text.contains("\"topic\":\"hero\""));

        ws.send(Message::Text("not json".to_string())).await.unwrap();
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next()).await.unwrap().unwrap().unwrap();
        assert!(frame.into_text().unwrap().contains("malformed_message"));

        ws.close(None).await.unwrap();
        for _ in 0..50 {
            if !server.simulation.store().contains_hero(HeroId(5)).await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!server.simulation.store().contains_hero(HeroId(5)).await);

        server.shutdown();
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap().unwrap();
    }
}
