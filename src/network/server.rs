//! WebSocket Observer Server
//!
//! Async WebSocket server for arena observers.
//! Streams minigame changes and round clock samples, and lets a
//! connection join the arena with its own player character.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use serde::{Serialize, Deserialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{interval, interval_at, timeout, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::game::world::EntityId;
use crate::network::protocol::{
    ClientMessage, ErrorCode, ProtocolError, RoundClockUpdate, ServerMessage, WelcomeInfo,
    unix_millis,
};
use crate::network::runtime::{ArenaHandle, RuntimeError};

/// Outgoing messages buffered per connection.
const OUTBOX_CAPACITY: usize = 64;

/// Floor for the keepalive ping period.
const MIN_PING_INTERVAL: Duration = Duration::from_millis(100);

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Connections are closed after this many seconds without a frame
    /// from the client. Pongs to the server's keepalive pings count.
    pub client_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            client_timeout_secs: 300,
        }
    }
}

impl ServerConfig {
    /// Idle timeout as a duration.
    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    /// Keepalive ping period: three pings per idle timeout.
    pub fn ping_interval(&self) -> Duration {
        (self.client_timeout() / 3).max(MIN_PING_INTERVAL)
    }
}

/// Observer server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Arena runtime is gone.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Connected observer.
#[derive(Debug, Clone, Copy)]
struct ConnectedClient {
    /// Character spawned for this connection.
    player_id: Option<EntityId>,
    /// Connection time.
    connected_at: Instant,
}

type Clients = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;

/// Per-connection settings shared by every connection task.
#[derive(Debug, Clone)]
struct ConnectionContext {
    clients: Clients,
    arena: ArenaHandle,
    clock_period: Duration,
    idle_timeout: Duration,
    ping_interval: Duration,
}

/// The observer server.
pub struct ObserverServer {
    /// Server configuration.
    config: ServerConfig,
    /// Arena being observed.
    arena: ArenaHandle,
    /// Connected clients.
    clients: Clients,
    /// How often connections get a round clock sample.
    clock_period: Duration,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl ObserverServer {
    /// Create a server for one arena.
    pub fn new(config: ServerConfig, arena: ArenaHandle, clock_period: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            arena,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            clock_period,
            shutdown_tx,
        }
    }

    /// Bind and serve until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        Ok(TcpListener::bind(self.config.bind_addr).await?)
    }

    /// Accept connections on `listener` until shutdown.
    #[instrument(skip(self, listener))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        info!("Observer server listening on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut arena_shutdown = self.arena.shutdown_signal();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            // Reserve the slot before the handshake so a burst
                            // of connects cannot overshoot the limit
                            {
                                let mut clients = self.clients.write().await;
                                if clients.len() >= self.config.max_connections {
                                    warn!("Connection limit reached, rejecting {}", addr);
                                    continue;
                                }
                                clients.insert(addr, ConnectedClient {
                                    player_id: None,
                                    connected_at: Instant::now(),
                                });
                            }

                            info!("New observer from {}", addr);
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
                _ = arena_shutdown.recv() => {
                    info!("Arena stopped, closing observer server");
                    self.shutdown();
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let ctx = ConnectionContext {
            clients: self.clients.clone(),
            arena: self.arena.clone(),
            clock_period: self.clock_period,
            idle_timeout: self.config.client_timeout(),
            ping_interval: self.config.ping_interval(),
        };
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match timeout(ctx.idle_timeout, accept_async(stream)).await {
                Ok(Ok(ws)) => ws,
                Ok(Err(e)) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    ctx.clients.write().await.remove(&addr);
                    return;
                }
                Err(_) => {
                    debug!("WebSocket handshake timed out for {}", addr);
                    ctx.clients.write().await.remove(&addr);
                    return;
                }
            };
            Self::run_connection(ws_stream, addr, ctx, shutdown_rx).await;
        });
    }

    async fn run_connection(
        ws_stream: tokio_tungstenite::WebSocketStream<TcpStream>,
        addr: SocketAddr,
        ctx: ConnectionContext,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(OUTBOX_CAPACITY);

        // Spawn message sender task; it also pings so passive observers
        // keep answering and stay under the idle timeout
        let ping_period = ctx.ping_interval;
        let sender_task = tokio::spawn(async move {
            let mut keepalive = interval_at(tokio::time::Instant::now() + ping_period, ping_period);
            keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                let frame = tokio::select! {
                    msg = msg_rx.recv() => {
                        let Some(msg) = msg else { break };
                        match msg.to_json() {
                            Ok(text) => Message::Text(text),
                            Err(e) => {
                                error!("Failed to serialize message: {}", e);
                                continue;
                            }
                        }
                    }
                    _ = keepalive.tick() => Message::Ping(Vec::new()),
                };
                if ws_sender.send(frame).await.is_err() {
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        // Subscribe before the welcome so no change falls in between
        let mut observer = ctx.arena.subscribe();
        let _ = msg_tx.send(ServerMessage::Welcome(WelcomeInfo {
            server_version: crate::VERSION.to_string(),
            tick_rate: ctx.arena.tick_rate(),
            state: RoundClockUpdate::from_sample(observer.sample()),
        })).await;

        let mut clock = interval(ctx.clock_period);
        clock.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut player: Option<EntityId> = None;
        let mut last_activity = Instant::now();

        loop {
            tokio::select! {
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            last_activity = Instant::now();
                            match ClientMessage::from_json(&text) {
                                Ok(client_msg) => {
                                    Self::handle_client_message(addr, client_msg, &ctx, &msg_tx, &mut player).await;
                                }
                                Err(e) => {
                                    debug!("Invalid message from {}: {}", addr, e);
                                    let _ = msg_tx.send(ServerMessage::Error(
                                        ProtocolError::new(ErrorCode::InvalidMessage, "Invalid message format"),
                                    )).await;
                                }
                            }
                        }
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                            last_activity = Instant::now();
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            debug!("Observer {} disconnected", addr);
                            break;
                        }
                        Some(Err(e)) => {
                            error!("WebSocket error for {}: {}", addr, e);
                            break;
                        }
                        _ => {}
                    }
                }
                change = observer.next_change() => {
                    match change {
                        Some(change) => {
                            let _ = msg_tx.send(ServerMessage::MinigameChanged(change.into())).await;
                        }
                        None => break,
                    }
                }
                _ = clock.tick() => {
                    if last_activity.elapsed() > ctx.idle_timeout {
                        info!("Closing idle observer {}", addr);
                        break;
                    }
                    let update = RoundClockUpdate::from_sample(observer.sample());
                    let _ = msg_tx.send(ServerMessage::RoundClock(update)).await;
                }
                _ = shutdown_rx.recv() => {
                    let _ = msg_tx.send(ServerMessage::Shutdown {
                        reason: "Server shutting down".to_string(),
                    }).await;
                    break;
                }
            }
        }

        // Cleanup
        if let Some(id) = player.take() {
            if ctx.arena.despawn_player(id).await.is_err() {
                debug!("Arena already stopped, {} not despawned", id);
            }
        }

        // Let queued messages (shutdown notice) go out
        drop(msg_tx);
        if tokio::time::timeout(Duration::from_secs(1), sender_task).await.is_err() {
            debug!("Sender for {} did not drain in time", addr);
        }

        let connected_for = {
            let mut clients = ctx.clients.write().await;
            clients.remove(&addr).map(|c| c.connected_at.elapsed())
        };
        info!("Observer {} cleaned up after {:?}", addr, connected_for.unwrap_or_default());
    }

    /// Handle a client message.
    async fn handle_client_message(
        addr: SocketAddr,
        msg: ClientMessage,
        ctx: &ConnectionContext,
        sender: &mpsc::Sender<ServerMessage>,
        player: &mut Option<EntityId>,
    ) {
        match msg {
            ClientMessage::Join { player_id } => {
                if player.is_some() {
                    let _ = sender.send(ServerMessage::Error(
                        ProtocolError::new(ErrorCode::AlreadyJoined, "Already joined"),
                    )).await;
                    return;
                }

                let id = match player_id {
                    Some(s) => match EntityId::from_uuid_str(&s) {
                        Some(id) => id,
                        None => {
                            let _ = sender.send(ServerMessage::Error(
                                ProtocolError::new(ErrorCode::InvalidPlayerId, "player_id must be a UUID"),
                            )).await;
                            return;
                        }
                    },
                    None => EntityId::random(),
                };

                match ctx.arena.spawn_player(id).await {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!("Observer {} asked for taken id {}", addr, id);
                        let _ = sender.send(ServerMessage::Error(
                            ProtocolError::new(ErrorCode::PlayerIdTaken, "player_id is already in the arena"),
                        )).await;
                        return;
                    }
                    Err(_) => {
                        let _ = sender.send(ServerMessage::Error(
                            ProtocolError::new(ErrorCode::ArenaUnavailable, "Arena is not running"),
                        )).await;
                        return;
                    }
                }

                *player = Some(id);
                {
                    let mut clients = ctx.clients.write().await;
                    if let Some(client) = clients.get_mut(&addr) {
                        client.player_id = Some(id);
                    }
                }
                debug!("Observer {} joined as {}", addr, id);
                let _ = sender.send(ServerMessage::Joined { player_id: id.to_uuid_string() }).await;
            }
            ClientMessage::Leave => {
                let Some(id) = player.take() else {
                    let _ = sender.send(ServerMessage::Error(
                        ProtocolError::new(ErrorCode::NotJoined, "Join first"),
                    )).await;
                    return;
                };

                // A stopped arena has no character left to remove
                let _ = ctx.arena.despawn_player(id).await;
                {
                    let mut clients = ctx.clients.write().await;
                    if let Some(client) = clients.get_mut(&addr) {
                        client.player_id = None;
                    }
                }
                let _ = sender.send(ServerMessage::Left { player_id: id.to_uuid_string() }).await;
            }
            ClientMessage::SyncRequest => {
                let update = RoundClockUpdate::from_sample(ctx.arena.sample());
                let _ = sender.send(ServerMessage::RoundClock(update)).await;
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender.send(ServerMessage::Pong {
                    timestamp,
                    server_time: unix_millis(),
                }).await;
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Number of connections with a spawned character.
    pub async fn joined_count(&self) -> usize {
        self.clients
            .read()
            .await
            .values()
            .filter(|c| c.player_id.is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;
    use crate::game::minigame::MinigameId;
    use crate::network::runtime::ArenaRuntime;
    use tokio_tungstenite::connect_async;

    type Client = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<TcpStream>,
    >;

    async fn start() -> (Arc<ObserverServer>, ArenaHandle, SocketAddr) {
        start_with(ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        })
        .await
    }

    async fn start_with(server_config: ServerConfig) -> (Arc<ObserverServer>, ArenaHandle, SocketAddr) {
        let config = ArenaConfig {
            seed: Some(3),
            ..Default::default()
        };
        let (runtime, arena) = ArenaRuntime::new(&config, 3);
        tokio::spawn(runtime.run());

        let server = Arc::new(ObserverServer::new(server_config, arena.clone(), Duration::from_millis(50)));
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let serving = server.clone();
        tokio::spawn(async move { serving.serve(listener).await });

        (server, arena, addr)
    }

    async fn next_message(ws: &mut Client) -> ServerMessage {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return ServerMessage::from_json(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("Connection ended: {:?}", other),
            }
        }
    }

    async fn wait_for<F>(ws: &mut Client, mut pred: F) -> ServerMessage
    where
        F: FnMut(&ServerMessage) -> bool,
    {
        loop {
            let msg = next_message(ws).await;
            if pred(&msg) {
                return msg;
            }
        }
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.client_timeout(), Duration::from_secs(300));
        assert_eq!(config.ping_interval(), Duration::from_secs(100));

        let zero = ServerConfig { client_timeout_secs: 0, ..Default::default() };
        assert_eq!(zero.ping_interval(), MIN_PING_INTERVAL);
    }

    #[tokio::test]
    async fn test_taken_player_id_rejected() {
        let (server, arena, addr) = start().await;
        let (mut first, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        let (mut second, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

        let join = ClientMessage::Join { player_id: None }.to_json().unwrap();
        first.send(Message::Text(join)).await.unwrap();
        let joined = wait_for(&mut first, |m| matches!(m, ServerMessage::Joined { .. })).await;
        let ServerMessage::Joined { player_id } = joined else { unreachable!() };

        let steal = ClientMessage::Join { player_id: Some(player_id.clone()) }.to_json().unwrap();
        second.send(Message::Text(steal)).await.unwrap();
        let reply = wait_for(&mut second, |m| {
            matches!(m, ServerMessage::Error(_) | ServerMessage::Joined { .. })
        }).await;
        match reply {
            ServerMessage::Error(error) => assert_eq!(error.code, ErrorCode::PlayerIdTaken),
            other => panic!("Expected error, got {:?}", other),
        }
        assert_eq!(server.joined_count().await, 1);

        // The refused connection has no character, so leaving touches nothing
        second.send(Message::Text(ClientMessage::Leave.to_json().unwrap())).await.unwrap();
        let error = wait_for(&mut second, |m| matches!(m, ServerMessage::Error(_))).await;
        let ServerMessage::Error(error) = error else { unreachable!() };
        assert_eq!(error.code, ErrorCode::NotJoined);

        let again = ClientMessage::Join { player_id: Some(player_id) }.to_json().unwrap();
        first.send(Message::Text(again)).await.unwrap();
        let error = wait_for(&mut first, |m| matches!(m, ServerMessage::Error(_))).await;
        let ServerMessage::Error(error) = error else { unreachable!() };
        assert_eq!(error.code, ErrorCode::AlreadyJoined);

        arena.shutdown();
    }

    #[tokio::test]
    async fn test_passive_observer_outlives_idle_timeout() {
        let (server, arena, addr) = start_with(ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            client_timeout_secs: 1,
            ..Default::default()
        })
        .await;
        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

        // Only read; pongs to the server's pings are the sole client traffic
        let until = Instant::now() + Duration::from_millis(1600);
        while Instant::now() < until {
            next_message(&mut ws).await;
        }

        wait_for(&mut ws, |m| matches!(m, ServerMessage::RoundClock(_))).await;
        assert_eq!(server.connection_count().await, 1);

        arena.shutdown();
    }

    #[tokio::test]
    async fn test_pending_handshakes_count_toward_limit() {
        let (server, arena, addr) = start_with(ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            max_connections: 1,
            ..Default::default()
        })
        .await;

        // Holds the only slot without ever finishing the handshake
        let _pending = TcpStream::connect(addr).await.unwrap();
        assert!(connect_async(format!("ws://{}", addr)).await.is_err());
        assert_eq!(server.connection_count().await, 1);

        arena.shutdown();
    }

    #[tokio::test]
    async fn test_welcome_join_leave() {
        let (server, arena, addr) = start().await;
        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

        match next_message(&mut ws).await {
            ServerMessage::Welcome(info) => {
                assert_eq!(info.tick_rate, 60);
                assert_eq!(info.server_version, crate::VERSION);
            }
            other => panic!("Expected welcome, got {:?}", other),
        }

        let join = ClientMessage::Join { player_id: None }.to_json().unwrap();
        ws.send(Message::Text(join)).await.unwrap();
        let joined = wait_for(&mut ws, |m| matches!(m, ServerMessage::Joined { .. })).await;
        let ServerMessage::Joined { player_id } = joined else { unreachable!() };
        assert!(EntityId::from_uuid_str(&player_id).is_some());
        assert_eq!(server.joined_count().await, 1);

        let sync = ClientMessage::SyncRequest.to_json().unwrap();
        ws.send(Message::Text(sync)).await.unwrap();
        let clock = wait_for(&mut ws, |m| matches!(m, ServerMessage::RoundClock(_))).await;
        let ServerMessage::RoundClock(update) = clock else { unreachable!() };
        assert_eq!(update.current_minigame, MinigameId::IceFloor);

        ws.send(Message::Text(ClientMessage::Leave.to_json().unwrap())).await.unwrap();
        wait_for(&mut ws, |m| matches!(m, ServerMessage::Left { .. })).await;

        ws.send(Message::Text(ClientMessage::Leave.to_json().unwrap())).await.unwrap();
        let error = wait_for(&mut ws, |m| matches!(m, ServerMessage::Error(_))).await;
        let ServerMessage::Error(error) = error else { unreachable!() };
        assert_eq!(error.code, ErrorCode::NotJoined);

        arena.shutdown();
    }

    #[tokio::test]
    async fn test_invalid_message_reports_error() {
        let (_server, arena, addr) = start().await;
        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

        ws.send(Message::Text("{\"type\":\"bogus\"}".to_string())).await.unwrap();
        let error = wait_for(&mut ws, |m| matches!(m, ServerMessage::Error(_))).await;
        let ServerMessage::Error(error) = error else { unreachable!() };
        assert_eq!(error.code, ErrorCode::InvalidMessage);

        arena.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_notifies_observers() {
        let (server, _arena, addr) = start().await;
        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        next_message(&mut ws).await;

        server.shutdown();
        let msg = wait_for(&mut ws, |m| matches!(m, ServerMessage::Shutdown { .. })).await;
        assert!(matches!(msg, ServerMessage::Shutdown { .. }));
    }
}
