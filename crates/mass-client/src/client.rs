//! Client lifecycle.
//!
//! [`MassClient`] owns one [`Connection`] and walks it through
//! `Disconnected → Connecting → Connected → Listening → Disconnecting → Closed`.
//!
//! - [`connect`](MassClient::connect) opens the transport, captures the server
//!   info and runs the connect-time schema check.
//! - [`start_listening`](MassClient::start_listening) spawns the initial state
//!   fetch and runs the read loop on the calling task until the connection ends.
//! - [`disconnect`](MassClient::disconnect) is terminal and safe to repeat.
//!
//! The read loop is the only consumer of incoming frames, so results and
//! events are handled strictly in arrival order.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use mass_core::api::{CommandMessage, parse_message, parse_server_info};
use mass_core::media::MediaItemImage;
use mass_core::provider::{ProviderInstance, ProviderManifest};
use mass_core::{ApiMessage, ClientError, CorrelationId, EventType, MassEvent, Result, ServerInfo};
use mass_settings::ClientSettings;
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::command::CommandSender;
use crate::connection::{Connection, WebsocketConnection};
use crate::correlator::CommandCorrelator;
use crate::images;
use crate::players::{PlayerStore, Players};
use crate::queues::{PlayerQueues, QueueStore};
use crate::router::{EventCallback, EventFilter, EventRouter, SubscriptionHandle};
use crate::schema::SchemaVersionGuard;
use crate::state::ProviderCache;

/// Where a [`MassClient`] is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Not connected yet.
    Disconnected,
    /// Transport handshake in progress.
    Connecting,
    /// Server info captured, read loop not running.
    Connected,
    /// Read loop running.
    Listening,
    /// Teardown in progress.
    Disconnecting,
    /// Torn down for good.
    Closed,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Listening => "listening",
            Self::Disconnecting => "disconnecting",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Client for a mass server.
pub struct MassClient {
    server_url: String,
    connection: Arc<dyn Connection>,
    guard: SchemaVersionGuard,
    correlator: CommandCorrelator,
    router: Arc<EventRouter>,
    providers: ProviderCache,
    players: Arc<PlayerStore>,
    queues: Arc<QueueStore>,
    server_info: RwLock<Option<ServerInfo>>,
    phase: Mutex<LifecyclePhase>,
    connect_lock: tokio::sync::Mutex<()>,
    listening: AtomicBool,
    stop: CancellationToken,
    fetch_task: Mutex<Option<JoinHandle<()>>>,
    initialized: watch::Sender<bool>,
}

impl MassClient {
    /// Client for `settings.server_url` over WebSocket.
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let connection = WebsocketConnection::new(&settings.server_url, settings.connection.clone())?;
        Ok(Self::with_connection(
            settings.server_url.clone(),
            Arc::new(connection),
        ))
    }

    /// Client over an arbitrary transport.
    pub fn with_connection(server_url: impl Into<String>, connection: Arc<dyn Connection>) -> Self {
        let router = Arc::new(EventRouter::new());

        let players = Arc::new(PlayerStore::default());
        {
            let store = Arc::clone(&players);
            let _ = router.subscribe(
                EventCallback::sync(move |event: &MassEvent| store.handle_event(event)),
                PlayerStore::filter(),
            );
        }
        let queues = Arc::new(QueueStore::default());
        {
            let store = Arc::clone(&queues);
            let _ = router.subscribe(
                EventCallback::sync(move |event: &MassEvent| store.handle_event(event)),
                QueueStore::filter(),
            );
        }

        let (initialized, _) = watch::channel(false);
        Self {
            server_url: server_url.into(),
            connection,
            guard: SchemaVersionGuard::default(),
            correlator: CommandCorrelator::new(),
            router,
            providers: ProviderCache::new(),
            players,
            queues,
            server_info: RwLock::new(None),
            phase: Mutex::new(LifecyclePhase::Disconnected),
            connect_lock: tokio::sync::Mutex::new(()),
            listening: AtomicBool::new(false),
            stop: CancellationToken::new(),
            fetch_task: Mutex::new(None),
            initialized,
        }
    }

    /// Replace the schema guard (to speak a different client schema).
    #[must_use]
    pub fn with_schema_guard(mut self, guard: SchemaVersionGuard) -> Self {
        self.guard = guard;
        self
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Open the connection and validate the server's schema.
    ///
    /// A no-op when already connected. After [`disconnect`](Self::disconnect)
    /// it fails with [`ClientError::ConnectionClosed`].
    pub async fn connect(&self) -> Result<()> {
        let _serial = self.connect_lock.lock().await;
        if self.stop.is_cancelled() {
            return Err(ClientError::ConnectionClosed);
        }
        if self.connection.connected() && self.server_info.read().is_some() {
            return Ok(());
        }

        debug!(server_url = %self.server_url, "connecting");
        self.set_phase(LifecyclePhase::Connecting);
        let handshake = tokio::select! {
            biased;
            () = self.stop.cancelled() => Err(ClientError::ConnectionClosed),
            handshake = self.handshake() => handshake,
        };
        let info = match handshake {
            // A disconnect landed mid-handshake: whatever was opened is closed again.
            _ if self.stop.is_cancelled() => {
                self.connection.disconnect().await;
                debug!(server_url = %self.server_url, "connect abandoned by disconnect");
                return Err(ClientError::ConnectionClosed);
            }
            Ok(info) => info,
            Err(e) => {
                self.connection.disconnect().await;
                self.set_phase(LifecyclePhase::Disconnected);
                warn!(server_url = %self.server_url, error = %e, "connect failed");
                return Err(e);
            }
        };

        info!(
            server_url = %self.server_url,
            server_id = %info.server_id,
            server_version = %info.server_version,
            schema_version = info.schema_version,
            "connected to server"
        );
        *self.server_info.write() = Some(info);
        self.set_phase(LifecyclePhase::Connected);
        Ok(())
    }

    async fn handshake(&self) -> Result<ServerInfo> {
        let raw = self.connection.connect().await?;
        let info = parse_server_info(raw)?;
        self.guard.check_connect(&info)?;
        Ok(info)
    }

    /// Connect if needed, then process incoming frames until the connection
    /// ends or [`disconnect`](Self::disconnect) is called.
    ///
    /// The initial state fetch runs concurrently and never blocks the loop.
    /// Always leaves the client disconnected on return.
    pub async fn start_listening(self: &Arc<Self>) -> Result<()> {
        if self.listening.swap(true, Ordering::AcqRel) {
            return Err(ClientError::InvalidState("already listening".into()));
        }
        if let Err(e) = self.connect().await {
            self.listening.store(false, Ordering::Release);
            return Err(e);
        }
        self.set_phase(LifecyclePhase::Listening);

        let fetch = {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.fetch_initial_state().await })
        };
        {
            let mut slot = self.fetch_task.lock();
            if self.stop.is_cancelled() {
                fetch.abort();
            } else {
                *slot = Some(fetch);
            }
        }

        let outcome = self.read_loop().await;
        self.disconnect().await;
        outcome
    }

    async fn read_loop(&self) -> Result<()> {
        debug!("starting message receive loop");
        loop {
            let frame = tokio::select! {
                biased;
                () = self.stop.cancelled() => {
                    debug!("stop requested, leaving receive loop");
                    return Ok(());
                }
                frame = self.connection.receive_message() => frame,
            };
            match frame {
                Ok(raw) => self.handle_incoming(raw),
                Err(ClientError::ConnectionClosed) => {
                    debug!("connection closed during listening");
                    return Ok(());
                }
                Err(ClientError::InvalidMessage(reason)) => {
                    warn!(%reason, "dropping undecodable frame");
                }
                Err(e) => {
                    warn!(error = %e, "receive failed, tearing down");
                    return Err(e);
                }
            }
        }
    }

    async fn fetch_initial_state(&self) {
        debug!("fetching initial state");
        let fetched = async {
            self.providers.bulk_fetch(self).await?;
            self.queues.fetch_state(self).await?;
            self.players.fetch_state(self).await
        }
        .await;

        match fetched {
            Ok(()) => {
                debug!("initial state fetched");
                let _ = self.initialized.send(true);
            }
            Err(e) if self.stop.is_cancelled() => {
                debug!(error = %e, "initial state fetch interrupted by disconnect");
            }
            Err(e) => warn!(error = %e, "initial state fetch failed"),
        }
    }

    /// Tear the client down: fail pending commands, stop the read loop and
    /// the initial fetch, close the connection. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        let first = !self.stop.is_cancelled();
        if first {
            debug!("disconnecting");
            self.set_phase(LifecyclePhase::Disconnecting);
        }
        self.stop.cancel();
        self.router.close();
        let cancelled = self.correlator.cancel_all();
        if let Some(task) = self.fetch_task.lock().take() {
            task.abort();
        }
        self.connection.disconnect().await;
        self.set_phase(LifecyclePhase::Closed);
        if first {
            info!(server_url = %self.server_url, cancelled, "disconnected from server");
        }
    }

    /// Resolves once the initial state fetch has completed.
    ///
    /// Fails with [`ClientError::ConnectionClosed`] if the client is torn down first.
    pub async fn wait_initialized(&self) -> Result<()> {
        let mut ready = self.initialized.subscribe();
        tokio::select! {
            biased;
            waited = ready.wait_for(|done| *done) => {
                waited.map(|_| ()).map_err(|_| ClientError::ConnectionClosed)
            }
            () = self.stop.cancelled() => Err(ClientError::ConnectionClosed),
        }
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Send a command and wait for its result.
    ///
    /// `args` must be a JSON object or `null`. With `require_schema` set, the
    /// command is refused locally when the server speaks an older schema.
    pub async fn send_command(
        &self,
        command: &str,
        args: Value,
        require_schema: Option<u32>,
    ) -> Result<Value> {
        self.check_command(require_schema)?;
        let id = CorrelationId::new();
        let message = CommandMessage::new(&id, command, args)?;
        let pending = self.correlator.register(id)?;
        debug!(command, message_id = %pending.id(), "sending command");
        self.connection.send_message(message.to_value()).await?;
        pending.wait().await
    }

    /// Send a command and decode its result into `T`.
    pub async fn send_command_as<T: DeserializeOwned>(
        &self,
        command: &str,
        args: Value,
        require_schema: Option<u32>,
    ) -> Result<T> {
        let value = self.send_command(command, args, require_schema).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Send a command without waiting for (or tracking) a result.
    pub async fn send_command_no_wait(
        &self,
        command: &str,
        args: Value,
        require_schema: Option<u32>,
    ) -> Result<()> {
        self.check_command(require_schema)?;
        let message = CommandMessage::new(&CorrelationId::new(), command, args)?;
        debug!(command, message_id = %message.message_id, "sending command without result");
        self.connection.send_message(message.to_value()).await
    }

    fn check_command(&self, require_schema: Option<u32>) -> Result<()> {
        if self.stop.is_cancelled() || !self.connection.connected() {
            return Err(ClientError::NotConnected);
        }
        let info = self.server_info.read();
        let Some(info) = info.as_ref() else {
            return Err(ClientError::NotConnected);
        };
        self.guard.check_command(require_schema, info)
    }

    // ── Incoming frames ─────────────────────────────────────────────

    /// Classify and route one incoming frame.
    pub(crate) fn handle_incoming(&self, raw: Value) {
        let message = match parse_message(raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "dropping unrecognised message");
                return;
            }
        };
        match message {
            ApiMessage::Success(result) if result.partial => {
                let _ = self
                    .correlator
                    .append_partial(&result.message_id, result.result);
            }
            ApiMessage::Success(result) => {
                debug!(message_id = %result.message_id, "received result");
                let _ = self.correlator.resolve(&result.message_id, result.result);
            }
            ApiMessage::Error(result) => {
                debug!(message_id = %result.message_id, error_code = result.error_code, "received error result");
                let error = result.to_error();
                let _ = self.correlator.reject(&result.message_id, error.into());
            }
            ApiMessage::Event(event) => self.handle_event(&event),
            other => debug!(?other, "received message with unhandled type"),
        }
    }

    fn handle_event(&self, event: &MassEvent) {
        if self.router.is_closed() {
            return;
        }
        if event.event == EventType::ProvidersUpdated {
            if let Err(e) = self.providers.apply_providers_updated(event) {
                warn!(error = %e, "undecodable providers update, keeping previous snapshot");
            }
        }
        let delivered = self.router.dispatch(event);
        debug!(event = %event.event, object_id = ?event.object_id, delivered, "dispatched event");
    }

    // ── Subscriptions ───────────────────────────────────────────────

    /// Subscribe to events matching `filter`.
    pub fn subscribe(&self, callback: EventCallback, filter: EventFilter) -> SubscriptionHandle {
        self.router.subscribe(callback, filter)
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// Base URL this client was created for.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Server info captured at connect.
    pub fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.read().clone()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.lock()
    }

    /// `Closed` is terminal; later transitions are ignored.
    fn set_phase(&self, phase: LifecyclePhase) {
        let mut current = self.phase.lock();
        if *current != phase && *current != LifecyclePhase::Closed {
            debug!(from = %*current, to = %phase, "lifecycle phase change");
            *current = phase;
        }
    }

    /// Whether the transport is open and the client not torn down.
    pub fn is_connected(&self) -> bool {
        !self.stop.is_cancelled() && self.connection.connected()
    }

    /// Commands still awaiting a result.
    pub fn pending_commands(&self) -> usize {
        self.correlator.pending_count()
    }

    /// All provider instances.
    pub fn providers(&self) -> Vec<ProviderInstance> {
        self.providers.providers()
    }

    /// All provider manifests.
    pub fn provider_manifests(&self) -> Vec<ProviderManifest> {
        self.providers.provider_manifests()
    }

    /// Manifest for `domain`.
    pub fn get_provider_manifest(&self, domain: &str) -> Option<ProviderManifest> {
        self.providers.get_provider_manifest(domain)
    }

    /// Provider by instance id or domain. See [`ProviderCache::get_provider`].
    pub fn get_provider(
        &self,
        instance_id_or_domain: &str,
        include_unavailable: bool,
    ) -> Option<ProviderInstance> {
        self.providers
            .get_provider(instance_id_or_domain, include_unavailable)
    }

    /// Player controls and state.
    pub fn players(&self) -> Players<'_> {
        Players::new(self)
    }

    /// Queue controls and state.
    pub fn player_queues(&self) -> PlayerQueues<'_> {
        PlayerQueues::new(self)
    }

    pub(crate) fn player_store(&self) -> &PlayerStore {
        &self.players
    }

    pub(crate) fn queue_store(&self) -> &QueueStore {
        &self.queues
    }

    /// URL to load `image` from, resized to `size` pixels (`0` for original).
    pub fn image_url(&self, image: &MediaItemImage, size: u32) -> Result<String> {
        let info = self.server_info.read();
        let Some(info) = info.as_ref() else {
            return Err(ClientError::NotConnected);
        };
        Ok(images::image_url(image, size, &info.base_url))
    }
}

#[async_trait]
impl CommandSender for MassClient {
    async fn send_command(
        &self,
        command: &str,
        args: Value,
        require_schema: Option<u32>,
    ) -> Result<Value> {
        MassClient::send_command(self, command, args, require_schema).await
    }
}

impl fmt::Debug for MassClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MassClient")
            .field("server_url", &self.server_url)
            .field("phase", &self.phase())
            .field("connected", &self.connection.connected())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
