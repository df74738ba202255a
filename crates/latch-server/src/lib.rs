//! Latch device server.
//!
//! This crate runs a [`Device`] behind a TCP listener using:
//! - Tokio for the async runtime
//! - Length-prefixed CBOR frames from `latch-proto`
//! - System time and cryptographic RNG
//!
//! ## Architecture
//!
//! ```text
//! latch-server
//!   ├─ SystemEnv          (production Environment impl)
//!   ├─ SigningIdentity    (ed25519 device identity)
//!   ├─ FileOwnerStore     (owner pattern persistence)
//!   └─ Device             (mode gate, access control, lock handler)
//! ```
//!
//! Each connection carries one request/response exchange at a time. The
//! blessings in a request are taken as presented; a transport with a
//! security handshake is expected to supply them in a real deployment.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod identity;
pub mod storage;
mod system_env;

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use bytes::BytesMut;
pub use error::ServerError;
pub use identity::{SigningIdentity, verify_issued};
use latch_core::{
    Actuator, BlessingName, CallerCredential, Device, DeviceConfig, Environment, MemoryActuator,
};
use latch_proto::{ErrorCode, Request, Response, decode_frame, encode_frame};
pub use storage::FileOwnerStore;
pub use system_env::SystemEnv;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
    sync::Semaphore,
};

/// File in the state directory holding the identity seed.
pub const IDENTITY_FILE: &str = "identity.key";

/// File in the state directory holding the owner record.
pub const OWNER_FILE: &str = "owner.cbor";

/// Pause after a failed accept before polling the listener again.
///
/// Accept errors such as `EMFILE` persist until a connection closes.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Device type served by [`Server`].
pub type ServerDevice = Device<SystemEnv, Arc<dyn Actuator>>;

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:7400")
    pub bind_address: String,
    /// Directory holding the identity seed and owner record
    pub state_dir: PathBuf,
    /// Root blessing name of the device identity
    pub device_name: String,
    /// Actuation and status timeouts
    pub device: DeviceConfig,
    /// Simulated travel time of the in-memory actuator
    pub actuator_latency: Duration,
    /// Maximum concurrent connections
    pub max_connections: usize,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7400".to_string(),
            state_dir: PathBuf::from("latch-state"),
            device_name: "device".to_string(),
            device: DeviceConfig::default(),
            actuator_latency: Duration::from_millis(200),
            max_connections: 64,
        }
    }
}

/// Production latch server.
pub struct Server {
    device: Arc<ServerDevice>,
    listener: TcpListener,
    connections: Arc<Semaphore>,
    env: SystemEnv,
}

impl Server {
    /// Load state, build the device and bind the listener.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The device name is not a valid blessing name
    /// - The identity seed or owner record cannot be read
    /// - Binding to the address fails
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let env = SystemEnv::new();

        let name = BlessingName::parse(config.device_name.as_str())
            .map_err(|e| ServerError::Config(format!("device name {:?}: {}", config.device_name, e)))?;
        let identity =
            SigningIdentity::load_or_generate(&config.state_dir.join(IDENTITY_FILE), name, &env)?;
        let store = FileOwnerStore::new(config.state_dir.join(OWNER_FILE));

        tracing::warn!("No actuator driver configured - using in-memory actuator");
        let actuator: Arc<dyn Actuator> =
            Arc::new(MemoryActuator::with_state(false, config.actuator_latency));

        let device = Device::builder(env, actuator, Arc::new(identity))
            .store(Box::new(store))
            .config(config.device)
            .build()?;

        Self::with_device(&config.bind_address, Arc::new(device), config.max_connections).await
    }

    /// Bind a listener in front of an existing device.
    ///
    /// # Errors
    ///
    /// Returns error if `max_connections` is zero or binding fails.
    pub async fn with_device(
        bind_address: &str,
        device: Arc<ServerDevice>,
        max_connections: usize,
    ) -> Result<Self, ServerError> {
        if max_connections == 0 {
            return Err(ServerError::Config("max_connections must be at least 1".to_string()));
        }

        let listener = TcpListener::bind(bind_address).await?;

        tracing::warn!("Caller blessings are trusted as presented - no transport authentication");

        Ok(Self {
            device,
            listener,
            connections: Arc::new(Semaphore::new(max_connections)),
            env: SystemEnv::new(),
        })
    }

    /// The served device.
    pub fn device(&self) -> &Arc<ServerDevice> {
        &self.device
    }

    /// Run the server, accepting connections and serving requests.
    ///
    /// This method runs until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.local_addr()?);

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    back_off_after_accept_error(&self.env, &e).await;
                    continue;
                },
            };

            let Ok(permit) = Arc::clone(&self.connections).try_acquire_owned() else {
                tracing::warn!("Connection limit reached, dropping {}", peer);
                continue;
            };

            let device = Arc::clone(&self.device);
            tokio::spawn(async move {
                tracing::debug!("New connection: {}", peer);
                if let Err(e) = serve_connection(stream, &device).await {
                    tracing::debug!("Connection {} closed with error: {}", peer, e);
                }
                drop(permit);
            });
        }
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

async fn back_off_after_accept_error(env: &impl Environment, error: &std::io::Error) {
    tracing::error!("Accept error: {}, retrying in {:?}", error, ACCEPT_BACKOFF);
    env.sleep(ACCEPT_BACKOFF).await;
}

/// Serve requests on one connection until the peer hangs up.
///
/// A frame that cannot be decoded is answered with `BadRequest` (id 0) and
/// ends the connection, since the stream can no longer be resynchronized.
///
/// # Errors
///
/// Returns the transport or protocol error that ended the connection.
pub async fn serve_connection<S, E, A>(mut stream: S, device: &Device<E, A>) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    E: Environment,
    A: Actuator,
{
    let mut inbound = BytesMut::with_capacity(4096);
    let mut outbound = BytesMut::with_capacity(4096);

    loop {
        let request = match decode_frame::<Request>(&mut inbound) {
            Ok(Some(request)) => request,
            Ok(None) => {
                if stream.read_buf(&mut inbound).await? == 0 {
                    if !inbound.is_empty() {
                        tracing::debug!("Peer closed mid-frame ({} bytes pending)", inbound.len());
                    }
                    return Ok(());
                }
                continue;
            },
            Err(e) => {
                tracing::warn!("Frame decode error: {}", e);
                outbound.clear();
                encode_frame(&Response::err(0, ErrorCode::BadRequest), &mut outbound)?;
                stream.write_all(&outbound).await?;
                stream.flush().await?;
                return Err(e.into());
            },
        };

        let response = handle_request(device, request).await;

        outbound.clear();
        encode_frame(&response, &mut outbound)?;
        stream.write_all(&outbound).await?;
        stream.flush().await?;
    }
}

/// Dispatch one request and build its response.
pub async fn handle_request<E, A>(device: &Device<E, A>, request: Request) -> Response
where
    E: Environment,
    A: Actuator,
{
    let Request { id, blessings, call } = request;
    let caller = CallerCredential::from_presented(blessings);
    let method = call.method();

    tracing::debug!("request {}: {} from {}", id, method, caller);

    match device.dispatch(&caller, call.into()).await {
        Ok(reply) => Response::ok(id, reply.into()),
        Err(e) => {
            tracing::debug!("request {}: {} failed: {}", id, method, e);
            Response::err(id, e.code())
        },
    }
}
