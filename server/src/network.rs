//! Server network layer: TCP admission, per-connection request handling and
//! the fixed-rate tick loop.

use crate::error::{GameError, ServerError};
use crate::orchestrator::Orchestrator;
use crate::ServerConfig;
use log::{debug, error, info, warn};
use shared::protocol::{split_messages, REPLY_CLOSING};
use shared::{PlayerKey, Request, RECV_BUFFER_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Session state shared by the tick loop and every connection task.
pub type SharedState = Arc<RwLock<Orchestrator>>;

/// Main server coordinating connections and simulation
pub struct Server {
    listener: TcpListener,
    state: SharedState,
    tick_duration: Duration,
}

impl Server {
    /// Binds the listening socket. A bind failure is fatal.
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let addr = config.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!("Server listening on {}", addr);

        Ok(Server {
            listener,
            state: Arc::new(RwLock::new(Orchestrator::new(config, Instant::now()))),
            tick_duration: config.tick_duration(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Spawns the task accepting new connections until the session stops.
    fn spawn_acceptor(listener: TcpListener, state: SharedState) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if !state.read().await.is_running() {
                            break;
                        }
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, state).await {
                                warn!("Connection from {} ended with an error: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    /// Main server loop: ticks the session until it stops running.
    pub async fn run(self) -> Result<(), ServerError> {
        let acceptor = Self::spawn_acceptor(self.listener, Arc::clone(&self.state));

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();
        let mut tick: u64 = 0;

        info!("Server started successfully");

        loop {
            tick_interval.tick().await;

            let now = Instant::now();
            let dt = now.duration_since(last_tick).as_secs_f32();
            last_tick = now;
            tick += 1;

            let running = {
                let mut state = self.state.write().await;
                if let Some(fps) = measured_fps(tick, dt) {
                    state.set_measured_fps(fps);
                }
                state.tick(now);
                state.is_running()
            };

            // Periodic performance monitoring
            if tick % 60 == 0 {
                let state = self.state.read().await;
                debug!(
                    "Tick {}: {} connected, phase {}, {:.1}Hz",
                    tick,
                    state.registry().connected_count(),
                    state.phase_name(),
                    1.0 / dt.max(f32::EPSILON)
                );
            }

            if !running {
                break;
            }
        }

        acceptor.abort();
        info!("Server shutting down after {} ticks", tick);
        Ok(())
    }
}

/// Frame rate implied by the last tick interval. The first interval tick fires
/// immediately, so it carries no measurement.
fn measured_fps(tick: u64, dt: f32) -> Option<f32> {
    (tick > 1 && dt > 0.0).then(|| 1.0 / dt)
}

/// Serves one client from admission to disconnection.
async fn handle_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    state: SharedState,
) -> Result<(), ServerError> {
    let admission = state.write().await.connect();
    let key = match admission {
        Ok(key) => key,
        Err(err) => {
            info!("Rejected connection from {}: {}", addr, err);
            stream.write_all(err.reply().as_bytes()).await?;
            return Ok(());
        }
    };
    info!("Player {} connected from {}", key, addr);

    let result = serve_player(&mut stream, key, &state).await;

    state.write().await.disconnect(&key);
    info!("Player {} disconnected", key);
    result
}

async fn serve_player(
    stream: &mut TcpStream,
    key: PlayerKey,
    state: &SharedState,
) -> Result<(), ServerError> {
    stream.write_all(key.to_string().as_bytes()).await?;

    let mut buffer = [0u8; RECV_BUFFER_SIZE];
    let mut named = false;

    loop {
        let len = stream.read(&mut buffer).await?;
        if len == 0 {
            return Ok(());
        }

        let chunk = String::from_utf8_lossy(&buffer[..len]);
        for message in split_messages(&chunk) {
            if !named {
                named = true;
                if let Err(e) = state.write().await.set_name(&key, message) {
                    warn!("Could not name player {}: {}", key, e);
                }
                continue;
            }

            let (reply, close) = {
                let mut orchestrator = state.write().await;
                respond(&mut orchestrator, key, message, Instant::now())
            };
            stream.write_all(reply.as_bytes()).await?;
            if close {
                return Ok(());
            }
        }
    }
}

/// Produces the reply to one message and whether the connection should close.
pub fn respond(
    orchestrator: &mut Orchestrator,
    key: PlayerKey,
    message: &str,
    now: Instant,
) -> (String, bool) {
    let request = match Request::parse(message) {
        Ok(Request::Close) => return (REPLY_CLOSING.to_string(), true),
        Ok(request) => request,
        Err(e) => {
            debug!("Malformed request from player {}: {}", key, e);
            return (GameError::from(e).reply().to_string(), false);
        }
    };

    match orchestrator.dispatch(key, request, now) {
        Ok(reply) => (reply, false),
        Err(e) => {
            debug!("Request '{}' from player {} failed: {}", message, key, e);
            (e.reply().to_string(), false)
        }
    }
}
