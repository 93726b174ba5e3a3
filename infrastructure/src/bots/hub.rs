//! Bot hub: the gateway side of the tool backend protocol.
//!
//! Accepts backend connections, runs the registration handshake, and
//! dispatches tool invocations with correlation ids and deadlines.
//!
//! # Connection anatomy
//!
//! Each accepted socket is split once. The read half is owned exclusively
//! by a reader task (no lock around the socket), which routes `result`
//! frames to pending invocations through a correlation map of oneshot
//! senders. The write half is owned by a writer task fed from an mpsc
//! channel, so concurrent invocations never interleave partial lines.
//!
//! # Lifecycle
//!
//! - handshake: first frame must be `register`; anything else drops the
//!   connection
//! - re-registration (same backend id reconnecting) replaces the previous
//!   connection and descriptor set
//! - disconnect: the reader task unregisters the backend and fails every
//!   pending invocation with `BackendUnavailable`
//! - deadline: enforced here with `tokio::time::timeout`; a late result
//!   finds no pending entry and is discarded

use super::protocol::{BotFrame, decode_frame, encode_frame};
use async_trait::async_trait;
use crossbar_application::ports::tool_invoker::{InvokeError, ToolInvoker};
use crossbar_application::ports::tool_registry::ToolRegistryPort;
use crossbar_domain::{BackendId, ToolFault, ToolInvocation, ToolOutcome};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a fresh connection may sit silent before the handshake is
/// abandoned.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

struct BotConnection {
    outbound: mpsc::UnboundedSender<BotFrame>,
    pending: Mutex<HashMap<String, oneshot::Sender<BotFrame>>>,
}

impl BotConnection {
    /// Fail every pending invocation; their awaiting callers observe a
    /// closed channel and report the backend unavailable.
    fn abandon_pending(&self) {
        self.pending.lock().unwrap().clear();
    }
}

/// Gateway-side hub for tool backends.
pub struct BotHub {
    registry: Arc<dyn ToolRegistryPort>,
    connections: RwLock<HashMap<BackendId, Arc<BotConnection>>>,
}

impl BotHub {
    pub fn new(registry: Arc<dyn ToolRegistryPort>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            connections: RwLock::new(HashMap::new()),
        })
    }

    /// Number of currently connected backends.
    pub fn connected_backends(&self) -> usize {
        self.connections.read().unwrap().len()
    }

    /// Accept backend connections until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, listener: TcpListener, shutdown: CancellationToken) {
        info!(addr = ?listener.local_addr().ok(), "bot hub listening");
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "backend connection accepted");
                            let hub = self.clone();
                            tokio::spawn(async move {
                                if let Err(e) = hub.handle_connection(stream).await {
                                    warn!(%peer, error = %e, "backend connection ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("bot hub shutting down");
                    break;
                }
            }
        }
    }

    /// Handshake, then pump frames until the backend goes away.
    async fn handle_connection(self: Arc<Self>, stream: TcpStream) -> std::io::Result<()> {
        let (read_half, write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        // handshake: first frame must be `register`
        let first = tokio::time::timeout(HANDSHAKE_TIMEOUT, lines.next_line()).await;
        let (backend, tools) = match first {
            Ok(Ok(Some(line))) => match decode_frame(&line) {
                Ok(BotFrame::Register { backend_id, tools }) => (BackendId::new(backend_id), tools),
                Ok(other) => {
                    warn!(frame = ?other, "backend sent non-register frame first, dropping");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "unparseable handshake frame, dropping");
                    return Ok(());
                }
            },
            Ok(Ok(None)) | Ok(Err(_)) => return Ok(()),
            Err(_) => {
                warn!("handshake timed out, dropping connection");
                return Ok(());
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Arc::new(BotConnection {
            outbound: tx,
            pending: Mutex::new(HashMap::new()),
        });

        self.registry.register(backend.clone(), tools);
        // a reconnect replaces the previous connection; its writer ends
        // when the old sender drops
        self.connections
            .write()
            .unwrap()
            .insert(backend.clone(), connection.clone());

        let writer = tokio::spawn(write_frames(write_half, rx));
        let _ = connection
            .outbound
            .send(BotFrame::Registered {
                backend_id: backend.to_string(),
            });
        info!(backend = %backend, "backend registered");

        // route result frames to their pending invocations
        while let Ok(Some(line)) = lines.next_line().await {
            match decode_frame(&line) {
                Ok(BotFrame::Result {
                    correlation_id,
                    output,
                    error,
                }) => {
                    let sender = connection.pending.lock().unwrap().remove(&correlation_id);
                    match sender {
                        Some(sender) => {
                            let _ = sender.send(BotFrame::Result {
                                correlation_id,
                                output,
                                error,
                            });
                        }
                        None => {
                            // deadline already passed, result discarded
                            debug!(%correlation_id, "late result discarded");
                        }
                    }
                }
                Ok(other) => {
                    warn!(backend = %backend, frame = ?other, "unexpected frame from backend");
                }
                Err(e) => {
                    warn!(backend = %backend, error = %e, "unparseable frame from backend");
                }
            }
        }

        // disconnect: tear down unless a reconnect already replaced us
        let mut connections = self.connections.write().unwrap();
        let still_current = connections
            .get(&backend)
            .is_some_and(|current| Arc::ptr_eq(current, &connection));
        if still_current {
            connections.remove(&backend);
            drop(connections);
            self.registry.unregister(&backend);
            info!(backend = %backend, "backend disconnected");
        } else {
            drop(connections);
            debug!(backend = %backend, "stale connection closed after reconnect");
        }
        connection.abandon_pending();
        writer.abort();
        Ok(())
    }
}

/// Writer task: serialize frames one per line, single owner of the write
/// half.
async fn write_frames(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<BotFrame>) {
    while let Some(frame) = rx.recv().await {
        let line = match encode_frame(&frame) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to encode frame");
                continue;
            }
        };
        if write_half.write_all(line.as_bytes()).await.is_err()
            || write_half.write_all(b"\n").await.is_err()
        {
            break;
        }
    }
}

#[async_trait]
impl ToolInvoker for BotHub {
    async fn invoke(
        &self,
        backend: &BackendId,
        invocation: &ToolInvocation,
        deadline: Duration,
    ) -> Result<ToolOutcome, InvokeError> {
        let connection = self
            .connections
            .read()
            .unwrap()
            .get(backend)
            .cloned()
            .ok_or_else(|| InvokeError::BackendUnavailable(backend.clone()))?;

        let correlation_id = invocation.call_id.to_string();
        let (tx, rx) = oneshot::channel();
        connection
            .pending
            .lock()
            .unwrap()
            .insert(correlation_id.clone(), tx);

        let frame = BotFrame::Invoke {
            correlation_id: correlation_id.clone(),
            tool: invocation.tool_name.clone(),
            args: invocation.arguments.clone(),
        };
        if connection.outbound.send(frame).is_err() {
            connection.pending.lock().unwrap().remove(&correlation_id);
            return Err(InvokeError::BackendUnavailable(backend.clone()));
        }

        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(BotFrame::Result { output, error, .. })) => Ok(match error {
                Some(message) => ToolOutcome::fault(
                    invocation.call_id.clone(),
                    &invocation.tool_name,
                    ToolFault::invocation_failed(message),
                ),
                None => ToolOutcome::success(
                    invocation.call_id.clone(),
                    &invocation.tool_name,
                    output.unwrap_or_default(),
                ),
            }),
            // only result frames are routed to pending senders
            Ok(Ok(_)) | Ok(Err(_)) => Err(InvokeError::BackendUnavailable(backend.clone())),
            Err(_elapsed) => {
                connection.pending.lock().unwrap().remove(&correlation_id);
                Err(InvokeError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BackendToolRegistry;
    use crossbar_domain::ToolDescriptor;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    async fn start_hub() -> (Arc<BotHub>, Arc<BackendToolRegistry>, std::net::SocketAddr) {
        let registry = Arc::new(BackendToolRegistry::new());
        let hub = BotHub::new(registry.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(hub.clone().run(listener, CancellationToken::new()));
        (hub, registry, addr)
    }

    /// Connect as a backend, register, and wait for the acknowledgment.
    async fn connect_bot(
        addr: std::net::SocketAddr,
        backend_id: &str,
        tools: Vec<ToolDescriptor>,
    ) -> TcpStream {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let register = encode_frame(&BotFrame::Register {
            backend_id: backend_id.into(),
            tools,
        })
        .unwrap();
        stream.write_all(register.as_bytes()).await.unwrap();
        stream.write_all(b"\n").await.unwrap();

        let (read_half, write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let ack = lines.next_line().await.unwrap().unwrap();
        assert!(matches!(
            decode_frame(&ack).unwrap(),
            BotFrame::Registered { .. }
        ));
        read_half_reunite(lines, write_half)
    }

    fn read_half_reunite(
        lines: tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
        write_half: OwnedWriteHalf,
    ) -> TcpStream {
        let read_half = lines.into_inner().into_inner();
        read_half.reunite(write_half).unwrap()
    }

    fn invocation(tool: &str) -> ToolInvocation {
        ToolInvocation::new(tool, serde_json::json!({"city": "Paris"}))
    }

    #[tokio::test]
    async fn register_then_invoke_round_trips() {
        let (hub, registry, addr) = start_hub().await;
        let stream = connect_bot(
            addr,
            "weather-bot",
            vec![ToolDescriptor::new("get_weather", "Weather")],
        )
        .await;

        // registration is visible through the registry
        use crossbar_application::ports::tool_registry::ToolRegistryPort as _;
        let (_, backend) = registry.resolve("get_weather").unwrap();
        assert_eq!(backend, BackendId::new("weather-bot"));

        // echo bot: answer each invoke with a canned result
        let (read_half, mut write_half) = stream.into_split();
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Ok(BotFrame::Invoke { correlation_id, .. }) = decode_frame(&line) {
                    let reply = encode_frame(&BotFrame::Result {
                        correlation_id,
                        output: Some("{\"temp\": 18}".into()),
                        error: None,
                    })
                    .unwrap();
                    write_half.write_all(reply.as_bytes()).await.unwrap();
                    write_half.write_all(b"\n").await.unwrap();
                }
            }
        });

        let outcome = hub
            .invoke(&backend, &invocation("get_weather"), Duration::from_secs(2))
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.output.as_deref(), Some("{\"temp\": 18}"));
    }

    #[tokio::test]
    async fn backend_error_becomes_fault_outcome() {
        let (hub, _registry, addr) = start_hub().await;
        let stream = connect_bot(addr, "flaky-bot", vec![ToolDescriptor::new("flaky", "")]).await;

        let (read_half, mut write_half) = stream.into_split();
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Ok(BotFrame::Invoke { correlation_id, .. }) = decode_frame(&line) {
                    let reply = encode_frame(&BotFrame::Result {
                        correlation_id,
                        output: None,
                        error: Some("disk on fire".into()),
                    })
                    .unwrap();
                    write_half.write_all(reply.as_bytes()).await.unwrap();
                    write_half.write_all(b"\n").await.unwrap();
                }
            }
        });

        let outcome = hub
            .invoke(
                &BackendId::new("flaky-bot"),
                &invocation("flaky"),
                Duration::from_secs(2),
            )
            .await
            .unwrap();
        assert!(!outcome.is_success());
        let fault = outcome.fault.unwrap();
        assert_eq!(fault.code, crossbar_domain::FaultCode::InvocationFailed);
        assert!(fault.message.contains("disk on fire"));
    }

    #[tokio::test]
    async fn silent_backend_times_out() {
        let (hub, _registry, addr) = start_hub().await;
        // bot registers but never answers invokes
        let _stream = connect_bot(addr, "silent-bot", vec![ToolDescriptor::new("slow", "")]).await;

        let result = hub
            .invoke(
                &BackendId::new("silent-bot"),
                &invocation("slow"),
                Duration::from_millis(100),
            )
            .await;
        assert!(matches!(result, Err(InvokeError::Timeout)));
    }

    #[tokio::test]
    async fn disconnect_unregisters_and_fails_future_invokes() {
        let (hub, registry, addr) = start_hub().await;
        let stream = connect_bot(addr, "gone-bot", vec![ToolDescriptor::new("gone", "")]).await;

        drop(stream);
        // give the reader task a moment to observe EOF
        tokio::time::sleep(Duration::from_millis(100)).await;

        use crossbar_application::ports::tool_registry::ToolRegistryPort as _;
        assert!(registry.resolve("gone").is_err());
        assert_eq!(hub.connected_backends(), 0);

        let result = hub
            .invoke(
                &BackendId::new("gone-bot"),
                &invocation("gone"),
                Duration::from_secs(1),
            )
            .await;
        assert!(matches!(result, Err(InvokeError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn reconnect_replaces_previous_registration() {
        let (hub, registry, addr) = start_hub().await;
        let _first = connect_bot(addr, "twin-bot", vec![ToolDescriptor::new("old_tool", "")]).await;
        let _second =
            connect_bot(addr, "twin-bot", vec![ToolDescriptor::new("new_tool", "")]).await;

        use crossbar_application::ports::tool_registry::ToolRegistryPort as _;
        assert!(registry.resolve("old_tool").is_err());
        assert!(registry.resolve("new_tool").is_ok());
        assert_eq!(hub.connected_backends(), 1);
    }
}
