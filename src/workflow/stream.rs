use crate::client::WorkflowKind;
use crate::shared::logging::append_session_log_line;
use crate::workflow::events::StreamEvent;
use crate::workflow::run::WorkflowRun;
use crate::workflow::StreamError;
use serde_json::json;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect, Message, WebSocket};

const PUMP_IDLE_SLEEP: Duration = Duration::from_millis(40);

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
}

struct Inner {
    state: ConnectionState,
    socket: Option<Socket>,
    pending_sends: VecDeque<String>,
    active_objective: Option<String>,
}

/// Owns the single live connection to the workflow event endpoint. All sends
/// are funneled through here; no other component writes to the socket. The
/// inner mutex serializes connection attempts, so a caller that arrives while
/// another is connecting waits for that attempt instead of dialing a second
/// socket.
pub struct StreamCoordinator {
    socket_url: String,
    state_root: PathBuf,
    retry_delay: Duration,
    inner: Mutex<Inner>,
}

impl StreamCoordinator {
    pub fn new(
        socket_url: impl Into<String>,
        state_root: impl Into<PathBuf>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            socket_url: socket_url.into(),
            state_root: state_root.into(),
            retry_delay,
            inner: Mutex::new(Inner {
                state: ConnectionState::Closed,
                socket: None,
                pending_sends: VecDeque::new(),
                active_objective: None,
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.lock_inner().state
    }

    /// No-op when already open; otherwise dials the endpoint and flushes any
    /// sends buffered while the connection was down, in FIFO order.
    pub fn ensure_connected(&self) -> Result<(), StreamError> {
        let mut inner = self.lock_inner();
        self.ensure_connected_locked(&mut inner)
    }

    /// Sends the single outbound message for one workflow. Rejected while a
    /// previous workflow on this connection has not reached a terminal state.
    /// If the connection is down, one reconnect is attempted after a short
    /// fixed delay before giving up.
    pub fn submit_workflow(
        &self,
        objective: &str,
        target: &str,
        kind: WorkflowKind,
    ) -> Result<(), StreamError> {
        // Same validation boundary as the request/response dispatcher.
        let target =
            crate::client::validate_target(target).map_err(|_| StreamError::EmptyTarget)?;

        let mut inner = self.lock_inner();
        if let Some(active) = &inner.active_objective {
            return Err(StreamError::WorkflowActive {
                objective: active.clone(),
            });
        }

        let message = json!({
            "objective": objective,
            "target": target,
            "workflow_type": kind.as_str(),
        })
        .to_string();
        inner.pending_sends.push_back(message.clone());

        if self.ensure_connected_locked(&mut inner).is_err() {
            thread::sleep(self.retry_delay);
            if self.ensure_connected_locked(&mut inner).is_err() {
                // Drop the buffered submission so a manual retry does not
                // double-send it.
                inner.pending_sends.retain(|queued| queued != &message);
                return Err(StreamError::Unavailable);
            }
        }
        inner.active_objective = Some(objective.to_string());
        Ok(())
    }

    /// Reads inbound frames and applies them to the run, strictly in arrival
    /// order, until the run is terminal, the connection drops, or the
    /// deadline passes. A drop mid-workflow leaves the run in its last-known
    /// state; retrying is the caller's decision.
    pub fn pump(&self, run: &mut WorkflowRun, idle_timeout: Duration) {
        let deadline = Instant::now() + idle_timeout;
        loop {
            if run.is_terminal() || Instant::now() >= deadline {
                break;
            }
            let mut inner = self.lock_inner();
            let Some(socket) = inner.socket.as_mut() else {
                break;
            };
            match socket.read() {
                Ok(Message::Text(text)) => {
                    self.apply_frame(run, text.as_str());
                }
                Ok(Message::Ping(payload)) => {
                    let _ = socket.send(Message::Pong(payload));
                }
                Ok(Message::Binary(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                Ok(Message::Close(_)) => {
                    self.close_locked(&mut inner);
                    break;
                }
                Err(tungstenite::Error::Io(err))
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    drop(inner);
                    thread::sleep(PUMP_IDLE_SLEEP);
                }
                Err(tungstenite::Error::ConnectionClosed) => {
                    self.close_locked(&mut inner);
                    break;
                }
                Err(err) => {
                    self.log(&format!("stream read failed: {err}"));
                    self.close_locked(&mut inner);
                    break;
                }
            }
        }
        let mut inner = self.lock_inner();
        if run.is_terminal() {
            inner.active_objective = None;
        }
    }

    pub fn close(&self) {
        let mut inner = self.lock_inner();
        self.close_locked(&mut inner);
    }

    fn apply_frame(&self, run: &mut WorkflowRun, text: &str) {
        match StreamEvent::parse(text) {
            Ok(event) => run.apply_event(&event),
            // Forward compatible: unknown shapes are logged and skipped.
            Err(err) => self.log(&err.to_string()),
        }
    }

    fn ensure_connected_locked(&self, inner: &mut MutexGuard<'_, Inner>) -> Result<(), StreamError> {
        if inner.state == ConnectionState::Open {
            return self.flush_pending(inner);
        }

        inner.state = ConnectionState::Connecting;
        let (mut socket, _) = match connect(self.socket_url.as_str()) {
            Ok(connection) => connection,
            Err(err) => {
                inner.state = ConnectionState::Closed;
                self.log(&format!("stream connect failed: {err}"));
                return Err(StreamError::Connect(err.to_string()));
            }
        };
        set_socket_nonblocking(&mut socket)?;
        inner.socket = Some(socket);
        inner.state = ConnectionState::Open;
        self.log("stream connected");
        self.flush_pending(inner)
    }

    fn flush_pending(&self, inner: &mut MutexGuard<'_, Inner>) -> Result<(), StreamError> {
        while let Some(message) = inner.pending_sends.pop_front() {
            let Some(socket) = inner.socket.as_mut() else {
                inner.pending_sends.push_front(message);
                return Err(StreamError::Send("connection is closed".to_string()));
            };
            if let Err(err) = socket.send(Message::Text(message.clone())) {
                inner.pending_sends.push_front(message);
                self.close_locked(inner);
                return Err(StreamError::Send(err.to_string()));
            }
        }
        Ok(())
    }

    fn close_locked(&self, inner: &mut MutexGuard<'_, Inner>) {
        if let Some(mut socket) = inner.socket.take() {
            let _ = socket.close(None);
        }
        if inner.state != ConnectionState::Closed {
            self.log("stream closed");
        }
        inner.state = ConnectionState::Closed;
        // A dropped connection releases the one-workflow guard so the caller
        // can retry manually.
        inner.active_objective = None;
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn log(&self, line: &str) {
        let _ = append_session_log_line(&self.state_root, line);
    }
}

fn set_socket_nonblocking(socket: &mut Socket) -> Result<(), StreamError> {
    match socket.get_mut() {
        MaybeTlsStream::Plain(stream) => stream.set_nonblocking(true),
        MaybeTlsStream::Rustls(stream) => stream.sock.set_nonblocking(true),
        _ => Ok(()),
    }
    .map_err(|err| StreamError::Connect(format!("failed to configure stream socket: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn unroutable_coordinator(root: &std::path::Path) -> StreamCoordinator {
        // Port 1 refuses immediately, so connect failures are fast.
        StreamCoordinator::new("ws://127.0.0.1:1", root, Duration::from_millis(1))
    }

    #[test]
    fn coordinator_starts_closed() {
        let temp = tempdir().expect("tempdir");
        let coordinator = unroutable_coordinator(temp.path());
        assert_eq!(coordinator.state(), ConnectionState::Closed);
    }

    #[test]
    fn send_while_unreachable_retries_once_then_reports_unavailable() {
        let temp = tempdir().expect("tempdir");
        let coordinator = unroutable_coordinator(temp.path());
        let err = coordinator
            .submit_workflow("scan", "example.com", WorkflowKind::Full)
            .expect_err("unreachable endpoint");
        assert!(matches!(err, StreamError::Unavailable));
        assert_eq!(coordinator.state(), ConnectionState::Closed);
    }

    #[test]
    fn whitespace_targets_are_rejected_before_any_connection_attempt() {
        let temp = tempdir().expect("tempdir");
        let coordinator = unroutable_coordinator(temp.path());
        for target in ["", "   ", "\t\n"] {
            let err = coordinator
                .submit_workflow("scan", target, WorkflowKind::Full)
                .expect_err("empty target");
            // An attempted dial against this endpoint would surface as
            // Unavailable instead.
            assert!(matches!(err, StreamError::EmptyTarget));
        }
        assert_eq!(coordinator.state(), ConnectionState::Closed);
    }

    #[test]
    fn pump_against_a_closed_connection_leaves_the_run_untouched() {
        let temp = tempdir().expect("tempdir");
        let coordinator = unroutable_coordinator(temp.path());
        let mut run = WorkflowRun::new("scan", "example.com");
        let before = run.clone();
        coordinator.pump(&mut run, Duration::from_millis(5));
        assert_eq!(run, before);
    }
}
