use crate::client::{AgentsStatus, ApiClient, ClientError, WorkflowKind};
use crate::config::Settings;
use crate::shared::logging::append_session_log_line;
use crate::tools;
use crate::workflow::fallback::execute_polled;
use crate::workflow::run::WorkflowRun;
use crate::workflow::stream::StreamCoordinator;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub mod tracker;

pub use tracker::{ExecutionRecord, ExecutionStatus, ExecutionTracker};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to allocate execution id: {0}")]
    IdAllocation(String),
    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    User,
    Assistant,
    Workflow,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub kind: ChatKind,
    pub content: String,
    pub timestamp: i64,
}

pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// One client session: the chat transcript, the execution tracker, the
/// optional active workflow run, and the single stream connection. All of it
/// is in-memory and session-scoped; `clear` resets everything at once.
pub struct Session {
    settings: Settings,
    client: ApiClient,
    stream: Arc<StreamCoordinator>,
    tracker: Arc<Mutex<ExecutionTracker>>,
    transcript: Vec<ChatEntry>,
    run: Option<WorkflowRun>,
    agents: Option<AgentsStatus>,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        let client = ApiClient::new(&settings);
        let stream = Arc::new(StreamCoordinator::new(
            settings.socket_url.clone(),
            settings.state_root.clone(),
            Duration::from_millis(settings.stream_retry_delay_ms),
        ));
        Self {
            settings,
            client,
            stream,
            tracker: Arc::new(Mutex::new(ExecutionTracker::new())),
            transcript: Vec::new(),
            run: None,
            agents: None,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn stream(&self) -> &Arc<StreamCoordinator> {
        &self.stream
    }

    pub fn transcript(&self) -> &[ChatEntry] {
        &self.transcript
    }

    pub fn active_run(&self) -> Option<&WorkflowRun> {
        self.run.as_ref()
    }

    pub fn agents_status(&self) -> Option<&AgentsStatus> {
        self.agents.as_ref()
    }

    pub fn push_entry(&mut self, kind: ChatKind, content: impl Into<String>) {
        self.transcript.push(ChatEntry {
            kind,
            content: content.into(),
            timestamp: now_secs(),
        });
    }

    pub fn with_tracker<T>(&self, f: impl FnOnce(&ExecutionTracker) -> T) -> T {
        f(&lock_tracker(&self.tracker))
    }

    /// Validates, records a running execution, and dispatches the network
    /// call on a worker thread. Returns the record id as soon as the record
    /// exists so the caller can show feedback before the request resolves;
    /// any number of executions may be in flight at once.
    pub fn execute_tool(
        &mut self,
        tool_id: &str,
        target: &str,
    ) -> Result<(String, JoinHandle<()>), SessionError> {
        let tool = tools::lookup(tool_id).map_err(ClientError::from)?;
        let target = crate::client::validate_target(target)
            .map_err(SessionError::Client)?
            .to_string();

        let id = lock_tracker(&self.tracker).begin(tool.id, &target, now_secs())?;
        self.log(&format!("execution {id} started tool={} target={target}", tool.id));

        let client = self.client.clone();
        let tracker = Arc::clone(&self.tracker);
        let tool_id = tool.id.to_string();
        let record_id = id.clone();
        let handle = thread::spawn(move || {
            let started = Instant::now();
            let outcome = match client.execute_tool(&tool_id, &target) {
                Ok(outcome) => outcome,
                // Inputs were validated before dispatch; anything surfacing
                // here is recorded as a plain failure.
                Err(err) => crate::client::ToolOutcome {
                    success: false,
                    output: err.to_string(),
                },
            };
            lock_tracker(&tracker).complete(
                &record_id,
                outcome.success,
                &outcome.output,
                started.elapsed().as_secs(),
            );
        });
        Ok((id, handle))
    }

    /// Blocking variant: dispatches and waits for the terminal transition.
    pub fn execute_tool_blocking(
        &mut self,
        tool_id: &str,
        target: &str,
    ) -> Result<ExecutionRecord, SessionError> {
        let (id, handle) = self.execute_tool(tool_id, target)?;
        let _ = handle.join();
        let record = self.with_tracker(|tracker| {
            tracker
                .records()
                .iter()
                .find(|record| record.id == id)
                .cloned()
        });
        record.ok_or_else(|| {
            // Only reachable if the session was cleared mid-flight.
            SessionError::Client(ClientError::Transport(format!(
                "execution `{id}` was cleared before completion"
            )))
        })
    }

    /// Runs a workflow in request/response mode with simulated step cadence.
    /// The resulting run is available through `active_run`.
    pub fn run_workflow_polled(
        &mut self,
        objective: &str,
        target: &str,
        kind: WorkflowKind,
        step_delay: Duration,
    ) -> Result<(), ClientError> {
        let target = crate::client::validate_target(target)?;
        self.push_entry(ChatKind::User, format!("workflow: {objective} ({target})"));

        let mut run = WorkflowRun::new(objective, target);
        let outcome = execute_polled(&self.client, &mut run, kind, step_delay);
        match &outcome {
            Ok(()) => {
                let used = run
                    .final_result
                    .as_ref()
                    .map(|r| r.agents_used)
                    .unwrap_or_default();
                self.push_entry(
                    ChatKind::Workflow,
                    format!("workflow completed, {used} agents used"),
                );
            }
            Err(err) => self.push_entry(ChatKind::Error, err.to_string()),
        }
        self.run = Some(run);
        outcome
    }

    /// Runs a workflow in streaming mode: one outbound submission, then the
    /// coordinator pumps events into the run until it is terminal, the
    /// connection drops, or the window elapses.
    pub fn run_workflow_streamed(
        &mut self,
        objective: &str,
        target: &str,
        kind: WorkflowKind,
        window: Duration,
    ) -> Result<(), SessionError> {
        let target = crate::client::validate_target(target)?;
        self.push_entry(ChatKind::User, format!("workflow: {objective} ({target})"));

        let mut run = WorkflowRun::new(objective, target);
        if let Err(err) = self.stream.submit_workflow(objective, target, kind) {
            self.push_entry(ChatKind::Error, err.to_string());
            return Err(SessionError::Client(ClientError::Transport(
                err.to_string(),
            )));
        }
        self.stream.pump(&mut run, window);
        for line in &run.status_lines {
            self.transcript.push(ChatEntry {
                kind: ChatKind::Workflow,
                content: line.clone(),
                timestamp: now_secs(),
            });
        }
        if run.is_terminal() {
            self.push_entry(ChatKind::Workflow, "workflow completed");
        }
        self.run = Some(run);
        Ok(())
    }

    pub fn refresh_agents_status(&mut self) -> Result<AgentsStatus, ClientError> {
        let status = self.client.fetch_agents_status()?;
        self.agents = Some(status.clone());
        Ok(status)
    }

    /// Empties the transcript, the tracker, and the active run atomically.
    /// The remote clear is best-effort: a failed `DELETE /history` never
    /// fails the local clear.
    pub fn clear(&mut self) {
        self.transcript.clear();
        lock_tracker(&self.tracker).clear();
        self.run = None;
        if let Err(err) = self.client.clear_remote_history() {
            self.log(&format!("remote history clear failed: {err}"));
        }
    }

    fn log(&self, line: &str) {
        let _ = append_session_log_line(&self.settings.state_root, line);
    }
}

fn lock_tracker(tracker: &Mutex<ExecutionTracker>) -> MutexGuard<'_, ExecutionTracker> {
    tracker.lock().unwrap_or_else(|err| err.into_inner())
}
