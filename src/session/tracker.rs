use crate::session::SessionError;
use crate::shared::ids::generate_execution_id;
use serde::{Deserialize, Serialize};

const ID_MAX_GENERATION_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One dispatched tool invocation. `tool_id` and `target` are immutable after
/// creation; `status` moves running -> completed or running -> failed exactly
/// once and is never reversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: String,
    pub tool_id: String,
    pub target: String,
    pub status: ExecutionStatus,
    pub output: String,
    pub started_at: i64,
    pub duration_seconds: Option<u64>,
}

/// Ordered, most-recent-first collection of execution records. The tracker
/// does not serialize tool calls; any number of records may be running at
/// once, and ordering guarantees apply only within a single record.
#[derive(Debug, Default)]
pub struct ExecutionTracker {
    records: Vec<ExecutionRecord>,
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a running record at the head of the collection and returns its
    /// session-unique id before any network activity happens.
    pub fn begin(
        &mut self,
        tool_id: &str,
        target: &str,
        now: i64,
    ) -> Result<String, SessionError> {
        let id = self.allocate_id(now)?;
        self.records.insert(
            0,
            ExecutionRecord {
                id: id.clone(),
                tool_id: tool_id.to_string(),
                target: target.to_string(),
                status: ExecutionStatus::Running,
                output: String::new(),
                started_at: now,
                duration_seconds: None,
            },
        );
        Ok(id)
    }

    /// Terminal transition for one record. Unknown ids are dropped silently
    /// (a completion can legitimately arrive after a clear). A repeated
    /// completion only rewrites `output` (last write wins); status and
    /// duration stay as the first completion left them.
    pub fn complete(&mut self, id: &str, success: bool, output: &str, duration_seconds: u64) {
        let Some(record) = self.records.iter_mut().find(|record| record.id == id) else {
            return;
        };
        if record.status.is_terminal() {
            record.output = output.to_string();
            return;
        }
        record.status = if success {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        record.output = output.to_string();
        record.duration_seconds = Some(duration_seconds);
    }

    /// Empties the collection atomically. In-flight completions against
    /// pre-clear ids become no-ops.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn allocate_id(&self, now: i64) -> Result<String, SessionError> {
        for _ in 0..ID_MAX_GENERATION_ATTEMPTS {
            let id = generate_execution_id(now).map_err(SessionError::IdAllocation)?;
            if !self.records.iter().any(|record| record.id == id) {
                return Ok(id);
            }
        }
        Err(SessionError::IdAllocation(format!(
            "failed to allocate unique execution id after {ID_MAX_GENERATION_ATTEMPTS} attempts"
        )))
    }
}
