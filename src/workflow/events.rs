use crate::workflow::StreamError;
use serde::Deserialize;

/// One typed message pushed by the executor over the live connection.
/// Arrival order is significant; the coordinator applies events exactly in
/// the order they were received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    WorkflowStart { objective: String },
    AgentStart { agent: String },
    AgentComplete { agent: String, thought: Option<String> },
    WorkflowComplete,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    r#type: String,
    #[serde(default)]
    objective: Option<String>,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    thought: Option<String>,
}

impl StreamEvent {
    /// Parses one inbound text frame. Unknown kinds and malformed frames are
    /// protocol errors; callers log and skip them, they are never fatal.
    pub fn parse(text: &str) -> Result<Self, StreamError> {
        let frame: RawFrame = serde_json::from_str(text)
            .map_err(|err| StreamError::Protocol(format!("malformed frame: {err}")))?;
        match frame.r#type.as_str() {
            "workflow_start" => Ok(Self::WorkflowStart {
                objective: frame.objective.unwrap_or_default(),
            }),
            "agent_start" => Ok(Self::AgentStart {
                agent: frame
                    .agent
                    .ok_or_else(|| StreamError::Protocol("agent_start without agent".into()))?,
            }),
            "agent_complete" => Ok(Self::AgentComplete {
                agent: frame
                    .agent
                    .ok_or_else(|| StreamError::Protocol("agent_complete without agent".into()))?,
                thought: frame.thought,
            }),
            "workflow_complete" => Ok(Self::WorkflowComplete),
            other => Err(StreamError::Protocol(format!(
                "unrecognized event type `{other}`"
            ))),
        }
    }
}
