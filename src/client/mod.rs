use crate::config::Settings;
use crate::tools::{self, ToolError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("unknown tool `{tool_id}`")]
    UnknownTool { tool_id: String },
    #[error("target must be non-empty")]
    EmptyTarget,
    #[error("api request failed: {0}")]
    Transport(String),
    #[error("api response decode failed: {0}")]
    Decode(String),
}

impl From<ToolError> for ClientError {
    fn from(value: ToolError) -> Self {
        match value {
            ToolError::UnknownTool { tool_id } => Self::UnknownTool { tool_id },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    Full,
    ReconOnly,
    ExploitOnly,
}

impl WorkflowKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::ReconOnly => "recon_only",
            Self::ExploitOnly => "exploit_only",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "recon_only" => Ok(Self::ReconOnly),
            "exploit_only" => Ok(Self::ExploitOnly),
            _ => Err("workflow type must be one of: full, recon_only, exploit_only".to_string()),
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Uniform result envelope for one tool dispatch. Transport failures and
/// remote-reported failures both land here as `success: false`; the caller
/// records them as a normal failed execution, never as a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub success: bool,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkflowHistoryEntry {
    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct WorkflowResult {
    #[serde(default)]
    pub history: Vec<WorkflowHistoryEntry>,
    #[serde(default)]
    pub agents_used: u32,
    #[serde(default)]
    pub timestamp: String,
}

/// Either an acceptance acknowledgment (streaming/polled mode) or the full
/// result delivered inline.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowSubmission {
    Accepted { workflow_id: String },
    Completed(WorkflowResult),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AgentDescriptor {
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub memory_size: usize,
    #[serde(default)]
    pub ai_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct AgentsStatus {
    #[serde(default)]
    pub ai_enabled: bool,
    #[serde(default)]
    pub agents: Vec<AgentDescriptor>,
}

/// Normalizes the executor's heterogeneous response bodies into one string:
/// an `output` field wins, else a `result` field, else a pretty-printed dump
/// of the whole body. This priority order is the whole contract; keep it in
/// this one function.
pub fn normalize_output(body: &Value) -> String {
    for key in ["output", "result"] {
        match body.get(key) {
            Some(Value::String(text)) => return text.clone(),
            Some(Value::Null) | None => {}
            Some(other) => {
                return serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())
            }
        }
    }
    serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string())
}

pub fn validate_target(target: &str) -> Result<&str, ClientError> {
    let trimmed = target.trim();
    if trimmed.is_empty() {
        return Err(ClientError::EmptyTarget);
    }
    Ok(trimmed)
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    api_base: String,
}

impl ApiClient {
    pub fn new(settings: &Settings) -> Self {
        Self {
            api_base: settings.api_base.clone(),
        }
    }

    pub fn with_base(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), path)
    }

    fn post_json(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        let response = ureq::post(&self.endpoint(path))
            .send_json(body)
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        response
            .into_json::<Value>()
            .map_err(|err| ClientError::Decode(err.to_string()))
    }

    fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ClientError> {
        let mut url = self.endpoint(path);
        if !query.is_empty() {
            let encoded = query
                .iter()
                .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url = format!("{url}?{encoded}");
        }
        let response = ureq::get(&url)
            .call()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        response
            .into_json::<Value>()
            .map_err(|err| ClientError::Decode(err.to_string()))
    }

    /// Dispatches one tool invocation. Rejects unknown tools and empty
    /// targets before any network call; everything after that boundary is
    /// reported through the outcome, never as an error.
    pub fn execute_tool(&self, tool_id: &str, target: &str) -> Result<ToolOutcome, ClientError> {
        let tool = tools::lookup(tool_id)?;
        let target = validate_target(target)?;

        match self.post_json("execute", json!({ "tool": tool.id, "target": target })) {
            Ok(body) => {
                let success = body
                    .get("success")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                Ok(ToolOutcome {
                    success,
                    output: normalize_output(&body),
                })
            }
            Err(err) => Ok(ToolOutcome {
                success: false,
                output: format!("{} failed: {err}", tool.id),
            }),
        }
    }

    /// Request/response workflow submission. The executor answers with either
    /// an acceptance carrying a workflow id or the full result inline.
    pub fn submit_workflow(
        &self,
        objective: &str,
        target: &str,
        kind: WorkflowKind,
    ) -> Result<WorkflowSubmission, ClientError> {
        let target = validate_target(target)?;
        let body = self.post_json(
            "workflow",
            json!({
                "objective": objective,
                "target": target,
                "workflow_type": kind.as_str(),
            }),
        )?;

        if let Some(workflow_id) = body.get("workflow_id").and_then(Value::as_str) {
            return Ok(WorkflowSubmission::Accepted {
                workflow_id: workflow_id.to_string(),
            });
        }
        let result: WorkflowResult =
            serde_json::from_value(body).map_err(|err| ClientError::Decode(err.to_string()))?;
        Ok(WorkflowSubmission::Completed(result))
    }

    pub fn fetch_workflow_result(&self, workflow_id: &str) -> Result<WorkflowResult, ClientError> {
        let body = self.get_json("workflow", &[("id", workflow_id.to_string())])?;
        serde_json::from_value(body).map_err(|err| ClientError::Decode(err.to_string()))
    }

    pub fn fetch_agents_status(&self) -> Result<AgentsStatus, ClientError> {
        let body = self.get_json("agents/status", &[])?;
        serde_json::from_value(body).map_err(|err| ClientError::Decode(err.to_string()))
    }

    pub fn clear_remote_history(&self) -> Result<(), ClientError> {
        ureq::delete(&self.endpoint("history"))
            .call()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_prefers_output_then_result_then_whole_body() {
        let with_output = json!({ "output": "scanned", "result": "ignored" });
        assert_eq!(normalize_output(&with_output), "scanned");

        let with_result = json!({ "result": "found 3 subdomains" });
        assert_eq!(normalize_output(&with_result), "found 3 subdomains");

        let bare = json!({ "ports": [80, 443] });
        let dumped = normalize_output(&bare);
        assert!(dumped.contains("ports"));
        assert!(dumped.contains("443"));
    }

    #[test]
    fn structured_output_fields_are_pretty_printed() {
        let body = json!({ "result": { "open": [22] } });
        let text = normalize_output(&body);
        assert!(text.contains("open"));
        assert!(text.contains("22"));
    }

    #[test]
    fn null_output_field_falls_through_to_result() {
        let body = json!({ "output": null, "result": "fallback" });
        assert_eq!(normalize_output(&body), "fallback");
    }

    #[test]
    fn unknown_tool_is_rejected_before_any_network_call() {
        // No listener behind this base; a network attempt would error as
        // Transport, not UnknownTool.
        let client = ApiClient::with_base("http://127.0.0.1:1/api");
        let err = client
            .execute_tool("reverse_shell", "example.com")
            .expect_err("unknown tool");
        assert!(matches!(err, ClientError::UnknownTool { ref tool_id } if tool_id == "reverse_shell"));
    }

    #[test]
    fn whitespace_targets_are_rejected_for_tools_and_workflows_alike() {
        let client = ApiClient::with_base("http://127.0.0.1:1/api");
        for target in ["", "   ", "\t\n"] {
            assert!(matches!(
                client.execute_tool("nmap", target),
                Err(ClientError::EmptyTarget)
            ));
            assert!(matches!(
                client.submit_workflow("scan", target, WorkflowKind::Full),
                Err(ClientError::EmptyTarget)
            ));
        }
    }

    #[test]
    fn transport_failure_becomes_a_failed_outcome_not_an_error() {
        let client = ApiClient::with_base("http://127.0.0.1:1/api");
        let outcome = client
            .execute_tool("nmap", "example.com")
            .expect("outcome, not error");
        assert!(!outcome.success);
        assert!(outcome.output.contains("nmap failed"));
    }

    #[test]
    fn workflow_kind_parse_round_trips() {
        for raw in ["full", "recon_only", "exploit_only"] {
            assert_eq!(WorkflowKind::parse(raw).expect("parse").as_str(), raw);
        }
        assert!(WorkflowKind::parse("stealth").is_err());
    }
}
