use crate::client::WorkflowResult;
use crate::workflow::events::StreamEvent;
use serde::{Deserialize, Serialize};

/// Fixed phase order for one workflow invocation, paired with the remote
/// agent that drives each phase.
pub const WORKFLOW_PHASES: [(&str, &str); 4] = [
    ("Planning", "Planner"),
    ("Reconnaissance", "Recon"),
    ("Analysis", "Exploit"),
    ("Reporting", "Reporting"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    pub name: String,
    pub agent: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

/// One multi-agent workflow invocation and its step-by-step progress.
///
/// Step invariants: at most one step is running at any time; steps left of
/// the running step are terminal, steps right of it are pending; a failed
/// step halts forward progress.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRun {
    pub workflow_id: Option<String>,
    pub objective: String,
    pub target: String,
    pub steps: Vec<WorkflowStep>,
    pub final_result: Option<WorkflowResult>,
    /// Free-floating progress lines for agents that do not map to a step.
    pub status_lines: Vec<String>,
    terminal: bool,
}

impl WorkflowRun {
    pub fn new(objective: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            workflow_id: None,
            objective: objective.into(),
            target: target.into(),
            steps: pending_steps(),
            final_result: None,
            status_lines: Vec::new(),
            terminal: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    fn step_index_for_agent(&self, agent: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.agent == agent)
    }

    /// The stream does not always announce every phase; when an event lands
    /// on a later step, the steps skipped over are closed out as completed so
    /// a single step is ever running.
    fn retire_steps_before(&mut self, idx: usize) {
        for step in &mut self.steps[..idx] {
            if !step.status.is_terminal() {
                step.status = StepStatus::Completed;
            }
        }
    }

    /// Marks the current (or first non-terminal) step failed and halts the
    /// run. Used by the fallback path when a submission or poll fails;
    /// steps after the failure stay pending.
    pub fn fail_active_step(&mut self, reason: impl Into<String>) {
        let idx = self
            .steps
            .iter()
            .position(|s| s.status == StepStatus::Running)
            .or_else(|| self.steps.iter().position(|s| !s.status.is_terminal()));
        if let Some(idx) = idx {
            self.steps[idx].status = StepStatus::Failed;
            self.steps[idx].result = Some(reason.into());
        }
        self.terminal = true;
    }

    /// Applies one stream event. Events must be fed in arrival order; the
    /// run never reorders or buffers.
    pub fn apply_event(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::WorkflowStart { objective } => {
                if !objective.is_empty() {
                    self.objective = objective.clone();
                }
                self.steps = pending_steps();
                self.status_lines.clear();
                self.final_result = None;
                self.terminal = false;
                self.steps[0].status = StepStatus::Running;
            }
            StreamEvent::AgentStart { agent } => match self.step_index_for_agent(agent) {
                Some(idx) if self.steps[idx].status == StepStatus::Pending => {
                    self.retire_steps_before(idx);
                    self.steps[idx].status = StepStatus::Running;
                }
                Some(_) => {}
                None => self.status_lines.push(format!("{agent} agent executing")),
            },
            StreamEvent::AgentComplete { agent, thought } => {
                match self.step_index_for_agent(agent) {
                    Some(idx) => {
                        self.retire_steps_before(idx);
                        self.steps[idx].status = StepStatus::Completed;
                        self.steps[idx].result = thought.clone();
                        if let Some(next) = self.steps.get_mut(idx + 1) {
                            if next.status == StepStatus::Pending {
                                next.status = StepStatus::Running;
                            }
                        }
                    }
                    None => self.status_lines.push(format!("{agent} agent completed")),
                }
            }
            StreamEvent::WorkflowComplete => {
                let halted = self.steps.iter().any(|s| s.status == StepStatus::Failed);
                if !halted {
                    for step in &mut self.steps {
                        if !step.status.is_terminal() {
                            step.status = StepStatus::Completed;
                        }
                    }
                }
                self.terminal = true;
            }
        }
    }
}

fn pending_steps() -> Vec<WorkflowStep> {
    WORKFLOW_PHASES
        .iter()
        .map(|(name, agent)| WorkflowStep {
            name: (*name).to_string(),
            agent: (*agent).to_string(),
            status: StepStatus::Pending,
            result: None,
        })
        .collect()
}
