pub mod events;
pub mod fallback;
pub mod run;
pub mod stream;

pub use events::StreamEvent;
pub use run::{StepStatus, WorkflowRun, WorkflowStep};
pub use stream::{ConnectionState, StreamCoordinator};

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("stream connect failed: {0}")]
    Connect(String),
    #[error("stream send failed: {0}")]
    Send(String),
    #[error("target must be non-empty")]
    EmptyTarget,
    #[error("stream is unavailable after reconnect attempt")]
    Unavailable,
    #[error("a workflow (`{objective}`) is still active on this connection")]
    WorkflowActive { objective: String },
    #[error("unrecognized stream event: {0}")]
    Protocol(String),
}
