use crate::client::{ApiClient, ClientError, WorkflowKind, WorkflowSubmission};
use crate::workflow::events::StreamEvent;
use crate::workflow::run::{WorkflowRun, WORKFLOW_PHASES};
use std::thread;
use std::time::Duration;

/// Request/response mode: submits the workflow, walks the step machine on a
/// fixed cadence, then polls once for the final result.
///
/// The per-step timing is a deliberate simulation, equal spacing across the
/// four phases regardless of real backend progress. It exists for display
/// only and must not be read as telemetry; tests run it with a zero delay.
pub fn execute_polled(
    client: &ApiClient,
    run: &mut WorkflowRun,
    kind: WorkflowKind,
    step_delay: Duration,
) -> Result<(), ClientError> {
    let submission = match client.submit_workflow(&run.objective, &run.target, kind) {
        Ok(submission) => submission,
        // Validation failures happen before any I/O and leave the run alone;
        // transport failures fail the active step and halt.
        Err(err @ ClientError::EmptyTarget) | Err(err @ ClientError::UnknownTool { .. }) => {
            return Err(err);
        }
        Err(err) => {
            run.fail_active_step(err.to_string());
            return Err(err);
        }
    };

    let objective = run.objective.clone();
    run.apply_event(&StreamEvent::WorkflowStart { objective });
    for (_, agent) in WORKFLOW_PHASES {
        thread::sleep(step_delay);
        run.apply_event(&StreamEvent::AgentComplete {
            agent: agent.to_string(),
            thought: None,
        });
    }
    run.apply_event(&StreamEvent::WorkflowComplete);

    match submission {
        WorkflowSubmission::Completed(result) => {
            run.final_result = Some(result);
            Ok(())
        }
        WorkflowSubmission::Accepted { workflow_id } => {
            run.workflow_id = Some(workflow_id.clone());
            let result = client.fetch_workflow_result(&workflow_id)?;
            run.final_result = Some(result);
            Ok(())
        }
    }
}
