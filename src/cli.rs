use crate::client::WorkflowKind;
use crate::config::Settings;
use crate::session::Session;
use crate::tools::{self, Category};
use std::path::PathBuf;
use std::time::Duration;

const USAGE: &str = "usage: redrelay <command>\n\
  tools [category] [query]        list the tool catalog\n\
  exec <tool> <target>            execute one tool and wait for its result\n\
  workflow <type> <target> [objective...]   run a workflow (request/response mode)\n\
  stream <type> <target> [objective...]     run a workflow over the live stream\n\
  agents                          show remote agent status\n\
  clear                           clear session and remote history";

const DEFAULT_OBJECTIVE: &str = "Comprehensive security assessment";
const POLLED_STEP_DELAY: Duration = Duration::from_secs(2);
const STREAM_WINDOW: Duration = Duration::from_secs(300);

fn default_settings() -> Settings {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let mut settings = Settings::new(PathBuf::from(home).join(".redrelay"));
    settings.apply_env_overrides();
    settings
}

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        return Err(USAGE.to_string());
    };
    let rest: Vec<String> = args.collect();

    match command.as_str() {
        "tools" => run_tools(&rest),
        "exec" => run_exec(&rest),
        "workflow" => run_workflow(&rest, false),
        "stream" => run_workflow(&rest, true),
        "agents" => run_agents(),
        "clear" => run_clear(),
        _ => Err(format!("unknown command `{command}`\n{USAGE}")),
    }
}

fn run_tools(rest: &[String]) -> Result<String, String> {
    let category = match rest.first() {
        Some(raw) => Some(Category::parse(raw)?),
        None => None,
    };
    let query = rest.get(1).map(String::as_str);
    let lines: Vec<String> = tools::filter(category, query)
        .iter()
        .map(|tool| format!("{:<16} {:<16} {}", tool.id, tool.category, tool.description))
        .collect();
    if lines.is_empty() {
        return Ok("no tools match".to_string());
    }
    Ok(lines.join("\n"))
}

fn run_exec(rest: &[String]) -> Result<String, String> {
    let [tool_id, target] = rest else {
        return Err("usage: redrelay exec <tool> <target>".to_string());
    };
    let mut session = Session::new(default_settings());
    let record = session
        .execute_tool_blocking(tool_id, target)
        .map_err(|err| err.to_string())?;
    Ok(format!(
        "{} {} -> {} ({}s)\n{}",
        record.tool_id,
        record.target,
        record.status,
        record.duration_seconds.unwrap_or_default(),
        record.output
    ))
}

fn run_workflow(rest: &[String], streamed: bool) -> Result<String, String> {
    let Some(kind_raw) = rest.first() else {
        return Err("usage: redrelay workflow <type> <target> [objective...]".to_string());
    };
    let kind = WorkflowKind::parse(kind_raw)?;
    let Some(target) = rest.get(1) else {
        return Err("usage: redrelay workflow <type> <target> [objective...]".to_string());
    };
    let objective = if rest.len() > 2 {
        rest[2..].join(" ")
    } else {
        DEFAULT_OBJECTIVE.to_string()
    };

    let mut session = Session::new(default_settings());
    if streamed {
        session
            .run_workflow_streamed(&objective, target, kind, STREAM_WINDOW)
            .map_err(|err| err.to_string())?;
    } else {
        session
            .run_workflow_polled(&objective, target, kind, POLLED_STEP_DELAY)
            .map_err(|err| err.to_string())?;
    }

    let Some(run) = session.active_run() else {
        return Err("workflow produced no run".to_string());
    };
    let mut lines = Vec::new();
    for step in &run.steps {
        match &step.result {
            Some(result) => lines.push(format!("{:<16} {}: {result}", step.name, step.status)),
            None => lines.push(format!("{:<16} {}", step.name, step.status)),
        }
    }
    if let Some(result) = &run.final_result {
        lines.push(format!("{} agents used", result.agents_used));
        for entry in &result.history {
            lines.push(format!(
                "{}: {} -> {}",
                entry.agent,
                entry.action,
                serde_json::to_string(&entry.result).unwrap_or_default()
            ));
        }
    }
    Ok(lines.join("\n"))
}

fn run_agents() -> Result<String, String> {
    let mut session = Session::new(default_settings());
    let status = session
        .refresh_agents_status()
        .map_err(|err| err.to_string())?;
    let mut lines = vec![format!(
        "ai: {}",
        if status.ai_enabled { "enabled" } else { "rule-based" }
    )];
    for agent in &status.agents {
        lines.push(format!(
            "{:<12} model={} memory={} ai={}",
            agent.name, agent.model, agent.memory_size, agent.ai_enabled
        ));
    }
    Ok(lines.join("\n"))
}

fn run_clear() -> Result<String, String> {
    let mut session = Session::new(default_settings());
    session.clear();
    Ok("session cleared".to_string())
}
