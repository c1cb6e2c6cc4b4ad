//! `kiln status`: report what a build would do, without building.

use std::error::Error;

use kiln_build::Orchestrator;
use kiln_cache::FingerprintEngine;
use serde::Serialize;

use crate::workspace::Workspace;
use crate::{GlobalArgs, ReportFormat, StatusArgs};

/// One line of the status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct StatusLine {
    project: String,
    status: String,
    rebuild: bool,
}

/// Runs the `kiln status` command.
///
/// Unlike `kiln build`, the self-fingerprint is compared but never
/// persisted, so running status does not change what the next build does.
pub fn run(args: &StatusArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let workspace = Workspace::discover(global)?;
    let lines = collect(&workspace, &args.projects, global)?;
    match args.format {
        ReportFormat::Text => print!("{}", render_text(&lines)),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&lines)?),
    }
    Ok(0)
}

fn collect(
    workspace: &Workspace,
    requested: &[String],
    global: &GlobalArgs,
) -> Result<Vec<StatusLine>, Box<dyn Error>> {
    let projects = workspace.select(requested)?;
    let tool_changed = tool_changed(workspace)?;
    if tool_changed {
        tracing::debug!("kiln or its configuration changed since the last build");
    }
    let ctx = workspace.context(workspace.options(global, tool_changed))?;
    let orchestrator = Orchestrator::new(&ctx);

    let mut lines: Vec<StatusLine> = Vec::new();
    for project in &projects {
        for (unit, status) in orchestrator.plan(project)? {
            if lines.iter().any(|line| line.project == unit) {
                continue;
            }
            lines.push(StatusLine {
                project: unit,
                status: status.to_string(),
                rebuild: status.needs_build(),
            });
        }
    }
    Ok(lines)
}

/// Whether the stored self-fingerprint is missing or out of date.
fn tool_changed(workspace: &Workspace) -> Result<bool, Box<dyn Error>> {
    let engine = FingerprintEngine::new(&workspace.root);
    let outcome = workspace.guard().peek(&engine, &workspace.open_store()?)?;
    Ok(outcome.force_rebuild)
}

fn render_text(lines: &[StatusLine]) -> String {
    let width = lines.iter().map(|l| l.project.len()).max().unwrap_or(0);
    let mut out = String::new();
    for line in lines {
        out.push_str(&format!("{:<width$}  {}\n", line.project, line.status));
    }
    let stale = lines.iter().filter(|l| l.rebuild).count();
    out.push_str(&format!(
        "{} of {} project(s) need rebuilding\n",
        stale,
        lines.len()
    ));
    out
}
