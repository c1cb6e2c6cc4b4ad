//! `kiln build`: build projects and their dependencies.

use std::error::Error;
use std::time::Instant;

use kiln_build::{BuildReport, Orchestrator};

use crate::workspace::Workspace;
use crate::{BuildArgs, GlobalArgs};

/// Runs the `kiln build` command.
///
/// Loads the workspace, checks whether the tool or its configuration changed
/// since the last run, and builds the requested projects. Returns exit code
/// 0 on success; build failures surface as errors.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let workspace = Workspace::discover(global)?;
    let projects = workspace.select(&args.projects)?;
    if projects.is_empty() {
        if !global.quiet {
            eprintln!("   Nothing to build in {}", workspace.config_path.display());
        }
        return Ok(0);
    }

    let mut ctx = workspace.context(workspace.options(global, args.force))?;
    let guard = ctx.check_self(&workspace.guard())?;
    if guard.force_rebuild && !args.force {
        tracing::info!("kiln or its configuration changed; rebuilding every project");
    }

    let started = Instant::now();
    let names: Vec<&str> = projects.iter().map(String::as_str).collect();
    let report = Orchestrator::new(&ctx).build_many(&names)?;

    if !global.quiet {
        eprintln!(
            "    Finished {} in {:.2}s",
            summarize(&report),
            started.elapsed().as_secs_f64()
        );
    }
    Ok(0)
}

/// One-line summary such as `2 built, 3 up to date`.
fn summarize(report: &BuildReport) -> String {
    let built = report.built().len();
    let skipped = report.skipped().len();
    match (built, skipped) {
        (0, 0) => "nothing to do".to_string(),
        (0, s) => format!("{s} up to date"),
        (b, 0) => format!("{b} built"),
        (b, s) => format!("{b} built, {s} up to date"),
    }
}
