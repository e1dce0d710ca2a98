//! Run command - executes a script against a dataset.

use super::dataset::Dataset;
use super::script::{Script, ScriptRunner, Trace};
use super::{CliError, CliResult};
use reltx_core::Config;
use std::path::Path;

/// Executes `script` against `dataset` and prints the trace.
///
/// # Errors
///
/// Returns input errors, or `StepsFailed` after printing when any step failed.
pub fn run(dataset: &Path, script: &Path, format: &str) -> CliResult<()> {
    let dataset = Dataset::read(dataset)?;
    let script = Script::read(script)?;
    let trace = execute(&dataset, &script)?;
    print(&trace, format)?;

    match trace.failures() {
        0 => Ok(()),
        failed => Err(CliError::StepsFailed(failed)),
    }
}

/// Loads `dataset` into a fresh hierarchy and runs `script` on it.
///
/// # Errors
///
/// Returns dataset errors; failing steps are part of the trace.
pub fn execute(dataset: &Dataset, script: &Script) -> CliResult<Trace> {
    let loaded = dataset.load()?;
    ScriptRunner::new(loaded, Config::default())?.run(script)
}

/// Prints a trace as text or json.
///
/// # Errors
///
/// Returns `Json` errors.
pub fn print(trace: &Trace, format: &str) -> CliResult<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(trace)?);
        }
        _ => {
            print_text_output(trace);
        }
    }
    Ok(())
}

fn print_text_output(trace: &Trace) {
    println!("Steps");
    println!("=====");
    for step in &trace.steps {
        let indent = "  ".repeat(step.level);
        println!("{indent}{:>3}. {}", step.index, step.step);
        for event in &step.events {
            println!("{indent}       {event}");
        }
        if let Some(error) = &step.error {
            println!("{indent}       ! {error}");
        }
    }

    println!();
    println!("Objects");
    println!("=======");
    for object in &trace.objects {
        println!("  {} ({}): {}", object.alias, object.class, object.state);
        for (property, value) in &object.values {
            println!("    {property} = {value}");
        }
        for (property, related) in &object.relations {
            println!("    {property} -> [{}]", related.join(", "));
        }
    }

    let failed = trace.failures();
    if failed > 0 {
        println!();
        println!("{failed} of {} steps failed", trace.steps.len());
    }
}
