//! CLI commands for tealforge
//!
//! Implements all command handlers for the CLI interface.

use super::scenario::{simulate, Scenario};
use crate::contract::{Application, CallOutcome};
use crate::core::state::readable_bytes;
use crate::samples::Template;
use crate::storage::{ArtifactConfig, ArtifactStore};
use std::path::Path;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Remove prior artifacts, build the trees, compile and write the listings
pub fn cmd_build(config: &ArtifactConfig, template: Template) -> CliResult<()> {
    let store = ArtifactStore::new(config.clone());

    println!(
        "🔨 Building '{}' (version {})...",
        template.name(),
        config.version
    );

    let removed = store.clean()?;
    println!("   ├─ Removed {} stale artifact(s)", removed);

    let program = template.program(config.version)?;
    let compiled = program.compile()?;
    println!(
        "   ├─ Compiled {} + {} lines",
        compiled.approval.lines().count(),
        compiled.clear_state.lines().count()
    );

    let (approval, clear) = store.write(&compiled)?;

    println!("\n✅ Build complete!");
    println!(
        "   ├─ Approval: {} ({}...)",
        approval.display(),
        &compiled.approval_hash()[..16]
    );
    println!(
        "   └─ Clear:    {} ({}...)",
        clear.display(),
        &compiled.clear_state_hash()[..16]
    );

    Ok(())
}

/// Print both listings of a template
pub fn cmd_show(template: Template, version: u8) -> CliResult<()> {
    let compiled = template.program(version)?.compile()?;

    println!("📜 {} approval program:", template.name());
    print!("{}", compiled.approval);
    println!("\n📜 {} clear-state program:", template.name());
    print!("{}", compiled.clear_state);

    Ok(())
}

/// List the sample programs
pub fn cmd_templates() -> CliResult<()> {
    println!("📋 Templates:");
    for (i, template) in Template::ALL.iter().enumerate() {
        let branch = if i + 1 == Template::ALL.len() {
            "└─"
        } else {
            "├─"
        };
        let (global, local) = template.schemas();
        println!(
            "   {} {:<8} {} (global {}i/{}b, local {}i/{}b)",
            branch,
            template.name(),
            template.description(),
            global.ints,
            global.bytes,
            local.ints,
            local.bytes
        );
    }

    Ok(())
}

/// Create an application from a template and run a scenario against it
pub fn cmd_simulate(template: Template, version: u8, scenario_path: &Path) -> CliResult<()> {
    let scenario = Scenario::load(scenario_path)?;
    let compiled = template.program(version)?.compile()?;
    let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);

    println!(
        "🧪 Simulating '{}' with {:?}...",
        template.name(),
        scenario_path
    );

    let sim = simulate(&scenario, template, &compiled, now)?;

    print_outcome("creation", &sim.creation);
    let app_id = match sim.app_id() {
        Some(id) => id,
        None => {
            println!("\n❌ Creation rejected; no calls were run");
            return Ok(());
        }
    };

    for record in &sim.calls {
        match &record.result {
            Ok(outcome) => print_outcome(&record.label, outcome),
            Err(e) => println!("\n   ⚠️  {}: {}", record.label, e),
        }
        if let Some(id) = record.group_id {
            println!("   Group: {}...", &hex::encode(id)[..16]);
        }
    }

    if let Some(app) = sim.manager.get(app_id) {
        print_state(app);
    }

    Ok(())
}

fn print_outcome(label: &str, outcome: &CallOutcome) {
    let verdict = if outcome.approved {
        "✅ approved"
    } else {
        "❌ rejected"
    };
    println!("\n   {} (app {}): {}", label, outcome.app_id, verdict);
    println!("   ├─ Cost: {}", outcome.cost);
    for entry in &outcome.logs {
        println!("   ├─ Log: {}", readable_bytes(entry));
    }
    match &outcome.error {
        Some(error) => println!("   └─ Error: {}", error),
        None => println!("   └─ Logs: {}", outcome.logs.len()),
    }
}

fn print_state(app: &Application) {
    println!("\n📦 Application {} state:", app.id);
    println!("   Creator: {}", app.creator.short());

    println!("   Global:");
    if app.state.global().is_empty() {
        println!("   └─ (empty)");
    }
    for (key, value) in app.state.global().iter() {
        println!("   └─ {} = {}", readable_bytes(key), value);
    }

    for account in app.state.accounts() {
        println!("   Local ({}):", account.short());
        if let Some(store) = app.state.local(account) {
            for (key, value) in store.iter() {
                println!("   └─ {} = {}", readable_bytes(key), value);
            }
        }
    }
}
