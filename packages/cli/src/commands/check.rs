use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use weft_editor::node::NodeRegistry;
use weft_editor::EditorState;

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Serialized editor state (JSON)
    pub state: PathBuf,
}

/// Outcome of a parse → serialize → parse cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    /// Node count per node type, root included
    pub counts: BTreeMap<String, usize>,
    /// Second parse serialized identically to the first
    pub stable: bool,
    pub text_content: String,
}

pub fn check(args: CheckArgs, _cwd: &str) -> Result<()> {
    let json = fs::read_to_string(&args.state)
        .with_context(|| format!("Cannot read {}", args.state.display()))?;
    let report = check_state(&json)?;

    println!("{}", args.state.display().to_string().bright_white().bold());
    for (node_type, count) in &report.counts {
        println!("  {:<12} {}", node_type, count);
    }
    println!("  {:<12} {} chars", "text", report.text_content.chars().count());
    println!();

    if report.stable {
        println!("{} Round trip is stable", "✅".green());
        Ok(())
    } else {
        Err(anyhow!("round trip changed the document"))
    }
}

pub fn check_state(json: &str) -> Result<CheckReport> {
    let registry = Arc::new(NodeRegistry::with_builtins());
    let first = EditorState::from_json_str(registry.clone(), json)?;
    let serialized = first.to_json_string()?;
    let second = EditorState::from_json_str(registry, &serialized)?;

    let stable = first.to_json()? == second.to_json()?
        && first.root_text_content() == second.root_text_content();
    debug!(stable, "round trip");

    let mut counts = BTreeMap::new();
    for node in first.node_map().values() {
        *counts.entry(node.node_type().to_string()).or_insert(0) += 1;
    }

    Ok(CheckReport {
        counts,
        stable,
        text_content: first.root_text_content(),
    })
}
