use crate::config::Config;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};
use weft_editor::weft_dom::shared_document;
use weft_editor::{generate_html_from_nodes, Editor};

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Serialized editor state (JSON)
    pub state: PathBuf,

    /// Config file (defaults to weft.config.json in the current directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the clipboard export form instead of the live DOM
    #[arg(long)]
    pub export: bool,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn render(args: RenderArgs, cwd: &str) -> Result<()> {
    let config = Config::resolve(args.config.as_deref(), cwd)?;
    let json = fs::read_to_string(&args.state)
        .with_context(|| format!("Cannot read {}", args.state.display()))?;

    let html = render_state(&json, &config, args.export)?;
    match args.output {
        Some(path) => {
            fs::write(&path, &html)?;
            println!("  {} {} → {}", "✓".green(), args.state.display(), path.display());
        }
        None => println!("{}", html),
    }
    Ok(())
}

/// Render `json` the way an editor attached to a fresh root would.
pub fn render_state(json: &str, config: &Config, export: bool) -> Result<String> {
    let editor = Editor::builder()
        .config(config.editor.clone())
        .initial_state(json)
        .build()?;
    info!(nodes = editor.get_editor_state().len(), "loaded editor state");

    if export {
        let html = editor.read(|state| generate_html_from_nodes(state, None))??;
        return Ok(html);
    }

    let document = shared_document();
    let root = document.borrow_mut().create_element(config.root_tag.as_str());
    editor.set_root_element(&document, root)?;
    let stats = document.borrow().stats();
    debug!(created = stats.created, inserted = stats.inserted, "rendered");

    let html = document.borrow().inner_html(root);
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_editor::Theme;

    const STATE: &str = r#"{"root": {"type": "root", "children": [
        {"type": "paragraph", "children": [
            {"type": "text", "text": "Hello "},
            {"type": "text", "text": "world", "format": 1}
        ]},
        {"type": "paragraph", "children": []}
    ]}}"#;

    #[test]
    fn test_render_live_dom() {
        let html = render_state(STATE, &Config::default(), false).unwrap();
        assert_eq!(
            html,
            "<p><span data-weft-text=\"true\">Hello </span>\
             <strong data-weft-text=\"true\">world</strong></p><p><br></p>"
        );
    }

    #[test]
    fn test_render_applies_theme() {
        let mut config = Config::default();
        config.editor.theme = Theme::new().with_class("paragraph", "para");
        let html = render_state(STATE, &config, false).unwrap();
        assert!(html.starts_with("<p class=\"para\">"));
    }

    #[test]
    fn test_render_rejects_unknown_nodes() {
        let json = r#"{"root": {"type": "root", "children": [{"type": "table"}]}}"#;
        let err = render_state(json, &Config::default(), false).unwrap_err();
        assert!(err.to_string().contains("table"));
    }
}
