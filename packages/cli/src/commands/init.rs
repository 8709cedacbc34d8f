use crate::config::{Config, DEFAULT_CONFIG_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Editor namespace written into the config
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

    // Check if config already exists
    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    let mut config = Config::default();
    if let Some(namespace) = args.namespace {
        config.editor.namespace = namespace;
    }
    let config_json = serde_json::to_string_pretty(&config)?;
    fs::write(&config_path, config_json)?;
    debug!(path = %config_path.display(), "wrote config");

    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    println!();
    println!("Next steps:");
    println!("  1. Save an editor state as JSON");
    println!("  2. Run: weft render <state.json>");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("weft-init-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = scratch("write");
        let cwd = dir.display().to_string();
        init(
            InitArgs {
                namespace: Some("notes".to_string()),
                force: false,
            },
            &cwd,
        )
        .unwrap();

        let config = Config::load(&cwd).unwrap();
        assert_eq!(config.editor.namespace, "notes");
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_init_keeps_existing_config_without_force() {
        let dir = scratch("keep");
        let cwd = dir.display().to_string();
        let path = dir.join(DEFAULT_CONFIG_NAME);
        fs::write(&path, "{\"rootTag\": \"section\"}").unwrap();

        init(
            InitArgs {
                namespace: None,
                force: false,
            },
            &cwd,
        )
        .unwrap();
        assert_eq!(Config::load(&cwd).unwrap().root_tag, "section");

        init(
            InitArgs {
                namespace: None,
                force: true,
            },
            &cwd,
        )
        .unwrap();
        assert_eq!(Config::load(&cwd).unwrap().root_tag, "div");
        fs::remove_dir_all(dir).unwrap();
    }
}
