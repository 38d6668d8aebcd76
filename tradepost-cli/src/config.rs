use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tradepost_core::TradeConfig;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a starter config file
    Init(InitArgs),
    /// Print the effective configuration (file, then environment overrides)
    Show,
    /// Check the config file parses and names known categories
    Validate,
    /// Show config file path
    Path,
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Force overwrite existing config
    #[arg(long, short)]
    pub force: bool,
}

pub fn run_config(args: ConfigArgs, path: Option<&Path>) -> Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(TradeConfig::config_path);
    match args.command {
        ConfigCommands::Init(args) => run_init(args, &path),
        ConfigCommands::Show => run_show(&path),
        ConfigCommands::Validate => run_validate(&path),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn run_init(args: InitArgs, path: &Path) -> Result<()> {
    if path.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "Config already exists at {:?}\n\nUse --force to overwrite",
            path
        ));
    }

    let mut config = TradeConfig::default();
    // one entry per category so the file shows the expected key format
    config
        .category_channels
        .insert("PC Softcore Ladder".to_string(), "${PC_SC_L_CHANNEL}".to_string());
    config.save_to(path)?;

    println!("✅ Config written to {}", path.display());
    println!("   Fill in [category_channels] and summary_channel, then run `tradepost config validate`.");
    Ok(())
}

fn run_show(path: &Path) -> Result<()> {
    let config = TradeConfig::load_with(Some(path))?;
    let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
    println!("# {}", path.display());
    print!("{}", rendered);
    Ok(())
}

fn run_validate(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("No config file at {} (run `tradepost config init`)", path.display());
    }
    let config = TradeConfig::load_from(path)?;

    println!("✅ {} is valid", path.display());
    println!("   data_dir: {}", config.data_dir.display());
    println!("   categories: {}", config.category_channels.len());
    if config.summary_channel.is_none() {
        println!("   ⚠️  summary_channel is not set");
    }
    Ok(())
}
