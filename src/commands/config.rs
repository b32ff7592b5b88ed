use colored::Colorize;

use crate::cli::Cli;
use crate::config::ClientConfig;
use crate::error::Result;

pub fn show(cli: &Cli) -> Result<()> {
    let config = cli.load_config()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    match cli.config.clone().or_else(ClientConfig::default_path) {
        Some(path) if path.exists() => println!("# {}", path.display().to_string().dimmed()),
        _ => println!("# {}", "built-in defaults".dimmed()),
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
