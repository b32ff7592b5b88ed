use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands;
use crate::config::ClientConfig;
use crate::error::Result;

/// Drive a remote CEF browser over WebSocket
#[derive(Parser, Debug)]
#[command(name = "cef-client")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true, env = "CEF_CLIENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Browser control endpoint, overrides the config file
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List open tab ids
    Tabs,

    /// Open a new tab
    Open {
        /// Page to load (defaults to the configured default URL)
        url: Option<String>,

        /// Return before the page has finished loading
        #[arg(long)]
        no_wait: bool,
    },

    /// Navigate a tab and wait for the load to finish
    Navigate {
        #[arg(long)]
        tab: i32,

        url: String,
    },

    /// Save a screenshot of a tab as PNG
    Screenshot {
        #[arg(long)]
        tab: i32,

        /// Output file
        #[arg(short, long, default_value = "screenshot.png")]
        out: PathBuf,

        #[arg(long, requires = "height")]
        width: Option<u32>,

        #[arg(long, requires = "width")]
        height: Option<u32>,
    },

    /// Close a tab
    CloseTab {
        #[arg(long)]
        tab: i32,
    },

    /// Print a tab's events until interrupted
    Watch {
        #[arg(long)]
        tab: i32,
    },

    /// Print the effective configuration
    Config,
}

impl Cli {
    /// Config file and environment, then command-line overrides.
    pub fn load_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::load(self.config.as_deref())?;
        if let Some(url) = &self.url {
            config.url = url.clone();
            config.validate()?;
        }
        Ok(config)
    }

    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Tabs => commands::browser::tabs(self).await,
            Commands::Open { url, no_wait } => {
                commands::browser::open(self, url.as_deref(), !no_wait).await
            }
            Commands::Navigate { tab, url } => commands::browser::navigate(self, *tab, url).await,
            Commands::Screenshot {
                tab,
                out,
                width,
                height,
            } => {
                let size = (*width).zip(*height);
                commands::browser::screenshot(self, *tab, out, size).await
            }
            Commands::CloseTab { tab } => commands::browser::close_tab(self, *tab).await,
            Commands::Watch { tab } => commands::watch::run(self, *tab).await,
            Commands::Config => commands::config::show(self),
        }
    }
}
