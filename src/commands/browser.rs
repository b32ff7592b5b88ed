use std::fs;
use std::path::Path;

use colored::Colorize;

use crate::browser::{Browser, OpenTabOptions};
use crate::cli::Cli;
use crate::error::Result;

async fn connect(cli: &Cli) -> Result<Browser> {
    let config = cli.load_config()?;
    Browser::connect(config).await
}

pub async fn tabs(cli: &Cli) -> Result<()> {
    let browser = connect(cli).await?;
    let tabs = browser.tabs().await?;
    browser.client().close().await;

    if cli.json {
        println!("{}", serde_json::json!({ "tabs": tabs }));
    } else if tabs.is_empty() {
        println!("{} No tabs open", "!".yellow());
    } else {
        println!("{} {} tabs open\n", "✓".green(), tabs.len());
        for id in tabs {
            println!("  {}", id.to_string().cyan());
        }
    }

    Ok(())
}

pub async fn open(cli: &Cli, url: Option<&str>, wait_until_loaded: bool) -> Result<()> {
    let browser = connect(cli).await?;
    let mut options = OpenTabOptions::default().wait_until_loaded(wait_until_loaded);
    options.url = url.map(str::to_string);
    let tab = browser.open_tab(options).await?;
    // The tab is open either way; a missing title only degrades the output.
    let title = match tab.title().await {
        Ok(title) => title,
        Err(e) => {
            tracing::warn!(tab_id = tab.id(), error = %e, "could not read tab title");
            String::new()
        }
    };
    browser.client().close().await;

    if cli.json {
        println!(
            "{}",
            serde_json::json!({ "success": true, "tab": tab.id(), "title": title })
        );
    } else {
        println!("{} Opened tab {}", "✓".green(), tab.id().to_string().cyan());
        if !title.is_empty() {
            println!("  {}", title.dimmed());
        }
    }

    Ok(())
}

pub async fn navigate(cli: &Cli, tab_id: i32, url: &str) -> Result<()> {
    let browser = connect(cli).await?;
    browser.tab(tab_id).navigate(url, true).await?;
    browser.client().close().await;

    if cli.json {
        println!(
            "{}",
            serde_json::json!({ "success": true, "tab": tab_id, "url": url })
        );
    } else {
        println!("{} Navigated to: {}", "✓".green(), url);
    }

    Ok(())
}

pub async fn screenshot(cli: &Cli, tab_id: i32, out: &Path, size: Option<(u32, u32)>) -> Result<()> {
    let browser = connect(cli).await?;
    let png = browser.tab(tab_id).screenshot(size).await?;
    browser.client().close().await;

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(out, &png)?;

    if cli.json {
        println!(
            "{}",
            serde_json::json!({
                "success": true,
                "path": out.display().to_string(),
                "bytes": png.len()
            })
        );
    } else {
        println!(
            "{} Screenshot saved: {} {}",
            "✓".green(),
            out.display(),
            format!("({} bytes)", png.len()).dimmed()
        );
    }

    Ok(())
}

pub async fn close_tab(cli: &Cli, tab_id: i32) -> Result<()> {
    let browser = connect(cli).await?;
    browser.tab(tab_id).close().await?;
    browser.client().close().await;

    if cli.json {
        println!("{}", serde_json::json!({ "success": true, "tab": tab_id }));
    } else {
        println!("{} Closed tab {}", "✓".green(), tab_id);
    }

    Ok(())
}
