use colored::Colorize;

use crate::browser::{LoadStatus, TabEvent, TabEvents};
use crate::cli::Cli;
use crate::error::Result;

pub async fn run(cli: &Cli, tab_id: i32) -> Result<()> {
    let config = cli.load_config()?;
    let events = TabEvents::connect(&config, tab_id).await?;

    if !cli.json {
        println!(
            "{} Watching tab {} {}",
            "◆".cyan(),
            tab_id.to_string().cyan(),
            "(Ctrl+C to stop)".dimmed()
        );
    }

    let json = cli.json;
    let subscriptions = events.on(move |event| {
        if json {
            println!("{}", to_json(&event));
        } else {
            println!("{}", describe(&event));
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        reason = events.closed() => {
            if !cli.json {
                println!("{} Event stream ended: {}", "!".yellow(), reason);
            }
        }
    }

    for subscription in &subscriptions {
        events.off(subscription);
    }
    events.close().await;
    Ok(())
}

fn describe(event: &TabEvent) -> String {
    match event {
        TabEvent::Title(title) => format!("{} {}", "title".bold(), title),
        TabEvent::Url(url) => format!("{} {}", "url".bold(), url),
        TabEvent::Favicon(url) => format!("{} {}", "favicon".bold(), url.dimmed()),
        TabEvent::Cursor(cursor) => format!("{} {}", "cursor".bold(), cursor),
        TabEvent::NewTab(url) => format!("{} {}", "new tab".bold(), url),
        TabEvent::LoadState(state) => {
            let status = match state.status {
                LoadStatus::Loading => "loading".yellow(),
                LoadStatus::Loaded => "loaded".green(),
                LoadStatus::LoadError => "error".red(),
            };
            let mut line = format!("{} {}", "load".bold(), status);
            if state.status == LoadStatus::LoadError {
                line.push_str(&format!(" {} {}", state.error_code, state.error_message));
            }
            line
        }
        TabEvent::UrlHovered { url, hovered } => {
            let verb = if *hovered { "hover" } else { "unhover" };
            format!("{} {}", verb.bold(), url.dimmed())
        }
        TabEvent::Closed => "closed".red().to_string(),
        TabEvent::Frame(data) => format!("{} {} bytes", "frame".dimmed(), data.len()),
        TabEvent::Popup { rect, data } => format!(
            "{} {}x{} at ({}, {}) {} bytes",
            "popup".dimmed(),
            rect.width,
            rect.height,
            rect.x,
            rect.y,
            data.len()
        ),
    }
}

fn to_json(event: &TabEvent) -> serde_json::Value {
    use serde_json::json;

    match event {
        TabEvent::Title(title) => json!({ "type": "Title", "data": title }),
        TabEvent::Url(url) => json!({ "type": "Url", "data": url }),
        TabEvent::Favicon(url) => json!({ "type": "Favicon", "data": url }),
        TabEvent::Cursor(cursor) => json!({ "type": "Cursor", "data": cursor }),
        TabEvent::NewTab(url) => json!({ "type": "NewTab", "data": url }),
        TabEvent::LoadState(state) => json!({ "type": "LoadState", "data": state }),
        TabEvent::UrlHovered { url, hovered } => {
            json!({ "type": "UrlHovered", "data": { "url": url, "hovered": hovered } })
        }
        TabEvent::Closed => json!({ "type": "Closed" }),
        TabEvent::Frame(data) => json!({ "type": "Frame", "bytes": data.len() }),
        TabEvent::Popup { rect, data } => {
            json!({ "type": "Popup", "rect": rect, "bytes": data.len() })
        }
    }
}
