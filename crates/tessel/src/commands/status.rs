//! Status command - checks a server and summarizes its session store.

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;

use super::Context;
use crate::client::{Client, HealthResponse, StoreHealth};

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {}

/// Status for JSON output.
#[derive(Debug, Serialize)]
struct StatusOutput {
    running: bool,
    server_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    health: Option<HealthResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Run the status command.
pub async fn run(_args: StatusArgs, ctx: &Context) -> Result<()> {
    let client = Client::new(&ctx.server_url)?;
    let checked = client.health().await;

    if ctx.json_output {
        let output = match checked {
            Ok(health) => StatusOutput {
                running: health.status == "ok",
                server_url: ctx.server_url.clone(),
                health: Some(health),
                error: None,
            },
            Err(e) => StatusOutput {
                running: false,
                server_url: ctx.server_url.clone(),
                health: None,
                error: Some(e.to_string()),
            },
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!();
    println!("{}", style("Tessel Server Status").bold());
    println!("{}", dim.apply_to("─".repeat(40)));

    let rows = match &checked {
        Ok(health) => health_rows(health),
        Err(e) => {
            let mut rows = vec![("Status", Style::new().red().apply_to("○ not running").to_string())];
            if ctx.verbose {
                rows.push(("Error", e.to_string()));
            }
            rows
        }
    };
    for (label, value) in rows {
        println!("  {:<14} {}", dim.apply_to(format!("{}:", label)), value);
    }
    println!("  {:<14} {}", dim.apply_to("Server:"), ctx.server_url);
    println!();

    Ok(())
}

/// Label/value lines describing a reachable server.
fn health_rows(health: &HealthResponse) -> Vec<(&'static str, String)> {
    let mut rows = vec![
        (
            "Status",
            Style::new().green().apply_to("● running").to_string(),
        ),
        ("Version", health.version.clone()),
    ];

    if let Some(mode) = &health.update_mode {
        let mode = if mode == "sequential" {
            Style::new().yellow().apply_to(format!("{} (not atomic)", mode)).to_string()
        } else {
            mode.clone()
        };
        rows.push(("Updates", mode));
    }

    if let Some(store) = &health.store {
        rows.push(("Store", store.backend.clone()));
        if let Some(keys) = describe_keys(store) {
            rows.push(("Sessions", keys));
        }
    }

    rows
}

/// `size / capacity (n with TTL)`, when the store reports counts.
fn describe_keys(store: &StoreHealth) -> Option<String> {
    let size = store.size?;
    let mut out = match store.capacity {
        Some(capacity) => format!("{} / {}", size, capacity),
        None => size.to_string(),
    };
    if let Some(with_ttl) = store.keys_with_ttl {
        out.push_str(&format!(" ({} with TTL)", with_ttl));
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(size: Option<usize>, capacity: Option<usize>) -> StoreHealth {
        StoreHealth {
            backend: "memory".to_string(),
            size,
            capacity,
            keys_with_ttl: size,
        }
    }

    #[test]
    fn test_describe_keys() {
        assert_eq!(
            describe_keys(&store(Some(3), Some(100))).as_deref(),
            Some("3 / 100 (3 with TTL)")
        );
        assert_eq!(
            describe_keys(&store(Some(3), None)).as_deref(),
            Some("3 (3 with TTL)")
        );
        assert_eq!(describe_keys(&store(None, None)), None);
    }

    #[test]
    fn test_rows_from_older_server() {
        let health: HealthResponse =
            serde_json::from_str(r#"{"status":"ok","version":"0.0.0"}"#).unwrap();

        let labels: Vec<&str> = health_rows(&health).iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, vec!["Status", "Version"]);
    }

    #[test]
    fn test_rows_for_redis_store() {
        let health: HealthResponse = serde_json::from_str(
            r#"{"status":"ok","version":"0.0.0","update_mode":"transactional","store":{"backend":"redis"}}"#,
        )
        .unwrap();

        let rows = health_rows(&health);
        let labels: Vec<&str> = rows.iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, vec!["Status", "Version", "Updates", "Store"]);
        assert_eq!(rows[3].1, "redis");
    }
}
