//! Session commands - allocate, read and update sessions.

use std::collections::HashMap;

use anyhow::Result;
use clap::{Args, Subcommand};
use console::Style;

use super::Context;
use crate::client::Client;

/// Arguments for the session command.
#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Allocate a new session and print its id
    Generate,

    /// Show a session's fields
    Get {
        /// Session id
        id: u64,
    },

    /// Set or delete session fields
    Update {
        /// Session id
        id: u64,

        /// Fields as key=value; `key=` deletes the field
        #[arg(required = true, value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
}

/// Run the session command.
pub async fn run(args: SessionArgs, ctx: &Context) -> Result<()> {
    let client = Client::new(&ctx.server_url)?;

    match args.command {
        SessionCommand::Generate => {
            let id = client.generate().await?;
            if ctx.json_output {
                println!("{}", serde_json::json!({ "id": id }));
            } else {
                println!("{}", id);
            }
        }
        SessionCommand::Get { id } => {
            let info = client.get_session_info(id).await?;
            if ctx.json_output {
                println!("{}", serde_json::json!({ "info": info }));
            } else if info.is_empty() {
                let dim = Style::new().dim();
                println!("{}", dim.apply_to("(no fields)"));
            } else {
                let mut names: Vec<&String> = info.keys().collect();
                names.sort();
                for name in names {
                    println!("{}={}", name, info[name]);
                }
            }
        }
        SessionCommand::Update { id, fields } => {
            let info: HashMap<String, String> = fields.into_iter().collect();
            client.update_session_info(id, info).await?;
            if ctx.json_output {
                println!("{}", serde_json::json!({ "success": true }));
            } else {
                println!("Session {} updated", id);
            }
        }
    }

    Ok(())
}

/// Parse `key=value`. The value may be empty; the key may not.
fn parse_field(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("missing field name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("score=10"),
            Ok(("score".to_string(), "10".to_string()))
        );
        assert_eq!(
            parse_field("lives="),
            Ok(("lives".to_string(), String::new()))
        );
        assert_eq!(
            parse_field("url=a=b"),
            Ok(("url".to_string(), "a=b".to_string()))
        );
        assert!(parse_field("score").is_err());
        assert!(parse_field("=10").is_err());
    }
}
