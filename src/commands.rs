//! Command execution.

use crate::Commands;
use colored::Colorize;
use serde_json::Value;
use surrealrpc_client::{Raw, RpcClient};

/// Executes a command and returns the formatted output.
pub async fn execute(
    client: &RpcClient,
    cmd: Commands,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Ping => {
            client.ping().await?;
            Ok("PONG".green().to_string())
        }

        Commands::Version => {
            let version = client.call("version", Vec::new(), Raw).await?;
            match version {
                Value::String(version) => Ok(version.cyan().to_string()),
                other => Ok(format_json(&other)),
            }
        }

        Commands::Call { method, params } => {
            let params = match params {
                Some(arg) => parse_params(&arg)?,
                None => Vec::new(),
            };
            let result = client.call(&method, params, Raw).await?;
            Ok(format_json(&result))
        }
    }
}

/// Parses call params (inline JSON or @file.json).
fn parse_params(arg: &str) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let value: Value = if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)?
    } else {
        serde_json::from_str(arg)?
    };
    Ok(match value {
        Value::Array(params) => params,
        other => vec![other],
    })
}

/// Formats JSON for display.
fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
