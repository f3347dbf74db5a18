//! Outpost CLI
//!
//! Command-line interface for operating a running Outpost agent.
//!
//! # Usage
//!
//! ```bash
//! outpost --help
//! outpost health
//! outpost stats traces
//! outpost emit log --payload '{"message": "deploy finished"}' --attr env=prod
//! outpost emit span --trace-id 4bf92f35 --attr http.status_code=200
//! ```

#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use shared::models::{AttributeValue, Attributes, RecordKind};

/// Outpost CLI - telemetry agent command-line interface
#[derive(Parser)]
#[command(name = "outpost")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Agent URL
    #[arg(
        short,
        long,
        env = "OUTPOST_AGENT_URL",
        default_value = "http://localhost:8080"
    )]
    agent_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check agent and pipeline health
    Health,
    /// Show pipeline counters
    Stats {
        /// Only this signal (traces, metrics or logs)
        signal: Option<String>,
    },
    /// Send one record through the agent
    Emit {
        /// Record kind (span, metric or log)
        kind: RecordKind,

        /// Trace ID, required for spans
        #[arg(long)]
        trace_id: Option<String>,

        /// Attribute as key=value; repeatable
        #[arg(long = "attr", value_parser = parse_attribute)]
        attributes: Vec<(String, AttributeValue)>,

        /// Record body; JSON, or plain text sent as a string
        #[arg(long)]
        payload: Option<String>,
    },
}

/// Parses `key=value`, typing the value as bool, integer, float or string.
fn parse_attribute(raw: &str) -> Result<(String, AttributeValue), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty attribute key in '{raw}'"));
    }

    let value = if let Ok(flag) = value.parse::<bool>() {
        AttributeValue::Bool(flag)
    } else if let Ok(int) = value.parse::<i64>() {
        AttributeValue::Int(int)
    } else if let Ok(float) = value.parse::<f64>() {
        AttributeValue::Float(float)
    } else {
        AttributeValue::String(value.to_string())
    };
    Ok((key.to_string(), value))
}

fn parse_payload(raw: Option<&str>) -> Value {
    raw.map_or(Value::Null, |text| {
        serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
    })
}

fn emit_body(
    trace_id: Option<String>,
    attributes: Vec<(String, AttributeValue)>,
    payload: Value,
) -> Value {
    let attributes: Attributes = attributes.into_iter().collect();
    let mut body = json!({
        "attributes": attributes,
        "payload": payload,
    });
    if let Some(trace_id) = trace_id {
        body["trace_id"] = Value::String(trace_id);
    }
    body
}

fn agent_url(base: &str, path: &str) -> String {
    format!("{}{path}", base.trim_end_matches('/'))
}

/// Sends a request and returns the JSON body.
///
/// Statuses other than 2xx are errors; 503 from `/health` still carries the
/// health body, so callers asking for health accept it.
async fn send(request: reqwest::RequestBuilder, allow_unavailable: bool) -> Result<Value> {
    let response = request.send().await.context("Failed to reach the agent")?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    tracing::debug!(%status, "Agent responded");

    let unavailable = allow_unavailable && status == reqwest::StatusCode::SERVICE_UNAVAILABLE;
    if !status.is_success() && !unavailable {
        let message = body["message"].as_str().unwrap_or("no details");
        bail!("Agent returned {status}: {message}");
    }
    Ok(body)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let client = reqwest::Client::new();

    match cli.command {
        Some(Commands::Health) => {
            let body = send(client.get(agent_url(&cli.agent_url, "/health")), true).await?;
            print_json(&body)?;
            if body["status"] != "healthy" {
                bail!("Agent is not healthy");
            }
        }
        Some(Commands::Stats { signal }) => {
            let path = signal.map_or_else(|| "/stats".to_string(), |s| format!("/stats/{s}"));
            let body = send(client.get(agent_url(&cli.agent_url, &path)), false).await?;
            print_json(&body)?;
        }
        Some(Commands::Emit {
            kind,
            trace_id,
            attributes,
            payload,
        }) => {
            let body = emit_body(trace_id, attributes, parse_payload(payload.as_deref()));
            let url = agent_url(&cli.agent_url, &format!("/v1/{}", kind.signal()));
            let response = send(client.post(url).json(&body), false).await?;
            print_json(&response)?;
        }
        None => {
            println!("Outpost CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse()).await
}
