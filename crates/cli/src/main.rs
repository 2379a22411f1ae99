//! dhfwk - command-line client for the distributed hardware framework daemon

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9531";

#[derive(Parser)]
#[command(name = "dhfwk")]
#[command(about = "Distributed hardware framework CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "DHFWK_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Args)]
struct DeviceArgs {
    /// Network session id of the device
    #[arg(short, long)]
    network_id: String,

    /// Device id
    #[arg(short, long)]
    device_id: String,
}

#[derive(Args)]
struct UnitArgs {
    #[command(flatten)]
    device: DeviceArgs,

    /// Hardware id on the device
    #[arg(long)]
    dh_id: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Enable one piece of remote hardware
    Enable(UnitArgs),

    /// Disable one piece of remote hardware
    Disable(UnitArgs),

    /// Announce a device and its hardware
    Online {
        #[command(flatten)]
        device: DeviceArgs,

        /// Hardware as DH_ID=TYPE, e.g. cam0=camera (repeatable)
        #[arg(short, long = "capability", value_parser = parse_capability)]
        capabilities: Vec<(String, String)>,
    },

    /// Take a device offline
    Offline(DeviceArgs),

    /// List in-flight tasks
    Tasks,

    /// List enabled hardware
    Enabled,

    /// Send a raw remote request (48001-48009)
    Request {
        /// Request code
        code: u32,

        /// Payload as JSON string
        #[arg(long, default_value = "{}")]
        data: String,
    },

    /// Fetch messages buffered for a listener
    Drain {
        /// Listener id
        listener_id: String,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct UnitEntry {
    network_id: String,
    device_id: String,
    dh_id: String,
}

#[derive(Deserialize)]
struct OutcomeEntry {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct TaskEntry {
    id: String,
    task_type: String,
    state: String,
    unit: UnitEntry,
    parent_id: Option<String>,
    outcome: Option<OutcomeEntry>,
}

#[derive(Tabled)]
struct TaskRow {
    id: String,
    #[tabled(rename = "type")]
    task_type: String,
    state: String,
    device: String,
    dh_id: String,
    parent: String,
    outcome: String,
}

impl From<TaskEntry> for TaskRow {
    fn from(entry: TaskEntry) -> Self {
        Self {
            id: entry.id,
            task_type: entry.task_type,
            state: entry.state,
            device: format!("{}/{}", entry.unit.network_id, entry.unit.device_id),
            dh_id: entry.unit.dh_id,
            parent: entry.parent_id.unwrap_or_else(|| "-".to_string()),
            outcome: entry
                .outcome
                .map(|o| format!("{} {}", o.code, o.message))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Deserialize, Tabled)]
struct UnitRow {
    network_id: String,
    device_id: String,
    dh_id: String,
}

#[derive(Deserialize)]
struct TaskSubmitted {
    task_id: String,
}

#[derive(Deserialize)]
struct Reply {
    status: i32,
    payload: Option<serde_json::Value>,
}

/// `cam0=camera` -> ("cam0", "camera")
fn parse_capability(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((dh_id, dh_type)) if !dh_id.is_empty() && !dh_type.is_empty() => {
            Ok((dh_id.to_string(), dh_type.to_string()))
        }
        _ => Err(format!("expected DH_ID=TYPE, got '{}'", s)),
    }
}

fn unit_params(args: &UnitArgs) -> serde_json::Value {
    json!({
        "network_id": args.device.network_id,
        "device_id": args.device.device_id,
        "dh_id": args.dh_id,
    })
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

async fn submit(url: &str, method: &str, params: serde_json::Value, what: &str) -> Result<()> {
    let result = call_rpc(url, method, params).await?;
    let submitted: TaskSubmitted = serde_json::from_value(result)?;
    println!(
        "{} {}",
        format!("✓ {} task submitted:", what).green().bold(),
        submitted.task_id
    );
    println!("  Track it with: dhfwk tasks");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Enable(args) => {
            submit(&cli.rpc_url, "dhfwk.enable.v1", unit_params(&args), "Enable").await?;
        }

        Commands::Disable(args) => {
            submit(&cli.rpc_url, "dhfwk.disable.v1", unit_params(&args), "Disable").await?;
        }

        Commands::Online {
            device,
            capabilities,
        } => {
            let capabilities: Vec<serde_json::Value> = capabilities
                .into_iter()
                .map(|(dh_id, dh_type)| json!({ "dh_id": dh_id, "dh_type": dh_type }))
                .collect();
            let params = json!({
                "network_id": device.network_id,
                "device_id": device.device_id,
                "capabilities": capabilities,
            });
            submit(&cli.rpc_url, "dhfwk.online.v1", params, "Online").await?;
        }

        Commands::Offline(device) => {
            let params = json!({
                "network_id": device.network_id,
                "device_id": device.device_id,
            });
            submit(&cli.rpc_url, "dhfwk.offline.v1", params, "Offline").await?;
        }

        Commands::Tasks => {
            let result = call_rpc(&cli.rpc_url, "dhfwk.tasks.v1", json!({})).await?;
            let tasks: Vec<TaskEntry> = serde_json::from_value(result["tasks"].clone())?;

            if tasks.is_empty() {
                println!("{}", "No tasks in flight".yellow());
            } else {
                println!("{}", format!("{} task(s) in flight", tasks.len()).cyan().bold());
                let rows: Vec<TaskRow> = tasks.into_iter().map(TaskRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Enabled => {
            let result = call_rpc(&cli.rpc_url, "dhfwk.enabled.v1", json!({})).await?;
            let units: Vec<UnitRow> = serde_json::from_value(result["units"].clone())?;

            if units.is_empty() {
                println!("{}", "No hardware enabled".yellow());
            } else {
                println!("{}", Table::new(units));
            }
        }

        Commands::Request { code, data } => {
            let data: serde_json::Value =
                serde_json::from_str(&data).context("Invalid JSON payload")?;
            let result = call_rpc(
                &cli.rpc_url,
                "dhfwk.remote_request.v1",
                json!({ "code": code, "data": data }),
            )
            .await?;
            let reply: Reply = serde_json::from_value(result)?;

            if reply.status == 0 {
                println!("  {} {}", "Status:".bold(), "OK".green());
            } else {
                println!("  {} {}", "Status:".bold(), reply.status.to_string().red());
            }
            if let Some(payload) = reply.payload {
                println!("{}", serde_json::to_string_pretty(&payload)?);
            }
        }

        Commands::Drain { listener_id } => {
            let result = call_rpc(
                &cli.rpc_url,
                "dhfwk.listener.drain.v1",
                json!({ "listener_id": listener_id }),
            )
            .await?;

            let messages = result["messages"].as_array().cloned().unwrap_or_default();
            if messages.is_empty() {
                println!("{}", format!("No messages for {}", listener_id).yellow());
            }
            for message in messages {
                println!("  {} {}", format!("[{}]", message["topic"]).bold(), message["message"]);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_capability() {
        assert_eq!(
            parse_capability("cam0=camera").unwrap(),
            ("cam0".to_string(), "camera".to_string())
        );
        assert!(parse_capability("cam0").is_err());
        assert!(parse_capability("=camera").is_err());
        assert!(parse_capability("cam0=").is_err());
    }

    #[test]
    fn test_task_row_from_dump() {
        let entry: TaskEntry = serde_json::from_value(json!({
            "id": "t1",
            "task_type": "ENABLE",
            "state": "RUNNING",
            "unit": { "network_id": "net", "device_id": "dev", "dh_id": "cam0" },
            "steps": ["DO_ENABLE"],
            "parent_id": null,
            "created_at": 1,
            "started_at": 2,
            "finished_at": null,
            "outcome": null
        }))
        .unwrap();

        let row = TaskRow::from(entry);
        assert_eq!(row.device, "net/dev");
        assert_eq!(row.parent, "-");
        assert_eq!(row.outcome, "-");
    }

    #[test]
    fn test_cli_parses_online() {
        let cli = Cli::try_parse_from([
            "dhfwk", "online", "-n", "net", "-d", "dev", "-c", "cam0=camera", "-c", "mic0=audio",
        ])
        .unwrap();
        match cli.command {
            Commands::Online { capabilities, .. } => assert_eq!(capabilities.len(), 2),
            _ => panic!("expected online"),
        }
    }
}
