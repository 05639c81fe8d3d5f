use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::{Map, Value};

use crimsonwatch::{load_config, logging};
use crimsonwatch_adapter_sources::ToolGatewayClient;

/// Invoke one tool on the tool gateway and print its JSON result.
#[derive(Parser, Debug)]
#[command(name = "tool", version, about)]
struct Cli {
    /// Tool name, e.g. get_threat_level
    tool: String,

    /// Argument as key=value; the value is parsed as JSON when it can be
    #[arg(short = 'a', long = "arg", value_name = "KEY=VALUE")]
    args: Vec<String>,

    /// Path to the YAML config (overrides discovery)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Gateway base URL (overrides config)
    #[arg(long, value_name = "URL", env = "CRIMSONWATCH_GATEWAY_URL")]
    gateway: Option<String>,
}

fn parse_args(raw: &[String]) -> Result<Map<String, Value>> {
    let mut arguments = Map::new();
    for pair in raw {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("argument {pair:?} is not KEY=VALUE");
        };
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.into()));
        arguments.insert(key.trim().to_string(), value);
    }
    Ok(arguments)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    logging::init_logging(&config.logging);

    let Some(base) = cli.gateway.or_else(|| config.gateway_base.clone()) else {
        bail!("no gateway configured; set gateway_base or pass --gateway");
    };
    let base = base.trim_end_matches('/').to_string();
    let arguments = parse_args(&cli.args)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;
    let result = runtime.block_on(async {
        let client = ToolGatewayClient::new(base, config.source_timeout())?;
        client.invoke(&cli.tool, &arguments).await
    })?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
