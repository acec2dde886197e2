use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use contracts::{ApiError, ErrorCode, FeatureKey, Policy};
use serde_json::{json, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use twin_api::{load_config, EngineApi, SignalReading};

#[derive(Parser, Debug)]
#[command(name = "twin-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drive the city twin: step, project, and speculate over the committed timeline")]
struct Cli {
    /// JSON TwinConfig; TWIN_SEED, TWIN_MODEL_SEED and TWIN_HIDDEN_SIZE override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Engine status
    Status,
    /// Commit `n` steps one at a time
    Step {
        #[arg(default_value_t = 1)]
        n: u64,
        #[arg(long = "policy", value_name = "KEY=VALUE", value_parser = parse_policy_entry)]
        policy: Vec<(String, f64)>,
    },
    /// Commit a projection atomically
    Project {
        steps: u64,
        #[arg(long = "policy", value_name = "KEY=VALUE", value_parser = parse_policy_entry)]
        policy: Vec<(String, f64)>,
    },
    /// Final metrics of a projection that is never committed
    Speculate {
        steps: u64,
        #[arg(long = "policy", value_name = "KEY=VALUE", value_parser = parse_policy_entry)]
        policy: Vec<(String, f64)>,
    },
    /// Feature values of one node
    Node {
        id: u64,
        /// Print a single feature column
        #[arg(long, value_parser = parse_feature_key)]
        feature: Option<FeatureKey>,
    },
    /// Metric history
    History {
        #[arg(long)]
        since: Option<u64>,
    },
    /// Ingest a sensor reading
    Signal {
        #[arg(long, allow_hyphen_values = true)]
        temperature: f64,
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        precipitation: f64,
        #[arg(long = "co2-delta", default_value_t = 0.0, allow_hyphen_values = true)]
        co2_delta: f64,
        #[arg(long)]
        anomaly: bool,
    },
}

fn parse_policy_entry(raw: &str) -> Result<(String, f64), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing policy key in {raw}"));
    }
    let magnitude = value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("invalid policy magnitude: {value}"))?;
    Ok((key.to_string(), magnitude))
}

fn parse_feature_key(raw: &str) -> Result<FeatureKey, String> {
    FeatureKey::parse(raw.trim()).ok_or_else(|| format!("unknown feature: {raw}"))
}

fn policy_of(entries: Vec<(String, f64)>) -> Option<Policy> {
    (!entries.is_empty()).then(|| entries.into_iter().collect())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|err| {
        ApiError::new(
            ErrorCode::InternalError,
            "output could not be serialized",
            Some(err.to_string()),
        )
    })
}

fn run(cli: Cli) -> Result<Value, ApiError> {
    let config = load_config(cli.config.as_deref())?;
    let mut api = EngineApi::from_config(config)?;

    match cli.command {
        Command::Status => to_json(&api.status()),
        Command::Step { n, policy } => {
            let policy = policy_of(policy);
            let mut committed = Vec::new();
            for _ in 0..n {
                committed.push(api.step(policy.as_ref())?);
            }
            to_json(&committed)
        }
        Command::Project { steps, policy } => {
            let policy = policy_of(policy);
            to_json(&api.run_projection(steps, policy.as_ref())?)
        }
        Command::Speculate { steps, policy } => {
            let policy = policy_of(policy);
            let speculative = api.speculate(steps, policy.as_ref())?;
            Ok(json!({
                "speculative": to_json(&speculative)?,
                "committed_timestep": api.status().current_timestep,
            }))
        }
        Command::Node { id, feature } => {
            let features = api.node_features(id)?;
            match feature {
                Some(key) => Ok(json!({
                    "node_id": id,
                    "feature": key,
                    "value": features.get(key),
                })),
                None => Ok(json!({
                    "node_id": id,
                    "features": to_json(&features)?,
                })),
            }
        }
        Command::History { since } => match since {
            Some(since) => to_json(&api.history_since(since)),
            None => to_json(&api.history()),
        },
        Command::Signal {
            temperature,
            precipitation,
            co2_delta,
            anomaly,
        } => {
            let reading = SignalReading {
                temperature,
                precipitation,
                co2_delta,
                is_anomaly: anomaly,
            };
            let outcome = api.ingest_signal(&reading)?;
            Ok(json!({
                "outcome": to_json(&outcome)?,
                "governance": to_json(api.governance())?,
            }))
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        },
        Err(error) => {
            match serde_json::to_string_pretty(&error) {
                Ok(text) => eprintln!("{text}"),
                Err(_) => eprintln!("error: {error}"),
            }
            ExitCode::FAILURE
        }
    }
}
