use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tempestas_core::domain::contract;
use tempestas_core::domain::reading::PredictionRequest;
use tempestas_core::llm::prompt::{build_prompt, iso8601};

#[derive(Debug, Parser)]
#[command(name = "tempestas_cli")]
struct Args {
    /// Prediction request JSON file (`{"device_id": ..., "records": [...]}`), or `-` for stdin.
    #[arg(long, default_value = "-")]
    input: String,

    /// Print the prompt, schema and target time without calling the backend.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = tempestas_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    // stdout carries the JSON result.
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    contract::validate_schema(contract::prediction_schema())?;

    let text = read_input(&args.input).await?;
    let request = parse_request(&text)?;

    if args.dry_run {
        let report = dry_run_report(&request, Utc::now());
        println!("{}", serde_json::to_string_pretty(&report)?);
        tracing::info!(
            device_id = %request.device_id,
            records = request.records.len(),
            dry_run = true,
            "prompt built; backend not called"
        );
        return Ok(());
    }

    let backend = tempestas_core::llm::backend_from_settings(&settings)?;
    match tempestas_core::forecast::predict(backend.as_ref(), &request, settings.prediction_timeout)
        .await
    {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(err) => {
            let err = anyhow::Error::new(err).context("prediction run failed");
            sentry_anyhow::capture_anyhow(&err);
            Err(err)
        }
    }
}

async fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("failed to read prediction request from stdin")?;
        return Ok(text);
    }

    tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("failed to read prediction request from {input}"))
}

fn parse_request(text: &str) -> anyhow::Result<PredictionRequest> {
    serde_json::from_str::<PredictionRequest>(text).context("input is not a valid prediction request")
}

fn dry_run_report(request: &PredictionRequest, now: DateTime<Utc>) -> serde_json::Value {
    let prompt = build_prompt(request.device_id, &request.records, now);
    serde_json::json!({
        "prompt": prompt.text,
        "schema": prompt.schema,
        "target_time": iso8601(prompt.target_time),
    })
}

fn init_sentry(settings: &tempestas_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
