//! odata-batch - run a batch described in a YAML plan against an OData service

use anyhow::Context;
use clap::Parser;
use odata_batch::{
    BatchClient, BatchConfig, BatchPlan, BatchResponseItem, ODataResponse, init_logging,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "odata-batch", version, about = "Send an OData $batch request described by a YAML plan")]
struct Cli {
    /// Service root URL; the batch is posted to <service-root>/$batch
    #[arg(long, env = "ODATA_BATCH_SERVICE_ROOT")]
    service_root: String,

    /// YAML file listing the batch items
    #[arg(long)]
    plan: PathBuf,

    /// YAML configuration file (defaults to ODATA_BATCH_* environment variables)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ask the server to continue after a failed sub-request
    #[arg(long)]
    continue_on_error: bool,

    /// Print response bodies and debug logs
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every sub-request succeeded
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = match &cli.config {
        Some(path) => BatchConfig::from_file(path)
            .await
            .with_context(|| format!("loading config {}", path.display()))?,
        None => BatchConfig::from_env().context("reading ODATA_BATCH_* environment")?,
    };
    if cli.continue_on_error {
        config.continue_on_error = true;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging)?;

    let plan = BatchPlan::from_file(&cli.plan)
        .await
        .with_context(|| format!("loading plan {}", cli.plan.display()))?;

    let client = BatchClient::new(config)?;
    let mut batch = client.batch_request(&cli.service_root)?;
    plan.apply(&mut batch)?;

    let response = batch.execute().await?;
    println!(
        "batch: {} {}",
        response.status_code(),
        response.status_message()
    );

    let mut all_ok = true;
    let items = response.body();
    while let Some(item) = items.next().await? {
        let position = items.position() - 1;
        match item {
            BatchResponseItem::Retrieve(item) => {
                all_ok &= print_response(
                    &format!("[{}] retrieve", position),
                    item.response(),
                    cli.verbose,
                );
            }
            BatchResponseItem::OutsideUpdate(item) => {
                all_ok &= print_response(
                    &format!("[{}] outside update", position),
                    item.response(),
                    cli.verbose,
                );
            }
            BatchResponseItem::Changeset(changeset) => {
                println!(
                    "[{}] changeset: {} of {} answered",
                    position,
                    changeset.received(),
                    changeset.requested()
                );
                let unapplied = changeset.unapplied_content_ids();
                for response in changeset {
                    let label = match response.content_id() {
                        Some(id) => format!("    ${}", id),
                        None => "    $?".to_string(),
                    };
                    all_ok &= print_response(&label, &response, cli.verbose);
                }
                if !unapplied.is_empty() {
                    all_ok = false;
                    println!("    not applied: {:?}", unapplied);
                }
            }
        }
    }

    if items.unanswered() > 0 {
        all_ok = false;
        println!("{} items got no response", items.unanswered());
    }

    Ok(all_ok)
}

fn print_response(label: &str, response: &ODataResponse, verbose: bool) -> bool {
    println!(
        "{} {:?}: {} {}",
        label,
        response.kind(),
        response.status_code(),
        response.status_message()
    );
    if verbose && !response.body_bytes().is_empty() {
        match response.body_text() {
            Ok(text) => println!("{}", text),
            Err(_) => println!("<{} bytes of binary content>", response.body_bytes().len()),
        }
    }
    response.is_success()
}
