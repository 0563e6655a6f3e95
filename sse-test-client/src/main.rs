use anyhow::Result;
use clap::Parser;
use colored::*;
use std::time::Duration;

mod api_client;
mod auth;
mod output;
mod scenarios;
mod sse_client;

use api_client::ApiClient;
use output::print_test_summary;
use scenarios::Harness;

#[derive(Parser)]
#[command(name = "sse-test-client")]
#[command(about = "Event stream integration testing tool")]
struct Cli {
    /// Base URL of the backend (e.g., http://localhost:4000)
    #[arg(long)]
    base_url: String,

    /// Heartbeat interval the server runs with, in seconds
    #[arg(long, default_value_t = 30)]
    heartbeat_interval_secs: u64,

    /// Test scenario to run
    #[arg(long, value_enum)]
    scenario: ScenarioChoice,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone)]
enum ScenarioChoice {
    /// Open a stream and wait for a heartbeat
    Connection,
    /// Submit a task and check only the submitting session is notified
    TaskReady,
    /// Log out and check the stream ends with LoggedOut
    Logout,
    /// Close the stream server-side and check it ends without LoggedOut
    Revoke,
    /// Run every scenario
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }

    let client = reqwest::Client::new();
    let harness = Harness {
        api: ApiClient::new(client.clone(), cli.base_url.clone()),
        client,
        base_url: cli.base_url.clone(),
        heartbeat_timeout: Duration::from_secs(cli.heartbeat_interval_secs + 5),
    };

    println!("{}", "=== TEST PHASE ===".bright_white().bold());

    let mut results = Vec::new();
    match cli.scenario {
        ScenarioChoice::Connection => results.push(scenarios::test_connection(&harness).await?),
        ScenarioChoice::TaskReady => results.push(scenarios::test_task_ready(&harness).await?),
        ScenarioChoice::Logout => results.push(scenarios::test_logout(&harness).await?),
        ScenarioChoice::Revoke => results.push(scenarios::test_revoke(&harness).await?),
        ScenarioChoice::All => {
            results.push(scenarios::test_connection(&harness).await?);
            results.push(scenarios::test_task_ready(&harness).await?);
            results.push(scenarios::test_logout(&harness).await?);
            results.push(scenarios::test_revoke(&harness).await?);
        }
    }

    println!("\n{}", "=== RESULTS ===".bright_white().bold());
    print_test_summary(&results);

    let all_passed = results.iter().all(|r| r.passed);

    if all_passed {
        println!("\n{}", "All tests passed! ✓".bright_green().bold());
    } else {
        println!("\n{}", "Some tests failed! ✗".bright_red().bold());
    }

    std::process::exit(if all_passed { 0 } else { 1 });
}
