//! tendcloud CLI
//!
//! Command-line interface for interacting with the tendcloud daemon

use std::fmt::Write as _;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tendcloud_api::pass::PassResult;
use tendcloud_client::HttpClient;

#[derive(Parser)]
#[command(name = "tendcloud-cli")]
#[command(about = "Inspect and trigger tendcloud reconciliation passes", long_about = None)]
struct Cli {
    /// Daemon base URL
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the daemon is up
    Health,
    /// Show the most recent pass
    #[command(name = "last-pass")]
    LastPass {
        /// Print the raw pass result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start a pass now
    Trigger,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let client = HttpClient::new(&cli.url)?;

    match cli.command {
        Commands::Health => {
            let health = client.health().await?;
            println!("{}", health.status);
        }
        Commands::LastPass { json } => {
            let last = client.last_pass().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&last)?);
            } else {
                if last.in_flight {
                    println!("a pass is running");
                }
                match &last.result {
                    Some(result) => print!("{}", render(result)),
                    None => println!("no pass has finished yet"),
                }
            }
        }
        Commands::Trigger => {
            if client.trigger_pass().await?.started {
                println!("pass started");
            } else {
                println!("a pass is already running");
            }
        }
    }

    Ok(())
}

/// Human-readable summary, one block per message
fn render(result: &PassResult) -> String {
    let mut out = String::new();
    let took = result.finished_at - result.started_at;
    let _ = writeln!(
        out,
        "pass {} ({}s)",
        result.started_at.format("%Y-%m-%d %H:%M:%S"),
        took.num_seconds()
    );
    if let Some(error) = &result.error {
        let _ = writeln!(out, "aborted: {error}");
    }

    for message in &result.messages {
        let _ = write!(out, "{} {}", message.action, message.kind);
        if let Some(name) = &message.name {
            let _ = write!(out, " {name}");
        }
        if let Some(id) = &message.resource_id {
            let _ = write!(out, " ({id})");
        }
        out.push('\n');
        if let Some(note) = &message.note {
            let _ = writeln!(out, "  {note}");
        }
        for name in message.outcomes.names() {
            let Some(steps) = message.outcomes.steps(name) else {
                continue;
            };
            for (step, status) in steps {
                let _ = writeln!(out, "  {name} {step}: {status}");
            }
        }
    }
    out
}
