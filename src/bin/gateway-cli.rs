//! Offline topology tooling: validate a topology file, list its compiled
//! routes, or dry-run a rewrite without starting the gateway.

use clap::{Parser as CliParser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use rewrite_gateway::config::load_config;
use rewrite_gateway::gateway::topology::Topology;
use rewrite_gateway::rewrite::Direction;

#[derive(CliParser)]
#[command(name = "gateway-cli")]
#[command(about = "Topology tooling for the rewrite gateway", long_about = None)]
struct Cli {
    /// Topology file to operate on.
    #[arg(short, long, default_value = "topology.toml")]
    file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, validate and compile the topology
    Validate,
    /// List compiled routes and rules
    Routes,
    /// Apply the topology's rewrite rules to a URL
    Rewrite {
        /// Value to rewrite (path+query or full URL).
        url: String,
        /// Direction to rewrite in.
        #[arg(short, long, default_value = "in")]
        direction: String,
        /// Apply a specific rule instead of the best match.
        #[arg(short, long)]
        rule: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let topology = match Topology::compile(&config) {
        Ok(topology) => topology,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Validate => {
            println!(
                "{}: ok ({} routes, {} rules)",
                cli.file.display(),
                topology.routes().len(),
                topology.engine().rules().count()
            );
        }
        Commands::Routes => {
            for route in &config.routes {
                println!("route {:24} {}", route.name, route.pattern);
            }
            for rule in topology.engine().rules() {
                let pattern = rule
                    .pattern()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "(by name only)".to_string());
                println!("rule  {:24} {}", rule.name(), pattern);
            }
        }
        Commands::Rewrite {
            url,
            direction,
            rule,
        } => {
            let direction = match direction.as_str() {
                "in" => Direction::In,
                "out" => Direction::Out,
                other => {
                    eprintln!("error: unknown direction '{}' (use 'in' or 'out')", other);
                    return ExitCode::FAILURE;
                }
            };
            let result = match rule {
                Some(name) => topology.engine().rewrite_rule(&name, direction, &url),
                None => topology.engine().rewrite(direction, &url),
            };
            match result {
                Ok(rewritten) => println!("{}", rewritten),
                Err(e) => {
                    eprintln!("error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
    }
    ExitCode::SUCCESS
}
