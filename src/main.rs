mod analysis;
mod report;

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use analysis::run_scenario;
use clap::{Parser, ValueEnum};
use log::info;
use report::render_report;
use trusslab::Scenario;

/// Built-in scenarios available without a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Demo {
    /// One steel bar pulled along its axis.
    Cantilever,
    /// A six-panel bridge under uniform deck load.
    Bridge,
}

/// Run a truss scenario over a load ramp and report strain and failures.
#[derive(Debug, Parser)]
#[command(name = "trusslab", version, about)]
struct Args {
    /// Scenario JSON file. A built-in demo runs when omitted.
    scenario: Option<PathBuf>,
    /// Built-in demo to run when no file is given.
    #[arg(long, value_enum, default_value_t = Demo::Cantilever)]
    demo: Demo,
    /// Full-scale load in newtons for the built-in demos. Scenario files carry their own loads.
    #[arg(long, conflicts_with = "scenario")]
    load: Option<f64>,
    /// Override the number of load steps.
    #[arg(long)]
    steps: Option<usize>,
    /// Print the report as JSON instead of text.
    #[arg(long)]
    json: bool,
    /// Log assembly and solver details.
    #[arg(short, long)]
    verbose: bool,
}

/// Build the requested built-in scenario.
fn demo_scenario(demo: Demo, load: Option<f64>) -> Scenario {
    match demo {
        Demo::Cantilever => Scenario::cantilever(load.unwrap_or(1.0e6), 5),
        Demo::Bridge => Scenario::bridge(6, load.unwrap_or(2.5e5), 10),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut scenario = match &args.scenario {
        Some(path) => {
            info!("loading scenario from {}", path.display());
            Scenario::from_json(&fs::read_to_string(path)?)?
        }
        None => demo_scenario(args.demo, args.load),
    };
    if let Some(steps) = args.steps {
        scenario.steps = steps;
    }

    let report = run_scenario(&scenario)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", render_report(&report));
    }

    Ok(())
}
