use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config_file::FromConfigFile;

use rustmdp::cars::State;
use rustmdp::config::{Config, Model};
use rustmdp::{report, solver, Mdp, Policy};


/// Command line argument parser.
#[derive(Parser, Debug)]
#[command(about = "Solve finite Markov Decision Processes by policy iteration", long_about = None)]
pub struct Args {
    /// Path to rustmdp configuration TOML file.
    config_path: PathBuf,

    #[command(subcommand)]
    command: Commands
}


#[derive(Subcommand, Debug)]
enum Commands {
    /// Print car rental and return probabilities.
    Probs,
    /// Print state values under the uniform random policy.
    Evaluate,
    /// Solve for the optimal policy.
    Solve {
        /// Also write the policy and values to this CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Solve a car rental model and show the policy for one state.
    State { n1: u8, n2: u8 },
}


fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let args = Args::parse();

    tracing::info!("Reading config file: {}", args.config_path.display());
    let config = Config::from_config_file(&args.config_path)
        .with_context(|| format!(
            "Unable to read configuration file {}", args.config_path.display()))?;
    let model = config.model()?;

    match &args.command {
        Commands::Probs => {
            let Model::Cars(cars) = &model else {
                anyhow::bail!("probability tables are only available for [cars] models");
            };
            print!("{}", cars.format_probs());
        }
        Commands::Evaluate => {
            rustmdp::mdp::validate(&model)?;
            config.solver.validate()?;
            let policy = Policy::uniform(model.num_states(), model.num_actions());
            let values = solver::evaluate_policy(
                &model, &policy, ndarray::Array1::zeros(model.num_states()), &config.solver)?;
            for (s, v) in values.iter().enumerate() {
                println!("{:>6} {:>12.4}", s, v);
            }
        }
        Commands::Solve { csv } => {
            tracing::info!(
                "Solving MDP with {} states and {} actions.",
                model.num_states(), model.num_actions());
            let solution = solver::solve(&model, &config.solver)?;
            match &model {
                Model::Cars(cars) => print!("{}", report::format_car_policy(cars, &solution)),
                Model::Tabular(_) => print!("{}", report::format_solution(&solution)),
            }
            if let Some(path) = csv {
                report::write_csv_file(&solution, path)
                    .with_context(|| format!("Unable to write {}", path.display()))?;
                tracing::info!("Wrote policy to {}", path.display());
            }
        }
        Commands::State { n1, n2 } => {
            let Model::Cars(cars) = &model else {
                anyhow::bail!("state lookup is only available for [cars] models");
            };
            if *n1 > cars.max1 || *n2 > cars.max2 {
                anyhow::bail!("state ({}, {}) is outside the lots", n1, n2);
            }
            let solution = solver::solve(&model, &config.solver)?;
            print!("{}", report::format_car_state(cars, &solution, &State { n1: *n1, n2: *n2 }));
        }
    }
    Ok(())
}
