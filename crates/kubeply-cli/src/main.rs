//! Kubeply CLI - apply layered Kubernetes manifests and wait for jobs to finish

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod args;
mod commands;
mod display;
mod error;
mod exit_codes;

use args::DeployArgs;

#[derive(Parser)]
#[command(name = "kubeply")]
#[command(author = "Kubeply Contributors")]
#[command(version)]
#[command(about = "Apply layered Kubernetes manifests and wait for jobs and pods to finish", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every manifest of the layered directories, in name order
    ApplyAll {
        #[command(flatten)]
        args: DeployArgs,
    },

    /// Apply the named manifests, in the given order
    ApplyOne {
        /// Manifest names (file stems)
        #[arg(required = true, value_name = "NAME")]
        names: Vec<String>,

        #[command(flatten)]
        args: DeployArgs,
    },

    /// Print the rendered manifests without touching the cluster
    Show {
        /// Manifest names (file stems)
        #[arg(required = true, value_name = "NAME")]
        names: Vec<String>,

        #[command(flatten)]
        args: DeployArgs,
    },
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run(cli: Cli) -> error::Result<()> {
    match cli.command {
        Commands::ApplyAll { args } => commands::apply::run(&args, None).await,
        Commands::ApplyOne { names, args } => commands::apply::run(&args, Some(names)).await,
        Commands::Show { names, args } => commands::show::run(&args, &names),
    }
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are not errors
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.debug);

    let code = match run(cli).await {
        Ok(()) => exit_codes::SUCCESS,
        Err(err) => {
            if let Some(failure) = err.workload_failure() {
                display::print_workload_failure(failure);
            }
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };

    std::process::exit(code);
}
