use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use modelrun::catalog::{Catalog, HttpCatalog};
use modelrun::config::Settings;
use modelrun::docker::{self, DockerCli};
use modelrun::params;
use modelrun::run::{ResultsOutcome, RunController, RunOutcome, RunRequest};

#[derive(Parser)]
#[command(
    name = "modelrun",
    version,
    about = "Run container-packaged black-box models and collect their outputs"
)]
struct Cli {
    /// Configuration JSON file with the catalog URL and credentials.
    #[arg(long, global = true, default_value = ".config")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a model (attached unless --detach is given).
    Run {
        /// Model name, e.g. CHIRPS-Monthly.
        #[arg(long)]
        model: Option<String>,
        /// Explicit model version id; overrides --model.
        #[arg(long)]
        version: Option<String>,
        /// Inline JSON object of run parameters.
        #[arg(long)]
        params: Option<String>,
        /// Parameters file (JSON or `name: value` lines).
        #[arg(long)]
        params_file: Option<PathBuf>,
        /// Result folder (defaults to ./runs/<model>/<timestamp>).
        #[arg(long)]
        output: Option<PathBuf>,
        /// Start the container and return immediately.
        #[arg(long)]
        detach: bool,
    },
    /// Poll a detached run and collect its results once it has finished.
    Results { container: String },
    /// List the latest models that carry a runnable image.
    ListModels,
    /// Show the version neighborhood of a model.
    Versions { model: String },
    /// Write a `<model>_params.txt` skeleton listing the model's parameters.
    ModelParams { model: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;
    let catalog = HttpCatalog::new(&settings);

    match cli.command {
        Commands::Run {
            model,
            version,
            params,
            params_file,
            output,
            detach,
        } => {
            anyhow::ensure!(
                model.is_some() || version.is_some(),
                "pass --model or --version"
            );
            docker::ensure_available()?;
            let engine = DockerCli::new();
            let controller = RunController::new(&catalog, &engine);

            let request = RunRequest {
                model_name: model,
                version,
                params_json: params,
                params_file,
                output_dir: output,
                attached: !detach,
            };
            match controller.run_model(&request, &mut |line| println!("{line}"))? {
                RunOutcome::Completed(result) => {
                    println!(
                        "collected {} output file(s) and {} accessory file(s)",
                        result.output_files.len(),
                        result.accessory_files.len()
                    );
                }
                RunOutcome::Detached(record) => {
                    println!("running detached as {}", record.container_name);
                    println!(
                        "results folder: {}",
                        record.local_output_folder.display()
                    );
                    println!(
                        "collect later with: modelrun results {}",
                        record.container_name
                    );
                }
            }
        }

        Commands::Results { container } => {
            docker::ensure_available()?;
            let engine = DockerCli::new();
            let controller = RunController::new(&catalog, &engine);
            match controller.get_results(&container)? {
                ResultsOutcome::Collected(result) => {
                    println!(
                        "collected {} output file(s) and {} accessory file(s)",
                        result.output_files.len(),
                        result.accessory_files.len()
                    );
                }
                ResultsOutcome::NotReady => {
                    println!("not ready: container {container} is still running");
                }
            }
        }

        Commands::ListModels => {
            for (idx, name) in catalog.available_models()?.iter().enumerate() {
                println!("({}) {name}", idx + 1);
            }
        }

        Commands::Versions { model } => {
            let versions = catalog.versions(&model)?;
            println!("current: {}", versions.current_version);
            for id in &versions.prev_versions {
                println!("previous: {id}");
            }
            for id in &versions.later_versions {
                println!("later: {id}");
            }
        }

        Commands::ModelParams { model } => {
            let info = catalog.model_info(Some(&model), None)?;
            let directive = catalog.directive(&info.id)?;
            let skeleton = params::params_skeleton(&model, &directive.command_raw);
            let path = format!("{model}_params.txt");
            std::fs::write(&path, skeleton)?;
            println!("{model} parameters file written to {path}");
        }
    }

    Ok(())
}
