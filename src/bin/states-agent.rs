use std::error::Error;
use std::io::{Read, Write};
use std::sync::Arc;

use tracing::{error, info};

use states_agent::cli::Cli;
use states_agent::config::store::{ConfigStore, FileConfigStore};
use states_agent::config::AgentConfig;
use states_agent::file_reader::FSFileReader;
use states_agent::logging::Logging;
use states_agent::worker::checksum::FileChecksumStore;
use states_agent::worker::state::{Recipe, StateDescriptor};
use states_agent::worker::state_executor::ShellStateExecutor;
use states_agent::worker::{exec_state, DirectoryModuleSet, FileManager, ReExecStepRunner, Worker};

const INITIAL_RECIPE_VERSION: &str = "initial";

fn main() -> Result<(), Box<dyn Error>> {
    Logging::try_init()?;

    let cli = Cli::parse_args();

    if let Some(checksum_root) = cli.exec_state_checksum_root() {
        return run_exec_state(checksum_root.clone());
    }

    if cli.print_debug_info() {
        println!("CLI: {:#?}", cli);
        return Ok(());
    }

    run_agent(cli)
}

/// Child Executor entry point (spec §4.3): reads the state descriptor from stdin, runs it
/// in-process (this process IS the isolation unit), writes the outcome to stdout. Never
/// errors outward — any failure is coerced into a `FAIL` outcome before this returns.
fn run_exec_state(checksum_root: std::path::PathBuf) -> Result<(), Box<dyn Error>> {
    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let state: StateDescriptor = serde_json::from_str(&input)?;

    let checksum = FileChecksumStore::new(checksum_root);
    let executor = ShellStateExecutor::new();
    let outcome = exec_state::run(&state, &checksum, &executor);

    let encoded = serde_json::to_string(&outcome)?;
    std::io::stdout().write_all(encoded.as_bytes())?;
    Ok(())
}

fn run_agent(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config: AgentConfig = FileConfigStore::new(cli.config_path()).load()?;
    info!(init = %config.init, "loaded configuration");

    let manager = Arc::new(FileManager::new(config.global.report_log.clone()));
    let binary = std::env::current_exe()?;
    let steps = Arc::new(ReExecStepRunner::new(binary, config.global.watch.clone()));
    let modules = Arc::new(DirectoryModuleSet::new(
        config.module.root.clone(),
        config.module.name.clone(),
    ));

    let worker = Worker::new(config.init.clone(), manager, steps, modules, config.recipe_delay()).run();

    if let Some(recipe_path) = cli.recipe_path() {
        let contents = FSFileReader.read(&recipe_path.to_string_lossy())?;
        let recipe: Recipe = serde_yaml::from_str(&contents)?;
        let version = if recipe.version.is_empty() {
            INITIAL_RECIPE_VERSION.to_string()
        } else {
            recipe.version
        };
        worker.load(version, Some(recipe.states))?;
        info!("initial recipe loaded");
    }

    let (shutdown_tx, shutdown_rx) = std::sync::mpsc::channel::<()>();
    create_shutdown_signal_handler(shutdown_tx)?;

    let _ = shutdown_rx.recv();
    info!("shutdown requested, aborting gracefully");
    worker.abort(false, true);
    worker.join();

    Ok(())
}

fn create_shutdown_signal_handler(sender: std::sync::mpsc::Sender<()>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        let _ = sender.send(());
    })
    .map_err(|e| {
        error!("could not set signal handler: {}", e);
        e
    })
}
