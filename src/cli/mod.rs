use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command-line surface: enough to point the binary at a config file and an initial
/// recipe, plus the hidden Child Executor entry point (spec §6).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, default_value_t = String::from("/etc/states-agent/config.yaml"))]
    config: String,

    /// Recipe file loaded at startup, under an initial version tag of `"initial"`.
    #[arg(short, long)]
    recipe: Option<PathBuf>,

    #[arg(long)]
    print_debug_info: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Child Executor entry point (spec §4.3): reads a state descriptor from stdin, runs
    /// it, writes the outcome to stdout. Not meant to be invoked by hand.
    #[command(name = "__exec-state", hide = true)]
    ExecState {
        #[arg(long)]
        checksum_root: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn config_path(&self) -> PathBuf {
        PathBuf::from(&self.config)
    }

    pub fn recipe_path(&self) -> Option<&PathBuf> {
        self.recipe.as_ref()
    }

    pub fn print_debug_info(&self) -> bool {
        self.print_debug_info
    }

    pub fn exec_state_checksum_root(&self) -> Option<&PathBuf> {
        match &self.command {
            Some(Command::ExecState { checksum_root }) => Some(checksum_root),
            None => None,
        }
    }
}
