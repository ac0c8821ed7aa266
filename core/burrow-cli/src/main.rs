//! burrow: workspace session manager CLI.
//!
//! Registers project directories as workspaces and enters them in dedicated
//! interactive sub-shells with scoped environment, history, and enter/exit
//! scripts. Inactive workspaces can be archived into squashfs images.

mod commands;
mod logging;
mod prompt;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "burrow")]
#[command(about = "Per-project workspace sessions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a directory as a workspace (defaults to the current one)
    Add {
        path: Option<PathBuf>,
    },

    /// Remove a workspace's registry link (directory contents untouched)
    Delete {
        /// Workspace path or identifier (defaults to the current directory)
        target: Option<String>,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// List registered workspaces
    List,

    /// Enter a workspace session
    Enter {
        /// Workspace path or identifier
        target: String,
    },

    /// Pick a workspace interactively and enter it
    Select,

    /// Switch the current session to another workspace
    Switch {
        target: String,
    },

    /// Leave the current workspace session (root shell only)
    Unload,

    /// Leave and immediately re-enter the current workspace (root shell only)
    Reload,

    /// Print the on-enter script path so a sub-shell can re-source it
    Rehash,

    /// Open the workspace's enter (or exit) script in the editor
    Configure {
        /// Workspace path or identifier (defaults to the active session)
        target: Option<String>,

        /// Edit the exit script instead of the enter script
        #[arg(long)]
        exit: bool,
    },

    /// Print an absolute path inside the active workspace (for cd wrappers)
    Path {
        rel: Option<String>,
    },

    /// List entries at a path relative to the active workspace
    Ls {
        rel: Option<String>,
    },

    /// Archive, restore, mount, and list workspace images
    Archive {
        #[command(subcommand)]
        command: ArchiveCommands,
    },
}

#[derive(Subcommand)]
enum ArchiveCommands {
    /// Compress an inactive workspace into an image
    Create {
        /// Workspace path or identifier
        target: String,

        /// Description recorded in the archive metadata
        #[arg(long)]
        description: Option<String>,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Extract an archive back to its original path
    Restore {
        id: String,
    },

    /// Extract an archive read-only under the mount area and relink it
    Mount {
        id: String,
    },

    /// Remove a mounted archive's extraction and link
    Unmount {
        id: String,
    },

    /// List archived workspaces
    List,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let storage = match burrow_core::StorageConfig::from_env() {
        Ok(storage) => storage,
        Err(err) => {
            eprintln!("burrow: {err}");
            return ExitCode::FAILURE;
        }
    };
    let _logging_guard = logging::init(&storage);

    let app = match commands::App::bootstrap(storage) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("burrow: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Add { path } => app.add(path),
        Commands::Delete { target, yes } => app.delete(target, yes),
        Commands::List => app.list(),
        Commands::Enter { target } => app.enter(&target),
        Commands::Select => app.select(),
        Commands::Switch { target } => app.switch(&target),
        Commands::Unload => app.unload(),
        Commands::Reload => app.reload(),
        Commands::Rehash => app.rehash(),
        Commands::Configure { target, exit } => app.configure(target, exit),
        Commands::Path { rel } => app.path(rel.as_deref()),
        Commands::Ls { rel } => app.ls(rel.as_deref()),
        Commands::Archive { command } => match command {
            ArchiveCommands::Create {
                target,
                description,
                yes,
            } => app.archive_create(&target, description, yes),
            ArchiveCommands::Restore { id } => app.archive_restore(&id),
            ArchiveCommands::Mount { id } => app.archive_mount(&id),
            ArchiveCommands::Unmount { id } => app.archive_unmount(&id),
            ArchiveCommands::List => app.archive_list(),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("burrow: {err}");
            ExitCode::FAILURE
        }
    }
}
