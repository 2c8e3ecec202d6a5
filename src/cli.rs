use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Remote service base URL (overrides TASKDECK_REMOTE_URL and stored config)
    #[arg(long, global = true)]
    pub remote: Option<String>,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in to the remote service and store the session
    Login {
        #[arg(value_name = "EMAIL")]
        email: String,
        /// Password; prompted for when omitted
        #[arg(value_name = "PASSWORD")]
        password: Option<String>,
    },
    /// Forget the stored remote session and fall back to guest mode
    Logout,
    /// List boards
    Boards,
    /// List projects
    Projects,
    /// List columns visible on a board
    Columns {
        #[arg(value_name = "BOARD")]
        board: String,
    },
    /// List tasks on a board
    Tasks {
        #[arg(value_name = "BOARD")]
        board: String,
    },
    /// Add a task to a board
    Add {
        #[arg(value_name = "TITLE")]
        title: String,
        #[arg(short, long, default_value = "todo")]
        column: String,
        /// Board id; defaults to the first board
        #[arg(short, long)]
        board: Option<String>,
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Move a task to another column
    Move {
        #[arg(value_name = "BOARD")]
        board: String,
        #[arg(value_name = "TASK")]
        task: String,
        #[arg(value_name = "COLUMN")]
        column: String,
    },
    /// Delete a task
    Rm {
        #[arg(value_name = "BOARD")]
        board: String,
        #[arg(value_name = "TASK")]
        task: String,
    },
    /// Set a config value
    Set {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
    /// Get a config value
    Get {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// List config values
    ConfigList,
    /// Delete a config value
    ConfigDelete {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// Reset local guest data (WARNING: deletes all local boards and tasks)
    Reset,
    /// Generate shell completions
    Completions {
        #[arg(value_name = "SHELL")]
        shell: String,
    },
}
