use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "glbforge")]
#[command(author, version, about = "Durable FBX to binary glTF conversion jobs")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the conversion engine until SIGINT/SIGTERM
    Start,

    /// Submit a zip archive for conversion
    Submit {
        /// Archive containing the FBX model at its root
        #[arg(required = true)]
        archive: PathBuf,

        /// Original file name shown in the job title (defaults to the archive name)
        #[arg(long)]
        name: Option<String>,

        /// Project directory name (a UUID is generated if omitted)
        #[arg(long)]
        unique_id: Option<String>,
    },

    /// Show a job's state, data and log as JSON
    Status {
        /// Job id
        id: String,
    },

    /// List jobs with per-state counts
    List {
        /// Only jobs in this state (inactive, active, complete, failed)
        #[arg(long)]
        state: Option<String>,

        /// Only jobs of this type
        #[arg(long = "type")]
        job_type: Option<String>,

        /// Maximum number of jobs to show
        #[arg(long, default_value = "50")]
        limit: i64,
    },

    /// Copy a completed job's converted file to a destination
    Download {
        /// Job id
        id: i64,

        /// Destination file or directory
        dest: PathBuf,
    },

    /// Delete a job and its log
    Remove {
        /// Job id
        id: i64,
    },

    /// Delete completed jobs that were submitted with remove-on-complete
    Purge,

    /// Check that the converter executable can be found
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
