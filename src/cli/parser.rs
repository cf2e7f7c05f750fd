use clap::{Parser, Subcommand, ValueEnum};

/// Command-line interface definition for punchsync
/// Reconciles biometric terminal punches with a cloud HR platform using SQLite
#[derive(Parser)]
#[command(
    name = "punchsync",
    version = env!("CARGO_PKG_VERSION"),
    about = "Attendance reconciliation: merge terminal and cloud punches into one SQLite ledger",
    long_about = None
)]
pub struct Cli {
    /// Override database path (useful for tests or custom DB)
    #[arg(global = true, long = "db")]
    pub db: Option<String>,

    /// Use this configuration file instead of ~/.punchsync/punchsync.conf
    #[arg(global = true, long = "config", value_name = "FILE")]
    pub config: Option<String>,

    /// Run in test mode (no config file update)
    #[arg(global = true, long = "test", hide = true)]
    pub test: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OriginArg {
    Device,
    Cloud,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and configuration
    Init,

    /// Manage the configuration file (view or edit)
    Config {
        #[arg(long = "print", help = "Print the effective configuration")]
        print_config: bool,

        #[arg(
            long = "edit",
            help = "Edit the configuration file (default editor: $EDITOR, or nano/notepad)"
        )]
        edit_config: bool,

        #[arg(
            long = "editor",
            help = "Specify the editor to use (vim, nano, or custom path)"
        )]
        editor: Option<String>,
    },

    /// Manage the database (migrations, integrity checks, etc.)
    Db {
        #[arg(long = "migrate", help = "Run pending database migrations")]
        migrate: bool,

        #[arg(long = "check", help = "Check database integrity")]
        check: bool,

        #[arg(long = "vacuum", help = "Vacuum the database")]
        vacuum: bool,

        #[arg(long = "info", help = "Show row counts, unsynced rows and checkpoints")]
        info: bool,
    },

    /// Show the internal audit log
    Log {
        #[arg(long = "print", help = "Print rows from the internal log table")]
        print: bool,
    },

    /// Manage cloud employee id → device key mappings
    Map {
        /// Add or update a mapping
        #[arg(long = "add", num_args = 2, value_names = ["CLOUD_ID", "DEVICE_KEY"])]
        add: Option<Vec<String>>,

        /// Remove the mapping of a cloud employee id
        #[arg(long = "remove", value_name = "CLOUD_ID", conflicts_with = "add")]
        remove: Option<String>,

        /// List all mappings
        #[arg(long = "list")]
        list: bool,
    },

    /// Pull new punches from the terminal
    PollDevice {
        /// Terminal export directory (overrides device.export_dir)
        #[arg(long = "export-dir", value_name = "DIR")]
        export_dir: Option<String>,
    },

    /// Pull attendance entries from the cloud HR platform
    PollCloud,

    /// Retire device rows that duplicate a cloud row
    Resolve {
        /// Matching window in seconds (overrides reconcile.conflict_window_secs)
        #[arg(long = "window", value_name = "SECS")]
        window: Option<i64>,
    },

    /// Push unsynced rows to the cloud HR platform
    Push,

    /// Run a full cycle: poll-device, poll-cloud, resolve, push
    Run {
        /// Terminal export directory (overrides device.export_dir)
        #[arg(long = "export-dir", value_name = "DIR")]
        export_dir: Option<String>,
    },

    /// List canonical ledger rows
    List {
        #[arg(long = "origin", value_enum)]
        origin: Option<OriginArg>,

        #[arg(long = "employee", value_name = "KEY")]
        employee: Option<i64>,

        #[arg(long = "unsynced", help = "Only rows not yet pushed")]
        unsynced: bool,
    },

    /// Export rows added since the last backup as SQL files
    Backup {
        #[arg(long, value_name = "DIR")]
        dir: String,

        #[arg(long, help = "Wrap each export in a .zip archive")]
        compress: bool,
    },
}
