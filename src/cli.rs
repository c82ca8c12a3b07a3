use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "rutero")]
#[command(about = "Trip and expense ledger for delivery drivers", long_about = None)]
pub struct Cli {
    /// Override Rutero home directory (config/data subdirs will be created inside it).
    #[arg(long, env = "RUTERO_HOME")]
    pub home: Option<std::path::PathBuf>,

    /// Run on transient in-memory data: nothing is read from or written
    /// to disk, and sync is disabled.
    #[arg(long, global = true)]
    pub guest: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Trip(TripArgs),
    Expense(ExpenseArgs),

    Report(ReportArgs),
    Days(DaysArgs),

    Login(LoginArgs),
    Logout,
    Sync(SyncArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RangeOpt {
    Today,
    Week,
    Month,
}

/// Window selection shared by every read command: a named preset, or an
/// explicit custom window, plus the optional single-day refinement.
#[derive(Debug, Args, Clone)]
pub struct RangeFlags {
    /// Named window relative to today. Default: month.
    #[arg(long, value_enum)]
    pub range: Option<RangeOpt>,

    /// Custom window start (YYYY-MM-DD). Requires --to.
    #[arg(long)]
    pub from: Option<String>,

    /// Custom window end (YYYY-MM-DD). Requires --from.
    #[arg(long)]
    pub to: Option<String>,

    /// Restrict to one exact day inside the window, or "all".
    #[arg(long)]
    pub day: Option<String>,
}

#[derive(Debug, Args)]
pub struct TripArgs {
    #[command(subcommand)]
    pub cmd: TripCmd,
}

#[derive(Debug, Subcommand)]
pub enum TripCmd {
    /// Record a trip. Date defaults to today.
    Add {
        #[arg(long)]
        date: Option<String>,

        /// Shorthand for --date <yesterday>.
        #[arg(long, conflicts_with = "date")]
        yesterday: bool,

        #[arg(long, default_value = "")]
        client: String,

        /// Price charged; unparseable or negative input counts as 0.
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        price: String,

        /// Distance in kilometers; same coercion as price.
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        km: String,
    },
    /// Edit fields of an existing trip.
    Set {
        id: i64,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        client: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        price: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        km: Option<String>,
    },
    /// Delete a trip (irreversible).
    Rm {
        id: i64,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    List {
        #[command(flatten)]
        window: RangeFlags,
    },
}

#[derive(Debug, Args)]
pub struct ExpenseArgs {
    #[command(subcommand)]
    pub cmd: ExpenseCmd,
}

#[derive(Debug, Subcommand)]
pub enum ExpenseCmd {
    /// Record an expense. Date defaults to today.
    Add {
        #[arg(long)]
        date: Option<String>,

        #[arg(long, conflicts_with = "date")]
        yesterday: bool,

        #[arg(long, default_value = "")]
        concept: String,

        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        amount: String,
    },
    Set {
        id: i64,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        concept: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        amount: Option<String>,
    },
    Rm {
        id: i64,
        #[arg(long)]
        yes: bool,
    },
    List {
        #[command(flatten)]
        window: RangeFlags,
    },
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub window: RangeFlags,
}

#[derive(Debug, Args)]
pub struct DaysArgs {
    #[command(flatten)]
    pub window: RangeFlags,
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Sync API base URL. Remembered for later invocations.
    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub user: Option<String>,

    /// Password for the sync API. Prompted for when omitted.
    #[arg(long, env = "RUTERO_PASSWORD")]
    pub password: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum SyncCmd {
    /// Show sync configuration and local counts.
    Status,
    /// Replace local data with the remote snapshot.
    Pull,
    /// Upload the local snapshot to the remote store.
    Push,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    #[command(subcommand)]
    pub cmd: SyncCmd,
}
