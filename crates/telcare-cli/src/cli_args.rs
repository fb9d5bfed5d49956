use clap::{ArgAction, Args, Parser, Subcommand};

/// Top-level CLI entrypoint.
#[derive(Parser, Debug, Clone)]
#[command(name = "telcare", version, about = "Telecom billing and plan-change portal client", long_about = None)]
pub struct Cli {
    /// Echo logs to stderr in addition to the log file.
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Supported subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Sign in and store the session locally.
    Login(LoginArgs),
    /// Sign out and purge the stored session.
    Logout,
    /// Create a new account.
    Register(RegisterArgs),
    /// Show the current session, if any.
    Whoami,
    /// Bill inquiry operations.
    #[command(subcommand)]
    Bill(BillCommand),
    /// Mobile plan operations.
    #[command(subcommand)]
    Product(ProductCommand),
    /// Show the effective configuration.
    Config,
}

#[derive(Debug, Clone, Args)]
pub struct LoginArgs {
    /// Account id (3-20 characters).
    #[arg(short, long, value_name = "ID")]
    pub user_id: String,

    /// Password; prompted interactively when omitted.
    #[arg(short, long)]
    pub password: Option<String>,

    /// Ask the portal to keep the session alive across logins.
    #[arg(long, action = ArgAction::SetTrue)]
    pub auto_login: bool,
}

#[derive(Debug, Clone, Args)]
pub struct RegisterArgs {
    /// Account id to create.
    #[arg(short, long, value_name = "ID")]
    pub user_id: String,

    /// Display name.
    #[arg(short = 'n', long, value_name = "NAME")]
    pub user_name: String,

    /// Phone line in 010-1234-5678 form.
    #[arg(short, long, value_name = "PHONE")]
    pub line_number: String,
}

#[derive(Debug, Clone, Subcommand)]
pub enum BillCommand {
    /// Show the inquiry menu: customer identifiers and selectable months.
    Menu,
    /// Fetch the bill for a month (defaults to the current billing month).
    Inquire(BillInquireArgs),
    /// List months with billing data for a line.
    Months(BillMonthsArgs),
}

#[derive(Debug, Clone, Args)]
pub struct BillInquireArgs {
    /// Billing month as YYYY-MM; defaults to the menu's current month.
    #[arg(short, long, value_name = "YYYY-MM")]
    pub month: Option<String>,

    /// Line number; defaults to the signed-in user's line.
    #[arg(short, long, value_name = "PHONE")]
    pub line: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct BillMonthsArgs {
    /// Line number; defaults to the signed-in user's line.
    #[arg(short, long, value_name = "PHONE")]
    pub line: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ProductCommand {
    /// Show the current product and customer record.
    Current,
    /// List products eligible as change targets.
    List,
    /// Run the plan-change flow against a target product code.
    Change(ProductChangeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ProductChangeArgs {
    /// Target product code.
    #[arg(short, long, value_name = "CODE")]
    pub target: String,

    /// Skip the confirmation prompt.
    #[arg(short = 'y', long, action = ArgAction::SetTrue)]
    pub yes: bool,
}
