use crate::demo::{
    run_demo, run_end_date, run_limit_check, run_plan_listing, DemoArgs, EndDateArgs,
    LimitCheckArgs, PlanListArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use immo_market::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Immo Market Backend",
    about = "Run the marketplace backend or inspect subscription rules from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Billing-cycle calculations
    Billing {
        #[command(subcommand)]
        command: BillingCommand,
    },
    /// Plan limit evaluation
    Limits {
        #[command(subcommand)]
        command: LimitsCommand,
    },
    /// Plan catalog inspection
    Plans {
        #[command(subcommand)]
        command: PlansCommand,
    },
    /// Walk a user through signup, upgrade and expiry against in-memory storage
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum BillingCommand {
    /// Print the end of a billing period
    EndDate(EndDateArgs),
}

#[derive(Subcommand, Debug)]
enum LimitsCommand {
    /// Evaluate a resource count against a plan cap
    Check(LimitCheckArgs),
}

#[derive(Subcommand, Debug)]
enum PlansCommand {
    /// List the default catalog or a CSV export
    List(PlanListArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Seed the plan catalog from a CSV export instead of the built-in plans
    #[arg(long)]
    pub(crate) plans_csv: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Billing {
            command: BillingCommand::EndDate(args),
        } => run_end_date(args),
        Command::Limits {
            command: LimitsCommand::Check(args),
        } => run_limit_check(args),
        Command::Plans {
            command: PlansCommand::List(args),
        } => run_plan_listing(args),
        Command::Demo(args) => run_demo(args),
    }
}
