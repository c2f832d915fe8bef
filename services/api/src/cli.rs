use crate::admin::{run_enrollment_list, ListArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use coursedesk::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "CourseDesk Enrollment Service",
    about = "Run the CourseDesk enrollment intake service and admin tools from the command line",
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
    /// Inspect enrollments persisted by the intake service
    Enrollments {
        #[command(subcommand)]
        command: EnrollmentsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum EnrollmentsCommand {
    /// Print stored enrollment records, newest first
    List(ListArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Enrollments {
            command: EnrollmentsCommand::List(args),
        } => run_enrollment_list(args).await,
    }
}
