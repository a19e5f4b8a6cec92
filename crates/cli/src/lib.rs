pub mod commands;

use clap::{Args, Parser, Subcommand};
use std::process::ExitCode;

use commands::requests::{DecisionArgs, SubmitArgs};

#[derive(Debug, Parser)]
#[command(
    name = "registrar",
    about = "Academic request approval CLI",
    long_about = "Submit academic requests, inspect stage flows, and record approval decisions against the registrar database.",
    after_help = "Examples:\n  registrar stages excuse\n  registrar submit --type leave --requester-id stu-1 --requester-name 'Ada Obi' --summary 'Conference'\n  registrar approve REQ-... --actor-id lec-1 --actor-name 'Dr. Musa' --role Lecturer"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "List the ordered approval stages of a request type")]
    Stages {
        #[arg(help = "Request type: excuse, leave or letter")]
        request_type: String,
    },
    #[command(about = "Submit a new request")]
    Submit {
        #[arg(long = "type")]
        request_type: String,
        #[arg(long)]
        requester_id: String,
        #[arg(long)]
        requester_name: String,
        #[arg(long)]
        summary: String,
    },
    #[command(about = "Show one request with its approval history")]
    Show { request_id: String },
    #[command(about = "List open requests the given role can act on")]
    Pending {
        #[arg(long)]
        role: String,
        #[arg(long)]
        limit: Option<u32>,
    },
    #[command(about = "List requests submitted by one requester")]
    Submitted {
        #[arg(long)]
        requester_id: String,
    },
    #[command(about = "Move a submitted request onto its first approval stage")]
    Dispatch { request_id: String },
    #[command(about = "Approve the current stage of a request")]
    Approve(DecisionFlags),
    #[command(about = "Reject a request at its current stage (comment required)")]
    Reject(DecisionFlags),
}

#[derive(Debug, Args)]
struct DecisionFlags {
    request_id: String,
    #[arg(long)]
    actor_id: String,
    #[arg(long)]
    actor_name: String,
    #[arg(long, help = "Acting role: Lecturer, HOD, Dean, VC, Staff or Admin")]
    role: String,
    #[arg(long)]
    comment: Option<String>,
}

impl From<DecisionFlags> for DecisionArgs {
    fn from(flags: DecisionFlags) -> Self {
        Self {
            request_id: flags.request_id,
            actor_id: flags.actor_id,
            actor_name: flags.actor_name,
            role: flags.role,
            comment: flags.comment,
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Stages { request_type } => commands::stages::run(&request_type),
        Command::Submit { request_type, requester_id, requester_name, summary } => {
            commands::requests::submit(SubmitArgs {
                request_type,
                requester_id,
                requester_name,
                summary,
            })
        }
        Command::Show { request_id } => commands::requests::show(&request_id),
        Command::Pending { role, limit } => commands::requests::pending(&role, limit),
        Command::Submitted { requester_id } => commands::requests::submitted(&requester_id),
        Command::Dispatch { request_id } => commands::requests::dispatch(&request_id),
        Command::Approve(flags) => commands::requests::approve(flags.into()),
        Command::Reject(flags) => commands::requests::reject(flags.into()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
