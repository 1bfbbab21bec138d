use anyhow::Result;
use clap::{Args, Parser, Subcommand};

mod commands;
mod context;
mod output;

use commands::chat::run_chat;
use commands::send::run_send;
use commands::server::{run_clear, run_health, run_status};
use context::CliContext;

#[derive(Parser)]
#[command(name = "termagent")]
#[command(about = "Terminal chat client for an AI agent server", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    /// Agent server base URL. Overrides settings files and TERMAGENT_URL.
    #[arg(long, global = true)]
    server: Option<String>,

    /// Enable verbose logging to stderr.
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat screen (default).
    Chat,
    /// Send one message and print the reply as it streams.
    Send(SendArgs),
    /// Check whether the agent server is reachable.
    Status,
    /// Drop the server-side conversation history.
    Clear,
    /// Query the server health endpoint.
    Health,
}

#[derive(Args)]
struct SendArgs {
    /// Message text; multiple words are joined with spaces.
    #[arg(required = true, num_args = 1..)]
    message: Vec<String>,

    /// Wait for the whole reply instead of streaming it.
    #[arg(long)]
    no_stream: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let ctx = CliContext::load(&cwd, cli.server.as_deref(), cli.verbose)?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_chat(ctx),
        Commands::Send(args) => run_send(&ctx, &args.message.join(" "), args.no_stream, cli.json),
        Commands::Status => run_status(&ctx, cli.json),
        Commands::Clear => run_clear(&ctx, cli.json),
        Commands::Health => run_health(&ctx, cli.json),
    }
}
