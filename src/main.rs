use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod ui;

use cli::CliHandler;
use turnier_client::version::CURRENT_VERSION;

#[derive(Parser)]
#[command(
    name = "turnier",
    about = "Command line client for the Turnier tournament API",
    long_about = "Turnier CLI - session management and API access for tournament organizers

QUICK START:
  turnier login                          # Sign in with username and password
  turnier status                         # Show session, expiry and server health
  turnier request GET /tournaments       # Call any endpoint with your session
  turnier logout                         # End the session",
    version = CURRENT_VERSION,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use a different config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login(LoginArgs),

    /// End the session
    Logout,

    /// Show session and server status
    #[command(aliases = &["st"])]
    Status,

    /// Refresh the session if it is about to expire
    Refresh,

    /// Send an authenticated request
    #[command(aliases = &["req"])]
    Request(RequestArgs),

    /// Configure settings
    #[command(aliases = &["cfg"])]
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct LoginArgs {
    #[arg(short, long)]
    pub username: Option<String>,
}

#[derive(Args)]
pub struct RequestArgs {
    /// GET, POST, PUT, PATCH or DELETE
    pub method: String,

    /// Path relative to the API base URL
    pub path: String,

    /// JSON body
    #[arg(short, long)]
    pub data: Option<String>,

    /// Extra header as NAME:VALUE, may be repeated
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Do not send a Content-Type header
    #[arg(long)]
    pub no_content_type: bool,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    Show,
    SetEndpoint { url: String },
    SetTimeout { seconds: u64 },
    SetRefreshThreshold { minutes: u32 },
    Reset,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(format!("turnier={},turnier_client={}", log_level, log_level));
    subscriber.init();

    let mut handler = CliHandler::with_config_path(cli.config);

    if let Err(e) = handler.execute(cli.command).await {
        ui::UI::new().error(&format!("Error: {}", e));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_command() {
        let cli = Cli::try_parse_from([
            "turnier",
            "request",
            "post",
            "/registrations",
            "--data",
            r#"{"competitorId":4}"#,
            "-H",
            "X-Club-Id: 42",
            "--no-content-type",
        ])
        .unwrap();

        match cli.command {
            Commands::Request(args) => {
                assert_eq!(args.method, "post");
                assert_eq!(args.path, "/registrations");
                assert_eq!(args.headers, vec!["X-Club-Id: 42".to_string()]);
                assert!(args.no_content_type);
            }
            _ => panic!("expected request command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["turnier", "status", "--verbose", "--config", "/tmp/t.json"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/t.json")));
    }

    #[test]
    fn test_config_subcommands() {
        let cli =
            Cli::try_parse_from(["turnier", "config", "set-refresh-threshold", "15"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigArgs {
                command: ConfigCommand::SetRefreshThreshold { minutes: 15 }
            })
        ));
    }
}
