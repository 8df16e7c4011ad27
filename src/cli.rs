use std::path::PathBuf;

use dialoguer::{theme::ColorfulTheme, Input, Password};
use reqwest::Method;
use tokio::sync::broadcast::{self, error::TryRecvError};
use turnier_client::config::{default_config_path, CliConfig};
use turnier_client::protocol::api::LoginRequest;
use turnier_client::version::format_version_info;
use turnier_client::{
    ApiClient, AuthService, LogoutReason, RefreshOutcome, RequestOptions, ResponseBody, Result,
    SessionEvent, TurnierError,
};

use crate::ui::UI;
use crate::{Commands, ConfigArgs, ConfigCommand, LoginArgs, RequestArgs};

/// CLI handler for processing commands
pub struct CliHandler {
    config_path: Option<PathBuf>,
    ui: UI,
}

impl CliHandler {
    pub fn with_config_path(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            ui: UI::new(),
        }
    }

    fn config_file(&self) -> PathBuf {
        self.config_path.clone().unwrap_or_else(default_config_path)
    }

    async fn load_config(&self) -> Result<CliConfig> {
        CliConfig::load(Some(&self.config_file())).await
    }

    async fn build_client(&self) -> Result<ApiClient> {
        let config = self.load_config().await?;
        ApiClient::new(config.to_client_config()?)
    }

    /// Execute a CLI command
    pub async fn execute(&mut self, command: Commands) -> Result<()> {
        if let Commands::Config(args) = command {
            return self.handle_config(args).await;
        }

        let client = self.build_client().await?;
        let mut events = client.subscribe();

        let result = match command {
            Commands::Login(args) => self.handle_login(&client, args).await,
            Commands::Logout => self.handle_logout(&client),
            Commands::Status => self.handle_status(&client).await,
            Commands::Refresh => self.handle_refresh(&client).await,
            Commands::Request(args) => self.handle_request(&client, args).await,
            Commands::Config(_) => Ok(()),
        };

        self.report_session_events(&mut events);
        result
    }

    /// Tell the user when the server ended the session during the command
    fn report_session_events(&self, events: &mut broadcast::Receiver<SessionEvent>) {
        loop {
            match events.try_recv() {
                Ok(SessionEvent::LoggedOut(LogoutReason::SessionExpired)) => {
                    self.ui
                        .warning("Your session has expired. Run `turnier login` to sign in again.");
                }
                Ok(_) => {}
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    async fn handle_login(&self, client: &ApiClient, args: LoginArgs) -> Result<()> {
        let theme = ColorfulTheme::default();
        let username = match args.username {
            Some(username) => username,
            None => Input::<String>::with_theme(&theme)
                .with_prompt("Username")
                .interact_text()?,
        };
        let password = Password::with_theme(&theme)
            .with_prompt("Password")
            .interact()?;

        let record = AuthService::new(client)
            .login(&LoginRequest { username, password })
            .await?;

        let name = record
            .user
            .and_then(|user| user.name)
            .unwrap_or_else(|| "unknown user".to_string());
        self.ui.success(&format!("Logged in as {}", name));
        Ok(())
    }

    fn handle_logout(&self, client: &ApiClient) -> Result<()> {
        let service = AuthService::new(client);
        if !service.status().token_present {
            self.ui.info("Not logged in");
            return Ok(());
        }
        service.logout()?;
        self.ui.success("Logged out");
        Ok(())
    }

    async fn handle_status(&self, client: &ApiClient) -> Result<()> {
        let status = AuthService::new(client).status();
        let server = client.check_health().await.ok();

        let mut rows = vec![
            ("Version", format_version_info()),
            ("Endpoint", client.config().base_url.clone()),
            ("Session", self.ui.format_session_state(&status)),
        ];

        if status.token_present {
            let user = status.user.clone().unwrap_or_default();
            rows.push(("User", self.ui.format_user_field(user.name)));
            rows.push(("Role", self.ui.format_user_field(user.role)));
            rows.push((
                "Expires",
                self.ui.format_expiry(status.expires_at, status.remaining_ms),
            ));
            rows.push((
                "Refresh due",
                if status.refresh_due { "yes" } else { "no" }.to_string(),
            ));
        }

        rows.push(("Server", self.ui.format_server_status(server)));
        self.ui.card("Status", rows);
        Ok(())
    }

    async fn handle_refresh(&self, client: &ApiClient) -> Result<()> {
        match client.refresh_if_needed().await {
            RefreshOutcome::Refreshed => self.ui.success("Session refreshed"),
            RefreshOutcome::NoToken => {
                return Err(TurnierError::not_authenticated(
                    "Not logged in. Run `turnier login` first.",
                ))
            }
            RefreshOutcome::Failed => self
                .ui
                .warning("Refresh failed; the current session is kept until it expires"),
            outcome => self.ui.info(&format!("Refresh {}", outcome)),
        }
        Ok(())
    }

    async fn handle_request(&self, client: &ApiClient, args: RequestArgs) -> Result<()> {
        let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| TurnierError::invalid_input(format!("Unknown method {}", args.method)))?;

        let mut options = RequestOptions::new(method);
        if let Some(data) = &args.data {
            let payload: serde_json::Value = serde_json::from_str(data)
                .map_err(|e| TurnierError::invalid_input(format!("--data is not JSON: {}", e)))?;
            options = options.json(&payload)?;
        }
        for raw in &args.headers {
            let (name, value) = parse_header(raw)?;
            options = options.header(name, value);
        }
        if args.no_content_type {
            options = options.without_header("content-type");
        }

        match client.call(&args.path, options).await? {
            ResponseBody::Json(value) => self.ui.print(&serde_json::to_string_pretty(&value)?),
            ResponseBody::Text(text) => self.ui.print(&text),
        }
        Ok(())
    }

    async fn handle_config(&self, args: ConfigArgs) -> Result<()> {
        let path = self.config_file();
        let mut config = self.load_config().await?;

        match args.command {
            ConfigCommand::Show => {
                self.ui.card(
                    "Configuration",
                    vec![
                        ("File", path.display().to_string()),
                        ("Endpoint", config.endpoint.clone()),
                        ("Timeout", format!("{}s", config.timeout)),
                        (
                            "Refresh threshold",
                            format!("{} ms", config.refresh_threshold_ms),
                        ),
                        ("Session file", config.session_path().display().to_string()),
                    ],
                );
                return Ok(());
            }
            ConfigCommand::SetEndpoint { url } => {
                if url.trim().is_empty() {
                    return Err(TurnierError::invalid_endpoint("Endpoint cannot be empty"));
                }
                config.endpoint = url.trim().trim_end_matches('/').to_string();
            }
            ConfigCommand::SetTimeout { seconds } => {
                if seconds == 0 {
                    return Err(TurnierError::invalid_input(
                        "Timeout must be at least one second",
                    ));
                }
                config.timeout = seconds;
            }
            ConfigCommand::SetRefreshThreshold { minutes } => {
                config.refresh_threshold_ms = i64::from(minutes) * 60 * 1000;
            }
            ConfigCommand::Reset => {
                config = CliConfig::default();
            }
        }

        config.save(&path).await?;
        self.ui.success("Configuration updated");
        Ok(())
    }
}

/// `Name: value` as given to `--header`
fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| TurnierError::invalid_header(format!("Expected NAME:VALUE, got {}", raw)))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(TurnierError::invalid_header("Header name cannot be empty"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("X-Club-Id: 42").unwrap(),
            ("X-Club-Id".to_string(), "42".to_string())
        );
        assert_eq!(
            parse_header("Accept:text/csv").unwrap(),
            ("Accept".to_string(), "text/csv".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }
}
