//! sessionguard - log in to an authentication service from the terminal and
//! keep the session's tokens fresh.
//!
//! Credentials are persisted with the configured storage backend, so a login
//! survives between invocations.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use sessionguard_core::{
    ApiClient, ChangePasswordRequest, Config, CredentialStore, ForgotPasswordRequest,
    LoginRequest, RegisterRequest, ResetPasswordRequest, SessionCoordinator, SessionOptions,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable overriding the configured base URL
const BASE_URL_ENV: &str = "SESSIONGUARD_BASE_URL";

const USAGE: &str = "\
Usage: sessionguard <command> [args]

Commands:
  login [email]            Log in and persist the session
  register [email]         Create an account and log in
  status                   Show whether a session is active and who it belongs to
  token                    Print a valid access token, refreshing it if needed
  refresh                  Force a token refresh
  logout                   End the session
  forgot-password <email>  Request a password reset email
  reset-password <code>    Set a new password using a reset code
  change-password          Change the password of the logged-in user

The service URL comes from the config file or SESSIONGUARD_BASE_URL.";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1).map(String::as_str) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    if matches!(command, "-h" | "--help" | "help") {
        println!("{USAGE}");
        return Ok(());
    }

    let mut config = Config::load().context("Failed to load config")?;
    if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
        config.base_url = Some(base_url);
    }

    let options = SessionOptions::from_config(&config)
        .with_context(|| format!("Set base_url in the config file or {BASE_URL_ENV}"))?;
    let transport = Arc::new(ApiClient::with_timeout(Duration::from_secs(
        config.request_timeout_secs,
    ))?);
    let store = CredentialStore::new(config.open_store()?);
    let session = SessionCoordinator::init(options, transport, store).await;

    match command {
        "login" => {
            let email = email_arg(&args, config.last_email.as_deref())?;
            let password = rpassword::prompt_password("Password: ")?;
            let identity = session
                .login(&LoginRequest {
                    email: email.clone(),
                    password,
                })
                .await
                .context("Login failed")?;

            config.last_email = Some(email);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
            info!(subject = ?identity.subject(), "Logged in");
            println!("Logged in as {}", display_name(&identity.as_json()));
        }
        "register" => {
            let email = email_arg(&args, None)?;
            let password = prompt_new_password()?;
            let identity = session
                .register(&RegisterRequest {
                    email,
                    password,
                    data: None,
                })
                .await
                .context("Registration failed")?;
            println!("Registered and logged in as {}", display_name(&identity.as_json()));
        }
        "status" => {
            let authenticated = session.is_authenticated().await;
            match (authenticated, session.get_user()) {
                (true, Some(identity)) => {
                    println!("Logged in as {}", display_name(&identity.as_json()));
                    match identity.expires_at() {
                        Ok(Some(expiry)) => println!("Access token expires {}", expiry.to_rfc3339()),
                        Ok(None) => println!("Access token does not expire"),
                        Err(e) => println!("Access token expiry unreadable: {e}"),
                    }
                    println!("{}", serde_json::to_string_pretty(&identity.as_json())?);
                }
                _ => println!("Not logged in"),
            }
        }
        "token" => {
            let token = session.get_valid_token().await?;
            println!("{token}");
        }
        "refresh" => {
            session.refresh().await.context("Refresh failed")?;
            println!("Session refreshed");
        }
        "logout" => {
            session.logout().await;
            println!("Logged out");
        }
        "forgot-password" => {
            let email = args
                .get(2)
                .cloned()
                .context("Usage: sessionguard forgot-password <email>")?;
            let response = session
                .forgot_password(&ForgotPasswordRequest { email })
                .await?;
            print_message(&response.message, "Password reset requested");
        }
        "reset-password" => {
            let code = args
                .get(2)
                .cloned()
                .context("Usage: sessionguard reset-password <code>")?;
            let password = prompt_new_password()?;
            let response = session
                .reset_password(&ResetPasswordRequest { code, password })
                .await?;
            print_message(&response.message, "Password reset");
        }
        "change-password" => {
            let password = rpassword::prompt_password("Current password: ")?;
            let new_password = prompt_new_password()?;
            let response = session
                .change_password(&ChangePasswordRequest {
                    password,
                    new_password,
                })
                .await?;
            print_message(&response.message, "Password changed");
        }
        other => {
            eprintln!("Unknown command: {other}\n\n{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}

/// Email from the command line, falling back to a prompt
fn email_arg(args: &[String], last_email: Option<&str>) -> Result<String> {
    if let Some(email) = args.get(2) {
        return Ok(email.clone());
    }

    match last_email {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    match (input.is_empty(), last_email) {
        (false, _) => Ok(input.to_string()),
        (true, Some(last)) => Ok(last.to_string()),
        (true, None) => bail!("An email address is required"),
    }
}

fn prompt_new_password() -> Result<String> {
    let password = rpassword::prompt_password("New password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    if password.is_empty() {
        bail!("Password must not be empty");
    }
    Ok(password)
}

/// Best human-readable name among common claims
fn display_name(claims: &serde_json::Value) -> String {
    ["email", "name", "sub"]
        .iter()
        .find_map(|key| claims.get(*key).and_then(|v| v.as_str()))
        .unwrap_or("unknown user")
        .to_string()
}

fn print_message(message: &str, fallback: &str) {
    if message.is_empty() {
        println!("{fallback}");
    } else {
        println!("{message}");
    }
}
