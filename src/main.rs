//! # ReelAgents CLI
//!
//! Exercises the client core from a terminal: inspect tokens, resolve routes and
//! navigation for a role, and follow a server job to completion.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use reelagents::api::ApiClient;
use reelagents::auth::{
    LocalIdentityProvider, Navigation, RouteGuard, navigate, navigation_for, parse_role_from_token,
    session_from_token,
};
use reelagents::config::{AppConfig, ConfigLoader};
use reelagents::context::AppContext;
use reelagents::jobs::{AsyncOperation, JobStatusSource, OperationOutcome, PollPolicy};
use reelagents::models::{Identity, Profile, Role, Session};
use reelagents::session_store::{AuthState, SessionStore};
use reelagents::store::{LocalChangeFeed, PostgrestStore};
use reelagents::telemetry::init_tracing;

#[derive(Parser)]
#[command(name = "reelagents", about = "ReelAgents dashboard client core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the loaded configuration with secrets redacted.
    Config,

    /// Print the role claim carried by an access token.
    TokenRole { token: String },

    /// Resolve a dashboard path for a signed-in role.
    Route {
        path: String,
        /// Profile role; omit for a signed-in user without a profile.
        #[arg(long)]
        role: Option<Role>,
        /// Evaluate as a signed-out visitor.
        #[arg(long, conflicts_with = "role")]
        signed_out: bool,
    },

    /// List sidebar entries for a role.
    #[command(name = "navigation")]
    Nav {
        #[arg(long)]
        role: Option<Role>,
    },

    /// Poll a job until it completes or fails.
    PollJob {
        job_id: String,
        /// Access token sent as the bearer credential.
        #[arg(long)]
        token: Option<String>,
        /// Give up after this many status checks.
        #[arg(long)]
        max_attempts: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    init_tracing(&config).context("initializing tracing")?;

    match cli.command {
        Command::Config => {
            println!("{}", config.redacted_json()?);
        }
        Command::TokenRole { token } => match parse_role_from_token(&token) {
            Some(role) => println!("{role}"),
            None => println!("none"),
        },
        Command::Route {
            path,
            role,
            signed_out,
        } => {
            let state = synthetic_state(role, signed_out);
            match navigate(&RouteGuard::from_config(&config), &state, &path) {
                Navigation::Render(route) => println!("render {route}"),
                Navigation::Loading => println!("loading"),
                Navigation::Redirect(target) => println!("redirect {target}"),
            }
        }
        Command::Nav { role } => {
            println!("{}", serde_json::to_string_pretty(&navigation_for(role))?);
        }
        Command::PollJob {
            job_id,
            token,
            max_attempts,
        } => {
            let state = poll_job(&config, job_id, token, max_attempts).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            if state.get("error").is_some_and(|error| !error.is_null()) {
                bail!("job did not complete");
            }
        }
    }

    Ok(())
}

/// Auth state for a hypothetical user, for route evaluation without a backend.
fn synthetic_state(role: Option<Role>, signed_out: bool) -> AuthState {
    if signed_out {
        return AuthState::new(None, None, false);
    }

    let user_id = Uuid::nil();
    let session = Session {
        user: Identity {
            id: user_id,
            email: None,
        },
        access_token: String::new(),
        refresh_token: None,
        expires_at: None,
    };
    let profile = role.map(|role| Profile {
        id: user_id,
        email: String::new(),
        role,
        company_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    });
    AuthState::new(Some(session), profile, false)
}

async fn poll_job(
    config: &AppConfig,
    job_id: String,
    token: Option<String>,
    max_attempts: Option<u32>,
) -> Result<JsonValue> {
    let api = match token {
        Some(token) => {
            let session = session_from_token(&token).context("reading access token")?;
            let session_store = SessionStore::new();
            let store = PostgrestStore::from_config(config, session_store.clone())
                .context("signed-in polling needs the hosted backend configured")?;
            let context = AppContext::new(
                config.clone(),
                session_store,
                Arc::new(LocalIdentityProvider::new(Some(session))),
                Arc::new(store),
                Arc::new(LocalChangeFeed::default()),
            )?;
            let _listener = context.start().await;
            context.api.clone()
        }
        None => ApiClient::from_config(config, SessionStore::new())?,
    };

    let mut policy = PollPolicy::from(&config.job_poll);
    if max_attempts.is_some() {
        policy.max_attempts = max_attempts;
    }

    let jobs: Arc<dyn JobStatusSource> = Arc::new(api);
    let operation: AsyncOperation<String, JsonValue> = AsyncOperation::builder(
        |job_id: String| async move { Ok(OperationOutcome::Job(job_id)) },
        jobs,
    )
    .poll_policy(policy)
    .build();

    operation.execute(job_id).await;
    let state = operation.settled().await;

    Ok(serde_json::json!({
        "status": format!("{:?}", state.status()).to_lowercase(),
        "progress": state.progress,
        "data": state.data,
        "error": state.error,
    }))
}
