use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use portal_gateway::api::{AdminCredentials, AuthApi, LoginRequest, ModelApi};
use portal_gateway::config::GatewayConfig;
use portal_gateway::utils::logging;
use portal_gateway::{ApiRequest, Gateway, Role, SessionEvent};
use reqwest::Method;
use serde_json::Value;
use tracing::info;

#[derive(Parser)]
#[command(name = "portal", version, about = "Medical assistant portal API client")]
struct AppCli {
    /// Config file path (JSON); defaults plus environment when omitted
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to the public or professional portal
    Login {
        #[arg(long, default_value = "public")]
        role: Role,
        #[arg(long)]
        email: String,
        #[arg(long, env = "PORTAL_PASSWORD")]
        password: String,
    },
    /// Log in to the admin portal
    AdminLogin {
        #[arg(long)]
        username: String,
        #[arg(long, env = "PORTAL_PASSWORD")]
        password: String,
    },
    /// End a portal session
    Logout {
        #[arg(long, default_value = "public")]
        role: Role,
    },
    /// Show the profile behind a session
    Me {
        #[arg(long, default_value = "public")]
        role: Role,
    },
    /// Send an arbitrary authenticated request
    Request {
        #[arg(long, default_value = "public")]
        role: Role,
        #[arg(long, default_value = "GET")]
        method: String,
        #[arg(long)]
        path: String,
        /// JSON body with camelCase keys
        #[arg(long)]
        body: Option<String>,
    },
    /// List configured providers and their models
    Providers {
        #[arg(long, default_value = "admin")]
        role: Role,
        /// Built-in catalogue instead of configured providers
        #[arg(long)]
        builtin: bool,
    },
    /// Show which session a navigation path maps to
    Whoami {
        #[arg(long, default_value = "/")]
        path: String,
    },
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AppCli::parse();
    logging::init(args.verbose);

    let config = GatewayConfig::load(args.config.as_deref())?;
    let gateway = Gateway::from_config(&config)
        .await
        .context("initialising gateway")?;

    let mut events = gateway.subscribe();
    let outcome = run(args.command, &gateway).await;

    while let Ok(event) = events.try_recv() {
        if let SessionEvent::SessionExpired { role, redirect_to } = event {
            eprintln!("{role} session expired; sign in again at {redirect_to}");
        }
    }

    outcome
}

async fn run(command: Commands, gateway: &Gateway) -> Result<()> {
    let auth = AuthApi::new(gateway);

    match command {
        Commands::Login {
            role,
            email,
            password,
        } => {
            let credential = auth.login(role, &LoginRequest { email, password }).await?;
            info!(role = %role, "logged in");
            print_json(&serde_json::json!({ "role": role, "user_id": credential.user_id }))
        }
        Commands::AdminLogin { username, password } => {
            let credential = auth
                .admin_login(&AdminCredentials { username, password })
                .await?;
            print_json(&serde_json::json!({ "role": Role::Admin, "user_id": credential.user_id }))
        }
        Commands::Logout { role } => {
            auth.logout(role).await?;
            info!(role = %role, "logged out");
            Ok(())
        }
        Commands::Me { role } => print_json(&auth.me(role).await?),
        Commands::Request {
            role,
            method,
            path,
            body,
        } => {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .context("parsing HTTP method")?;
            let mut request = ApiRequest::new(method, path);
            if let Some(raw) = body {
                let body: Value = serde_json::from_str(&raw).context("parsing --body JSON")?;
                request = request.body(body);
            }
            print_json(&gateway.send(role, request).await?)
        }
        Commands::Providers { role, builtin } => {
            let models = ModelApi::new(gateway, role);
            let envelope = if builtin {
                models.builtin_providers_with_models().await?
            } else {
                models.providers_with_models().await?
            };
            print_json(&envelope.data)
        }
        Commands::Whoami { path } => {
            let role = Role::from_path(&path);
            let user = gateway.store().user(role).await?;
            let active = gateway.store().load(role).await?.is_some();
            print_json(&serde_json::json!({
                "role": role,
                "storage_prefix": role.storage_prefix(),
                "active": active,
                "user": user,
            }))
        }
    }
}
