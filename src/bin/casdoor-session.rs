//! Terminal stand-in for the browser demo page.
//!
//! Each subcommand is one button of the page; the session file plays the
//! part of browser storage, so one invocation is one page load.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, anyhow};
use casdoor_session::{
    AfterLogin, AuthApi, AuthError, FileStore, Navigation, ProtectedResource, RedirectProvider,
    SessionConfig, SessionController, StatePolicy, UserInfo,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_STORE: &str = ".casdoor-session.json";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Parser)]
#[command(name = "casdoor-session", about = "Log in to a Casdoor-backed API and call protected resources")]
struct Cli {
    #[arg(long, global = true, env = "AUTH_API_BASE", default_value = DEFAULT_API_URL)]
    api_url: Url,
    /// Session file standing in for browser storage.
    #[arg(long, global = true, env = "AUTH_SESSION_FILE", default_value = DEFAULT_STORE)]
    store: PathBuf,
    /// Reject callbacks whose state does not match the pending login.
    #[arg(
        long,
        global = true,
        env = "AUTH_STRICT_STATE",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    strict_state: bool,
    /// In-app path to go to after login instead of staying on the page.
    #[arg(long, global = true, env = "AUTH_REDIRECT_AFTER_LOGIN")]
    redirect_after_login: Option<String>,
    #[arg(long, global = true, env = "AUTH_HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Username/password login.
    Login {
        #[arg(short, long)]
        username: String,
        /// Prompted for when omitted.
        #[arg(short, long, env = "AUTH_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Start an OAuth/OIDC login and print the URL to open.
    Oauth,
    /// Start a Microsoft SSO login and print the URL to open.
    Microsoft,
    /// Finish a redirect login from the URL the browser landed on.
    Callback { url: Url },
    /// Show the logged-in user.
    Whoami,
    /// Call protected resources (all of them by default).
    Probe { resources: Vec<ProtectedResource> },
    /// Show the persisted session.
    Status {
        #[arg(long)]
        show_token: bool,
    },
    Logout,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctl = build_controller(&cli)?;

    match cli.command {
        Command::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => rpassword::prompt_password("Password: ")
                    .context("failed to read password")?,
            };
            let session = ctl.login_direct(&username, &password).await?;
            println!("Direct login successful ({}).", session.method);
            print_navigation(&ctl.after_login(None));
            show_user(&ctl).await
        }
        Command::Oauth => begin(&ctl, RedirectProvider::OAuth).await,
        Command::Microsoft => begin(&ctl, RedirectProvider::Microsoft).await,
        Command::Callback { url } => match ctl.handle_page_load(&url).await? {
            None => {
                println!("No code parameter in URL; nothing to do.");
                Ok(())
            }
            Some(landing) => {
                println!(
                    "{} login successful.",
                    landing.session.method.to_string().to_uppercase()
                );
                print_navigation(&landing.navigation);
                show_user(&ctl).await
            }
        },
        Command::Whoami => show_user(&ctl).await,
        Command::Probe { resources } => probe(&ctl, resources).await,
        Command::Status { show_token } => {
            let session = ctl.current_session();
            println!("state:   {}", ctl.state());
            println!("method:  {}", session.method);
            if let Some(pending) = ctl.pending_redirect() {
                println!("pending: {} (state {})", pending.provider, pending.state);
            }
            if let Some(token) = session.token.filter(|_| show_token) {
                println!("token:   {token}");
            }
            println!("store:   {}", ctl.store().path().display());
            Ok(())
        }
        Command::Logout => {
            ctl.logout();
            println!("Logged out successfully.");
            Ok(())
        }
    }
}

fn build_controller(cli: &Cli) -> anyhow::Result<SessionController<FileStore>> {
    let mut config = SessionConfig::new(cli.api_url.clone());
    if cli.strict_state {
        config = config.with_state_policy(StatePolicy::Strict);
    }
    if let Some(path) = &cli.redirect_after_login {
        config = config.with_after_login(AfterLogin::RedirectTo(path.clone()));
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cli.timeout))
        .build()
        .map_err(|err| anyhow!("failed to build HTTP client: {err}"))?;
    let api = AuthApi::new(cli.api_url.clone()).with_http_client(http);

    let store = FileStore::open(&cli.store)
        .with_context(|| format!("failed to open session file {}", cli.store.display()))?;

    Ok(SessionController::new(config, store).with_api(api))
}

async fn begin(ctl: &SessionController<FileStore>, provider: RedirectProvider) -> anyhow::Result<()> {
    let nav = ctl.begin_redirect_login(provider).await?;
    println!("Open this URL to log in, then pass the URL you land on to `callback`:");
    print_navigation(&nav);
    Ok(())
}

async fn show_user(ctl: &SessionController<FileStore>) -> anyhow::Result<()> {
    let user = ctl.fetch_user_info().await?;
    print_user(&user);
    Ok(())
}

fn print_user(user: &UserInfo) {
    println!("ID:           {}", user.id);
    println!("Name:         {}", user.name);
    println!("Display Name: {}", user.display_name.as_deref().unwrap_or("N/A"));
    println!("Email:        {}", user.email);
    println!("Is Admin:     {}", if user.is_admin { "yes" } else { "no" });
    println!("Owner:        {}", user.owner.as_deref().unwrap_or("N/A"));
    if !user.roles.is_empty() {
        println!("Roles:        {}", user.roles.join(", "));
    }
}

fn print_navigation(nav: &Navigation) {
    match nav {
        Navigation::External(url) => println!("{url}"),
        Navigation::Replace(url) => println!("Location is now {url}"),
        Navigation::Redirect(path) => println!("Continue at {path}"),
        Navigation::Stay => {}
    }
}

async fn probe(
    ctl: &SessionController<FileStore>,
    resources: Vec<ProtectedResource>,
) -> anyhow::Result<()> {
    let resources = if resources.is_empty() {
        ProtectedResource::ALL.to_vec()
    } else {
        resources
    };

    for resource in resources {
        match ctl.fetch_resource(resource).await {
            Ok(report) => {
                let body = serde_json::to_string_pretty(&report.body)?;
                println!("{}: ok ({})\n{body}", resource.label(), report.status);
            }
            Err(AuthError::Server { status, message }) => {
                println!("{}: {status} - {message}", resource.label());
            }
            Err(err @ AuthError::NotAuthenticated) => return Err(err.into()),
            Err(err) => println!("{}: {err}", resource.label()),
        }
    }
    Ok(())
}
