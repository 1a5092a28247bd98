use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use aws_azure_auth::azure::Azure;
use aws_azure_auth::browser::Chrome;
use aws_azure_auth::config::{self, Config};
use aws_azure_auth::saml::{Assertion, SAMLRequest};
use aws_azure_auth::ui::Prompt;
use aws_azure_auth::{aws, console, credentials, http_client, BUILD_INFO};

/// Get temporary AWS credentials through AssumeRoleWithSAML with Azure AD.
#[derive(Parser, Debug)]
#[command(name = "aws-azure-auth", disable_version_flag = true)]
struct Args {
    /// Configure initial settings
    #[arg(short, long)]
    configure: bool,

    /// AWS profile
    #[arg(short, long, default_value = "default")]
    profile: String,

    /// AWS IAM role name
    #[arg(short, long)]
    role: Option<String>,

    /// Open the AWS Management Console in a browser
    #[arg(short, long)]
    web: bool,

    /// Show version
    #[arg(short, long)]
    version: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    if args.version {
        println!("{}", BUILD_INFO);
        return Ok(());
    }

    if args.configure {
        return configure(&args.profile).await;
    }

    let cancel = CancellationToken::new();
    handle_signals(cancel.clone());

    if args.web {
        return open_console(&args.profile, &cancel).await;
    }

    let config = Config::load(&args.profile)
        .context("please run `aws-azure-auth --configure` at the first time")?;

    let saml_request = SAMLRequest::new(config.app_id_uri.as_str()).encode()?;

    let azure = Azure::new(Chrome, saml_request, config.azure_tenant_id.clone());
    let saml_response = azure
        .authenticate(&cancel, &config.chrome_user_data_dir)
        .await
        .context("failed to capture the SAML response")?;

    let assertion = Assertion::from_base64(&saml_response)?;
    let role = assertion.select_role(args.role.as_deref())?;
    log::info!("assuming {}", role);

    let sts = aws::sts_client(&args.profile).await;
    let issued = aws::assume_role_with_saml(
        &sts,
        &cancel,
        config.default_session_duration_hours,
        &role.role_arn,
        &role.principal_arn,
        &saml_response,
    )
    .await?;

    credentials::save(&args.profile, &issued).await?;
    println!(
        "Credentials for {} saved to profile [{}], valid until {}",
        role.role_arn, args.profile, issued.expiration
    );
    Ok(())
}

async fn configure(profile: &str) -> anyhow::Result<()> {
    let current = Config::load(profile).unwrap_or_default();
    let mut prompt = Prompt::stdio();

    let azure_tenant_id = prompt.ask_string("Azure Tenant ID", Some(current.azure_tenant_id.as_str()))?;
    let app_id_uri = prompt.ask_string("App ID URI", Some(current.app_id_uri.as_str()))?;

    let current_hours = match current.default_session_duration_hours {
        0 => String::new(),
        hours => hours.to_string(),
    };
    let default_session_duration_hours = prompt.ask_int(
        "Default Session Duration Hours (1-12)",
        Some(current_hours.as_str()),
        |value| config::parse_session_duration_hours(value).map(|_| ()),
    )?;

    let current_dir = if current.chrome_user_data_dir.as_os_str().is_empty() {
        config::default_chrome_user_data_dir()?
    } else {
        current.chrome_user_data_dir
    };
    let chrome_user_data_dir =
        prompt.ask_string("Chrome User Data Directory", Some(current_dir.display().to_string().as_str()))?;

    Config {
        app_id_uri,
        azure_tenant_id,
        default_session_duration_hours,
        chrome_user_data_dir: chrome_user_data_dir.into(),
    }
    .save(profile)
    .await
}

async fn open_console(profile: &str, cancel: &CancellationToken) -> anyhow::Result<()> {
    let (session, region) = console::current_session(profile).await?;
    let http_client = http_client::create_signin_http_client()?;
    let url = console::build_console_url(&http_client, cancel, &session, &region).await?;
    open_browser(&url)
}

fn open_browser(url: &str) -> anyhow::Result<()> {
    let mut command = if cfg!(target_os = "macos") {
        let mut command = std::process::Command::new("open");
        command.arg(url);
        command
    } else if cfg!(target_os = "windows") {
        // cmd treats `&` as a command separator.
        let escaped = url.replace('&', "^&");
        let mut command = std::process::Command::new("cmd");
        command.args(["/c", "start", escaped.as_str()]);
        command
    } else if cfg!(target_os = "linux") {
        let mut command = std::process::Command::new("xdg-open");
        command.arg(url);
        command
    } else {
        anyhow::bail!("OS does not support --web");
    };

    let status = command.status().context("failed to open a browser")?;
    if !status.success() {
        anyhow::bail!("failed to open a browser: {}", status);
    }
    Ok(())
}

/// Turns hang-up, interrupt, quit and terminate into cancellation so the browser gets closed.
#[cfg(unix)]
fn handle_signals(cancel: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let kinds = [
        SignalKind::hangup(),
        SignalKind::interrupt(),
        SignalKind::quit(),
        SignalKind::terminate(),
    ];
    for kind in kinds {
        let cancel = cancel.clone();
        match signal(kind) {
            Ok(mut stream) => {
                tokio::spawn(async move {
                    while stream.recv().await.is_some() {
                        log::debug!("received signal {:?}", kind);
                        cancel.cancel();
                    }
                });
            }
            Err(err) => log::warn!("failed to install signal handler: {}", err),
        }
    }
}

#[cfg(not(unix))]
fn handle_signals(cancel: CancellationToken) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
}
