use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use consent::infra::converter;
use consent::{
    ActionType, ConsentAction, ConsentClient, ConsentConfig, ConsentError, ConsentEvents,
    ConsentModule, ConsentState, Consents, LoadOutcome, MessagesResponse, RegulationKind,
};
use consent_http_plugin::{ReqwestTransport, TransportConfig};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Consent CLI - drive the consent module against the privacy backend
#[derive(Parser)]
#[command(name = "consent-cli")]
#[command(about = "Consent CLI - load consent messages and record user choices")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one message-load cycle and print the messages to render
    Load {
        /// Authenticated user id
        #[arg(long)]
        auth_id: Option<String>,
        /// Publisher data forwarded on page views, as key=value
        #[arg(long = "pub-data", value_parser = parse_pub_data)]
        pub_data: Vec<(String, Value)>,
    },
    /// Accept everything for a regulation
    AcceptAll {
        #[arg(value_enum)]
        regulation: Regulation,
    },
    /// Reject everything for a regulation
    RejectAll {
        #[arg(value_enum)]
        regulation: Regulation,
    },
    /// Submit an action payload as posted by a message renderer
    Action {
        /// JSON object with `actionType` and `campaignType`
        json: String,
    },
    /// Print the stored consent
    Show,
    /// Forget all consent stored on this device
    Clear,
    /// Validate configuration and exit
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum Regulation {
    Gdpr,
    Ccpa,
}

impl From<Regulation> for RegulationKind {
    fn from(r: Regulation) -> Self {
        match r {
            Regulation::Gdpr => Self::Gdpr,
            Regulation::Ccpa => Self::Ccpa,
        }
    }
}

fn parse_pub_data(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    if key.is_empty() {
        return Err("pub-data key must not be empty".to_owned());
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
    Ok((key.to_owned(), value))
}

/// Reports background outcomes in the log.
struct LogEvents;

impl ConsentEvents for LogEvents {
    fn on_success(&self, messages: &MessagesResponse) {
        tracing::info!(campaigns = messages.campaign_list().len(), "Messages ready");
    }

    fn on_show_consent_only(&self) {
        tracing::info!("Consent is current");
    }

    fn on_failure(&self, error: &ConsentError, is_fatal: bool) {
        tracing::error!(error = %error, is_fatal, "Load cycle failed");
    }

    fn on_consent_ready(&self, consents: &Consents) {
        tracing::info!(
            gdpr = consents.gdpr.is_some(),
            ccpa = consents.ccpa.is_some(),
            "Consent ready"
        );
    }

    fn on_action_submitted(&self, consent: &ConsentState) {
        tracing::info!(regulation = %consent.kind(), uuid = ?consent.uuid(), "Action submitted");
    }

    fn on_error(&self, error: &ConsentError) {
        tracing::error!(error = %error, "Consent call failed");
    }
}

fn init_logging(verbose: u8, json: bool) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = if verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    } else {
        EnvFilter::new(default_level)
    };
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_client(config: ConsentConfig) -> Result<consent::ConsentLocalClient> {
    let transport = ReqwestTransport::new(TransportConfig {
        default_timeout_ms: config.request_timeout_ms,
        ..TransportConfig::default()
    })?;
    Ok(ConsentModule::builder(config)
        .transport(Arc::new(transport))
        .events(Arc::new(LogEvents))
        .build()?)
}

async fn load(
    client: &consent::ConsentLocalClient,
    configured: &[RegulationKind],
    auth_id: Option<String>,
    pub_data: Vec<(String, Value)>,
) -> Result<()> {
    let pub_data: Map<String, Value> = pub_data.into_iter().collect();
    match client.load_messages(auth_id, pub_data).await? {
        LoadOutcome::Messages(messages) => {
            for campaign in converter::prioritized_campaigns(&messages, configured) {
                let message_id = campaign.meta_data().and_then(|m| m.message_id);
                println!(
                    "{}: message {}",
                    campaign.kind(),
                    message_id.map_or_else(|| "-".to_owned(), |id| id.to_string())
                );
            }
        }
        LoadOutcome::ShowConsentOnly => println!("consent is current, nothing to show"),
    }
    Ok(())
}

async fn submit(client: &consent::ConsentLocalClient, action: ConsentAction) -> Result<()> {
    let consent = client.submit_action(action).await?;
    match consent {
        ConsentState::Gdpr(gdpr) => print_json(&gdpr),
        ConsentState::Ccpa(ccpa) => {
            println!("usprivacy: {}", ccpa.usp_string());
            print_json(&ccpa)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ConsentConfig> {
    if let Some(path) = path
        && !path.is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.display());
    }
    ConsentConfig::load(path).context("failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let config = load_config(cli.config.as_deref())?;
    let configured: Vec<RegulationKind> = config.campaigns.iter().map(|c| c.kind).collect();

    if matches!(cli.command, Commands::Check) {
        println!("Configuration is valid");
        return print_json(&config);
    }

    let client = build_client(config)?;
    match cli.command {
        Commands::Load { auth_id, pub_data } => {
            load(&client, &configured, auth_id, pub_data).await
        }
        Commands::AcceptAll { regulation } => {
            submit(
                &client,
                ConsentAction::new(regulation.into(), ActionType::AcceptAll),
            )
            .await
        }
        Commands::RejectAll { regulation } => {
            submit(
                &client,
                ConsentAction::new(regulation.into(), ActionType::RejectAll),
            )
            .await
        }
        Commands::Action { json } => {
            let action = converter::consent_action(&json).context("invalid action payload")?;
            submit(&client, action).await
        }
        Commands::Show => print_json(&client.consents()),
        Commands::Clear => {
            client.clear_all()?;
            println!("consent cleared");
            Ok(())
        }
        Commands::Check => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pub_data_values_are_json_when_possible() {
        assert_eq!(
            parse_pub_data("page=42").unwrap(),
            ("page".to_owned(), Value::from(42))
        );
        assert_eq!(
            parse_pub_data("section=sports").unwrap(),
            ("section".to_owned(), Value::from("sports"))
        );
        assert!(parse_pub_data("no-separator").is_err());
        assert!(parse_pub_data("=1").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
