//! Account connection and installation

use std::collections::HashMap;

use anyhow::Context;
use openapi_client::models::{Account, Website};
use tracing::{error, info, warn};

use crate::errors::AgentError;
use crate::http::api::{ApiClient, WebChangeApi};
use crate::http::client::HttpClient;
use crate::logs::{init_logging, LogOptions};
use crate::storage::layout::StorageLayout;
use crate::storage::options::{keys, FileOptionStore, OptionStore};
use crate::storage::settings::Settings;

/// Remote identifiers resolved for this site
#[derive(Debug, Clone)]
pub struct Activation {
    pub account: Account,
    pub website_id: String,
    pub manual_group_id: Option<String>,
    pub monitoring_group_id: Option<String>,
}

/// `https://www.Example.com/` and `example.com` name the same site
fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim().to_lowercase();
    let domain = domain
        .strip_prefix("https://")
        .or_else(|| domain.strip_prefix("http://"))
        .unwrap_or(&domain);
    let domain = domain.strip_prefix("www.").unwrap_or(domain);
    domain.trim_end_matches('/').to_string()
}

fn find_website<'a>(websites: &'a [Website], domain: &str) -> Option<&'a Website> {
    let wanted = normalize_domain(domain);
    websites
        .iter()
        .find(|website| normalize_domain(&website.domain) == wanted)
}

/// Store `api_token`, check it against the service and remember the
/// website and group ids for `domain`. On any failure the token and the
/// ids are removed again, so a half-connected site never looks connected.
pub async fn activate(
    options: &dyn OptionStore,
    api: &dyn WebChangeApi,
    api_token: &str,
    domain: &str,
) -> Result<Activation, AgentError> {
    let api_token = api_token.trim();
    if api_token.is_empty() {
        return Err(AgentError::invalid("api_token", "API token is required"));
    }

    options.set_string(keys::API_TOKEN, api_token).await?;

    match connect_site(options, api, domain).await {
        Ok(activation) => Ok(activation),
        Err(e) => {
            warn!("Account connection failed, removing the token: {}", e);
            if let Err(cleanup) = disconnect(options).await {
                error!("Failed to remove the rejected token: {}", cleanup);
            }
            Err(e)
        }
    }
}

async fn connect_site(
    options: &dyn OptionStore,
    api: &dyn WebChangeApi,
    domain: &str,
) -> Result<Activation, AgentError> {
    let account = api.get_account().await?;

    let websites = api.get_websites().await?;
    let website = find_website(&websites, domain)
        .ok_or_else(|| AgentError::NotFound(format!("no website registered for {}", domain)))?;

    options.set_string(keys::WEBSITE_ID, &website.id).await?;
    for (key, group) in [
        (keys::MANUAL_GROUP_ID, &website.manual_detection_group),
        (keys::MONITORING_GROUP_ID, &website.auto_detection_group),
    ] {
        match group {
            Some(id) => options.set_string(key, id).await?,
            None => options.delete(key).await?,
        }
    }

    info!(account = %account.email, website = %website.id, "Account connected");
    Ok(Activation {
        account,
        website_id: website.id.clone(),
        manual_group_id: website.manual_detection_group.clone(),
        monitoring_group_id: website.auto_detection_group.clone(),
    })
}

/// Forget the credential and the remote identifiers
pub async fn disconnect(options: &dyn OptionStore) -> Result<(), AgentError> {
    for key in [
        keys::API_TOKEN,
        keys::WEBSITE_ID,
        keys::MANUAL_GROUP_ID,
        keys::MONITORING_GROUP_ID,
    ] {
        options.delete(key).await?;
    }
    Ok(())
}

/// Run the installation process
pub async fn install(cli_args: &HashMap<String, String>) {
    match install_impl(cli_args).await {
        Ok(activation) => {
            info!("Installation successful");
            println!("\n[SUCCESS] Web Change Detector agent connected!");
            println!("  Account: {}", activation.account.email);
            println!("  Website ID: {}", activation.website_id);
            println!("Start the agent with: systemctl start wcd-agent");
        }
        Err(e) => {
            error!("Installation failed: {:?}", e);
            eprintln!("\n[ERROR] Installation failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn install_impl(cli_args: &HashMap<String, String>) -> anyhow::Result<Activation> {
    let _ = init_logging(LogOptions {
        stdout: true,
        ..Default::default()
    });

    println!("Web Change Detector Agent Installer");
    println!("===================================");
    println!();

    let token_env_var = "WCD_API_TOKEN";
    let api_token = cli_args
        .get("token")
        .cloned()
        .or_else(|| std::env::var(token_env_var).ok())
        .with_context(|| {
            format!(
                "Missing API token. Provide via --token=<token> or {} environment variable",
                token_env_var
            )
        })?;
    let domain = cli_args
        .get("domain")
        .cloned()
        .context("Missing site domain. Provide via --domain=<domain>")?;

    let layout = match cli_args.get("home") {
        Some(home) => StorageLayout::new(home),
        None => StorageLayout::default(),
    };
    println!("Setting up storage at: {:?}", layout.base_dir);
    layout.setup().await.context("creating storage directories")?;

    let settings_file = layout.settings_file();
    let mut settings: Settings = settings_file
        .read_json_or_default()
        .await
        .context("reading settings")?;
    if let Some(backend) = cli_args.get("backend") {
        settings.backend.base_url = backend.clone();
    }
    settings.site.domain = domain.clone();
    if settings.nonce_secret.is_empty() {
        settings.nonce_secret = format!("{}{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
    }
    println!("Backend URL: {}", settings.backend.base_url);

    let options = std::sync::Arc::new(
        FileOptionStore::load(layout.options_file())
            .await
            .context("loading options")?,
    );
    let http = HttpClient::new(
        &settings.backend.base_url,
        std::time::Duration::from_secs(settings.backend.timeout_secs),
    )?;
    let api = ApiClient::new(
        http,
        options.clone(),
        std::sync::Arc::new(crate::cache::api::ApiResponseCache::new(
            0,
            std::time::Duration::ZERO,
        )),
    );

    println!("Connecting account...");
    let activation = activate(options.as_ref(), &api, &api_token, &domain)
        .await
        .context("connecting the account")?;

    settings_file
        .write_json(&settings)
        .await
        .context("writing settings")?;
    settings_file.set_permissions_600().await?;
    println!("Settings saved to: {:?}", settings_file.path());

    Ok(activation)
}
