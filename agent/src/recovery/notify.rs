//! Critical error emails to the site administrator

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::AgentError;
use crate::recovery::category::ErrorCategory;
use crate::storage::options::{get_typed, keys, set_typed, OptionStore};
use crate::storage::settings::SmtpSettings;
use crate::utils::sha256_hash;

/// Delivers a message to the administrator
#[async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), AgentError>;
}

/// SMTP delivery through lettre
pub struct SmtpNotifier {
    settings: SmtpSettings,
    to_address: String,
}

impl SmtpNotifier {
    pub fn new(settings: SmtpSettings, to_address: impl Into<String>) -> Self {
        Self {
            settings,
            to_address: to_address.into(),
        }
    }
}

#[async_trait]
impl AdminNotifier for SmtpNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), AgentError> {
        let address_error = |e: lettre::address::AddressError| {
            AgentError::NotificationError(format!("invalid address: {}", e))
        };

        let email = Message::builder()
            .from(self.settings.from_address.parse().map_err(address_error)?)
            .to(self.to_address.parse().map_err(address_error)?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AgentError::NotificationError(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.host)
                .map_err(|e| AgentError::NotificationError(e.to_string()))?
                .port(self.settings.port);

        if let (Some(user), Some(pass)) = (&self.settings.username, &self.settings.password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        transport_builder
            .build()
            .send(email)
            .await
            .map_err(|e| AgentError::NotificationError(e.to_string()))?;

        info!(to = %self.to_address, "Critical error email sent");
        Ok(())
    }
}

/// Sends at most one email per distinct error per interval. The last send
/// time per fingerprint is kept in the option store.
pub struct CriticalErrorNotifier {
    options: Arc<dyn OptionStore>,
    sender: Arc<dyn AdminNotifier>,
    site: String,
    interval: Duration,
    guard: Mutex<()>,
}

impl CriticalErrorNotifier {
    pub fn new(options: Arc<dyn OptionStore>, sender: Arc<dyn AdminNotifier>, site: &str) -> Self {
        Self {
            options,
            sender,
            site: site.to_string(),
            interval: Duration::hours(1),
            guard: Mutex::new(()),
        }
    }

    /// Identifies "the same error" for rate limiting
    pub fn fingerprint(category: ErrorCategory, message: &str) -> String {
        sha256_hash(format!("{}|{}", category, message).as_bytes())
    }

    /// Returns whether an email went out
    pub async fn notify(&self, category: ErrorCategory, message: &str) -> Result<bool, AgentError> {
        self.notify_at(Utc::now(), category, message).await
    }

    pub async fn notify_at(
        &self,
        now: DateTime<Utc>,
        category: ErrorCategory,
        message: &str,
    ) -> Result<bool, AgentError> {
        let _guard = self.guard.lock().await;

        let fingerprint = Self::fingerprint(category, message);
        let mut sent: BTreeMap<String, i64> =
            get_typed(self.options.as_ref(), keys::ERROR_NOTIFICATIONS)
                .await?
                .unwrap_or_default();

        if let Some(last) = sent.get(&fingerprint).and_then(|ts| DateTime::from_timestamp(*ts, 0)) {
            if now - last < self.interval {
                debug!("Critical error notification throttled: {}", fingerprint);
                return Ok(false);
            }
        }

        let subject = format!("[Web Change Detector] Critical error on {}", self.site);
        let body = format!(
            "A critical error occurred on {}.\n\nCategory: {}\nTime: {}\nMessage: {}\n\nFurther occurrences of this error are suppressed for one hour.",
            self.site,
            category,
            now.to_rfc3339(),
            message
        );
        self.sender.send(&subject, &body).await?;

        sent.retain(|_, ts| {
            DateTime::from_timestamp(*ts, 0)
                .map(|t| now - t < self.interval)
                .unwrap_or(false)
        });
        sent.insert(fingerprint, now.timestamp());
        set_typed(self.options.as_ref(), keys::ERROR_NOTIFICATIONS, &sent).await?;
        Ok(true)
    }
}
