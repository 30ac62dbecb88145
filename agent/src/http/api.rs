//! The Web Change Detector API as the rest of the agent sees it

use std::sync::Arc;

use async_trait::async_trait;
use openapi_client::models::{
    Account, Comparison, ComparisonFilters, ComparisonStatus, Group, Page, QueueItem,
    ScreenshotType, SyncUrlsRequest, SyncUrlsResponse, TakeScreenshotsRequest,
    TakeScreenshotsResponse, TrialAccountRequest, TrialAccountResponse, Website,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};

use crate::cache::api::ApiResponseCache;
use crate::errors::AgentError;
use crate::http::client::HttpClient;
use crate::storage::options::OptionStore;

/// Operations consumed from the remote service
#[async_trait]
pub trait WebChangeApi: Send + Sync {
    async fn take_screenshots(
        &self,
        group_id: &str,
        sc_type: ScreenshotType,
    ) -> Result<TakeScreenshotsResponse, AgentError>;

    async fn get_comparisons(
        &self,
        filters: &ComparisonFilters,
    ) -> Result<Page<Comparison>, AgentError>;

    async fn update_comparison_status(
        &self,
        comparison_id: &str,
        status: ComparisonStatus,
    ) -> Result<Comparison, AgentError>;

    async fn get_queues(&self, batch_id: &str, per_page: u32, page: u32)
        -> Result<Page<QueueItem>, AgentError>;

    async fn get_group(&self, group_id: &str) -> Result<Group, AgentError>;

    async fn update_group(&self, group: &Group) -> Result<Group, AgentError>;

    async fn get_websites(&self) -> Result<Vec<Website>, AgentError>;

    async fn get_website(&self, website_id: &str) -> Result<Website, AgentError>;

    async fn update_website(&self, website: &Website) -> Result<Website, AgentError>;

    async fn sync_urls(
        &self,
        website_id: &str,
        request: &SyncUrlsRequest,
    ) -> Result<SyncUrlsResponse, AgentError>;

    async fn get_account(&self) -> Result<Account, AgentError>;

    async fn create_trial_account(
        &self,
        request: &TrialAccountRequest,
    ) -> Result<TrialAccountResponse, AgentError>;
}

/// HTTP implementation reading the credential from the option store.
/// Group, website and account reads are cached; writes invalidate them.
pub struct ApiClient {
    http: HttpClient,
    options: Arc<dyn OptionStore>,
    cache: Arc<ApiResponseCache>,
}

impl ApiClient {
    pub fn new(
        http: HttpClient,
        options: Arc<dyn OptionStore>,
        cache: Arc<ApiResponseCache>,
    ) -> Self {
        Self {
            http,
            options,
            cache,
        }
    }

    async fn token(&self) -> Result<SecretString, AgentError> {
        self.options
            .api_token()
            .await?
            .ok_or_else(|| AgentError::AuthError("no API token stored".to_string()))
    }

    fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.cache
            .get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    fn remember<T: Serialize>(&self, key: &str, value: &T) {
        if let Ok(value) = serde_json::to_value(value) {
            self.cache.insert(key, value);
        }
    }
}

#[async_trait]
impl WebChangeApi for ApiClient {
    async fn take_screenshots(
        &self,
        group_id: &str,
        sc_type: ScreenshotType,
    ) -> Result<TakeScreenshotsResponse, AgentError> {
        let token = self.token().await?;
        let request = TakeScreenshotsRequest {
            group_ids: vec![group_id.to_string()],
            sc_type,
        };
        self.http
            .take_screenshots(token.expose_secret(), &request)
            .await
    }

    async fn get_comparisons(
        &self,
        filters: &ComparisonFilters,
    ) -> Result<Page<Comparison>, AgentError> {
        let token = self.token().await?;
        self.http.get_comparisons(token.expose_secret(), filters).await
    }

    async fn update_comparison_status(
        &self,
        comparison_id: &str,
        status: ComparisonStatus,
    ) -> Result<Comparison, AgentError> {
        let token = self.token().await?;
        self.http
            .update_comparison_status(token.expose_secret(), comparison_id, status)
            .await
    }

    async fn get_queues(
        &self,
        batch_id: &str,
        per_page: u32,
        page: u32,
    ) -> Result<Page<QueueItem>, AgentError> {
        let token = self.token().await?;
        self.http
            .get_queues(token.expose_secret(), batch_id, per_page, page)
            .await
    }

    async fn get_group(&self, group_id: &str) -> Result<Group, AgentError> {
        let key = format!("/groups/{}", group_id);
        if let Some(group) = self.cached(&key) {
            return Ok(group);
        }
        let token = self.token().await?;
        let group = self.http.get_group(token.expose_secret(), group_id).await?;
        self.remember(&key, &group);
        Ok(group)
    }

    async fn update_group(&self, group: &Group) -> Result<Group, AgentError> {
        let token = self.token().await?;
        let updated = self.http.update_group(token.expose_secret(), group).await?;
        self.remember(&format!("/groups/{}", updated.id), &updated);
        Ok(updated)
    }

    async fn get_websites(&self) -> Result<Vec<Website>, AgentError> {
        let token = self.token().await?;
        self.http.get_websites(token.expose_secret()).await
    }

    async fn get_website(&self, website_id: &str) -> Result<Website, AgentError> {
        let key = format!("/websites/{}", website_id);
        if let Some(website) = self.cached(&key) {
            return Ok(website);
        }
        let token = self.token().await?;
        let website = self
            .http
            .get_website(token.expose_secret(), website_id)
            .await?;
        self.remember(&key, &website);
        Ok(website)
    }

    async fn update_website(&self, website: &Website) -> Result<Website, AgentError> {
        let token = self.token().await?;
        let updated = self
            .http
            .update_website(token.expose_secret(), website)
            .await?;
        self.remember(&format!("/websites/{}", updated.id), &updated);
        Ok(updated)
    }

    async fn sync_urls(
        &self,
        website_id: &str,
        request: &SyncUrlsRequest,
    ) -> Result<SyncUrlsResponse, AgentError> {
        let token = self.token().await?;
        let response = self
            .http
            .sync_urls(token.expose_secret(), website_id, request)
            .await?;
        self.cache.invalidate_prefix("/groups/");
        Ok(response)
    }

    async fn get_account(&self) -> Result<Account, AgentError> {
        let key = "/account";
        if let Some(account) = self.cached(key) {
            return Ok(account);
        }
        let token = self.token().await?;
        let account = self.http.get_account(token.expose_secret()).await?;
        self.remember(key, &account);
        Ok(account)
    }

    async fn create_trial_account(
        &self,
        request: &TrialAccountRequest,
    ) -> Result<TrialAccountResponse, AgentError> {
        self.http.create_trial_account(request).await
    }
}
