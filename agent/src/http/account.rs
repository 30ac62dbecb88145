//! Account API client

use openapi_client::models::{Account, DataResponse, TrialAccountRequest, TrialAccountResponse};

use crate::errors::AgentError;
use crate::http::client::HttpClient;

impl HttpClient {
    pub async fn get_account(&self, token: &str) -> Result<Account, AgentError> {
        let response: DataResponse<Account> = self.get("/account", &[], token).await?;
        Ok(response.data)
    }

    /// Register a trial account; no credential is needed yet
    pub async fn create_trial_account(
        &self,
        request: &TrialAccountRequest,
    ) -> Result<TrialAccountResponse, AgentError> {
        self.post_anonymous("/trials", request).await
    }
}
