//! Processing queue API client

use openapi_client::models::{Page, QueueItem};

use crate::errors::AgentError;
use crate::http::client::HttpClient;

impl HttpClient {
    /// One page of a screenshot batch's queue items; pages start at 1
    pub async fn get_queues(
        &self,
        token: &str,
        batch_id: &str,
        per_page: u32,
        page: u32,
    ) -> Result<Page<QueueItem>, AgentError> {
        let query = [
            ("batch".to_string(), batch_id.to_string()),
            ("per_page".to_string(), per_page.to_string()),
            ("page".to_string(), page.to_string()),
        ];
        self.get("/queues", &query, token).await
    }
}
