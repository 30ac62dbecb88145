//! Comparison API client

use openapi_client::models::{
    Comparison, ComparisonFilters, ComparisonStatus, ComparisonStatusUpdate, DataResponse, Page,
};

use crate::errors::AgentError;
use crate::http::client::HttpClient;

impl HttpClient {
    /// List comparisons matching the filters
    pub async fn get_comparisons(
        &self,
        token: &str,
        filters: &ComparisonFilters,
    ) -> Result<Page<Comparison>, AgentError> {
        self.get("/comparisons", &filters.to_query(), token).await
    }

    /// Set the admin status of one comparison
    pub async fn update_comparison_status(
        &self,
        token: &str,
        comparison_id: &str,
        status: ComparisonStatus,
    ) -> Result<Comparison, AgentError> {
        let path = format!("/comparisons/{}", comparison_id);
        let response: DataResponse<Comparison> = self
            .put(&path, token, &ComparisonStatusUpdate { status })
            .await?;
        Ok(response.data)
    }
}
