//! Screenshot API client

use openapi_client::models::{TakeScreenshotsRequest, TakeScreenshotsResponse};

use crate::errors::AgentError;
use crate::http::client::HttpClient;

impl HttpClient {
    /// Queue screenshots for the given groups. The service answers with the
    /// batch id, or with a message when it refused the request.
    pub async fn take_screenshots(
        &self,
        token: &str,
        request: &TakeScreenshotsRequest,
    ) -> Result<TakeScreenshotsResponse, AgentError> {
        self.post("/screenshots/take", token, request).await
    }
}
