//! Group and website API client

use openapi_client::models::{
    DataResponse, Group, Page, SyncUrlsRequest, SyncUrlsResponse, Website,
};

use crate::errors::AgentError;
use crate::http::client::HttpClient;

impl HttpClient {
    pub async fn get_group(&self, token: &str, group_id: &str) -> Result<Group, AgentError> {
        let path = format!("/groups/{}", group_id);
        let response: DataResponse<Group> = self.get(&path, &[], token).await?;
        Ok(response.data)
    }

    pub async fn update_group(&self, token: &str, group: &Group) -> Result<Group, AgentError> {
        let path = format!("/groups/{}", group.id);
        let response: DataResponse<Group> = self.put(&path, token, group).await?;
        Ok(response.data)
    }

    pub async fn get_websites(&self, token: &str) -> Result<Vec<Website>, AgentError> {
        let response: Page<Website> = self.get("/websites", &[], token).await?;
        Ok(response.data)
    }

    pub async fn get_website(&self, token: &str, website_id: &str) -> Result<Website, AgentError> {
        let path = format!("/websites/{}", website_id);
        let response: DataResponse<Website> = self.get(&path, &[], token).await?;
        Ok(response.data)
    }

    pub async fn update_website(
        &self,
        token: &str,
        website: &Website,
    ) -> Result<Website, AgentError> {
        let path = format!("/websites/{}", website.id);
        let response: DataResponse<Website> = self.put(&path, token, website).await?;
        Ok(response.data)
    }

    /// Replace the website's URL list
    pub async fn sync_urls(
        &self,
        token: &str,
        website_id: &str,
        request: &SyncUrlsRequest,
    ) -> Result<SyncUrlsResponse, AgentError> {
        let path = format!("/websites/{}/sync-urls", website_id);
        self.post(&path, token, request).await
    }
}
