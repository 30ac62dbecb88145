//! API models

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Screenshot type tag sent with a screenshot request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotType {
    Pre,
    Post,
    Auto,
    Compare,
}

impl ScreenshotType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScreenshotType::Pre => "pre",
            ScreenshotType::Post => "post",
            ScreenshotType::Auto => "auto",
            ScreenshotType::Compare => "compare",
        }
    }
}

impl FromStr for ScreenshotType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre" => Ok(ScreenshotType::Pre),
            "post" => Ok(ScreenshotType::Post),
            "auto" => Ok(ScreenshotType::Auto),
            "compare" => Ok(ScreenshotType::Compare),
            _ => Err(format!("Invalid screenshot type: {}", s)),
        }
    }
}

impl fmt::Display for ScreenshotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Take screenshots request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeScreenshotsRequest {
    pub group_ids: Vec<String>,
    pub sc_type: ScreenshotType,
}

/// Take screenshots response. The API answers with either a batch id or an
/// error message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TakeScreenshotsResponse {
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Comparison status, settable by the admin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    New,
    Ok,
    ToFix,
    FalsePositive,
}

impl ComparisonStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonStatus::New => "new",
            ComparisonStatus::Ok => "ok",
            ComparisonStatus::ToFix => "to_fix",
            ComparisonStatus::FalsePositive => "false_positive",
        }
    }
}

impl FromStr for ComparisonStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ComparisonStatus::New),
            "ok" => Ok(ComparisonStatus::Ok),
            "to_fix" => Ok(ComparisonStatus::ToFix),
            "false_positive" => Ok(ComparisonStatus::FalsePositive),
            _ => Err(format!("Invalid comparison status: {}", s)),
        }
    }
}

/// A before/after comparison computed by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub html_title: Option<String>,
    pub device: String,
    pub status: ComparisonStatus,
    #[serde(default)]
    pub difference_percent: f64,
    #[serde(default)]
    pub screenshot_1_link: Option<String>,
    #[serde(default)]
    pub screenshot_2_link: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub batch: Option<String>,
    pub created_at: String,
}

/// Comparison status update request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonStatusUpdate {
    pub status: ComparisonStatus,
}

/// Pagination metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub last_page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total: u64,
}

/// A paginated list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: PageMeta,
}

/// Single resource response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// Comparison list filters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonFilters {
    #[serde(default)]
    pub statuses: Vec<ComparisonStatus>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
}

impl ComparisonFilters {
    /// Query string pairs, in the API's parameter names
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if !self.statuses.is_empty() {
            let statuses: Vec<&str> = self.statuses.iter().map(|s| s.as_str()).collect();
            query.push(("status".to_string(), statuses.join(",")));
        }
        if !self.groups.is_empty() {
            query.push(("groups".to_string(), self.groups.join(",")));
        }
        let optional = [
            ("from", &self.from),
            ("to", &self.to),
            ("url", &self.url),
            ("device", &self.device),
            ("batch", &self.batch),
            ("orderBy", &self.order_by),
            ("order", &self.order),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                query.push((name.to_string(), value.clone()));
            }
        }
        if let Some(page) = self.page {
            query.push(("page".to_string(), page.to_string()));
        }
        if let Some(per_page) = self.per_page {
            query.push(("per_page".to_string(), per_page.to_string()));
        }
        query
    }
}

/// Processing queue item status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Open,
    Processing,
    Done,
    Failed,
}

impl QueueStatus {
    /// Whether the item still has remote work pending
    pub fn is_pending(&self) -> bool {
        matches!(self, QueueStatus::Open | QueueStatus::Processing)
    }
}

/// A unit of remote work (one screenshot or one comparison)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub status: QueueStatus,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub sc_type: Option<String>,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub error_msg: Option<String>,
}

/// URL group settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub monitoring: bool,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub interval_in_h: f64,
    #[serde(default)]
    pub hour_of_day: u8,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub css: Option<String>,
    #[serde(default)]
    pub alert_emails: Vec<String>,
}

/// A URL type selectable for synchronisation (post type or taxonomy)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlType {
    pub url_type_slug: String,
    pub url_type_name: String,
    pub post_type_slug: String,
    pub post_type_name: String,
}

/// Website settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Website {
    pub id: String,
    pub domain: String,
    #[serde(default)]
    pub manual_detection_group: Option<String>,
    #[serde(default)]
    pub auto_detection_group: Option<String>,
    #[serde(default)]
    pub sync_url_types: Vec<UrlType>,
    #[serde(default)]
    pub allowances: serde_json::Value,
}

/// A URL submitted for synchronisation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncUrl {
    pub url: String,
    #[serde(default)]
    pub html_title: String,
    #[serde(default)]
    pub url_type: String,
    #[serde(default)]
    pub url_category: String,
}

/// Sync URLs request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncUrlsRequest {
    pub delete_missing: bool,
    pub urls: Vec<SyncUrl>,
}

/// Sync URLs response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncUrlsResponse {
    #[serde(default)]
    pub added: u64,
    #[serde(default)]
    pub removed: u64,
}

/// Account details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub checks_done: u64,
    #[serde(default)]
    pub checks_left: u64,
    #[serde(default)]
    pub renewal_at: Option<String>,
}

/// Trial account request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialAccountRequest {
    pub name: String,
    pub email: String,
    pub domain: String,
}

/// Trial account response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialAccountResponse {
    pub api_token: String,
    #[serde(default)]
    pub account: Option<Account>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}
