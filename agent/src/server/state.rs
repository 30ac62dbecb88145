//! Server state

use std::sync::Arc;

use crate::authn::nonce::NonceSigner;
use crate::cache::api::ApiResponseCache;
use crate::http::api::WebChangeApi;
use crate::logs::Logger;
use crate::recovery::retry::ErrorHandler;
use crate::recovery::strategies::RecoveryRegistry;
use crate::storage::options::OptionStore;
use crate::storage::settings::SiteSettings;
use crate::workflow::manual_checks::ManualChecks;

/// Server state shared across handlers
pub struct ServerState {
    pub site: SiteSettings,
    pub options: Arc<dyn OptionStore>,
    pub api: Arc<dyn WebChangeApi>,
    pub cache: Arc<ApiResponseCache>,
    pub manual_checks: Arc<ManualChecks>,
    pub errors: Arc<ErrorHandler>,
    pub recovery: Arc<RecoveryRegistry>,
    pub nonces: Arc<NonceSigner>,
}

impl ServerState {
    pub fn logger(&self) -> &Arc<Logger> {
        self.errors.logger()
    }
}
