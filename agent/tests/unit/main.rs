//! Integration tests for the agent

mod test_actions;
mod test_api_client;
mod test_manual_checks;
mod test_recovery;
mod test_server;
mod test_workers;
