//! Server application state shared across handlers

use super::session::SessionStore;
use crate::config::ServerConfig;
use crate::generation::{ChatCompletionsProvider, GenerationProvider};
use crate::jira::JiraClient;
use crate::shutdown::ShutdownState;
use std::sync::Arc;

#[derive(Clone)]
pub struct ServerAppState {
    /// Sessions and the Jira credentials they hold
    pub sessions: Arc<SessionStore>,

    /// Jira REST client (holds no credentials itself)
    pub jira: JiraClient,

    /// Test case generator
    pub generator: Arc<dyn GenerationProvider>,

    pub cookie_secure: bool,

    pub shutdown_state: ShutdownState,
}

impl ServerAppState {
    /// Build the state from configuration using the chat completions provider
    pub fn new(config: &ServerConfig, shutdown_state: ShutdownState) -> anyhow::Result<Self> {
        let provider = ChatCompletionsProvider::new(config.generation.clone())?;
        Self::with_generator(config, shutdown_state, Arc::new(provider))
    }

    /// Build the state with a specific generation provider
    pub fn with_generator(
        config: &ServerConfig,
        shutdown_state: ShutdownState,
        generator: Arc<dyn GenerationProvider>,
    ) -> anyhow::Result<Self> {
        let jira = JiraClient::new(config.upstream_timeout)?
            .with_stories_query(config.jira_jql.clone(), config.jira_max_results);

        Ok(Self {
            sessions: Arc::new(SessionStore::new(
                config.session_secret.clone(),
                config.session_ttl,
            )),
            jira,
            generator,
            cookie_secure: config.cookie_secure,
            shutdown_state,
        })
    }
}
