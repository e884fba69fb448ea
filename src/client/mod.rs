//! Console API client

use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tf_provider::Diagnostics;
use thiserror::Error;

mod graphql;
pub mod model;
mod queries;

pub use graphql::{graphql_endpoint, ConsoleClient};

use model::{
    Cluster, ClusterAttributes, ClusterUpdateAttributes, GitAttributes, GitRepository,
    InfrastructureStack, Project, ServiceDeployment, ServiceDeploymentAttributes,
    ServiceUpdateAttributes, StackAttributes,
};

/// Error returned by the console API
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested object does not exist (anymore)
    #[error("could not find resource")]
    NotFound,
    /// The console rejected the request
    #[error("graphql error: {}", .0.join("; "))]
    GraphQl(Vec<String>),
    /// The console answered with a non-success HTTP status
    #[error("console returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    /// The request could not be sent or its response could not be received
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The response could not be decoded
    #[error("could not decode console response: {0}")]
    Decode(#[from] serde_json::Error),
    /// The provider has not been configured yet
    #[error("provider is not configured")]
    NotConfigured,
}

impl ApiError {
    /// Check if the error means the object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Classify the messages of a GraphQL `errors` array
    ///
    /// Only an array made entirely of missing-resource messages is [`ApiError::NotFound`].
    pub(crate) fn from_messages(messages: Vec<String>) -> Self {
        if !messages.is_empty() && messages.iter().all(|message| is_not_found_message(message)) {
            Self::NotFound
        } else {
            Self::GraphQl(messages)
        }
    }
}

fn is_not_found_message(message: &str) -> bool {
    message
        .to_ascii_lowercase()
        .contains("could not find resource")
}

/// Operations of the console used by the provider
#[async_trait]
pub trait ConsoleApi: Send + Sync {
    async fn get_cluster(&self, id: &str) -> Result<Cluster, ApiError>;
    async fn get_cluster_by_handle(&self, handle: &str) -> Result<Cluster, ApiError>;
    async fn create_cluster(&self, attributes: &ClusterAttributes) -> Result<Cluster, ApiError>;
    async fn update_cluster(
        &self,
        id: &str,
        attributes: &ClusterUpdateAttributes,
    ) -> Result<Cluster, ApiError>;
    async fn delete_cluster(&self, id: &str) -> Result<(), ApiError>;
    async fn detach_cluster(&self, id: &str) -> Result<(), ApiError>;

    async fn get_service_deployment(&self, id: &str) -> Result<ServiceDeployment, ApiError>;
    async fn create_service_deployment(
        &self,
        cluster_id: &str,
        attributes: &ServiceDeploymentAttributes,
    ) -> Result<ServiceDeployment, ApiError>;
    async fn update_service_deployment(
        &self,
        id: &str,
        attributes: &ServiceUpdateAttributes,
    ) -> Result<ServiceDeployment, ApiError>;
    async fn delete_service_deployment(&self, id: &str) -> Result<(), ApiError>;

    async fn get_stack(&self, id: &str) -> Result<InfrastructureStack, ApiError>;
    async fn create_stack(
        &self,
        attributes: &StackAttributes,
    ) -> Result<InfrastructureStack, ApiError>;
    async fn update_stack(
        &self,
        id: &str,
        attributes: &StackAttributes,
    ) -> Result<InfrastructureStack, ApiError>;
    async fn delete_stack(&self, id: &str) -> Result<(), ApiError>;
    async fn detach_stack(&self, id: &str) -> Result<(), ApiError>;

    async fn get_git_repository(&self, id: &str) -> Result<GitRepository, ApiError>;
    async fn get_git_repository_by_url(&self, url: &str) -> Result<GitRepository, ApiError>;
    async fn create_git_repository(
        &self,
        attributes: &GitAttributes,
    ) -> Result<GitRepository, ApiError>;
    async fn update_git_repository(
        &self,
        id: &str,
        attributes: &GitAttributes,
    ) -> Result<GitRepository, ApiError>;
    async fn delete_git_repository(&self, id: &str) -> Result<(), ApiError>;

    async fn get_project_by_name(&self, name: &str) -> Result<Project, ApiError>;
}

/// Handle to the console API shared by the provider, its resources and its data sources
///
/// Resources are registered before the provider is configured,
/// so the API client is published into the handle by `configure`.
#[derive(Clone, Default)]
pub struct Console {
    api: Arc<OnceLock<Arc<dyn ConsoleApi>>>,
}

impl Console {
    /// Publish the API client
    ///
    /// Returns `false` if a client was already published.
    pub fn set(&self, api: Arc<dyn ConsoleApi>) -> bool {
        self.api.set(api).is_ok()
    }

    /// Get the API client
    pub fn get(&self) -> Result<&dyn ConsoleApi, ApiError> {
        self.api
            .get()
            .map(|api| api.as_ref())
            .ok_or(ApiError::NotConfigured)
    }

    /// Get the API client, recording an error in `diags` if the provider is not configured
    pub fn api(&self, diags: &mut Diagnostics) -> Option<&dyn ConsoleApi> {
        match self.get() {
            Ok(api) => Some(api),
            Err(err) => {
                diags.root_error(
                    "Provider is not configured",
                    format!("The Plural console cannot be reached: {err}"),
                );
                None
            }
        }
    }
}

impl Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("configured", &self.api.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_messages_are_classified() {
        assert!(ApiError::from_messages(vec!["could not find resource".into()]).is_not_found());
        assert!(
            ApiError::from_messages(vec!["Could not find resource cluster".into()]).is_not_found()
        );
        assert!(!ApiError::from_messages(vec!["user not found for token".into()]).is_not_found());
        assert!(!ApiError::from_messages(vec![
            "could not find resource".into(),
            "unauthorized".into(),
        ])
        .is_not_found());
        assert!(!ApiError::from_messages(vec![]).is_not_found());
        let err = ApiError::from_messages(vec!["forbidden".into(), "try again".into()]);
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "graphql error: forbidden; try again");
    }

    #[test]
    fn unconfigured_console_reports_a_diagnostic() {
        let console = Console::default();
        let mut diags = Diagnostics::default();
        assert!(console.api(&mut diags).is_none());
        assert_eq!(diags.errors.len(), 1);
        assert!(matches!(console.get(), Err(ApiError::NotConfigured)));
    }
}
