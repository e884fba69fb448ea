use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use tracing::{debug, trace};

use super::model::{
    Cluster, ClusterAttributes, ClusterUpdateAttributes, Deleted, GitAttributes, GitRepository,
    InfrastructureStack, Project, ServiceDeployment, ServiceDeploymentAttributes,
    ServiceUpdateAttributes, StackAttributes,
};
use super::queries::{self, Operation};
use super::{ApiError, ConsoleApi};

/// Build the GraphQL endpoint from the console URL
///
/// `https://console.example.com` and `https://console.example.com/gql` both give
/// `https://console.example.com/gql`.
pub fn graphql_endpoint(console_url: &str) -> String {
    let url = console_url.trim_end_matches('/');
    if url.ends_with("/gql") {
        url.to_owned()
    } else {
        format!("{url}/gql")
    }
}

/// GraphQL client of the console
#[derive(Debug, Clone)]
pub struct ConsoleClient {
    http: Client,
    endpoint: String,
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Request<'a> {
    query: &'a str,
    operation_name: &'a str,
    variables: Json,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    data: Option<Json>,
    #[serde(default)]
    errors: Vec<ResponseError>,
}

#[derive(Deserialize)]
struct ResponseError {
    message: String,
}

impl ConsoleClient {
    /// Create a client for the console at `console_url`, authenticated with `token`
    pub fn new<U: AsRef<str>, T: Into<String>>(console_url: U, token: T) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        Ok(Self {
            http,
            endpoint: graphql_endpoint(console_url.as_ref()),
            token: token.into(),
        })
    }

    /// GraphQL endpoint the client sends its requests to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: Operation,
        variables: Json,
    ) -> Result<T, ApiError> {
        debug!(operation = operation.name, "Sending console request");
        trace!(operation = operation.name, %variables, "Console request variables");

        let response = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .json(&Request {
                query: operation.document,
                operation_name: operation.name,
                variables,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let response: Response = serde_json::from_slice(&body)?;
        if !response.errors.is_empty() {
            let messages = response
                .errors
                .into_iter()
                .map(|error| error.message)
                .collect();
            let err = ApiError::from_messages(messages);
            debug!(operation = operation.name, error = %err, "Console request failed");
            return Err(err);
        }

        match response
            .data
            .and_then(|mut data| data.get_mut(operation.field).map(Json::take))
        {
            None | Some(Json::Null) => Err(ApiError::NotFound),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    async fn execute_deletion(&self, operation: Operation, id: &str) -> Result<(), ApiError> {
        let _: Deleted = self.execute(operation, json!({ "id": id })).await?;
        Ok(())
    }
}

#[async_trait]
impl ConsoleApi for ConsoleClient {
    async fn get_cluster(&self, id: &str) -> Result<Cluster, ApiError> {
        self.execute(queries::GET_CLUSTER, json!({ "id": id }))
            .await
    }
    async fn get_cluster_by_handle(&self, handle: &str) -> Result<Cluster, ApiError> {
        self.execute(queries::GET_CLUSTER_BY_HANDLE, json!({ "handle": handle }))
            .await
    }
    async fn create_cluster(&self, attributes: &ClusterAttributes) -> Result<Cluster, ApiError> {
        self.execute(queries::CREATE_CLUSTER, json!({ "attributes": attributes }))
            .await
    }
    async fn update_cluster(
        &self,
        id: &str,
        attributes: &ClusterUpdateAttributes,
    ) -> Result<Cluster, ApiError> {
        self.execute(
            queries::UPDATE_CLUSTER,
            json!({ "id": id, "attributes": attributes }),
        )
        .await
    }
    async fn delete_cluster(&self, id: &str) -> Result<(), ApiError> {
        self.execute_deletion(queries::DELETE_CLUSTER, id).await
    }
    async fn detach_cluster(&self, id: &str) -> Result<(), ApiError> {
        self.execute_deletion(queries::DETACH_CLUSTER, id).await
    }

    async fn get_service_deployment(&self, id: &str) -> Result<ServiceDeployment, ApiError> {
        self.execute(queries::GET_SERVICE_DEPLOYMENT, json!({ "id": id }))
            .await
    }
    async fn create_service_deployment(
        &self,
        cluster_id: &str,
        attributes: &ServiceDeploymentAttributes,
    ) -> Result<ServiceDeployment, ApiError> {
        self.execute(
            queries::CREATE_SERVICE_DEPLOYMENT,
            json!({ "clusterId": cluster_id, "attributes": attributes }),
        )
        .await
    }
    async fn update_service_deployment(
        &self,
        id: &str,
        attributes: &ServiceUpdateAttributes,
    ) -> Result<ServiceDeployment, ApiError> {
        self.execute(
            queries::UPDATE_SERVICE_DEPLOYMENT,
            json!({ "id": id, "attributes": attributes }),
        )
        .await
    }
    async fn delete_service_deployment(&self, id: &str) -> Result<(), ApiError> {
        self.execute_deletion(queries::DELETE_SERVICE_DEPLOYMENT, id)
            .await
    }

    async fn get_stack(&self, id: &str) -> Result<InfrastructureStack, ApiError> {
        self.execute(queries::GET_STACK, json!({ "id": id })).await
    }
    async fn create_stack(
        &self,
        attributes: &StackAttributes,
    ) -> Result<InfrastructureStack, ApiError> {
        self.execute(queries::CREATE_STACK, json!({ "attributes": attributes }))
            .await
    }
    async fn update_stack(
        &self,
        id: &str,
        attributes: &StackAttributes,
    ) -> Result<InfrastructureStack, ApiError> {
        self.execute(
            queries::UPDATE_STACK,
            json!({ "id": id, "attributes": attributes }),
        )
        .await
    }
    async fn delete_stack(&self, id: &str) -> Result<(), ApiError> {
        self.execute_deletion(queries::DELETE_STACK, id).await
    }
    async fn detach_stack(&self, id: &str) -> Result<(), ApiError> {
        self.execute_deletion(queries::DETACH_STACK, id).await
    }

    async fn get_git_repository(&self, id: &str) -> Result<GitRepository, ApiError> {
        self.execute(queries::GET_GIT_REPOSITORY, json!({ "id": id }))
            .await
    }
    async fn get_git_repository_by_url(&self, url: &str) -> Result<GitRepository, ApiError> {
        self.execute(queries::GET_GIT_REPOSITORY_BY_URL, json!({ "url": url }))
            .await
    }
    async fn create_git_repository(
        &self,
        attributes: &GitAttributes,
    ) -> Result<GitRepository, ApiError> {
        self.execute(
            queries::CREATE_GIT_REPOSITORY,
            json!({ "attributes": attributes }),
        )
        .await
    }
    async fn update_git_repository(
        &self,
        id: &str,
        attributes: &GitAttributes,
    ) -> Result<GitRepository, ApiError> {
        self.execute(
            queries::UPDATE_GIT_REPOSITORY,
            json!({ "id": id, "attributes": attributes }),
        )
        .await
    }
    async fn delete_git_repository(&self, id: &str) -> Result<(), ApiError> {
        self.execute_deletion(queries::DELETE_GIT_REPOSITORY, id)
            .await
    }

    async fn get_project_by_name(&self, name: &str) -> Result<Project, ApiError> {
        self.execute(queries::GET_PROJECT_BY_NAME, json!({ "name": name }))
            .await
    }
}
