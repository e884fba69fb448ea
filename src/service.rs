//! `plural_service_deployment` resource

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::{Value, ValueEmpty, ValueString},
    AttributePath, Diagnostics, Resource,
};
use tracing::{debug, info};

use crate::client::model::{
    ServiceDeployment, ServiceDeploymentAttributes, ServiceDeploymentStatus,
    ServiceUpdateAttributes,
};
use crate::client::Console;
use crate::utils::{
    api_error, check_errors, check_not_empty, git_ref, known_string, replace_if_changed,
    value_option, value_string, wait_error, WithNormalize, WithSchema,
};
use crate::wait::Context;
use crate::waiters::{wait_for_deletion, wait_for_healthy, WaitSettings};

#[derive(Debug, Clone)]
pub struct ServiceDeploymentResource {
    console: Console,
    health: WaitSettings,
    deletion: WaitSettings,
}

impl ServiceDeploymentResource {
    pub fn new(console: Console) -> Self {
        Self {
            console,
            health: WaitSettings::SERVICE_HEALTH,
            deletion: WaitSettings::SERVICE_DELETION,
        }
    }

    pub fn with_health_wait(self, health: WaitSettings) -> Self {
        Self { health, ..self }
    }

    pub fn with_deletion_wait(self, deletion: WaitSettings) -> Self {
        Self { deletion, ..self }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceDeploymentState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub namespace: ValueString<'a>,
    pub cluster_id: ValueString<'a>,
    pub repository_id: ValueString<'a>,
    pub git_ref: ValueString<'a>,
    pub git_folder: ValueString<'a>,
    pub version: ValueString<'a>,
    pub protect: Value<bool>,
    pub wait_healthy: Value<bool>,
    pub status: ValueString<'a>,
}

impl<'a> ServiceDeploymentState<'a> {
    fn apply(&mut self, service: &ServiceDeployment) {
        self.id = value_string(service.id.as_str());
        self.name = value_string(service.name.as_str());
        self.namespace = value_string(service.namespace.as_str());
        if let Some(cluster) = &service.cluster {
            self.cluster_id = value_string(cluster.id.as_str());
        }
        if self.repository_id.is_value() || service.repository.is_some() {
            self.repository_id = value_option(service.repository.as_ref().map(|r| r.id.as_str()));
        }
        if self.git_ref.is_value() || self.git_folder.is_value() {
            let git = service.git.as_ref();
            self.git_ref = value_option(git.map(|git| git.reference.as_str()));
            self.git_folder = value_option(git.map(|git| git.folder.as_str()));
        }
        if self.version.is_value() {
            self.version = value_option(service.version.as_deref());
        }
        self.protect = Value::Value(service.protect.unwrap_or(false));
        self.status = value_string(service.status.as_str());
    }

    fn attributes(&self) -> ServiceDeploymentAttributes {
        ServiceDeploymentAttributes {
            name: known_string(&self.name).unwrap_or_default(),
            namespace: known_string(&self.namespace).unwrap_or_default(),
            version: known_string(&self.version),
            protect: self.protect.as_option(),
            repository_id: known_string(&self.repository_id),
            git: git_ref(&self.git_ref, &self.git_folder),
        }
    }

    fn update_attributes(&self) -> ServiceUpdateAttributes {
        ServiceUpdateAttributes {
            version: known_string(&self.version),
            protect: self.protect.as_option(),
            git: git_ref(&self.git_ref, &self.git_folder),
        }
    }
}

impl<'a> WithSchema for ServiceDeploymentState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Internal identifier of the service deployment"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the service deployment"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "namespace" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Kubernetes namespace the service is deployed into"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "cluster_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Identifier of the cluster the service is deployed on"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "repository_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Identifier of the git repository holding the manifests"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "git_ref" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Git reference (branch, tag or commit) to deploy"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "git_folder" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Folder of the repository holding the manifests"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "version" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Semantic version of the service deployment"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "protect" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Prevent the service deployment from being deleted"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "wait_healthy" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Wait for the service deployment to become healthy after creation"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "status" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Status reported by the deployment agent"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::plain(
                    "Service deployed by the Plural console onto a cluster",
                ),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithNormalize for ServiceDeploymentState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        if self.protect.is_null() {
            self.protect = Value::Value(false);
        }
        if self.wait_healthy.is_null() {
            self.wait_healthy = Value::Value(true);
        }
    }
}

#[async_trait]
impl Resource for ServiceDeploymentResource {
    type State<'a> = ServiceDeploymentState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ServiceDeploymentState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_not_empty(diags, &config.name, "name");
        check_not_empty(diags, &config.namespace, "namespace");
        check_not_empty(diags, &config.cluster_id, "cluster_id");
        if config.git_ref.is_null() != config.git_folder.is_null() {
            diags.error(
                "Incomplete git location",
                "`git_ref` and `git_folder` must be set together",
                AttributePath::new(if config.git_ref.is_null() {
                    "git_ref"
                } else {
                    "git_folder"
                }),
            );
        }
        check_errors(diags)
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        mut state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let api = self.console.api(diags)?;
        match api.get_service_deployment(state.id.as_str()).await {
            Ok(service) => {
                state.apply(&service);
                Some((state, private_state))
            }
            Err(err) if err.is_not_found() => {
                debug!(id = %state.id, "Service deployment is gone, removing it from the state");
                None
            }
            Err(err) => {
                api_error(diags, "Could not read service deployment", err);
                None
            }
        }
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.id = Value::Unknown;
        state.status = Value::Unknown;
        state.normalize(diags);
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state;
        state.id = prior_state.id.clone();
        state.normalize(diags);

        let redeployed = state.version != prior_state.version
            || state.git_ref != prior_state.git_ref
            || state.git_folder != prior_state.git_folder
            || state.repository_id != prior_state.repository_id;
        state.status = if redeployed {
            Value::Unknown
        } else {
            prior_state.status.clone()
        };

        let mut triggers = vec![];
        replace_if_changed(&mut triggers, &prior_state.name, &state.name, "name");
        replace_if_changed(
            &mut triggers,
            &prior_state.namespace,
            &state.namespace,
            "namespace",
        );
        replace_if_changed(
            &mut triggers,
            &prior_state.cluster_id,
            &state.cluster_id,
            "cluster_id",
        );
        Some((state, prior_private_state, triggers))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let api = self.console.api(diags)?;
        let mut state = planned_state;

        let service = match api
            .create_service_deployment(state.cluster_id.as_str(), &state.attributes())
            .await
        {
            Ok(service) => service,
            Err(err) => {
                api_error(diags, "Could not create service deployment", err);
                return None;
            }
        };
        info!(id = %service.id, name = %service.name, "Created service deployment");
        state.apply(&service);
        state.normalize(diags);

        if state.wait_healthy == Value::Value(true)
            && service.status != ServiceDeploymentStatus::Healthy
        {
            let id = service.id.as_str();
            let status = wait_for_healthy(
                &Context::background(),
                self.health,
                id,
                move || async move {
                    api.get_service_deployment(id)
                        .await
                        .map(|service| service.status)
                },
            )
            .await;

            if let Err(err) = status {
                wait_error(
                    diags,
                    "Error while waiting for service deployment to become healthy",
                    err,
                );
                diags.root_warning(
                    "Service deployment was created",
                    format!("Service deployment {id} exists on the console and may need to be imported or deleted manually."),
                );
                return None;
            }
            state.status = value_string(ServiceDeploymentStatus::Healthy.as_str());
        }

        Some((state, planned_private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let api = self.console.api(diags)?;
        let mut state = planned_state;

        match api
            .update_service_deployment(state.id.as_str(), &state.update_attributes())
            .await
        {
            Ok(service) => {
                state.apply(&service);
                state.normalize(diags);
                Some((state, planned_private_state))
            }
            Err(err) => {
                api_error(diags, "Could not update service deployment", err);
                None
            }
        }
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let api = self.console.api(diags)?;
        let id = state.id.as_str();

        match api.delete_service_deployment(id).await {
            Ok(()) => (),
            Err(err) if err.is_not_found() => {
                diags.root_warning(
                    "Service deployment has already been deleted",
                    err.to_string(),
                );
                return Some(());
            }
            Err(err) => {
                api_error(diags, "Could not delete service deployment", err);
                return None;
            }
        }

        match wait_for_deletion(
            &Context::background(),
            self.deletion,
            "service deployment",
            id,
            || api.get_service_deployment(id),
        )
        .await
        {
            Ok(()) => Some(()),
            Err(err) => {
                wait_error(
                    diags,
                    "Error while waiting for service deployment to be deleted",
                    err,
                );
                None
            }
        }
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let api = self.console.api(diags)?;
        match api.get_service_deployment(&id).await {
            Ok(service) => {
                let mut state = ServiceDeploymentState {
                    version: value_option(service.version.as_deref()),
                    git_ref: value_option(service.git.as_ref().map(|git| git.reference.as_str())),
                    git_folder: value_option(service.git.as_ref().map(|git| git.folder.as_str())),
                    ..Default::default()
                };
                state.apply(&service);
                state.normalize(diags);
                Some((state, Default::default()))
            }
            Err(err) => {
                api_error(diags, "Could not import service deployment", err);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::body_partial_json;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::utils::testing::{console, operations};

    const FAST: WaitSettings = WaitSettings::new(Duration::from_millis(10), Duration::from_secs(5));

    fn resource(server: &MockServer) -> ServiceDeploymentResource {
        ServiceDeploymentResource::new(console(server))
            .with_health_wait(FAST)
            .with_deletion_wait(FAST)
    }

    fn planned(wait_healthy: bool) -> ServiceDeploymentState<'static> {
        ServiceDeploymentState {
            id: Value::Unknown,
            name: value_string("console"),
            namespace: value_string("plrl-console"),
            cluster_id: value_string("c1"),
            repository_id: value_string("r1"),
            git_ref: value_string("main"),
            git_folder: value_string("charts/console"),
            protect: Value::Value(false),
            wait_healthy: Value::Value(wait_healthy),
            status: Value::Unknown,
            ..Default::default()
        }
    }

    fn service(status: &str) -> serde_json::Value {
        json!({
            "id": "s1",
            "name": "console",
            "namespace": "plrl-console",
            "status": status,
            "cluster": { "id": "c1" },
            "repository": { "id": "r1" },
            "git": { "ref": "main", "folder": "charts/console" },
        })
    }

    async fn mount_create(server: &MockServer) {
        Mock::given(body_partial_json(json!({
            "operationName": "CreateServiceDeployment",
            "variables": {
                "clusterId": "c1",
                "attributes": {
                    "name": "console",
                    "namespace": "plrl-console",
                    "repositoryId": "r1",
                    "git": { "ref": "main", "folder": "charts/console" },
                },
            },
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "createServiceDeployment": service("STALE") } })),
        )
        .expect(1)
        .mount(server)
        .await;
    }

    #[tokio::test]
    async fn create_waits_for_health() {
        let server = MockServer::start().await;
        mount_create(&server).await;
        Mock::given(body_partial_json(
            json!({ "operationName": "ServiceDeployment" }),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "serviceDeployment": service("SYNCED") } })),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;
        Mock::given(body_partial_json(
            json!({ "operationName": "ServiceDeployment" }),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "serviceDeployment": service("HEALTHY") } })),
        )
        .mount(&server)
        .await;

        let mut diags = Diagnostics::default();
        let (state, _) = Resource::create(
            &resource(&server),
            &mut diags,
            planned(true),
            planned(true),
            Default::default(),
            Default::default(),
        )
        .await
        .unwrap();

        assert!(diags.errors.is_empty());
        assert_eq!(state.id, value_string("s1"));
        assert_eq!(state.status, value_string("HEALTHY"));
        assert_eq!(operations(&server, "ServiceDeployment").await, 3);
    }

    #[tokio::test]
    async fn create_without_health_wait() {
        let server = MockServer::start().await;
        mount_create(&server).await;

        let mut diags = Diagnostics::default();
        let (state, _) = Resource::create(
            &resource(&server),
            &mut diags,
            planned(false),
            planned(false),
            Default::default(),
            Default::default(),
        )
        .await
        .unwrap();

        assert_eq!(state.status, value_string("STALE"));
        assert_eq!(operations(&server, "ServiceDeployment").await, 0);
    }

    #[tokio::test]
    async fn unhealthy_service_fails_create() {
        let server = MockServer::start().await;
        mount_create(&server).await;
        Mock::given(body_partial_json(
            json!({ "operationName": "ServiceDeployment" }),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "serviceDeployment": service("FAILED") } })),
        )
        .mount(&server)
        .await;

        let resource = ServiceDeploymentResource::new(console(&server)).with_health_wait(
            WaitSettings::new(Duration::from_millis(10), Duration::from_millis(100)),
        );
        let mut diags = Diagnostics::default();
        let created = Resource::create(
            &resource,
            &mut diags,
            planned(true),
            planned(true),
            Default::default(),
            Default::default(),
        )
        .await;

        assert!(created.is_none());
        assert_eq!(
            diags.errors[0].summary,
            "Error while waiting for service deployment to become healthy"
        );
        assert!(diags.warnings[0].detail.contains("s1"));
    }

    #[tokio::test]
    async fn destroy_waits_for_deletion() {
        let server = MockServer::start().await;
        Mock::given(body_partial_json(
            json!({ "operationName": "DeleteServiceDeployment" }),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "deleteServiceDeployment": { "id": "s1" } } })),
        )
        .expect(1)
        .mount(&server)
        .await;
        Mock::given(body_partial_json(
            json!({ "operationName": "ServiceDeployment" }),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "serviceDeployment": service("SYNCED") } })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
        Mock::given(body_partial_json(
            json!({ "operationName": "ServiceDeployment" }),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "serviceDeployment": null } })),
        )
        .mount(&server)
        .await;

        let mut state = planned(true);
        state.id = value_string("s1");
        let mut diags = Diagnostics::default();
        let result = Resource::destroy(
            &resource(&server),
            &mut diags,
            state,
            Default::default(),
            Default::default(),
        )
        .await;

        assert!(result.is_some());
        assert!(diags.errors.is_empty());
        assert_eq!(operations(&server, "ServiceDeployment").await, 2);
    }

    #[tokio::test]
    async fn moving_service_forces_replacement() {
        let resource = ServiceDeploymentResource::new(Console::default());
        let mut prior = planned(true);
        prior.id = value_string("s1");
        prior.status = value_string("HEALTHY");
        let mut proposed = prior.clone();
        proposed.cluster_id = value_string("c2");

        let mut diags = Diagnostics::default();
        let (state, _, triggers) = Resource::plan_update(
            &resource,
            &mut diags,
            prior,
            proposed.clone(),
            proposed,
            Default::default(),
            Default::default(),
        )
        .await
        .unwrap();

        assert_eq!(triggers, vec![AttributePath::new("cluster_id")]);
        assert_eq!(state.status, value_string("HEALTHY"));
    }

    #[tokio::test]
    async fn git_location_must_be_complete() {
        let resource = ServiceDeploymentResource::new(Console::default());
        let mut config = planned(true);
        config.git_folder = Value::Null;

        let mut diags = Diagnostics::default();
        assert!(Resource::validate(&resource, &mut diags, config)
            .await
            .is_none());
        assert_eq!(diags.errors[0].attribute, AttributePath::new("git_folder"));
    }

    #[tokio::test]
    async fn vanished_service_is_dropped_from_state() {
        let server = MockServer::start().await;
        Mock::given(body_partial_json(
            json!({ "operationName": "ServiceDeployment" }),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "serviceDeployment": null } })),
        )
        .expect(1)
        .mount(&server)
        .await;

        let mut state = planned(true);
        state.id = value_string("s1");
        let mut diags = Diagnostics::default();
        let read = Resource::read(
            &resource(&server),
            &mut diags,
            state,
            Default::default(),
            Default::default(),
        )
        .await;

        assert!(read.is_none());
        assert!(diags.errors.is_empty());
    }
}
