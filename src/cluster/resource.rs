use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::{Value, ValueEmpty, ValueMap, ValueString},
    AttributePath, Diagnostics, Resource,
};
use tracing::{debug, info};

use crate::client::model::{Cluster, ClusterAttributes, ClusterUpdateAttributes};
use crate::client::Console;
use crate::utils::{
    api_error, check_errors, check_not_empty, known_string, replace_if_changed, value_option,
    value_string, wait_error, WithNormalize, WithSchema,
};
use crate::wait::Context;
use crate::waiters::{wait_for_deletion, WaitSettings};

use super::{tags_from_api, tags_to_api};

#[derive(Debug, Clone)]
pub struct ClusterResource {
    console: Console,
    deletion: WaitSettings,
}

impl ClusterResource {
    pub fn new(console: Console) -> Self {
        Self {
            console,
            deletion: WaitSettings::CLUSTER_DELETION,
        }
    }

    pub fn with_deletion_wait(self, deletion: WaitSettings) -> Self {
        Self { deletion, ..self }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClusterState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub handle: ValueString<'a>,
    pub version: ValueString<'a>,
    pub current_version: ValueString<'a>,
    pub protect: Value<bool>,
    pub tags: ValueMap<'a, ValueString<'a>>,
    pub detach: Value<bool>,
}

impl<'a> ClusterState<'a> {
    fn apply(&mut self, cluster: &Cluster) {
        self.id = value_string(cluster.id.as_str());
        self.name = value_string(cluster.name.as_str());
        self.handle = value_option(cluster.handle.as_deref());
        if self.version.is_value() {
            self.version = value_option(cluster.version.as_deref());
        }
        self.current_version = value_option(cluster.current_version.as_deref());
        self.protect = Value::Value(cluster.protect.unwrap_or(false));
        match cluster.tags.as_deref() {
            Some(tags) if !tags.is_empty() || self.tags.is_value() => {
                self.tags = tags_from_api(tags);
            }
            _ => (),
        }
    }

    fn attributes(&self) -> ClusterAttributes {
        ClusterAttributes {
            name: known_string(&self.name).unwrap_or_default(),
            handle: known_string(&self.handle),
            version: known_string(&self.version),
            protect: self.protect.as_option(),
            tags: tags_to_api(&self.tags),
        }
    }

    fn update_attributes(&self) -> ClusterUpdateAttributes {
        ClusterUpdateAttributes {
            handle: known_string(&self.handle),
            version: known_string(&self.version),
            protect: self.protect.as_option(),
            tags: tags_to_api(&self.tags),
        }
    }
}

impl<'a> WithSchema for ClusterState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Internal identifier of the cluster"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Human-readable name of the cluster"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "handle" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Unique handle of the cluster, defaults to its name"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "version" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Desired Kubernetes version of the cluster"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "current_version" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Kubernetes version currently running on the cluster"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "protect" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Prevent the cluster from being deleted"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "tags" => Attribute {
                        attr_type: AttributeType::Map(AttributeType::String.into()),
                        description: Description::plain("Key/value tags of the cluster"),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "detach" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::markdown("Detach the cluster from the console on destroy instead of deleting it. Detached clusters are not waited for."),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                },
                description: Description::plain("Cluster managed by the Plural console"),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithNormalize for ClusterState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        if self.id.is_null() {
            self.id = Value::Unknown;
        }
        if self.handle.is_null() {
            self.handle = Value::Unknown;
        }
        if self.current_version.is_null() {
            self.current_version = Value::Unknown;
        }
        if self.protect.is_null() {
            self.protect = Value::Value(false);
        }
        if self.detach.is_null() {
            self.detach = Value::Value(false);
        }
    }
}

#[async_trait]
impl Resource for ClusterResource {
    type State<'a> = ClusterState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ClusterState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_not_empty(diags, &config.name, "name");
        if let Value::Value(handle) = &config.handle {
            if handle.is_empty() {
                diags.error_short("`handle` should not be empty", AttributePath::new("handle"));
            }
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
        match api.get_cluster(state.id.as_str()).await {
            Ok(cluster) => {
                state.apply(&cluster);
                Some((state, private_state))
            }
            Err(err) if err.is_not_found() => {
                debug!(id = %state.id, "Cluster is gone, removing it from the state");
                None
            }
            Err(err) => {
                api_error(diags, "Could not read cluster", err);
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
        state.current_version = Value::Unknown;
        state.normalize(diags);
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state;
        state.id = prior_state.id.clone();
        if config_state.handle.is_null() {
            state.handle = prior_state.handle.clone();
        }
        if state.version != prior_state.version {
            state.current_version = Value::Unknown;
        } else {
            state.current_version = prior_state.current_version.clone();
        }
        state.normalize(diags);

        let mut triggers = vec![];
        replace_if_changed(&mut triggers, &prior_state.handle, &state.handle, "handle");
        Some((state, prior_private_state, triggers))
    }

    async fn plan_destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        if prior_state.protect == Value::Value(true) {
            diags.error(
                "Cluster is protected",
                "Set `protect` to false and apply before destroying this cluster.",
                AttributePath::new("protect"),
            );
            return None;
        }
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

        match api.create_cluster(&state.attributes()).await {
            Ok(cluster) => {
                info!(id = %cluster.id, name = %cluster.name, "Created cluster");
                state.apply(&cluster);
                state.normalize(diags);
                Some((state, planned_private_state))
            }
            Err(err) => {
                api_error(diags, "Could not create cluster", err);
                None
            }
        }
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
            .update_cluster(state.id.as_str(), &state.update_attributes())
            .await
        {
            Ok(cluster) => {
                state.apply(&cluster);
                state.normalize(diags);
                Some((state, planned_private_state))
            }
            Err(err) => {
                api_error(diags, "Could not update cluster", err);
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

        if state.detach == Value::Value(true) {
            return match api.detach_cluster(id).await {
                Ok(()) => Some(()),
                Err(err) if err.is_not_found() => {
                    diags.root_warning("Cluster has already been deleted", err.to_string());
                    Some(())
                }
                Err(err) => {
                    api_error(diags, "Could not detach cluster", err);
                    None
                }
            };
        }

        if state.protect == Value::Value(true) {
            diags.error_short("Cluster is protected", AttributePath::new("protect"));
            return None;
        }

        match api.delete_cluster(id).await {
            Ok(()) => (),
            Err(err) if err.is_not_found() => {
                diags.root_warning("Cluster has already been deleted", err.to_string());
                return Some(());
            }
            Err(err) => {
                api_error(diags, "Could not delete cluster", err);
                return None;
            }
        }

        match wait_for_deletion(&Context::background(), self.deletion, "cluster", id, || {
            api.get_cluster(id)
        })
        .await
        {
            Ok(()) => Some(()),
            Err(err) => {
                wait_error(diags, "Error while waiting for cluster to be deleted", err);
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
        match api.get_cluster(&id).await {
            Ok(cluster) => {
                let mut state = ClusterState {
                    version: value_option(cluster.version.as_deref()),
                    detach: Value::Value(false),
                    ..Default::default()
                };
                state.apply(&cluster);
                Some((state, Default::default()))
            }
            Err(err) => {
                api_error(diags, "Could not import cluster", err);
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

    fn resource(server: &MockServer) -> ClusterResource {
        ClusterResource::new(console(server)).with_deletion_wait(WaitSettings::new(
            Duration::from_millis(10),
            Duration::from_secs(5),
        ))
    }

    fn state(protect: bool, detach: bool) -> ClusterState<'static> {
        ClusterState {
            id: value_string("c1"),
            name: value_string("prod"),
            handle: value_string("prod"),
            protect: Value::Value(protect),
            detach: Value::Value(detach),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn destroy_waits_until_cluster_is_gone() {
        let server = MockServer::start().await;
        Mock::given(body_partial_json(
            json!({ "operationName": "DeleteCluster" }),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "deleteCluster": { "id": "c1" } } })),
        )
        .mount(&server)
        .await;
        Mock::given(body_partial_json(json!({ "operationName": "Cluster" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "cluster": { "id": "c1", "name": "prod", "deletedAt": "2024-05-01T00:00:00Z" } }
            })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(body_partial_json(json!({ "operationName": "Cluster" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "cluster": null },
                "errors": [{ "message": "could not find resource" }],
            })))
            .mount(&server)
            .await;

        let mut diags = Diagnostics::default();
        let result = Resource::destroy(
            &resource(&server),
            &mut diags,
            state(false, false),
            Default::default(),
            Default::default(),
        )
        .await;

        assert!(result.is_some(), "{diags:?}");
        assert!(diags.errors.is_empty());
        assert_eq!(operations(&server, "DeleteCluster").await, 1);
        assert_eq!(operations(&server, "Cluster").await, 3);
    }

    #[tokio::test]
    async fn destroy_reports_wait_failures() {
        let server = MockServer::start().await;
        Mock::given(body_partial_json(
            json!({ "operationName": "DeleteCluster" }),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "deleteCluster": { "id": "c1" } } })),
        )
        .mount(&server)
        .await;
        Mock::given(body_partial_json(json!({ "operationName": "Cluster" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{ "message": "unauthorized" }],
            })))
            .mount(&server)
            .await;

        let mut diags = Diagnostics::default();
        let result = Resource::destroy(
            &resource(&server),
            &mut diags,
            state(false, false),
            Default::default(),
            Default::default(),
        )
        .await;

        assert!(result.is_none());
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(
            diags.errors[0].summary,
            "Error while waiting for cluster to be deleted"
        );
        assert!(diags.errors[0].detail.contains("unauthorized"));
        assert_eq!(operations(&server, "Cluster").await, 1);
    }

    #[tokio::test]
    async fn detached_cluster_is_not_waited_for() {
        let server = MockServer::start().await;
        Mock::given(body_partial_json(
            json!({ "operationName": "DetachCluster" }),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "detachCluster": { "id": "c1" } } })),
        )
        .expect(1)
        .mount(&server)
        .await;

        let mut diags = Diagnostics::default();
        let result = Resource::destroy(
            &resource(&server),
            &mut diags,
            state(false, true),
            Default::default(),
            Default::default(),
        )
        .await;

        assert!(result.is_some());
        assert_eq!(operations(&server, "Cluster").await, 0);
    }

    #[tokio::test]
    async fn protected_cluster_is_not_deleted() {
        let server = MockServer::start().await;
        let resource = resource(&server);

        let mut diags = Diagnostics::default();
        let planned = Resource::plan_destroy(
            &resource,
            &mut diags,
            state(true, false),
            Default::default(),
            Default::default(),
        )
        .await;
        assert!(planned.is_none());
        assert_eq!(diags.errors[0].summary, "Cluster is protected");

        let mut diags = Diagnostics::default();
        let destroyed = Resource::destroy(
            &resource,
            &mut diags,
            state(true, false),
            Default::default(),
            Default::default(),
        )
        .await;
        assert!(destroyed.is_none());
        assert!(server
            .received_requests()
            .await
            .unwrap_or_default()
            .is_empty());
    }

    #[tokio::test]
    async fn changing_handle_forces_replacement() {
        let resource = ClusterResource::new(Console::default());
        let prior = state(false, false);
        let mut proposed = prior.clone();
        proposed.handle = value_string("prod-2");
        proposed.version = value_string("1.30");

        let mut diags = Diagnostics::default();
        let (planned, _, triggers) = Resource::plan_update(
            &resource,
            &mut diags,
            prior.clone(),
            proposed.clone(),
            proposed,
            Default::default(),
            Default::default(),
        )
        .await
        .unwrap();

        assert_eq!(triggers, vec![AttributePath::new("handle")]);
        assert_eq!(planned.id, prior.id);
        assert!(planned.current_version.is_unknown());
    }

    #[tokio::test]
    async fn unconfigured_provider_is_reported() {
        let resource = ClusterResource::new(Console::default());
        let mut diags = Diagnostics::default();
        let created = Resource::create(
            &resource,
            &mut diags,
            state(false, false),
            state(false, false),
            Default::default(),
            Default::default(),
        )
        .await;
        assert!(created.is_none());
        assert_eq!(diags.errors[0].summary, "Provider is not configured");
    }

    #[tokio::test]
    async fn vanished_cluster_is_dropped_from_state() {
        let server = MockServer::start().await;
        Mock::given(body_partial_json(json!({ "operationName": "Cluster" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "cluster": null }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut diags = Diagnostics::default();
        let read = Resource::read(
            &resource(&server),
            &mut diags,
            state(false, false),
            Default::default(),
            Default::default(),
        )
        .await;

        assert!(read.is_none());
        assert!(diags.errors.is_empty());
    }

    #[tokio::test]
    async fn read_failures_are_reported() {
        let server = MockServer::start().await;
        Mock::given(body_partial_json(json!({ "operationName": "Cluster" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{ "message": "user not found for token" }]
            })))
            .mount(&server)
            .await;

        let mut diags = Diagnostics::default();
        let read = Resource::read(
            &resource(&server),
            &mut diags,
            state(false, false),
            Default::default(),
            Default::default(),
        )
        .await;

        assert!(read.is_none());
        assert_eq!(diags.errors[0].summary, "Could not read cluster");
    }
}
