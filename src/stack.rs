use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::{Value, ValueEmpty, ValueString},
    AttributePath, Diagnostics, Resource,
};
use tracing::{debug, info};

use crate::client::model::{GitRef, InfrastructureStack, StackAttributes, StackType};
use crate::client::Console;
use crate::utils::{
    api_error, check_errors, check_not_empty, known_string, replace_if_changed, value_option,
    value_string, wait_error, WithNormalize, WithSchema,
};
use crate::wait::Context;
use crate::waiters::{wait_for_deletion, WaitSettings};

#[derive(Debug, Clone)]
pub struct InfrastructureStackResource {
    console: Console,
    deletion: WaitSettings,
}

impl InfrastructureStackResource {
    pub fn new(console: Console) -> Self {
        Self {
            console,
            deletion: WaitSettings::STACK_DELETION,
        }
    }

    pub fn with_deletion_wait(self, deletion: WaitSettings) -> Self {
        Self { deletion, ..self }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InfrastructureStackState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    #[serde(rename = "type")]
    pub stack_type: ValueString<'a>,
    pub approval: Value<bool>,
    pub cluster_id: ValueString<'a>,
    pub repository_id: ValueString<'a>,
    pub git_ref: ValueString<'a>,
    pub git_folder: ValueString<'a>,
    pub detach: Value<bool>,
    pub status: ValueString<'a>,
}

impl<'a> InfrastructureStackState<'a> {
    fn apply(&mut self, stack: &InfrastructureStack) {
        self.id = value_string(stack.id.as_str());
        self.name = value_string(stack.name.as_str());
        self.stack_type = value_string(stack.stack_type.as_str());
        self.approval = Value::Value(stack.approval.unwrap_or(false));
        if let Some(cluster) = &stack.cluster {
            self.cluster_id = value_string(cluster.id.as_str());
        }
        if let Some(repository) = &stack.repository {
            self.repository_id = value_string(repository.id.as_str());
        }
        if let Some(git) = &stack.git {
            self.git_ref = value_string(git.reference.as_str());
            self.git_folder = value_string(git.folder.as_str());
        }
        self.status = value_option(stack.status.as_deref());
    }

    fn attributes(&self) -> StackAttributes {
        StackAttributes {
            name: known_string(&self.name).unwrap_or_default(),
            stack_type: self
                .stack_type
                .as_deref_option()
                .and_then(StackType::parse)
                .unwrap_or_default(),
            approval: self.approval.as_option(),
            cluster_id: known_string(&self.cluster_id).unwrap_or_default(),
            repository_id: known_string(&self.repository_id).unwrap_or_default(),
            git: GitRef {
                reference: known_string(&self.git_ref).unwrap_or_default(),
                folder: known_string(&self.git_folder).unwrap_or_default(),
            },
        }
    }
}

impl<'a> WithSchema for InfrastructureStackState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Internal identifier of the stack"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the stack"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "type" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::markdown("Tool running the stack: `TERRAFORM`, `ANSIBLE` or `CUSTOM`"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "approval" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Require a manual approval before applying changes"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "cluster_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Identifier of the cluster running the stack"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "repository_id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Identifier of the git repository holding the sources"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "git_ref" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Git reference (branch, tag or commit) to run"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "git_folder" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Folder of the repository holding the sources"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "detach" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Detach the stack on destroy instead of deleting it"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "status" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Status of the last stack run"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::plain("Infrastructure stack run by the Plural console"),
                ..Default::default()
            },
        }
    }
}

impl<'a> WithNormalize for InfrastructureStackState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        if self.approval.is_null() {
            self.approval = Value::Value(false);
        }
        if self.detach.is_null() {
            self.detach = Value::Value(false);
        }
    }
}

#[async_trait]
impl Resource for InfrastructureStackResource {
    type State<'a> = InfrastructureStackState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(InfrastructureStackState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_not_empty(diags, &config.name, "name");
        check_not_empty(diags, &config.cluster_id, "cluster_id");
        check_not_empty(diags, &config.repository_id, "repository_id");
        check_not_empty(diags, &config.git_ref, "git_ref");
        check_not_empty(diags, &config.git_folder, "git_folder");
        if let Value::Value(stack_type) = &config.stack_type {
            if StackType::parse(stack_type).is_none() {
                diags.error(
                    "Invalid stack type",
                    format!("`{stack_type}` is not one of TERRAFORM, ANSIBLE or CUSTOM"),
                    AttributePath::new("type"),
                );
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
        match api.get_stack(state.id.as_str()).await {
            Ok(stack) => {
                state.apply(&stack);
                Some((state, private_state))
            }
            Err(err) if err.is_not_found() => {
                debug!(id = %state.id, "Stack is gone, removing it from the state");
                None
            }
            Err(err) => {
                api_error(diags, "Could not read stack", err);
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
        state.status = prior_state.status.clone();
        state.normalize(diags);

        let mut triggers = vec![];
        replace_if_changed(&mut triggers, &prior_state.name, &state.name, "name");
        replace_if_changed(
            &mut triggers,
            &prior_state.stack_type,
            &state.stack_type,
            "type",
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

        match api.create_stack(&state.attributes()).await {
            Ok(stack) => {
                info!(id = %stack.id, name = %stack.name, "Created stack");
                state.apply(&stack);
                state.normalize(diags);
                Some((state, planned_private_state))
            }
            Err(err) => {
                api_error(diags, "Could not create stack", err);
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
            .update_stack(state.id.as_str(), &state.attributes())
            .await
        {
            Ok(stack) => {
                state.apply(&stack);
                state.normalize(diags);
                Some((state, planned_private_state))
            }
            Err(err) => {
                api_error(diags, "Could not update stack", err);
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

        let (removed, summary) = if state.detach == Value::Value(true) {
            (api.detach_stack(id).await, "Could not detach stack")
        } else {
            (api.delete_stack(id).await, "Could not delete stack")
        };
        match removed {
            Ok(()) => (),
            Err(err) if err.is_not_found() => {
                diags.root_warning("Stack has already been deleted", err.to_string());
                return Some(());
            }
            Err(err) => {
                api_error(diags, summary, err);
                return None;
            }
        }
        if state.detach == Value::Value(true) {
            return Some(());
        }

        match wait_for_deletion(&Context::background(), self.deletion, "stack", id, || {
            api.get_stack(id)
        })
        .await
        {
            Ok(()) => Some(()),
            Err(err) => {
                wait_error(diags, "Error while waiting for stack to be deleted", err);
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
        match api.get_stack(&id).await {
            Ok(stack) => {
                let mut state = InfrastructureStackState::default();
                state.apply(&stack);
                state.normalize(diags);
                Some((state, Default::default()))
            }
            Err(err) => {
                api_error(diags, "Could not import stack", err);
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

    fn resource(server: &MockServer) -> InfrastructureStackResource {
        InfrastructureStackResource::new(console(server)).with_deletion_wait(WaitSettings::new(
            Duration::from_millis(10),
            Duration::from_secs(5),
        ))
    }

    fn state(detach: bool) -> InfrastructureStackState<'static> {
        InfrastructureStackState {
            id: value_string("st1"),
            name: value_string("network"),
            stack_type: value_string("TERRAFORM"),
            approval: Value::Value(false),
            cluster_id: value_string("c1"),
            repository_id: value_string("r1"),
            git_ref: value_string("main"),
            git_folder: value_string("terraform/network"),
            detach: Value::Value(detach),
            status: value_string("SUCCESSFUL"),
        }
    }

    #[tokio::test]
    async fn create_sends_stack_attributes() {
        let server = MockServer::start().await;
        Mock::given(body_partial_json(json!({
            "operationName": "CreateStack",
            "variables": { "attributes": {
                "name": "network",
                "type": "TERRAFORM",
                "clusterId": "c1",
                "repositoryId": "r1",
                "git": { "ref": "main", "folder": "terraform/network" },
            } },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "createStack": {
                "id": "st1",
                "name": "network",
                "type": "TERRAFORM",
                "status": "QUEUED",
                "cluster": { "id": "c1" },
                "repository": { "id": "r1" },
                "git": { "ref": "main", "folder": "terraform/network" },
            } }
        })))
        .expect(1)
        .mount(&server)
        .await;

        let mut planned = state(false);
        planned.id = Value::Unknown;
        planned.status = Value::Unknown;
        let mut diags = Diagnostics::default();
        let (created, _) = Resource::create(
            &resource(&server),
            &mut diags,
            planned.clone(),
            planned,
            Default::default(),
            Default::default(),
        )
        .await
        .unwrap();

        assert_eq!(created.id, value_string("st1"));
        assert_eq!(created.status, value_string("QUEUED"));
    }

    #[tokio::test]
    async fn destroy_waits_for_stack_deletion() {
        let server = MockServer::start().await;
        Mock::given(body_partial_json(json!({ "operationName": "DeleteStack" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": { "deleteStack": { "id": "st1" } } })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(body_partial_json(json!({ "operationName": "InfrastructureStack" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "infrastructureStack": { "id": "st1", "name": "network", "type": "TERRAFORM" } }
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(body_partial_json(
            json!({ "operationName": "InfrastructureStack" }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "could not find resource" }]
        })))
        .mount(&server)
        .await;

        let mut diags = Diagnostics::default();
        let result = Resource::destroy(
            &resource(&server),
            &mut diags,
            state(false),
            Default::default(),
            Default::default(),
        )
        .await;

        assert!(result.is_some());
        assert!(diags.errors.is_empty());
        assert_eq!(operations(&server, "InfrastructureStack").await, 2);
    }

    #[tokio::test]
    async fn detached_stack_is_not_waited_for() {
        let server = MockServer::start().await;
        Mock::given(body_partial_json(json!({ "operationName": "DetachStack" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": { "detachStack": { "id": "st1" } } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut diags = Diagnostics::default();
        let result = Resource::destroy(
            &resource(&server),
            &mut diags,
            state(true),
            Default::default(),
            Default::default(),
        )
        .await;

        assert!(result.is_some());
        assert_eq!(operations(&server, "DeleteStack").await, 0);
        assert_eq!(operations(&server, "InfrastructureStack").await, 0);
    }

    #[tokio::test]
    async fn stack_type_is_validated() {
        let resource = InfrastructureStackResource::new(Console::default());
        let mut config = state(false);
        config.stack_type = value_string("PULUMI");

        let mut diags = Diagnostics::default();
        assert!(Resource::validate(&resource, &mut diags, config)
            .await
            .is_none());
        assert_eq!(diags.errors[0].attribute, AttributePath::new("type"));
    }

    #[tokio::test]
    async fn changing_type_forces_replacement() {
        let resource = InfrastructureStackResource::new(Console::default());
        let prior = state(false);
        let mut proposed = prior.clone();
        proposed.stack_type = value_string("ANSIBLE");
        proposed.git_ref = value_string("v2");

        let mut diags = Diagnostics::default();
        let (_, _, triggers) = Resource::plan_update(
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

        assert_eq!(triggers, vec![AttributePath::new("type")]);
    }

    #[tokio::test]
    async fn vanished_stack_is_dropped_from_state() {
        let server = MockServer::start().await;
        Mock::given(body_partial_json(
            json!({ "operationName": "InfrastructureStack" }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "could not find resource" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

        let mut diags = Diagnostics::default();
        let read = Resource::read(
            &resource(&server),
            &mut diags,
            state(false),
            Default::default(),
            Default::default(),
        )
        .await;

        assert!(read.is_none());
        assert!(diags.errors.is_empty());
    }
}
