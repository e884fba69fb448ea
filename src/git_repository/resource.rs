use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::{Value, ValueEmpty, ValueString},
    AttributePath, Diagnostics, Resource,
};
use tracing::{debug, info};

use crate::client::model::{GitAttributes, GitRepository};
use crate::client::Console;
use crate::utils::{
    api_error, check_errors, check_not_empty, known_string, replace_if_changed, value_option,
    value_string, WithSchema,
};

#[derive(Debug, Clone)]
pub struct GitRepositoryResource {
    console: Console,
}

impl GitRepositoryResource {
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GitRepositoryState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub url: ValueString<'a>,
    pub private_key: ValueString<'a>,
    pub passphrase: ValueString<'a>,
    pub username: ValueString<'a>,
    pub password: ValueString<'a>,
    pub health: ValueString<'a>,
}

impl<'a> GitRepositoryState<'a> {
    fn apply(&mut self, repository: &GitRepository) {
        self.id = value_string(repository.id.as_str());
        self.url = value_string(repository.url.as_str());
        self.health = value_option(repository.health.as_deref());
    }

    fn attributes(&self) -> GitAttributes {
        GitAttributes {
            url: known_string(&self.url).unwrap_or_default(),
            private_key: known_string(&self.private_key),
            passphrase: known_string(&self.passphrase),
            username: known_string(&self.username),
            password: known_string(&self.password),
        }
    }
}

fn sensitive(description: &'static str) -> Attribute {
    Attribute {
        attr_type: AttributeType::String,
        description: Description::plain(description),
        constraint: AttributeConstraint::Optional,
        sensitive: true,
        ..Default::default()
    }
}

impl<'a> WithSchema for GitRepositoryState<'a> {
    fn schema() -> Schema {
        Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Internal identifier of the git repository"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "url" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Clone URL of the repository"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "private_key" => sensitive("SSH private key used to clone the repository"),
                    "passphrase" => sensitive("Passphrase of the SSH private key"),
                    "username" => sensitive("Username for HTTPS authentication"),
                    "password" => sensitive("Password or token for HTTPS authentication"),
                    "health" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Health of the repository as seen by the console"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::plain("Git repository registered on the Plural console"),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl Resource for GitRepositoryResource {
    type State<'a> = GitRepositoryState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(GitRepositoryState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_not_empty(diags, &config.url, "url");
        if config.passphrase.is_value() && config.private_key.is_null() {
            diags.error_short(
                "`passphrase` requires `private_key`",
                AttributePath::new("passphrase"),
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
        match api.get_git_repository(state.id.as_str()).await {
            Ok(repository) => {
                state.apply(&repository);
                Some((state, private_state))
            }
            Err(err) if err.is_not_found() => {
                debug!(id = %state.id, "Git repository is gone, removing it from the state");
                None
            }
            Err(err) => {
                api_error(diags, "Could not read git repository", err);
                None
            }
        }
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.id = Value::Unknown;
        state.health = Value::Unknown;
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state;
        state.id = prior_state.id.clone();
        state.health = Value::Unknown;

        let mut triggers = vec![];
        replace_if_changed(&mut triggers, &prior_state.url, &state.url, "url");
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

        match api.create_git_repository(&state.attributes()).await {
            Ok(repository) => {
                info!(id = %repository.id, url = %repository.url, "Created git repository");
                state.apply(&repository);
                Some((state, planned_private_state))
            }
            Err(err) => {
                api_error(diags, "Could not create git repository", err);
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
            .update_git_repository(state.id.as_str(), &state.attributes())
            .await
        {
            Ok(repository) => {
                state.apply(&repository);
                Some((state, planned_private_state))
            }
            Err(err) => {
                api_error(diags, "Could not update git repository", err);
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
        match api.delete_git_repository(state.id.as_str()).await {
            Ok(()) => Some(()),
            Err(err) if err.is_not_found() => {
                diags.root_warning("Git repository has already been deleted", err.to_string());
                Some(())
            }
            Err(err) => {
                api_error(diags, "Could not delete git repository", err);
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
        match api.get_git_repository(&id).await {
            Ok(repository) => {
                let mut state = GitRepositoryState::default();
                state.apply(&repository);
                Some((state, Default::default()))
            }
            Err(err) => {
                api_error(diags, "Could not import git repository", err);
                None
            }
        }
    }
}
