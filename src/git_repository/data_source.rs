use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::{ValueEmpty, ValueString},
    DataSource, Diagnostics,
};

use crate::client::Console;
use crate::utils::{api_error, check_errors, check_not_empty, value_option, value_string};

#[derive(Debug, Clone)]
pub struct GitRepositoryDataSource {
    console: Console,
}

impl GitRepositoryDataSource {
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GitRepositoryDataSourceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub url: ValueString<'a>,
    pub health: ValueString<'a>,
}

#[async_trait]
impl DataSource for GitRepositoryDataSource {
    type State<'a> = GitRepositoryDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
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
                    "health" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Health of the repository as seen by the console"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::plain(
                    "Looks up a git repository registered on the console by its URL",
                ),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_not_empty(diags, &config.url, "url");
        check_errors(diags)
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let api = self.console.api(diags)?;
        match api.get_git_repository_by_url(config.url.as_str()).await {
            Ok(repository) => Some(GitRepositoryDataSourceState {
                id: value_string(repository.id),
                url: value_string(repository.url),
                health: value_option(repository.health.as_deref()),
            }),
            Err(err) if err.is_not_found() => {
                diags.root_error(
                    "Git repository not found",
                    format!("No git repository is registered for {}", config.url),
                );
                None
            }
            Err(err) => {
                api_error(diags, "Could not read git repository", err);
                None
            }
        }
    }
}
