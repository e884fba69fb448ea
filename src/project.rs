//! `plural_project` data source

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::{Value, ValueEmpty, ValueString},
    DataSource, Diagnostics,
};

use crate::client::Console;
use crate::utils::{api_error, check_errors, check_not_empty, value_option, value_string};

#[derive(Debug, Clone)]
pub struct ProjectDataSource {
    console: Console,
}

impl ProjectDataSource {
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub default: Value<bool>,
}

#[async_trait]
impl DataSource for ProjectDataSource {
    type State<'a> = ProjectState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Internal identifier of the project"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Name of the project"),
                        constraint: AttributeConstraint::Required,
                        ..Default::default()
                    },
                    "description" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Description of the project"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "default" => Attribute {
                        attr_type: AttributeType::Bool,
                        description: Description::plain("Whether this is the default project"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::plain("Looks up a project by name"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        check_not_empty(diags, &config.name, "name");
        check_errors(diags)
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let api = self.console.api(diags)?;
        match api.get_project_by_name(config.name.as_str()).await {
            Ok(project) => Some(ProjectState {
                id: value_string(project.id),
                name: value_string(project.name),
                description: value_option(project.description.as_deref()),
                default: Value::Value(project.default),
            }),
            Err(err) if err.is_not_found() => {
                diags.root_error(
                    "Project not found",
                    format!("No project is named {}", config.name),
                );
                None
            }
            Err(err) => {
                api_error(diags, "Could not read project", err);
                None
            }
        }
    }
}
