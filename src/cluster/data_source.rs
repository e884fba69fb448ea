use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::{Value, ValueEmpty, ValueMap, ValueString},
    AttributePath, DataSource, Diagnostics,
};

use crate::client::Console;
use crate::utils::{api_error, check_errors, value_option, value_string};

use super::tags_from_api;

#[derive(Debug, Clone)]
pub struct ClusterDataSource {
    console: Console,
}

impl ClusterDataSource {
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClusterDataSourceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub handle: ValueString<'a>,
    pub name: ValueString<'a>,
    pub version: ValueString<'a>,
    pub current_version: ValueString<'a>,
    pub protect: Value<bool>,
    pub tags: ValueMap<'a, ValueString<'a>>,
}

#[async_trait]
impl DataSource for ClusterDataSource {
    type State<'a> = ClusterDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "id" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Internal identifier of the cluster"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "handle" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Unique handle of the cluster"),
                        constraint: AttributeConstraint::OptionalComputed,
                        ..Default::default()
                    },
                    "name" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Human-readable name of the cluster"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "version" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::plain("Desired Kubernetes version of the cluster"),
                        constraint: AttributeConstraint::Computed,
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
                        description: Description::plain("Whether the cluster is protected from deletion"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                    "tags" => Attribute {
                        attr_type: AttributeType::Map(AttributeType::String.into()),
                        description: Description::plain("Key/value tags of the cluster"),
                        constraint: AttributeConstraint::Computed,
                        ..Default::default()
                    },
                },
                description: Description::markdown("Looks up a cluster by `id` or by `handle`"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        match (&config.id, &config.handle) {
            (Value::Null, Value::Null) => {
                diags.root_error_short("Either `id` or `handle` must be set to look up a cluster")
            }
            (Value::Value(_), Value::Value(_)) => diags.error_short(
                "`id` and `handle` are mutually exclusive",
                AttributePath::new("handle"),
            ),
            _ => (),
        }
        check_errors(diags)
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let api = self.console.api(diags)?;

        let cluster = match (&config.id, &config.handle) {
            (Value::Value(id), _) => api.get_cluster(id).await,
            (_, Value::Value(handle)) => api.get_cluster_by_handle(handle).await,
            _ => {
                diags.root_error_short("Either `id` or `handle` must be set to look up a cluster");
                return None;
            }
        };

        match cluster {
            Ok(cluster) => Some(ClusterDataSourceState {
                id: value_string(cluster.id),
                handle: value_option(cluster.handle.as_deref()),
                name: value_string(cluster.name),
                version: value_option(cluster.version.as_deref()),
                current_version: value_option(cluster.current_version.as_deref()),
                protect: Value::Value(cluster.protect.unwrap_or(false)),
                tags: tags_from_api(cluster.tags.as_deref().unwrap_or_default()),
            }),
            Err(err) if err.is_not_found() => {
                diags.root_error("Cluster not found", err.to_string());
                None
            }
            Err(err) => {
                api_error(diags, "Could not read cluster", err);
                None
            }
        }
    }
}
