use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tf_provider::{
    map,
    schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema},
    value::{Value, ValueEmpty, ValueString},
    AttributePath, Diagnostics, DynamicDataSource, DynamicResource, Provider,
};
use tracing::{debug, info};

use crate::client::{Console, ConsoleClient};
use crate::cluster::{ClusterDataSource, ClusterResource};
use crate::git_repository::{GitRepositoryDataSource, GitRepositoryResource};
use crate::project::ProjectDataSource;
use crate::service::ServiceDeploymentResource;
use crate::stack::InfrastructureStackResource;
use crate::utils::check_errors;

pub const CONSOLE_URL_ENV: &str = "PLURAL_CONSOLE_URL";
pub const ACCESS_TOKEN_ENV: &str = "PLURAL_ACCESS_TOKEN";

/// Terraform provider for the Plural console
///
/// Every resource and data source shares the [`Console`] handle, which is filled by
/// [`Provider::configure`].
#[derive(Debug, Default, Clone)]
pub struct PluralProvider {
    console: Console,
}

impl PluralProvider {
    pub fn console(&self) -> &Console {
        &self.console
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig<'a> {
    #[serde(borrow = "'a")]
    pub console_url: ValueString<'a>,
    pub access_token: ValueString<'a>,
}

/// Configured value, or the content of the environment variable `var` when not set
fn resolve(value: &ValueString, var: &str) -> Option<String> {
    match value {
        Value::Value(value) => Some(value.to_string()),
        _ => std::env::var(var).ok().filter(|value| !value.is_empty()),
    }
}

#[async_trait]
impl Provider for PluralProvider {
    type Config<'a> = ProviderConfig<'a>;
    type MetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(Schema {
            version: 1,
            block: Block {
                attributes: map! {
                    "console_url" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::markdown(format!(
                            "URL of the Plural console, defaults to the `{CONSOLE_URL_ENV}` environment variable"
                        )),
                        constraint: AttributeConstraint::Optional,
                        ..Default::default()
                    },
                    "access_token" => Attribute {
                        attr_type: AttributeType::String,
                        description: Description::markdown(format!(
                            "Access token used to authenticate to the console, defaults to the `{ACCESS_TOKEN_ENV}` environment variable"
                        )),
                        constraint: AttributeConstraint::Optional,
                        sensitive: true,
                        ..Default::default()
                    },
                },
                description: Description::plain("plural"),
                ..Default::default()
            },
        })
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::Config<'a>) -> Option<()> {
        if let Value::Value(url) = &config.console_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                diags.error(
                    "Invalid console URL",
                    format!("`{url}` is not an http(s) URL"),
                    AttributePath::new("console_url"),
                );
            }
        }
        check_errors(diags)
    }

    async fn configure<'a>(
        &self,
        diags: &mut Diagnostics,
        terraform_version: String,
        config: Self::Config<'a>,
    ) -> Option<()> {
        let console_url = resolve(&config.console_url, CONSOLE_URL_ENV);
        let access_token = resolve(&config.access_token, ACCESS_TOKEN_ENV);

        if console_url.is_none() {
            diags.error(
                "Missing console URL",
                format!("Set `console_url` or the {CONSOLE_URL_ENV} environment variable"),
                AttributePath::new("console_url"),
            );
        }
        if access_token.is_none() {
            diags.error(
                "Missing access token",
                format!("Set `access_token` or the {ACCESS_TOKEN_ENV} environment variable"),
                AttributePath::new("access_token"),
            );
        }
        let (Some(console_url), Some(access_token)) = (console_url, access_token) else {
            return None;
        };

        let client = match ConsoleClient::new(&console_url, access_token) {
            Ok(client) => client,
            Err(err) => {
                diags.root_error("Could not create console client", err.to_string());
                return None;
            }
        };
        info!(
            endpoint = client.endpoint(),
            terraform_version, "Configured Plural console client"
        );
        if !self.console.set(Arc::new(client)) {
            debug!("Console client already configured, keeping the first one");
        }
        Some(())
    }

    fn get_resources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicResource>>> {
        Some(map! {
            "plural_cluster" => ClusterResource::new(self.console.clone()),
            "plural_service_deployment" => ServiceDeploymentResource::new(self.console.clone()),
            "plural_infrastructure_stack" => InfrastructureStackResource::new(self.console.clone()),
            "plural_git_repository" => GitRepositoryResource::new(self.console.clone()),
        })
    }

    fn get_data_sources(
        &self,
        _diags: &mut Diagnostics,
    ) -> Option<HashMap<String, Box<dyn DynamicDataSource>>> {
        Some(map! {
            "plural_cluster" => ClusterDataSource::new(self.console.clone()),
            "plural_git_repository" => GitRepositoryDataSource::new(self.console.clone()),
            "plural_project" => ProjectDataSource::new(self.console.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::value_string;

    #[test]
    fn configured_values_win_over_environment() {
        assert_eq!(
            resolve(&value_string("https://console.example.com"), "PATH").as_deref(),
            Some("https://console.example.com")
        );
        assert!(resolve(&Value::Null, "TERRAFORM_PROVIDER_PLURAL_UNSET_VARIABLE").is_none());
        assert!(resolve(&Value::Unknown, "PATH").is_some());
    }

    #[tokio::test]
    async fn configure_publishes_the_client() {
        let provider = PluralProvider::default();
        let config = ProviderConfig {
            console_url: value_string("https://console.example.com"),
            access_token: value_string("token"),
        };

        let mut diags = Diagnostics::default();
        let configured = provider.configure(&mut diags, "1.9.0".into(), config).await;

        assert!(configured.is_some());
        assert!(provider.console().get().is_ok());
    }

    #[tokio::test]
    async fn invalid_console_url_is_rejected() {
        let provider = PluralProvider::default();
        let config = ProviderConfig {
            console_url: value_string("console.example.com"),
            access_token: value_string("token"),
        };

        let mut diags = Diagnostics::default();
        assert!(Provider::validate(&provider, &mut diags, config)
            .await
            .is_none());
        assert_eq!(diags.errors[0].attribute, AttributePath::new("console_url"));
    }

    #[test]
    fn registers_every_resource_and_data_source() {
        let provider = PluralProvider::default();
        let mut diags = Diagnostics::default();

        let mut resources: Vec<_> = provider
            .get_resources(&mut diags)
            .unwrap()
            .into_keys()
            .collect();
        resources.sort();
        assert_eq!(
            resources,
            [
                "plural_cluster",
                "plural_git_repository",
                "plural_infrastructure_stack",
                "plural_service_deployment",
            ]
        );

        let data_sources = provider.get_data_sources(&mut diags).unwrap();
        assert_eq!(data_sources.len(), 3);
        assert!(data_sources.contains_key("plural_project"));
    }
}
