//! Request and response structures of the console API

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Reference to another console object
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct IdRef {
    pub id: String,
}

/// Key/value tag
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

/// Location of sources within a git repository
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub reference: String,
    pub folder: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub handle: Option<String>,
    pub version: Option<String>,
    pub current_version: Option<String>,
    pub protect: Option<bool>,
    pub tags: Option<Vec<Tag>>,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAttributes {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protect: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterUpdateAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protect: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

/// Status of a service deployment as reported by the deployment agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceDeploymentStatus {
    Stale,
    Synced,
    Healthy,
    Failed,
    Paused,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ServiceDeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stale => "STALE",
            Self::Synced => "SYNCED",
            Self::Healthy => "HEALTHY",
            Self::Failed => "FAILED",
            Self::Paused => "PAUSED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl Display for ServiceDeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDeployment {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub version: Option<String>,
    pub protect: Option<bool>,
    #[serde(default)]
    pub status: ServiceDeploymentStatus,
    pub cluster: Option<IdRef>,
    pub repository: Option<IdRef>,
    pub git: Option<GitRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDeploymentAttributes {
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protect: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceUpdateAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protect: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitRef>,
}

/// Tool used to run an infrastructure stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackType {
    #[default]
    Terraform,
    Ansible,
    Custom,
}

impl StackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terraform => "TERRAFORM",
            Self::Ansible => "ANSIBLE",
            Self::Custom => "CUSTOM",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TERRAFORM" => Some(Self::Terraform),
            "ANSIBLE" => Some(Self::Ansible),
            "CUSTOM" => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStack {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub stack_type: StackType,
    pub status: Option<String>,
    pub approval: Option<bool>,
    pub cluster: Option<IdRef>,
    pub repository: Option<IdRef>,
    pub git: Option<GitRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackAttributes {
    pub name: String,
    #[serde(rename = "type")]
    pub stack_type: StackType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval: Option<bool>,
    pub cluster_id: String,
    pub repository_id: String,
    pub git: GitRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitRepository {
    pub id: String,
    pub url: String,
    pub health: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitAttributes {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub default: bool,
}

/// Payload of delete and detach mutations
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Deleted {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_service_status_does_not_fail() {
        let service: ServiceDeployment = serde_json::from_value(json!({
            "id": "s1",
            "name": "api",
            "namespace": "default",
            "status": "SOMETHING_NEW",
        }))
        .unwrap();
        assert_eq!(service.status, ServiceDeploymentStatus::Unknown);

        let service: ServiceDeployment = serde_json::from_value(json!({
            "id": "s1",
            "name": "api",
            "namespace": "default",
            "status": "HEALTHY",
            "git": { "ref": "main", "folder": "charts/api" },
        }))
        .unwrap();
        assert_eq!(service.status, ServiceDeploymentStatus::Healthy);
        assert_eq!(service.git.unwrap().reference, "main");
    }

    #[test]
    fn attributes_skip_unset_fields() {
        let attributes = ClusterAttributes {
            name: "prod".into(),
            protect: Some(true),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&attributes).unwrap(),
            json!({ "name": "prod", "protect": true })
        );

        let attributes = StackAttributes {
            name: "network".into(),
            stack_type: StackType::Ansible,
            approval: None,
            cluster_id: "c1".into(),
            repository_id: "r1".into(),
            git: GitRef {
                reference: "main".into(),
                folder: "stacks/network".into(),
            },
        };
        assert_eq!(
            serde_json::to_value(&attributes).unwrap(),
            json!({
                "name": "network",
                "type": "ANSIBLE",
                "clusterId": "c1",
                "repositoryId": "r1",
                "git": { "ref": "main", "folder": "stacks/network" },
            })
        );
    }

    #[test]
    fn stack_type_round_trips_through_its_name() {
        for stack_type in [StackType::Terraform, StackType::Ansible, StackType::Custom] {
            assert_eq!(StackType::parse(stack_type.as_str()), Some(stack_type));
        }
        assert_eq!(StackType::parse("terraform"), None);
    }
}
