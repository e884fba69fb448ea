//! GraphQL documents sent to the console

/// GraphQL operation
///
/// `field` is the top-level field of the response `data` holding the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub name: &'static str,
    pub field: &'static str,
    pub document: &'static str,
}

macro_rules! cluster_fragment {
    () => {
        "fragment ClusterFragment on Cluster { id name handle version currentVersion protect deletedAt tags { name value } }"
    };
}

macro_rules! service_fragment {
    () => {
        "fragment ServiceDeploymentFragment on ServiceDeployment { id name namespace version protect status cluster { id } repository { id } git { ref folder } }"
    };
}

macro_rules! stack_fragment {
    () => {
        "fragment InfrastructureStackFragment on InfrastructureStack { id name type status approval cluster { id } repository { id } git { ref folder } }"
    };
}

macro_rules! git_fragment {
    () => {
        "fragment GitRepositoryFragment on GitRepository { id url health error }"
    };
}

macro_rules! operation {
    ($name:literal, $field:literal, $document:expr) => {
        Operation {
            name: $name,
            field: $field,
            document: $document,
        }
    };
}

pub const GET_CLUSTER: Operation = operation!(
    "Cluster",
    "cluster",
    concat!(
        "query Cluster($id: ID) { cluster(id: $id) { ...ClusterFragment } } ",
        cluster_fragment!()
    )
);
pub const GET_CLUSTER_BY_HANDLE: Operation = operation!(
    "ClusterByHandle",
    "cluster",
    concat!(
        "query ClusterByHandle($handle: String) { cluster(handle: $handle) { ...ClusterFragment } } ",
        cluster_fragment!()
    )
);
pub const CREATE_CLUSTER: Operation = operation!(
    "CreateCluster",
    "createCluster",
    concat!(
        "mutation CreateCluster($attributes: ClusterAttributes!) { createCluster(attributes: $attributes) { ...ClusterFragment } } ",
        cluster_fragment!()
    )
);
pub const UPDATE_CLUSTER: Operation = operation!(
    "UpdateCluster",
    "updateCluster",
    concat!(
        "mutation UpdateCluster($id: ID!, $attributes: ClusterUpdateAttributes!) { updateCluster(id: $id, attributes: $attributes) { ...ClusterFragment } } ",
        cluster_fragment!()
    )
);
pub const DELETE_CLUSTER: Operation = operation!(
    "DeleteCluster",
    "deleteCluster",
    "mutation DeleteCluster($id: ID!) { deleteCluster(id: $id) { id } }"
);
pub const DETACH_CLUSTER: Operation = operation!(
    "DetachCluster",
    "detachCluster",
    "mutation DetachCluster($id: ID!) { detachCluster(id: $id) { id } }"
);

pub const GET_SERVICE_DEPLOYMENT: Operation = operation!(
    "ServiceDeployment",
    "serviceDeployment",
    concat!(
        "query ServiceDeployment($id: ID) { serviceDeployment(id: $id) { ...ServiceDeploymentFragment } } ",
        service_fragment!()
    )
);
pub const CREATE_SERVICE_DEPLOYMENT: Operation = operation!(
    "CreateServiceDeployment",
    "createServiceDeployment",
    concat!(
        "mutation CreateServiceDeployment($clusterId: ID!, $attributes: ServiceDeploymentAttributes!) { createServiceDeployment(clusterId: $clusterId, attributes: $attributes) { ...ServiceDeploymentFragment } } ",
        service_fragment!()
    )
);
pub const UPDATE_SERVICE_DEPLOYMENT: Operation = operation!(
    "UpdateServiceDeployment",
    "updateServiceDeployment",
    concat!(
        "mutation UpdateServiceDeployment($id: ID!, $attributes: ServiceUpdateAttributes!) { updateServiceDeployment(id: $id, attributes: $attributes) { ...ServiceDeploymentFragment } } ",
        service_fragment!()
    )
);
pub const DELETE_SERVICE_DEPLOYMENT: Operation = operation!(
    "DeleteServiceDeployment",
    "deleteServiceDeployment",
    "mutation DeleteServiceDeployment($id: ID!) { deleteServiceDeployment(id: $id) { id } }"
);

pub const GET_STACK: Operation = operation!(
    "InfrastructureStack",
    "infrastructureStack",
    concat!(
        "query InfrastructureStack($id: ID) { infrastructureStack(id: $id) { ...InfrastructureStackFragment } } ",
        stack_fragment!()
    )
);
pub const CREATE_STACK: Operation = operation!(
    "CreateStack",
    "createStack",
    concat!(
        "mutation CreateStack($attributes: StackAttributes!) { createStack(attributes: $attributes) { ...InfrastructureStackFragment } } ",
        stack_fragment!()
    )
);
pub const UPDATE_STACK: Operation = operation!(
    "UpdateStack",
    "updateStack",
    concat!(
        "mutation UpdateStack($id: ID!, $attributes: StackAttributes!) { updateStack(id: $id, attributes: $attributes) { ...InfrastructureStackFragment } } ",
        stack_fragment!()
    )
);
pub const DELETE_STACK: Operation = operation!(
    "DeleteStack",
    "deleteStack",
    "mutation DeleteStack($id: ID!) { deleteStack(id: $id) { id } }"
);
pub const DETACH_STACK: Operation = operation!(
    "DetachStack",
    "detachStack",
    "mutation DetachStack($id: ID!) { detachStack(id: $id) { id } }"
);

pub const GET_GIT_REPOSITORY: Operation = operation!(
    "GitRepository",
    "gitRepository",
    concat!(
        "query GitRepository($id: ID) { gitRepository(id: $id) { ...GitRepositoryFragment } } ",
        git_fragment!()
    )
);
pub const GET_GIT_REPOSITORY_BY_URL: Operation = operation!(
    "GitRepositoryByUrl",
    "gitRepository",
    concat!(
        "query GitRepositoryByUrl($url: String) { gitRepository(url: $url) { ...GitRepositoryFragment } } ",
        git_fragment!()
    )
);
pub const CREATE_GIT_REPOSITORY: Operation = operation!(
    "CreateGitRepository",
    "createGitRepository",
    concat!(
        "mutation CreateGitRepository($attributes: GitAttributes!) { createGitRepository(attributes: $attributes) { ...GitRepositoryFragment } } ",
        git_fragment!()
    )
);
pub const UPDATE_GIT_REPOSITORY: Operation = operation!(
    "UpdateGitRepository",
    "updateGitRepository",
    concat!(
        "mutation UpdateGitRepository($id: ID!, $attributes: GitAttributes!) { updateGitRepository(id: $id, attributes: $attributes) { ...GitRepositoryFragment } } ",
        git_fragment!()
    )
);
pub const DELETE_GIT_REPOSITORY: Operation = operation!(
    "DeleteGitRepository",
    "deleteGitRepository",
    "mutation DeleteGitRepository($id: ID!) { deleteGitRepository(id: $id) { id } }"
);

pub const GET_PROJECT_BY_NAME: Operation = operation!(
    "Project",
    "project",
    "query Project($name: String) { project(name: $name) { id name description default } }"
);
