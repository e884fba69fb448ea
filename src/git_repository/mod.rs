//! `plural_git_repository` resource and data source

mod data_source;
mod resource;

pub use data_source::GitRepositoryDataSource;
pub use resource::{GitRepositoryResource, GitRepositoryState};
