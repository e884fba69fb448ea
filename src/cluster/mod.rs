use std::borrow::Cow;

use tf_provider::value::{Value, ValueMap, ValueString};

use crate::client::model::Tag;
use crate::utils::value_string;

mod data_source;
mod resource;

pub use data_source::ClusterDataSource;
pub use resource::{ClusterResource, ClusterState};

fn tags_to_api(tags: &ValueMap<'_, ValueString<'_>>) -> Option<Vec<Tag>> {
    let tags = tags.as_ref_option()?;
    Some(
        tags.iter()
            .filter_map(|(name, value)| {
                Some(Tag {
                    name: name.to_string(),
                    value: value.as_deref_option()?.to_owned(),
                })
            })
            .collect(),
    )
}

fn tags_from_api<'a>(tags: &[Tag]) -> ValueMap<'a, ValueString<'a>> {
    Value::Value(
        tags.iter()
            .map(|tag| {
                (
                    Cow::Owned(tag.name.clone()),
                    value_string(tag.value.as_str()),
                )
            })
            .collect(),
    )
}
