use std::borrow::Cow;
use std::fmt::Display;

use tf_provider::{
    schema::Schema,
    value::{Value, ValueString},
    AttributePath, Diagnostics,
};

use crate::client::model::GitRef;
use crate::client::ApiError;
use crate::wait::WaitError;

pub(crate) trait WithSchema {
    fn schema() -> Schema;
}

pub(crate) trait WithNormalize {
    fn normalize(&mut self, diags: &mut Diagnostics);
}

/// Owned string value
pub(crate) fn value_string<'a, S: Into<String>>(value: S) -> ValueString<'a> {
    Value::Value(Cow::Owned(value.into()))
}

/// Owned string value, null if `value` is [`None`]
pub(crate) fn value_option<'a>(value: Option<&str>) -> ValueString<'a> {
    value.map_or(Value::Null, value_string)
}

/// Known string content of `value`
pub(crate) fn known_string(value: &ValueString) -> Option<String> {
    value.as_deref_option().map(str::to_owned)
}

/// Git location built from two string attributes, if both are known
pub(crate) fn git_ref(reference: &ValueString, folder: &ValueString) -> Option<GitRef> {
    Some(GitRef {
        reference: known_string(reference)?,
        folder: known_string(folder)?,
    })
}

/// Record an error if a required string attribute is empty or null
pub(crate) fn check_not_empty(diags: &mut Diagnostics, value: &ValueString, name: &'static str) {
    match value {
        Value::Value(content) => {
            if content.is_empty() {
                diags.error_short(
                    format!("`{name}` should not be empty"),
                    AttributePath::new(name),
                );
            }
        }
        Value::Null => {
            diags.error_short(
                format!("`{name}` should not be null"),
                AttributePath::new(name),
            );
        }
        Value::Unknown => (),
    }
}

/// Add `name` to the replacement triggers if its known value changed
pub(crate) fn replace_if_changed<T: PartialEq>(
    triggers: &mut Vec<AttributePath>,
    prior: &Value<T>,
    planned: &Value<T>,
    name: &'static str,
) {
    if prior.is_value() && prior != planned {
        triggers.push(AttributePath::new(name));
    }
}

/// Record a console error
pub(crate) fn api_error<E: Display>(diags: &mut Diagnostics, summary: &'static str, err: E) {
    diags.root_error(summary, err.to_string());
}

/// Record a failed wait
pub(crate) fn wait_error(diags: &mut Diagnostics, summary: &'static str, err: WaitError<ApiError>) {
    let detail = if err.is_timeout() {
        format!("{err}. The operation has been issued and may still complete on the console.")
    } else {
        format!("got error: {err}")
    };
    diags.root_error(summary, detail);
}

pub(crate) fn check_errors(diags: &Diagnostics) -> Option<()> {
    if diags.errors.is_empty() {
        Some(())
    } else {
        None
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_strings_are_checked() {
        let mut diags = Diagnostics::default();
        check_not_empty(&mut diags, &value_string("prod"), "name");
        check_not_empty(&mut diags, &Value::Unknown, "name");
        assert!(check_errors(&diags).is_some());

        check_not_empty(&mut diags, &value_string(""), "name");
        check_not_empty(&mut diags, &Value::Null, "handle");
        assert_eq!(diags.errors.len(), 2);
        assert!(check_errors(&diags).is_none());
    }

    #[test]
    fn replacement_only_for_known_prior_values() {
        let mut triggers = Vec::new();
        replace_if_changed(&mut triggers, &Value::Null, &value_string("b"), "handle");
        replace_if_changed(
            &mut triggers,
            &value_string("a"),
            &value_string("a"),
            "name",
        );
        assert!(triggers.is_empty());

        replace_if_changed(
            &mut triggers,
            &value_string("a"),
            &value_string("b"),
            "handle",
        );
        assert_eq!(triggers, vec![AttributePath::new("handle")]);
    }

    #[test]
    fn git_ref_needs_both_parts() {
        assert!(git_ref(&value_string("main"), &Value::Null).is_none());
        let git = git_ref(&value_string("main"), &value_string("charts")).unwrap();
        assert_eq!(git.reference, "main");
        assert_eq!(git.folder, "charts");
    }
}
