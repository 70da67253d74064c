//! Directive parsing
//!
//! Directive strings are the wire format carried verbatim in the descriptor
//! spec: `removeAnyFinalizers`, `addFinalizer:<name>`, `addLabel:<key>:<value>`,
//! `removeLabel:<key>`, `scale:<integer>`. They are parsed once at the
//! boundary into a tagged variant; executors never look at raw strings.

use crate::error::{Error, Result};

const TOKEN_REMOVE_FINALIZERS: &str = "removeAnyFinalizers";
const TOKEN_ADD_FINALIZER: &str = "addFinalizer";
const TOKEN_ADD_LABEL: &str = "addLabel";
const TOKEN_REMOVE_LABEL: &str = "removeLabel";
const TOKEN_SCALE: &str = "scale";

/// One mutation to apply to the resolved target object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    RemoveAllFinalizers,
    AddFinalizer(String),
    AddLabel { key: String, value: String },
    RemoveLabel(String),
    Scale(i32),
}

/// A parsed directive, keeping the raw string for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub action: Action,
    pub raw: String,
}

impl Directive {
    /// Parses a raw directive string.
    ///
    /// Action tokens are recognized by substring containment rather than
    /// exact prefix matching; descriptors in the wild rely on that leniency.
    /// Strings matching no token are a deliberate no-op and parse to `None`.
    /// Malformed arguments for a recognized token are rejected with
    /// `InvalidArgument`.
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let action = if raw.contains(TOKEN_REMOVE_FINALIZERS) {
            Action::RemoveAllFinalizers
        } else if raw.contains(TOKEN_ADD_FINALIZER) {
            Action::AddFinalizer(single_argument(raw, TOKEN_ADD_FINALIZER)?)
        } else if raw.contains(TOKEN_ADD_LABEL) {
            let (key, value) = label_arguments(raw)?;
            Action::AddLabel { key, value }
        } else if raw.contains(TOKEN_REMOVE_LABEL) {
            Action::RemoveLabel(single_argument(raw, TOKEN_REMOVE_LABEL)?)
        } else if raw.contains(TOKEN_SCALE) {
            Action::Scale(replica_argument(raw)?)
        } else {
            return Ok(None);
        };

        Ok(Some(Directive {
            action,
            raw: raw.to_string(),
        }))
    }
}

fn invalid(raw: &str, reason: &str) -> Error {
    Error::InvalidArgument {
        raw: raw.to_string(),
        reason: reason.to_string(),
    }
}

/// Splits on `:` and returns the segments following the one holding the
/// action token.
fn segments_after_token<'a>(raw: &'a str, token: &str) -> Vec<&'a str> {
    let segments: Vec<&str> = raw.split(':').collect();
    let position = segments
        .iter()
        .position(|segment| segment.contains(token))
        .unwrap_or(0);
    segments[position + 1..].to_vec()
}

fn single_argument(raw: &str, token: &str) -> Result<String> {
    match segments_after_token(raw, token).first() {
        Some(argument) if !argument.is_empty() => Ok((*argument).to_string()),
        _ => Err(invalid(raw, "missing argument after ':'")),
    }
}

fn label_arguments(raw: &str) -> Result<(String, String)> {
    let segments = segments_after_token(raw, TOKEN_ADD_LABEL);
    match (segments.first(), segments.get(1)) {
        (Some(key), Some(value)) if !key.is_empty() && !value.is_empty() => {
            Ok(((*key).to_string(), (*value).to_string()))
        }
        _ => Err(invalid(raw, "expected '<key>:<value>' after the action token")),
    }
}

fn replica_argument(raw: &str) -> Result<i32> {
    let argument = single_argument(raw, TOKEN_SCALE)?;
    let replicas: i32 = argument
        .parse()
        .map_err(|_| invalid(raw, "replica count must be an integer"))?;
    if replicas < 0 {
        return Err(invalid(raw, "replica count must not be negative"));
    }
    Ok(replicas)
}
