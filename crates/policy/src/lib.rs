//! Wildcard check for IAM policy documents.
//!
//! Walks `PolicyDocument.Statement` (object or array) and each statement's
//! `Resource` (string or array of strings) looking for a `*`. Missing fields
//! count as "no wildcard"; fields of any other JSON type are errors.

use serde_json::Value as Json;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("malformed policy JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("value of \"{field}\" is {reason}")]
    UnexpectedShape { field: &'static str, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, PolicyError>;

const WILDCARD: char = '*';

/// Parses one JSON document. Empty or invalid text is an error.
pub fn parse(text: &str) -> Result<Json> {
    Ok(serde_json::from_str(text)?)
}

/// `true` when no `Resource` reachable from the document contains a `*`.
pub fn is_asterisk_free(text: &str) -> Result<bool> {
    let doc = parse(text)?;
    is_document_asterisk_free(&doc)
}

pub fn is_document_asterisk_free(doc: &Json) -> Result<bool> {
    Ok(!has_wildcard_in_any_statement(doc)?)
}

/// Scans `PolicyDocument.Statement`, stopping at the first statement with a
/// wildcard resource. Statements after that one are not looked at.
pub fn has_wildcard_in_any_statement(doc: &Json) -> Result<bool> {
    let Some(statements) = doc.get("PolicyDocument").and_then(|d| d.get("Statement")) else {
        trace!("no PolicyDocument.Statement");
        return Ok(false);
    };

    match statements {
        Json::Array(items) => {
            for (ix, statement) in items.iter().enumerate() {
                if statement_has_wildcard(Some(statement))? {
                    debug!(statement = ix, "wildcard resource found");
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Json::Object(_) => statement_has_wildcard(Some(statements)),
        _ => Err(PolicyError::UnexpectedShape {
            field: "Statement",
            reason: "neither an object nor an array",
        }),
    }
}

/// Checks one statement's `Resource` field.
///
/// A missing statement, or one that is not an object, has no resources and
/// yields `false` rather than an error.
pub fn statement_has_wildcard(statement: Option<&Json>) -> Result<bool> {
    let Some(Json::Object(fields)) = statement else {
        return Ok(false);
    };
    let Some(resource) = fields.get("Resource") else {
        trace!("statement has no Resource");
        return Ok(false);
    };

    match resource {
        Json::Array(items) => {
            for item in items {
                if resource_value_has_wildcard(item)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Json::String(s) => Ok(resource_has_wildcard(s)),
        _ => Err(PolicyError::UnexpectedShape {
            field: "Resource",
            reason: "neither a string nor an array",
        }),
    }
}

/// Wildcard test for a single resource value, which must be a JSON string.
pub fn resource_value_has_wildcard(resource: &Json) -> Result<bool> {
    match resource {
        Json::String(s) => Ok(resource_has_wildcard(s)),
        _ => Err(PolicyError::UnexpectedShape {
            field: "Resource",
            reason: "not a string",
        }),
    }
}

pub fn resource_has_wildcard(resource: &str) -> bool {
    let found = resource.contains(WILDCARD);
    if found {
        debug!(resource, "wildcard in resource");
    }
    found
}
