use crate::errors::{AggregatorError, Result};
use crate::resource_id::parse_list;
use hyper::Request;

/// Returns the decoded value of the first query parameter named `name`.
pub fn query_param<B>(request: &Request<B>, name: &str) -> Option<String> {
    let query = request.uri().query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// A query parameter that must be present and non-blank.
pub fn required_param<B>(request: &Request<B>, name: &str) -> Result<String> {
    query_param(request, name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AggregatorError::InvalidInput(format!("missing required parameter '{name}'")))
}

/// A comma-separated list parameter that must name at least one entry.
pub fn required_list<B>(request: &Request<B>, name: &str) -> Result<Vec<String>> {
    let entries = parse_list(&required_param(request, name)?);
    if entries.is_empty() {
        return Err(AggregatorError::InvalidInput(format!(
            "parameter '{name}' lists no entries"
        )));
    }
    Ok(entries)
}
