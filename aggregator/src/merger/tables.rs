use crate::errors::{AggregatorError, Result};
use crate::executor::UpstreamResponse;
use crate::merger::scope;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::sync::LazyLock;

pub const QUERY_RESOURCE_TYPE: &str = "Microsoft.CostManagement/query";
pub const SUBSCRIPTION_COLUMN: &str = "_subscription";
pub const RESOURCE_GROUP_COLUMN: &str = "_resourceGroup";

static SUBSCRIPTION_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)subscriptions/([^/]+)").expect("valid regex"));
static RESOURCE_GROUP_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)resourceGroups/([^/]+)").expect("valid regex"));

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct TableDocument {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub properties: TableProperties,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct TableProperties {
    pub columns: Vec<JsonValue>,
    pub rows: Vec<Vec<JsonValue>>,
}

/// Shape of one upstream cost query result. Fields other than these are dropped.
#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    id: Option<String>,
    properties: TableProperties,
}

/// Subscription and resource group named by a query result id
#[derive(Debug, Default, PartialEq)]
struct Provenance {
    subscription: Option<String>,
    resource_group: Option<String>,
}

impl Provenance {
    fn from_id(id: Option<&str>) -> Self {
        let capture = |pattern: &Regex| {
            id.and_then(|id| pattern.captures(id))
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };
        Self {
            subscription: capture(&SUBSCRIPTION_TOKEN),
            resource_group: capture(&RESOURCE_GROUP_TOKEN),
        }
    }
}

fn token_cell(token: &Option<String>) -> JsonValue {
    token
        .as_ref()
        .map_or(JsonValue::Null, |t| JsonValue::String(t.clone()))
}

fn parse_result(response: &UpstreamResponse) -> Result<QueryResult> {
    serde_json::from_slice(&response.body).map_err(|e| {
        AggregatorError::MergeFailed(format!("unexpected cost query result: {e}"))
    })
}

/// Concatenates the rows of every cost query result under the first result's columns.
///
/// Each row gets its source's subscription, and its resource group when the first
/// result was scoped to one.
///
/// Every row of every result, later results included, must have exactly as many
/// values as the first result has columns. Later results' own column lists are not
/// consulted. A row of any other width fails the whole merge with
/// [`AggregatorError::MergeFailed`]; rows are never padded or truncated.
pub fn merge_tables(
    responses: Vec<UpstreamResponse>,
    first_scope: &str,
    suffix: &str,
) -> Result<TableDocument> {
    let mut results = responses.iter().map(parse_result);

    let first = results
        .next()
        .ok_or_else(|| AggregatorError::MergeFailed("no cost query results to merge".into()))??;

    let first_provenance = Provenance::from_id(first.id.as_deref());
    let with_resource_group = first_provenance.resource_group.is_some();
    let width = first.properties.columns.len();

    let mut columns = first.properties.columns;
    columns.push(json!({"name": SUBSCRIPTION_COLUMN, "type": "String"}));
    if with_resource_group {
        columns.push(json!({"name": RESOURCE_GROUP_COLUMN, "type": "String"}));
    }

    let mut rows = Vec::new();
    let mut append = |result_rows: Vec<Vec<JsonValue>>, provenance: &Provenance| -> Result<()> {
        for mut row in result_rows {
            if row.len() != width {
                return Err(AggregatorError::MergeFailed(format!(
                    "row has {} values but the result has {width} columns",
                    row.len()
                )));
            }
            row.push(token_cell(&provenance.subscription));
            if with_resource_group {
                row.push(token_cell(&provenance.resource_group));
            }
            rows.push(row);
        }
        Ok(())
    };

    append(first.properties.rows, &first_provenance)?;
    for result in results {
        let result = result?;
        let provenance = Provenance::from_id(result.id.as_deref());
        append(result.properties.rows, &provenance)?;
    }

    Ok(TableDocument {
        id: scope::synthetic_id(first_scope, suffix),
        name: suffix.to_string(),
        resource_type: QUERY_RESOURCE_TYPE.to_string(),
        properties: TableProperties { columns, rows },
    })
}
