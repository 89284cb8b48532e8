//! Merging of fan-out responses into one document.
//!
//! `ItemUnion` concatenates collection items and tags each with the parameters
//! that produced it. `ColumnUnion` concatenates the rows of tabular cost query
//! results and appends provenance columns to the schema of the first response.

pub mod items;
pub mod scope;
pub mod tables;

use crate::errors::Result;
use crate::executor::UpstreamResponse;
use hyper::body::Bytes;
use serde::Serialize;
use uuid::Uuid;

pub use items::ItemDocument;
pub use tables::TableDocument;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResultMerger {
    ItemUnion,
    /// `scope` is the first requested scope; it names the merged result.
    ColumnUnion { scope: String },
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MergedDocument {
    Items(ItemDocument),
    Table(TableDocument),
}

impl MergedDocument {
    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

impl ResultMerger {
    pub fn name(&self) -> &'static str {
        match self {
            ResultMerger::ItemUnion => "item_union",
            ResultMerger::ColumnUnion { .. } => "column_union",
        }
    }

    /// Merges responses in the order given, which is the order they were requested.
    pub fn merge(&self, responses: Vec<UpstreamResponse>) -> Result<MergedDocument> {
        match self {
            ResultMerger::ItemUnion => items::merge_items(responses).map(MergedDocument::Items),
            ResultMerger::ColumnUnion { scope } => {
                let suffix = Uuid::new_v4().to_string();
                tables::merge_tables(responses, scope, &suffix).map(MergedDocument::Table)
            }
        }
    }
}
