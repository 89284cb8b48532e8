//! Resource Manager Aggregation Handler
//!
//! Turns one inbound call into N resource manager `GET` calls and merges the
//! results into a single collection.
//!
//! # Request Format
//!
//! - **Method**: `GET` (default route `/api/arm`)
//! - **`armRoute`** (required): a resource manager route in which whole path
//!   segments of the form `$name` are placeholders, e.g.
//!   `/subscriptions/$subscriptions/resourceGroups/$resourceGroups/providers/Microsoft.Web/sites/$sites?api-version=2022-03-01`
//! - **`resourceIds`** (required): comma-separated resource ids, each optionally
//!   wrapped in single quotes.
//!
//! Every placeholder is resolved against each resource id by segment name: the
//! value of `$sites` is the segment following `sites` in the id. The query string
//! of `armRoute` is sent unchanged.
//!
//! # Response Format
//!
//! ```json
//! {
//!   "value": [
//!     {
//!       "name": "siteA",
//!       "gateway": {"subscriptions": "1", "resourceGroups": "g", "sites": "siteA"}
//!     }
//!   ]
//! }
//! ```
//!
//! Upstream collections (bodies with a `value` array) are flattened; any other
//! body is a single item. Each item carries a `gateway` object with the
//! placeholder values that produced it.

use crate::api::params::{required_list, required_param};
use crate::errors::Result;
use crate::handler::{Handler, SplitRequest};
use crate::merger::ResultMerger;
use crate::template::RouteTemplate;
use hyper::Request;
use hyper::body::Bytes;

pub const ROUTE_PARAM: &str = "armRoute";
pub const RESOURCE_IDS_PARAM: &str = "resourceIds";

pub struct ArmAggregateHandler;

impl Handler for ArmAggregateHandler {
    fn name(&self) -> &'static str {
        "arm_aggregate"
    }

    fn split_request(&self, request: &Request<Bytes>) -> Result<SplitRequest> {
        let template = RouteTemplate::parse(&required_param(request, ROUTE_PARAM)?);
        let resource_ids = required_list(request, RESOURCE_IDS_PARAM)?;

        Ok(SplitRequest {
            requests: template.expand_all(&resource_ids)?,
            merger: ResultMerger::ItemUnion,
        })
    }
}
