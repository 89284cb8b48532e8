use crate::errors::{AggregatorError, Result};
use crate::template::{ConcreteRequest, ParameterBinding};
use crate::upstream::UpstreamClient;
use hyper::body::Bytes;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Raw body of one successful upstream call, tagged with the binding that produced it
#[derive(Clone, Debug)]
pub struct UpstreamResponse {
    pub binding: ParameterBinding,
    pub body: Bytes,
}

/// Executes a batch of upstream requests concurrently.
///
/// At most `max_concurrency` calls are in flight at once. Responses are returned in
/// request order. The batch is all-or-nothing: the first failed call aborts every
/// call still pending or in flight, and its error is returned.
#[derive(Clone)]
pub struct FanOutExecutor {
    upstream: UpstreamClient,
    max_concurrency: usize,
}

impl FanOutExecutor {
    pub fn new(upstream: UpstreamClient, max_concurrency: usize) -> Self {
        Self {
            upstream,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub async fn execute(
        &self,
        requests: Vec<ConcreteRequest>,
        token: &str,
    ) -> Result<Vec<UpstreamResponse>> {
        let total = requests.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let token: Arc<str> = Arc::from(token);
        let mut join_set = JoinSet::new();

        for (index, request) in requests.into_iter().enumerate() {
            let upstream = self.upstream.clone();
            let semaphore = semaphore.clone();
            let token = token.clone();

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| AggregatorError::InternalError(e.to_string()))?;

                let body = upstream.send(&request, &token).await?;
                Ok::<_, AggregatorError>((
                    index,
                    UpstreamResponse {
                        binding: request.binding,
                        body,
                    },
                ))
            });
        }

        let mut slots: Vec<Option<UpstreamResponse>> = (0..total).map(|_| None).collect();

        while let Some(joined) = join_set.join_next().await {
            let outcome = joined
                .map_err(|e| AggregatorError::InternalError(format!("Upstream task failed: {e}")))
                .and_then(|result| result);

            match outcome {
                Ok((index, response)) => slots[index] = Some(response),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        aborted = join_set.len(),
                        "Aborting fan-out after upstream failure"
                    );
                    join_set.abort_all();
                    return Err(e);
                }
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.ok_or_else(|| {
                    AggregatorError::InternalError("Upstream task finished without a result".into())
                })
            })
            .collect()
    }
}
