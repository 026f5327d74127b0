//! Axum adapter for the edge filter

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::filter::{AuthOutcome, RequestView, rewrite_credentials};
use crate::server::AppState;

/// Runs the edge filter and either forwards the request or answers with the
/// rejection.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let outcome = {
        let view = RequestView::new(req.method(), req.uri().path(), req.headers());
        state.filter.evaluate(view).await
    };
    state.metrics.record_decision(outcome.decision());

    match outcome {
        AuthOutcome::Allow => next.run(req).await,
        AuthOutcome::AllowWithRewrittenHeaders(pair) => {
            if let Err(err) = rewrite_credentials(req.headers_mut(), &pair) {
                return err.into_response();
            }
            next.run(req).await
        }
        AuthOutcome::Reject(status) => status.into_response(),
    }
}
