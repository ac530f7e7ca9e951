use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::{HOST, LOCATION};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rewriter_engine::{InboundRequest, RewriteOutcome};
use tracing::{debug, error};
use url::Url;

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Answers with `301 Moved Permanently` when a rule matches the request,
/// otherwise hands the request on unchanged.
pub async fn rewrite(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(inbound) = inbound_request(&state, &request) else {
        return next.run(request).await;
    };

    match state.pipeline.process(&inbound).await {
        RewriteOutcome::Redirect { location, .. } => match HeaderValue::from_str(location.as_str()) {
            Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(LOCATION, location)]).into_response(),
            Err(e) => {
                error!(location = %location, error = %e, "cannot emit redirect");
                next.run(request).await
            }
        },
        RewriteOutcome::Passthrough => next.run(request).await,
    }
}

fn inbound_request(state: &AppState, request: &Request) -> Option<InboundRequest> {
    let uri = request.uri();

    let host = uri
        .authority()
        .map(|authority| authority.as_str())
        .or_else(|| header(request.headers(), HOST.as_str()))?;

    let scheme = uri
        .scheme_str()
        .or_else(|| {
            header(request.headers(), FORWARDED_PROTO)
                .and_then(|value| value.split(',').next())
                .map(str::trim)
        })
        .unwrap_or(&state.default_scheme);

    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());

    let url = match Url::parse(&format!("{scheme}://{host}{path_and_query}")) {
        Ok(url) => url,
        Err(e) => {
            debug!(host, path = path_and_query, error = %e, "cannot build absolute request URL");
            return None;
        }
    };

    let site = state.sites.resolve(url.host_str().unwrap_or_default());

    Some(InboundRequest::new(request.method().as_str(), url, site).with_raw_path(uri.path()))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
