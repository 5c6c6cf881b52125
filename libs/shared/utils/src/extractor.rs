use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use http::HeaderValue;

use shared_models::TraceContext;

pub const APPLICATION_ID_HEADER: &str = "application-id";
pub const TRANSACTION_ID_HEADER: &str = "transaction-id";

// Seeds a TraceContext from the request headers and echoes the transaction id back.
// The state is the application id used when the caller sends none.
pub async fn trace_context_middleware(
    State(default_application_id): State<String>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = {
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        TraceContext::from_parts_or(
            &default_application_id,
            header(APPLICATION_ID_HEADER).as_deref(),
            header(TRANSACTION_ID_HEADER).as_deref(),
        )
    };
    let transaction_id = ctx.transaction_id.clone();

    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&transaction_id) {
        response.headers_mut().insert(TRANSACTION_ID_HEADER, value);
    }
    response
}
