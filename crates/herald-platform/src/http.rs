//! Shared response handling for platform clients.

use reqwest::Response;

use crate::PlatformError;

/// Standard error body most of the platforms return.
#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    #[serde(alias = "error")]
    message: String,
}

/// Map a non-success response to the [`PlatformError`] taxonomy.
///
/// `resource` and `id` label the record for 404 mapping; pass an empty id
/// for collection-level requests.
pub(crate) async fn check(
    resource: &str,
    id: &str,
    response: Response,
) -> Result<Response, PlatformError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());
        return Err(PlatformError::RateLimited { retry_after_secs });
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(PlatformError::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        });
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .map(|b| b.message)
        .unwrap_or(text);

    match status.as_u16() {
        401 | 403 => Err(PlatformError::Auth(message)),
        400 | 422 => Err(PlatformError::Validation(message)),
        code => Err(PlatformError::Api {
            status: code,
            message,
        }),
    }
}
