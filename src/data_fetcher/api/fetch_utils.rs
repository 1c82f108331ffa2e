//! Generic HTTP fetching utilities with status classification and error handling

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument};

use crate::error::AppError;

/// Fetches `url` with a GET and parses the JSON body.
///
/// No retries: a failed request is reported once and the caller decides
/// whether to skip it.
///
/// # Arguments
/// * `client` - HTTP client for making requests
/// * `url` - URL to fetch data from
///
/// # Returns
/// * `Result<T, AppError>` - Parsed response data or error
#[instrument(skip(client))]
pub async fn fetch<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T, AppError> {
    info!("Fetching data from URL: {url}");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| map_request_error(e, url))?;

    read_json(response, url).await
}

/// Converts a transport-level reqwest error into the matching `AppError`.
pub fn map_request_error(e: reqwest::Error, url: &str) -> AppError {
    error!("Request failed for URL {}: {}", url, e);
    if e.is_timeout() {
        AppError::network_timeout(url)
    } else if e.is_connect() {
        AppError::network_connection(url, e.to_string())
    } else {
        AppError::ApiFetch(e)
    }
}

/// Maps a non-success HTTP status to a specific error type.
pub fn status_error(status: StatusCode, message: &str, url: &str) -> AppError {
    let status_code = status.as_u16();
    let reason = if message.is_empty() {
        status.canonical_reason().unwrap_or("Unknown error")
    } else {
        message
    };

    error!("HTTP {} - {} (URL: {})", status_code, reason, url);

    match status_code {
        404 => AppError::api_not_found(url),
        429 => AppError::api_rate_limit(reason, url),
        400..=499 => AppError::api_client_error(status_code, reason, url),
        502 | 503 => AppError::api_service_unavailable(status_code, reason, url),
        _ => AppError::api_server_error(status_code, reason, url),
    }
}

/// Checks the status of `response` and parses its body as JSON.
pub async fn read_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, AppError> {
    let status = response.status();
    debug!("Response status: {status}");

    let response_text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to read response text from URL {}: {}", url, e);
            return Err(AppError::ApiFetch(e));
        }
    };

    if !status.is_success() {
        return Err(status_error(status, &error_message(&response_text), url));
    }

    debug!("Response length: {} bytes", response_text.len());
    let preview: String = response_text.chars().take(1024).collect();
    debug!("Response text (first 1024 chars): {preview}");

    match serde_json::from_str::<T>(&response_text) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            error!("Failed to parse API response: {} (URL: {})", e, url);
            error!(
                "Response text (first 200 chars): {}",
                &response_text.chars().take(200).collect::<String>()
            );

            // Check if it's malformed JSON vs unexpected structure
            if response_text.trim().is_empty() {
                Err(AppError::api_no_data("Response body is empty", url))
            } else if !response_text.trim_start().starts_with('{')
                && !response_text.trim_start().starts_with('[')
            {
                Err(AppError::api_malformed_json(
                    "Response is not valid JSON",
                    url,
                ))
            } else {
                Err(AppError::api_unexpected_structure(e.to_string(), url))
            }
        }
    }
}

/// Pulls `error.message` out of a Google-style JSON error body, if present.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_default()
}
