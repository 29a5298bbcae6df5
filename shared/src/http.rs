//! Response helpers shared by the HTTP routes.

use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::ApiError;

pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(value)?.into())
        .map_err(Box::new)?)
}

pub fn no_content() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::Empty)
        .map_err(Box::new)?)
}

pub fn preflight() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header(
            "Access-Control-Allow-Methods",
            "GET,POST,PUT,PATCH,DELETE,OPTIONS",
        )
        .header(
            "Access-Control-Allow-Headers",
            "Content-Type,Authorization,X-User-Id",
        )
        .body(Body::Empty)
        .map_err(Box::new)?)
}

pub fn error(err: &ApiError) -> Result<Response<Body>, Error> {
    json(err.status(), &err.to_response_body())
}

pub fn method_not_allowed() -> Result<Response<Body>, Error> {
    json(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({"error": "Method not allowed"}),
    )
}

/// Turns a route outcome into a response; API errors become JSON bodies,
/// only response-building failures reach the runtime.
pub fn respond(result: Result<Response<Body>, ApiError>) -> Result<Response<Body>, Error> {
    match result {
        Ok(resp) => Ok(resp),
        Err(err) => {
            match &err {
                ApiError::Config(_) | ApiError::Backend(_) => tracing::error!("Request failed: {}", err),
                _ => tracing::info!("Request rejected: {}", err),
            }
            error(&err)
        }
    }
}

pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Request body is required".to_string()));
    }
    match serde_json::from_slice(body) {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::error!("Failed to parse request body: {}", e);
            Err(e.into())
        }
    }
}

/// Like [`parse_body`] but an absent body yields the type's default.
pub fn parse_optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ApiError> {
    if body.is_empty() {
        Ok(T::default())
    } else {
        parse_body(body)
    }
}

/// Wraps a serializable value into an `Ok` JSON response with `status`.
pub fn reply<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, ApiError> {
    json(status, value).map_err(|e| ApiError::Backend(format!("failed to build response: {}", e)))
}
