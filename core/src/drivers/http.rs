//! JSON-over-HTTP plumbing shared by the vendor drivers.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use tracing::{debug, error};

use super::DriverError;

/// Builds a header map from `(name, value)` pairs.
pub fn header_map(driver: &'static str, pairs: &[(&str, &str)]) -> Result<HeaderMap, DriverError> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| DriverError::Config {
            driver,
            message: format!("Invalid header name `{name}`: {e}"),
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| DriverError::Config {
            driver,
            message: format!("Invalid value for header `{name}`: {e}"),
        })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// `Authorization: Bearer <key>` plus a JSON content type.
pub fn bearer_headers(driver: &'static str, api_key: &str) -> Result<HeaderMap, DriverError> {
    let bearer = format!("Bearer {api_key}");
    let mut headers = header_map(driver, &[(AUTHORIZATION.as_str(), bearer.as_str())])?;
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

/// POSTs `body` to `url` and returns the decoded JSON answer.
pub async fn post_json(
    client: &reqwest::Client,
    driver: &'static str,
    operation: &'static str,
    url: &str,
    headers: &HeaderMap,
    body: &Value,
) -> Result<Value, DriverError> {
    debug!(driver, operation, url, "Sending request");
    let request = client.post(url).headers(headers.clone()).json(body);
    send_json(request, driver, operation, url).await
}

/// GETs `url` and returns the decoded JSON answer.
pub async fn get_json(
    client: &reqwest::Client,
    driver: &'static str,
    operation: &'static str,
    url: &str,
    headers: &HeaderMap,
) -> Result<Value, DriverError> {
    debug!(driver, operation, url, "Sending request");
    let request = client.get(url).headers(headers.clone());
    send_json(request, driver, operation, url).await
}

async fn send_json(
    request: reqwest::RequestBuilder,
    driver: &'static str,
    operation: &'static str,
    url: &str,
) -> Result<Value, DriverError> {
    let response = request.send().await.map_err(|e| {
        error!(error = ?e, driver, operation, "Request failed");
        DriverError::from_reqwest(driver, operation, url, &e)
    })?;

    let status = response.status();
    debug!(%status, driver, operation, "Received API response");

    if status.is_success() {
        response.json::<Value>().await.map_err(|e| {
            error!(error = ?e, driver, operation, "Failed to parse response JSON");
            DriverError::protocol(driver, operation, format!("Failed to parse response JSON: {e}"))
        })
    } else {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error (failed to read response body)".to_string());
        error!(%status, driver, operation, "Provider returned an error");
        Err(DriverError::from_response(
            driver,
            operation,
            url,
            status.as_u16(),
            body,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bearer_headers() {
        let headers = bearer_headers("D", "abc").unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer abc");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_invalid_header_value() {
        let err = header_map("D", &[("x-key", "bad\nvalue")]).unwrap_err();
        assert!(matches!(err, DriverError::Config { driver: "D", .. }));
    }

    #[tokio::test]
    async fn test_post_json_maps_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/thing")
            .with_status(401)
            .with_body("bad key")
            .create_async()
            .await;
        let url = format!("{}/v1/thing", server.url());
        let err = post_json(
            &reqwest::Client::new(),
            "D",
            "op",
            &url,
            &HeaderMap::new(),
            &json!({}),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            DriverError::Unauthorized {
                driver: "D",
                operation: "op",
                message: "bad key".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_post_json_rejects_non_json() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;
        let err = post_json(
            &reqwest::Client::new(),
            "D",
            "op",
            &server.url(),
            &HeaderMap::new(),
            &json!({}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DriverError::Protocol { .. }));
    }
}
