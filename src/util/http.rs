//! HTTP client construction and response checking for the built-in tools.

use std::time::Duration;

use crate::error::PalaverError;

/// Build a reqwest client with a request timeout and user agent.
pub fn build_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client, PalaverError> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()?)
}

/// Send a GET and decode its JSON body, mapping every failure to
/// `ExternalService` for `tool`.
pub async fn get_json(
    tool: &str,
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value, PalaverError> {
    let response = request
        .send()
        .await
        .map_err(|e| PalaverError::external(tool, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PalaverError::external(
            tool,
            format!("HTTP {}: {}", status.as_u16(), truncate(&body, 200)),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| PalaverError::external(tool, format!("invalid JSON body: {e}")))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("北京北京", 2), "北京");
        assert_eq!(truncate("short", 200), "short");
    }
}
