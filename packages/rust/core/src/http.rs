//! JSON-over-HTTP plumbing shared by the upstream clients.

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;

use docbot_shared::{DocBotError, Result};

/// POST `body` as JSON to `{base}/{path}` and decode the JSON reply.
///
/// Transport failures, non-2xx statuses and undecodable bodies all become
/// [`DocBotError::Upstream`] tagged with `service`. Non-2xx errors carry the
/// status and response body.
pub(crate) async fn post_json<B, R>(
    client: &Client,
    service: &str,
    base: &str,
    path: &str,
    body: &B,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let url = format!("{base}/{path}");
    let resp = client
        .post(&url)
        .json(body)
        .send()
        .await
        .map_err(|e| DocBotError::upstream(service, e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        return Err(DocBotError::upstream(service, format!("{status}: {body}")));
    }

    resp.json()
        .await
        .map_err(|e| DocBotError::upstream(service, format!("invalid response from {path}: {e}")))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Reply {
        ok: bool,
    }

    #[tokio::test]
    async fn posts_json_and_decodes_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/things"))
            .and(body_json(json!({ "name": "x" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let base = format!("{}/v1", server.uri());
        let reply: Reply = post_json(&Client::new(), "svc", &base, "things", &json!({ "name": "x" }))
            .await
            .unwrap();
        assert!(reply.ok);
    }

    #[tokio::test]
    async fn failures_are_tagged_with_the_service() {
        let server = MockServer::start().await;
        Mock::given(path("/down"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;
        Mock::given(path("/garbled"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = Client::new();
        let err = post_json::<_, Reply>(&client, "svc", &server.uri(), "down", &json!({}))
            .await
            .unwrap_err();
        assert!(err.is_upstream());
        let message = err.to_string();
        assert!(message.starts_with("svc request failed: 503"), "{message}");
        assert!(message.contains("maintenance"), "{message}");

        let err = post_json::<_, Reply>(&client, "svc", &server.uri(), "garbled", &json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid response from garbled"), "{err}");
    }
}
