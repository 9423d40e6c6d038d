use anyhow::Context;
use serde_json::Value;

use crate::ApiClient;

/// Read-only status surface of the twins the credentials can see.
pub struct StatusApi<'a> {
    client: &'a dyn ApiClient,
}

impl<'a> StatusApi<'a> {
    const ALL_TWINS_URL: &'static str = "/status";

    pub fn new(client: &'a dyn ApiClient) -> Self {
        Self { client }
    }

    /// Returns the status of a single twin.
    pub fn twin_status(&self, eco_twin_id: &str) -> Result<Value, anyhow::Error> {
        let path = format!("/twins/{}/status", eco_twin_id);

        let reply = self.client.http_get(&path, &[])?;

        serde_json::from_str(&reply).with_context(|| format!("parsing reply of {}", path))
    }

    /// Returns the status of every authorized twin.
    pub fn all_twins_status(&self) -> Result<Vec<Value>, anyhow::Error> {
        let reply = self.client.http_get(Self::ALL_TWINS_URL, &[])?;

        serde_json::from_str(&reply)
            .with_context(|| format!("parsing reply of {}", Self::ALL_TWINS_URL))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use anyhow::bail;
    use serde_json::json;

    use super::*;

    struct FakeClient {
        gets: RefCell<Vec<String>>,
        reply: Result<String, String>,
    }

    impl FakeClient {
        fn replying(reply: Result<&str, &str>) -> Self {
            FakeClient {
                gets: RefCell::new(vec![]),
                reply: reply.map(str::to_string).map_err(str::to_string),
            }
        }
    }

    impl ApiClient for FakeClient {
        fn http_get(&self, path: &str, _: &[(String, String)]) -> Result<String, anyhow::Error> {
            self.gets.borrow_mut().push(path.to_string());
            self.reply.clone().map_err(anyhow::Error::msg)
        }

        fn http_put(&self, _: &str, _: &str) -> Result<String, anyhow::Error> {
            bail!("status reads never issue PUTs")
        }
    }

    #[test]
    fn twin_status_hits_the_twin_endpoint() {
        let client = FakeClient::replying(Ok(r#"{"state": "running", "soc": 0.8}"#));

        let status = StatusApi::new(&client).twin_status("twin-3").unwrap();

        assert_eq!(client.gets.borrow()[0], "/twins/twin-3/status");
        assert_eq!(status["state"], "running");
    }

    #[test]
    fn all_twins_status_returns_the_parsed_list() {
        let client = FakeClient::replying(Ok(r#"[{"id": "a"}, {"id": "b"}]"#));

        let statuses = StatusApi::new(&client).all_twins_status().unwrap();

        assert_eq!(client.gets.borrow()[0], "/status");
        assert_eq!(statuses, vec![json!({"id": "a"}), json!({"id": "b"})]);
    }

    #[test]
    fn transport_errors_propagate() {
        let client = FakeClient::replying(Err("HTTP 401 (InvalidToken): nope"));

        let err = StatusApi::new(&client).twin_status("twin-3").unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn malformed_reply_is_a_parse_error() {
        let client = FakeClient::replying(Ok("<html>gateway timeout</html>"));

        let err = StatusApi::new(&client).all_twins_status().unwrap_err();
        assert!(err.to_string().contains("parsing reply"));
    }
}
