//! Decoding of page-to-host script messages
//!
//! Pages reach the host in two ways: by navigating to the surface's custom
//! scheme (`myapp://login?data=...`), or by posting a message body through the
//! engine's script message handler. Posted bodies use the same JSON shape as
//! the other Passport web views: `{"method": "...", "data": ...}`.

use serde::Deserialize;
use serde_json::Value;
use url::Url;

/// Method name used for posted bodies that are not JSON messages
pub const RAW_MESSAGE_METHOD: &str = "message";

/// A message from page content to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptMessage {
    /// Handler name chosen by the page
    pub method: String,
    /// Payload, already decoded
    pub data: String,
}

#[derive(Deserialize)]
struct PostedMessage {
    method: String,
    #[serde(default)]
    data: Value,
}

impl ScriptMessage {
    /// Creates a message
    pub fn new(method: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            data: data.into(),
        }
    }

    /// Decode an intercepted custom-scheme navigation
    ///
    /// The method is the URL host (or the path when there is no host). A
    /// `data` query parameter is percent-decoded; any other query is passed
    /// through untouched.
    pub fn from_intercepted_url(url: &Url) -> Self {
        let method = url
            .host_str()
            .filter(|host| !host.is_empty())
            .unwrap_or_else(|| url.path().trim_matches('/'))
            .to_string();

        let data = match url.query() {
            None => String::new(),
            Some(query) => url
                .query_pairs()
                .find(|(key, _)| key == "data")
                .map(|(_, value)| value.into_owned())
                .unwrap_or_else(|| query.to_string()),
        };

        Self { method, data }
    }

    /// Decode a body posted by page script
    pub fn from_posted_body(body: &str) -> Self {
        match serde_json::from_str::<PostedMessage>(body) {
            Ok(posted) => Self {
                method: posted.method,
                data: match posted.data {
                    Value::Null => String::new(),
                    Value::String(data) => data,
                    other => other.to_string(),
                },
            },
            Err(err) => {
                log::debug!("Posted message is not a JSON method call ({err}), passing it through");
                Self::new(RAW_MESSAGE_METHOD, body)
            }
        }
    }
}
