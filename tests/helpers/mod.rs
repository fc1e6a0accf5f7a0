//! Test helpers: a virtual clock and a CloudSight mock server.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cloudsight::services::auth::Authorizer;
use cloudsight::services::clock::Clock;
use cloudsight::{ClassificationClient, ClientConfig, SimpleAuth};
use serde_json::{json, Value};
use wiremock::MockServer;

pub const TEST_KEY: &str = "test-key";

/// Clock whose `sleep` returns immediately after advancing virtual time.
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        })
    }

    /// Total virtual time slept so far.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }

    /// Every sleep requested, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        *self.elapsed.lock().unwrap() += duration;
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Client pointed at `server`, authorized with a simple key.
pub fn client_for(server: &MockServer, clock: Arc<ManualClock>) -> ClassificationClient {
    client_with_auth(server, clock, Box::new(SimpleAuth::new(TEST_KEY)))
}

pub fn client_with_auth(
    server: &MockServer,
    clock: Arc<ManualClock>,
    auth: Box<dyn Authorizer>,
) -> ClassificationClient {
    let config = ClientConfig {
        base_url: server.uri(),
        ..ClientConfig::default()
    };
    ClassificationClient::with_clock(config, auth, clock).expect("Failed to build client")
}

/// Response body for a job in the given status.
pub fn job_body(token: &str, status: &str) -> Value {
    json!({
        "token": token,
        "url": "https://example.com/cat.jpg",
        "status": status,
    })
}

/// Smallest valid PNG header, enough for format sniffing.
pub fn png_bytes() -> Vec<u8> {
    vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D]
}

/// Value of one `name="value"` pair in an OAuth authorization header.
pub fn oauth_param(header: &str, name: &str) -> Option<String> {
    let pairs = header.strip_prefix("OAuth ")?;
    pairs.split(", ").find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key != name {
            return None;
        }
        let value = value.trim_matches('"');
        urlencoding::decode(value).ok().map(|decoded| decoded.into_owned())
    })
}

/// Decoded fields of an `application/x-www-form-urlencoded` body.
pub fn parse_form(body: &[u8]) -> BTreeMap<String, String> {
    let decode = |raw: &str| {
        urlencoding::decode(&raw.replace('+', " "))
            .expect("Form field is not valid UTF-8")
            .into_owned()
    };
    String::from_utf8_lossy(body)
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(name), decode(value))
        })
        .collect()
}

/// The authorization header of a request the mock server received.
pub fn authorization(request: &wiremock::Request) -> String {
    request
        .headers
        .get("authorization")
        .expect("Request has no authorization header")
        .to_str()
        .unwrap()
        .to_string()
}
