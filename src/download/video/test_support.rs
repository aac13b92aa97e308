use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use crate::download::DownloadClient;
use crate::options::Options;

/// Serves `body` honouring `Range: bytes=a-b` headers like a range-capable
/// media server. Requests starting at `fail_at` get a 500.
#[derive(Clone)]
pub struct RangeResponder {
    pub body: Arc<Vec<u8>>,
    pub fail_at: Option<u64>,
    pub requests: Arc<AtomicUsize>,
}

impl RangeResponder {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body: Arc::new(body),
            fail_at: None,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_at(mut self, start: u64) -> Self {
        self.fail_at = Some(start);
        self
    }
}

fn parse_range(value: &str) -> Option<(usize, usize)> {
    let (start, stop) = value.strip_prefix("bytes=")?.split_once('-')?;
    Some((start.parse().ok()?, stop.parse().ok()?))
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let range = request
            .headers
            .get("range")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_range);

        let Some((start, stop)) = range else {
            return ResponseTemplate::new(200).set_body_bytes(self.body.to_vec());
        };

        if self.fail_at == Some(start as u64) {
            return ResponseTemplate::new(500);
        }

        if start >= self.body.len() {
            return ResponseTemplate::new(416);
        }

        let stop = stop.min(self.body.len() - 1);
        ResponseTemplate::new(206).set_body_bytes(self.body[start..=stop].to_vec())
    }
}

/// Deterministic, non-repeating-per-chunk content.
pub fn media_bytes(length: usize) -> Vec<u8> {
    (0..length).map(|i| (i % 251) as u8).collect()
}

pub async fn mount_media(server: &MockServer, media_path: &str, responder: RangeResponder) {
    let length = responder.body.len();

    Mock::given(method("HEAD"))
        .and(path(media_path))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-length", length.to_string().as_str())
                .set_body_raw(vec![0u8; length], "video/mp4"),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(media_path))
        .respond_with(responder)
        .mount(server)
        .await;
}

pub fn client() -> DownloadClient {
    DownloadClient::new(&Options::default()).unwrap()
}
