//! [`Transport`] over reqwest.

use super::classify::{classify_middleware_error, classify_reqwest_error, classify_status};
use super::client::{create_http_client, HttpClientConfig};
use super::sink::{
    ResourceTracker, Transport, TransportHandle, TransportOutcome, TransportSink,
};

use bytes::BytesMut;
use futures::StreamExt;
use reqwest::Url;
use reqwest_middleware::ClientWithMiddleware;
use tracing::debug;

// Upper bound for the initial body buffer, whatever Content-Length claims.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// Streams a GET into memory, reporting progress per chunk.
///
/// Each transfer runs on its own Tokio task, so [`Transport::start`] must be
/// called from within a Tokio runtime.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ClientWithMiddleware,
    resources: ResourceTracker,
}

impl HttpTransport {
    /// Transport over an existing middleware client.
    pub fn new(client: ClientWithMiddleware) -> Self {
        Self {
            client,
            resources: ResourceTracker::new(),
        }
    }

    /// Build the client from `config`.
    pub fn from_config(config: HttpClientConfig) -> Result<Self, reqwest::Error> {
        create_http_client(config).map(Self::new)
    }
}

impl Transport for HttpTransport {
    fn start(&self, url: &Url, sink: TransportSink) -> TransportHandle {
        let handle = TransportHandle::new();
        let token = handle.token();
        let client = self.client.clone();
        let resources = self.resources.clone();
        let url = url.clone();

        tokio::spawn(async move {
            // Every resource of the transfer lives inside `fetch` and is
            // dropped by the time `select!` returns.
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => TransportOutcome::Cancelled,
                outcome = fetch(&client, &url, &sink, &resources) => outcome,
            };
            debug!("Transfer {} finished", sink.ticket());
            sink.finish(outcome);
        });

        handle
    }

    fn live_resources(&self) -> usize {
        self.resources.live()
    }
}

async fn fetch(
    client: &ClientWithMiddleware,
    url: &Url,
    sink: &TransportSink,
    resources: &ResourceTracker,
) -> TransportOutcome {
    let _lease = resources.acquire();

    debug!("Fetching {}", url);
    let res = match client.get(url.as_str()).send().await {
        Ok(res) => res,
        Err(e) => {
            debug!("Request for {} failed: {}", url, e);
            return TransportOutcome::Failed(classify_middleware_error(&e));
        }
    };

    if let Some(kind) = classify_status(res.status()) {
        debug!("{} answered {}", url, res.status());
        return TransportOutcome::Failed(kind);
    }

    let total = res.content_length().unwrap_or(0);
    sink.progress(0, total);

    let mut body = BytesMut::with_capacity(total.min(MAX_PREALLOCATION) as usize);
    let mut stream = res.bytes_stream();
    while let Some(item) = stream.next().await {
        let chunk = match item {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!("Body of {} interrupted: {}", url, e);
                return TransportOutcome::Failed(classify_reqwest_error(&e));
            }
        };
        body.extend_from_slice(&chunk);
        sink.progress(body.len() as u64, total);
    }

    TransportOutcome::Success(body.freeze())
}
