//! Kernel bridge over HTTP.
//!
//! `POST {base}/execute` carries the JSON [`ExecuteRequest`]. The response
//! body streams one [`BackendMessage`] per line and ends after the reply.
//! A failed request or a body that stops early closes the attempt's channel,
//! which the coordinator reports as a disconnect.

use tokio::sync::mpsc;

use super::{BackendMessage, ExecuteRequest, KernelBackend, TransportError};

/// Talks to a kernel bridge at a fixed base URL.
#[derive(Debug, Clone)]
pub struct HttpKernelBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpKernelBackend {
    /// Fails unless `base_url` is an `http://` or `https://` URL.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let base = base_url.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(TransportError(format!(
                "backend url must start with http:// or https://, got '{}'",
                base_url
            )));
        }
        Ok(HttpKernelBackend {
            client: reqwest::Client::new(),
            endpoint: format!("{}/execute", base),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl KernelBackend for HttpKernelBackend {
    fn submit(
        &self,
        request: ExecuteRequest,
    ) -> Result<mpsc::UnboundedReceiver<BackendMessage>, TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| TransportError(format!("no async runtime: {}", err)))?;
        let pending = self.client.post(&self.endpoint).json(&request);
        let endpoint = self.endpoint.clone();
        let cell = request.auxiliary.uuid;

        let (tx, rx) = mpsc::unbounded_channel();
        runtime.spawn(async move {
            match relay(pending, &tx).await {
                Ok(count) => tracing::debug!(%endpoint, %cell, count, "backend stream finished"),
                Err(err) => tracing::warn!(%endpoint, %cell, "backend stream failed: {}", err),
            }
        });
        Ok(rx)
    }
}

/// Sends the request and forwards every decoded line. Returns how many
/// messages were delivered.
async fn relay(
    pending: reqwest::RequestBuilder,
    tx: &mpsc::UnboundedSender<BackendMessage>,
) -> Result<usize, TransportError> {
    let transport = |err: reqwest::Error| TransportError(err.to_string());
    let mut response = pending
        .send()
        .await
        .map_err(transport)?
        .error_for_status()
        .map_err(transport)?;

    let mut lines = LineBuffer::default();
    let mut delivered = 0;
    while let Some(chunk) = response.chunk().await.map_err(transport)? {
        for line in lines.push(&chunk) {
            delivered += deliver(&line, tx)?;
        }
    }
    if let Some(line) = lines.finish() {
        delivered += deliver(&line, tx)?;
    }
    Ok(delivered)
}

fn deliver(line: &[u8], tx: &mpsc::UnboundedSender<BackendMessage>) -> Result<usize, TransportError> {
    match decode_line(line) {
        Some(Ok(message)) => {
            tx.send(message)
                .map_err(|_| TransportError("attempt no longer listening".into()))?;
            Ok(1)
        }
        Some(Err(err)) => {
            tracing::warn!("skipping undecodable backend line: {}", err);
            Ok(0)
        }
        None => Ok(0),
    }
}

/// `None` for blank lines.
fn decode_line(line: &[u8]) -> Option<Result<BackendMessage, serde_json::Error>> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(serde_json::from_slice(line))
}

/// Splits a chunked body into complete lines.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let rest = self.pending.split_off(end + 1);
            let mut line = std::mem::replace(&mut self.pending, rest);
            line.pop();
            lines.push(line);
        }
        lines
    }

    /// Trailing bytes without a final newline.
    fn finish(self) -> Option<Vec<u8>> {
        (!self.pending.is_empty()).then_some(self.pending)
    }
}
