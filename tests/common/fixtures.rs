//! Stub transports for driving sweeps without a network

use async_trait::async_trait;
use gfi_sweep::{QueryRequest, Transport, TransportError, TransportResponse};
use std::sync::Mutex;

/// A request as seen by a stub: protocol version and pixel position
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeenRequest {
    /// `VERSION` parameter
    pub version: String,
    /// Pixel column (`I` for 1.3.0, `X` for 1.1.1)
    pub i: u32,
    /// Pixel row (`J` for 1.3.0, `Y` for 1.1.1)
    pub j: u32,
}

impl SeenRequest {
    fn from_request(request: &QueryRequest) -> Self {
        let version = request.get("VERSION").unwrap_or_default().to_string();
        let (col, row) = if version == "1.3.0" { ("I", "J") } else { ("X", "Y") };
        let pixel = |name: &str| {
            request
                .get(name)
                .and_then(|v| v.parse().ok())
                .unwrap_or(u32::MAX)
        };
        Self {
            i: pixel(col),
            j: pixel(row),
            version,
        }
    }
}

type Responder = dyn Fn(&SeenRequest) -> Result<TransportResponse, TransportError> + Send + Sync;

/// Transport answering every request through a closure, recording what it saw
pub struct StubTransport {
    respond: Box<Responder>,
    seen: Mutex<Vec<SeenRequest>>,
}

impl StubTransport {
    /// Answer requests with `respond`
    pub fn new(
        respond: impl Fn(&SeenRequest) -> Result<TransportResponse, TransportError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Same 200 body for every request
    pub fn constant(body: &'static str) -> Self {
        Self::new(move |_| Ok(TransportResponse::new(200, body)))
    }

    /// Every request fails at the transport level
    pub fn unreachable() -> Self {
        Self::new(|_| Err(TransportError::Connect("connection refused".to_string())))
    }

    /// Requests seen so far, in arrival order
    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of requests seen so far
    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: &QueryRequest) -> Result<TransportResponse, TransportError> {
        let seen = SeenRequest::from_request(request);
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(seen.clone());
        (self.respond)(&seen)
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// HTML popup body unique to one pixel
pub fn popup_for(i: u32, j: u32) -> String {
    format!("<div class=\"lizmapPopupContent\"><table><tr><td>{i}</td><td>{j}</td></tr></table></div>")
}
