//! The protocol router.
//!
//! Holds the registered adapters in a fixed order, probes them
//! concurrently, and always reports results back in registration order
//! so fallback is deterministic.

use std::sync::Arc;

use futures_util::future::join_all;
use http::HeaderMap;
use url::Url;

use payfetch::adapter::{CapturedResponse, ProtocolAdapter, ProtocolRequest, ProtocolResult};
use payfetch::error::{Error, ErrorKind};
use payfetch::offer::ProtocolQuote;

/// A successful probe: the adapter that detected plus its quote.
#[derive(Clone)]
pub struct Probe {
    /// The adapter that recognised the challenge.
    pub adapter: Arc<dyn ProtocolAdapter>,
    /// Its normalised quote.
    pub quote: ProtocolQuote,
}

impl std::fmt::Debug for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Probe")
            .field("protocol", &self.adapter.protocol())
            .field("quote", &self.quote)
            .finish()
    }
}

/// Registration-ordered adapter dispatch.
#[derive(Default)]
pub struct ProtocolRouter {
    adapters: Vec<Arc<dyn ProtocolAdapter>>,
}

impl std::fmt::Debug for ProtocolRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let protocols: Vec<_> = self.adapters.iter().map(|a| a.protocol()).collect();
        f.debug_struct("ProtocolRouter")
            .field("adapters", &protocols)
            .finish()
    }
}

impl ProtocolRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter; registration order is dispatch order.
    pub fn register(&mut self, adapter: Arc<dyn ProtocolAdapter>) {
        self.adapters.push(adapter);
    }

    /// Returns `true` when no adapter is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Probes every adapter: detection runs concurrently, quotes are
    /// retrieved for the detecting adapters in registration order.
    ///
    /// # Errors
    ///
    /// Adapter errors during detect propagate: they signal a
    /// reachability problem, not a free endpoint. `detection-failed` is
    /// raised when every adapter cleanly reports no challenge.
    pub async fn probe_all(
        &self,
        url: &Url,
        headers: Option<&HeaderMap>,
    ) -> Result<Vec<Probe>, Error> {
        let detections = join_all(
            self.adapters
                .iter()
                .map(|adapter| adapter.detect(url, headers)),
        )
        .await;

        let mut detected: Vec<Arc<dyn ProtocolAdapter>> = Vec::new();
        for (adapter, detection) in self.adapters.iter().zip(detections) {
            if detection? {
                detected.push(Arc::clone(adapter));
            }
        }
        if detected.is_empty() {
            return Err(Error::new(
                ErrorKind::DetectionFailed,
                format!("no payment protocol detected at {url}"),
            ));
        }

        let mut probes = Vec::with_capacity(detected.len());
        for adapter in detected {
            let quote = adapter.quote(url, headers).await?;
            probes.push(Probe { adapter, quote });
        }
        Ok(probes)
    }

    /// Pure re-probe of a buffered response across all adapters, in
    /// registration order.
    #[must_use]
    pub fn probe_from_response(&self, response: &CapturedResponse) -> Vec<Probe> {
        self.adapters
            .iter()
            .filter_map(|adapter| {
                adapter.quote_from_response(response).map(|quote| Probe {
                    adapter: Arc::clone(adapter),
                    quote,
                })
            })
            .collect()
    }

    /// Probes and returns the first detecting adapter with its quote.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`ProtocolRouter::probe_all`].
    pub async fn probe(&self, url: &Url, headers: Option<&HeaderMap>) -> Result<Probe, Error> {
        let mut probes = self.probe_all(url, headers).await?;
        Ok(probes.remove(0))
    }

    /// Delegates execution to the given adapter.
    ///
    /// # Errors
    ///
    /// Whatever the adapter raises.
    pub async fn execute(
        &self,
        adapter: &Arc<dyn ProtocolAdapter>,
        request: &ProtocolRequest,
    ) -> Result<ProtocolResult, Error> {
        adapter.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use payfetch::money::Money;
    use payfetch::offer::Protocol;
    use std::time::Duration;

    struct StubAdapter {
        protocol: Protocol,
        detects: bool,
        detect_delay_ms: u64,
        detect_error: Option<ErrorKind>,
        cents: u64,
    }

    #[async_trait]
    impl ProtocolAdapter for StubAdapter {
        fn protocol(&self) -> Protocol {
            self.protocol
        }

        async fn detect(&self, _url: &Url, _headers: Option<&HeaderMap>) -> Result<bool, Error> {
            tokio::time::sleep(Duration::from_millis(self.detect_delay_ms)).await;
            match self.detect_error {
                Some(kind) => Err(Error::new(kind, "detect blew up")),
                None => Ok(self.detects),
            }
        }

        async fn quote(
            &self,
            _url: &Url,
            _headers: Option<&HeaderMap>,
        ) -> Result<ProtocolQuote, Error> {
            Ok(ProtocolQuote {
                protocol: self.protocol,
                amount: Money::from_cents(self.cents),
                network: None,
                pay_to: None,
                all_accepts: None,
                input_hints: None,
            })
        }

        fn quote_from_response(&self, _response: &CapturedResponse) -> Option<ProtocolQuote> {
            self.detects.then(|| ProtocolQuote {
                protocol: self.protocol,
                amount: Money::from_cents(self.cents),
                network: None,
                pay_to: None,
                all_accepts: None,
                input_hints: None,
            })
        }

        async fn execute(&self, _request: &ProtocolRequest) -> Result<ProtocolResult, Error> {
            unimplemented!("not exercised by router tests")
        }
    }

    fn url() -> Url {
        "https://api.example/resource".parse().unwrap()
    }

    #[tokio::test]
    async fn test_probe_all_preserves_registration_order() {
        let mut router = ProtocolRouter::new();
        // The second adapter detects faster, but order must follow
        // registration.
        router.register(Arc::new(StubAdapter {
            protocol: Protocol::X402,
            detects: true,
            detect_delay_ms: 30,
            detect_error: None,
            cents: 10,
        }));
        router.register(Arc::new(StubAdapter {
            protocol: Protocol::L402,
            detects: true,
            detect_delay_ms: 1,
            detect_error: None,
            cents: 20,
        }));

        let probes = router.probe_all(&url(), None).await.unwrap();
        assert_eq!(probes.len(), 2);
        assert_eq!(probes[0].adapter.protocol(), Protocol::X402);
        assert_eq!(probes[1].adapter.protocol(), Protocol::L402);
    }

    #[tokio::test]
    async fn test_probe_all_skips_non_detecting() {
        let mut router = ProtocolRouter::new();
        router.register(Arc::new(StubAdapter {
            protocol: Protocol::X402,
            detects: false,
            detect_delay_ms: 0,
            detect_error: None,
            cents: 10,
        }));
        router.register(Arc::new(StubAdapter {
            protocol: Protocol::L402,
            detects: true,
            detect_delay_ms: 0,
            detect_error: None,
            cents: 20,
        }));

        let probes = router.probe_all(&url(), None).await.unwrap();
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].adapter.protocol(), Protocol::L402);
    }

    #[tokio::test]
    async fn test_probe_all_none_detect_is_detection_failed() {
        let mut router = ProtocolRouter::new();
        router.register(Arc::new(StubAdapter {
            protocol: Protocol::X402,
            detects: false,
            detect_delay_ms: 0,
            detect_error: None,
            cents: 10,
        }));

        let err = router.probe_all(&url(), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DetectionFailed);
    }

    #[tokio::test]
    async fn test_probe_all_propagates_detect_errors() {
        let mut router = ProtocolRouter::new();
        router.register(Arc::new(StubAdapter {
            protocol: Protocol::X402,
            detects: true,
            detect_delay_ms: 0,
            detect_error: Some(ErrorKind::EndpointUnreachable),
            cents: 10,
        }));

        let err = router.probe_all(&url(), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EndpointUnreachable);
    }

    #[tokio::test]
    async fn test_probe_returns_first() {
        let mut router = ProtocolRouter::new();
        router.register(Arc::new(StubAdapter {
            protocol: Protocol::X402,
            detects: true,
            detect_delay_ms: 0,
            detect_error: None,
            cents: 10,
        }));
        router.register(Arc::new(StubAdapter {
            protocol: Protocol::L402,
            detects: true,
            detect_delay_ms: 0,
            detect_error: None,
            cents: 20,
        }));

        let probe = router.probe(&url(), None).await.unwrap();
        assert_eq!(probe.adapter.protocol(), Protocol::X402);
    }

    #[tokio::test]
    async fn test_probe_from_response_is_ordered() {
        let mut router = ProtocolRouter::new();
        router.register(Arc::new(StubAdapter {
            protocol: Protocol::X402,
            detects: true,
            detect_delay_ms: 0,
            detect_error: None,
            cents: 10,
        }));
        router.register(Arc::new(StubAdapter {
            protocol: Protocol::L402,
            detects: true,
            detect_delay_ms: 0,
            detect_error: None,
            cents: 20,
        }));

        let response = CapturedResponse {
            url: "https://api.example".into(),
            status: 402,
            headers: HeaderMap::new(),
            body: vec![],
        };
        let probes = router.probe_from_response(&response);
        assert_eq!(probes.len(), 2);
        assert_eq!(probes[0].adapter.protocol(), Protocol::X402);
    }
}
