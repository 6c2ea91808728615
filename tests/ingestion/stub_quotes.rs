//! Stub quote source for integration testing.
//!
//! Returns a fixed price snapshot after an optional delay and records how
//! many calls are in flight, so tests can observe overlap between cycles.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tiger_tracker::quotes::QuoteSource;
use tiger_tracker::types::{QuoteError, Quotes};

#[derive(Clone)]
pub struct StubQuotes {
    prices: Quotes,
    delay: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    /// If set, every call fails with this transport error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl StubQuotes {
    pub fn new(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: prices.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for StubQuotes {
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Quotes, QuoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(QuoteError::Transport(msg));
        }

        symbols
            .iter()
            .map(|s| {
                self.prices
                    .get(s)
                    .map(|p| (s.clone(), *p))
                    .ok_or_else(|| QuoteError::MissingQuote(s.clone()))
            })
            .collect()
    }
}
