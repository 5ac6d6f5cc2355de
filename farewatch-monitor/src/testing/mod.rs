//! Scripted stand-ins for the browser and the chat collaborator, and an in-memory store.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use farewatch_core::extraction::{
    Browser, BrowserLauncher, CarOffer, ExtractionError, ExtractionPage, LaunchError, Quote,
    QuoteSet,
};
use farewatch_core::messaging::AlertSink;
use farewatch_shared::PriceTrend;

mod store;

pub use store::InMemoryStore;

pub const SAMPLE_DATE: &str = "sex., 26 de set.";

pub fn quote(price: i32) -> Quote {
    Quote {
        departure_time: "08:05".to_string(),
        arrival_time: "09:10".to_string(),
        duration: "1 h 5 min".to_string(),
        airline: "LATAM".to_string(),
        stops_label: "Sem escalas".to_string(),
        price,
        emissions: "58 kg CO2e".to_string(),
        stop_details: Vec::new(),
    }
}

pub fn quote_set(prices: &[i32]) -> QuoteSet {
    QuoteSet {
        quotes: prices.iter().map(|p| quote(*p)).collect(),
        origin: "São Paulo".to_string(),
        destination: "Rio de Janeiro".to_string(),
        date: SAMPLE_DATE.to_string(),
        source_url: String::new(),
    }
}

enum Step<T> {
    Reply(Result<T, ExtractionError>),
    Hang,
}

#[derive(Default)]
struct Script {
    connected: AtomicBool,
    flights: Mutex<VecDeque<Step<QuoteSet>>>,
    cars: Mutex<VecDeque<Step<CarOffer>>>,
    visited: Mutex<Vec<String>>,
    failing_pages: AtomicUsize,
    pages_opened: AtomicUsize,
    pages_closed: AtomicUsize,
    snapshots: AtomicUsize,
    closes: AtomicUsize,
}

/// Browser whose pages answer from a queue of scripted replies.
/// An exhausted queue answers with a fault.
#[derive(Clone)]
pub struct ScriptedBrowser {
    script: Arc<Script>,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        let script = Script::default();
        script.connected.store(true, Ordering::SeqCst);
        Self { script: Arc::new(script) }
    }

    pub fn push_flights(&self, reply: Result<QuoteSet, ExtractionError>) -> &Self {
        self.script.flights.lock().unwrap().push_back(Step::Reply(reply));
        self
    }

    /// Next flight extraction never completes
    pub fn push_hang(&self) -> &Self {
        self.script.flights.lock().unwrap().push_back(Step::Hang);
        self
    }

    pub fn push_car(&self, reply: Result<CarOffer, ExtractionError>) -> &Self {
        self.script.cars.lock().unwrap().push_back(Step::Reply(reply));
        self
    }

    pub fn set_connected(&self, connected: bool) {
        self.script.connected.store(connected, Ordering::SeqCst);
    }

    pub fn fail_next_pages(&self, count: usize) {
        self.script.failing_pages.store(count, Ordering::SeqCst);
    }

    /// URLs navigated to, in order
    pub fn visited(&self) -> Vec<String> {
        self.script.visited.lock().unwrap().clone()
    }

    pub fn pages_opened(&self) -> usize {
        self.script.pages_opened.load(Ordering::SeqCst)
    }

    pub fn pages_closed(&self) -> usize {
        self.script.pages_closed.load(Ordering::SeqCst)
    }

    pub fn snapshots(&self) -> usize {
        self.script.snapshots.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.script.closes.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Browser for ScriptedBrowser {
    async fn is_connected(&self) -> bool {
        self.script.connected.load(Ordering::SeqCst)
    }

    async fn new_page(&self) -> Result<Box<dyn ExtractionPage>, ExtractionError> {
        let failing = self.script.failing_pages.load(Ordering::SeqCst);
        if failing > 0 {
            self.script.failing_pages.store(failing - 1, Ordering::SeqCst);
            return Err(ExtractionError::Fault("Target closed".to_string()));
        }
        self.script.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedPage { script: self.script.clone() }))
    }

    async fn close(&self) {
        self.script.closes.fetch_add(1, Ordering::SeqCst);
        self.script.connected.store(false, Ordering::SeqCst);
    }
}

struct ScriptedPage {
    script: Arc<Script>,
}

async fn play<T>(step: Option<Step<T>>) -> Result<T, ExtractionError> {
    match step {
        Some(Step::Reply(reply)) => reply,
        Some(Step::Hang) => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ExtractionError::Fault("hung page woke up".to_string()))
        }
        None => Err(ExtractionError::Fault("script exhausted".to_string())),
    }
}

#[async_trait]
impl ExtractionPage for ScriptedPage {
    async fn extract_flights(&mut self, url: &str) -> Result<QuoteSet, ExtractionError> {
        self.script.visited.lock().unwrap().push(url.to_string());
        let step = self.script.flights.lock().unwrap().pop_front();
        play(step).await
    }

    async fn extract_car_offer(&mut self, url: &str) -> Result<CarOffer, ExtractionError> {
        self.script.visited.lock().unwrap().push(url.to_string());
        let step = self.script.cars.lock().unwrap().pop_front();
        play(step).await
    }

    async fn snapshot(&mut self) -> Result<String, ExtractionError> {
        self.script.snapshots.fetch_add(1, Ordering::SeqCst);
        Ok("<html><body>scripted</body></html>".to_string())
    }

    async fn close(&mut self) {
        self.script.pages_closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct ScriptedLauncher {
    browser: Option<ScriptedBrowser>,
    launches: AtomicUsize,
}

impl ScriptedLauncher {
    pub fn new(browser: Arc<ScriptedBrowser>) -> Self {
        Self {
            browser: Some(browser.as_ref().clone()),
            launches: AtomicUsize::new(0),
        }
    }

    /// Launcher for an environment where the browser binary is missing
    pub fn failing() -> Self {
        Self {
            browser: None,
            launches: AtomicUsize::new(0),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Arc<dyn Browser>, LaunchError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        match &self.browser {
            Some(browser) => {
                browser.set_connected(true);
                Ok(Arc::new(browser.clone()))
            }
            None => Err(LaunchError::Failed("Executable doesn't exist".to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentAlert {
    pub user_id: i64,
    pub text: String,
    pub trend: Option<PriceTrend>,
}

/// Alert sink that keeps everything it was asked to send
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<SentAlert>>,
    fail: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        sink
    }

    pub fn sent(&self) -> Vec<SentAlert> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn send_alert(
        &self,
        user_id: i64,
        text: &str,
        trend: Option<PriceTrend>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("chat service unavailable".into());
        }
        self.sent.lock().unwrap().push(SentAlert {
            user_id,
            text: text.to_string(),
            trend,
        });
        Ok(())
    }
}
