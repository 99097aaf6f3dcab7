//! Page load lifecycle: analysis-status check, dependent fetches, and
//! cancellation when the page goes away.

use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{DashboardApi, FetchError};
use crate::models::{BriefSummary, DashboardSummary, FeedbackReport, LastImports, SummaryQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Import,
    Analysis,
    Reports,
}

impl Page {
    pub const ALL: [Page; 4] = [Page::Overview, Page::Import, Page::Analysis, Page::Reports];

    pub fn title(self) -> &'static str {
        match self {
            Page::Overview => "Overview",
            Page::Import => "Import",
            Page::Analysis => "Analysis",
            Page::Reports => "Reports",
        }
    }

    pub fn index(self) -> usize {
        Page::ALL.iter().position(|p| *p == self).unwrap_or(0)
    }

    pub fn next(self) -> Page {
        Page::ALL[(self.index() + 1) % Page::ALL.len()]
    }

    pub fn prev(self) -> Page {
        Page::ALL[(self.index() + Page::ALL.len() - 1) % Page::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    LastImports,
    Summary,
    Brief,
    FeedbackReport,
}

impl Endpoint {
    /// Snapshot key.
    pub fn key(self) -> &'static str {
        match self {
            Endpoint::LastImports => "reviews/last_imports",
            Endpoint::Summary => "dashboard/summary",
            Endpoint::Brief => "recommendations/brief",
            Endpoint::FeedbackReport => "recommendations/feedback-report",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            Endpoint::LastImports => "Failed to load recent imports",
            Endpoint::Summary => "Failed to load analysis data",
            Endpoint::Brief => "Failed to load the executive summary",
            Endpoint::FeedbackReport => "Failed to load AI recommendations",
        }
    }
}

/// Where a page is in its single load per visit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadPhase {
    #[default]
    Unknown,
    Checking,
    /// Backend is busy; nothing else is fetched for this visit.
    Analyzing,
    Idle,
    Loading,
    Success,
    Error,
}

impl LoadPhase {
    pub fn begin_check(self) -> Self {
        match self {
            LoadPhase::Unknown => LoadPhase::Checking,
            other => other,
        }
    }

    /// Pages without a status check go straight to idle.
    pub fn skip_check(self) -> Self {
        match self {
            LoadPhase::Unknown => LoadPhase::Idle,
            other => other,
        }
    }

    /// A failed status check counts as idle.
    pub fn status_resolved(self, status: &Result<bool, FetchError>) -> Self {
        match (self, status) {
            (LoadPhase::Checking, Ok(true)) => LoadPhase::Analyzing,
            (LoadPhase::Checking, _) => LoadPhase::Idle,
            (other, _) => other,
        }
    }

    pub fn begin_fetch(self) -> Self {
        match self {
            LoadPhase::Idle => LoadPhase::Loading,
            other => other,
        }
    }

    pub fn fetch_finished(self, ok: bool) -> Self {
        match self {
            LoadPhase::Loading if ok => LoadPhase::Success,
            LoadPhase::Loading => LoadPhase::Error,
            other => other,
        }
    }

    pub fn is_analyzing(self) -> bool {
        self == LoadPhase::Analyzing
    }

    pub fn is_busy(self) -> bool {
        matches!(self, LoadPhase::Checking | LoadPhase::Loading)
    }

    pub fn label(self) -> &'static str {
        match self {
            LoadPhase::Unknown => "not loaded",
            LoadPhase::Checking => "checking analysis status",
            LoadPhase::Analyzing => "analysis in progress",
            LoadPhase::Idle => "idle",
            LoadPhase::Loading => "loading",
            LoadPhase::Success => "loaded",
            LoadPhase::Error => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Payload {
    LastImports(LastImports),
    Summary(Box<DashboardSummary>),
    Brief(BriefSummary),
    FeedbackReport(FeedbackReport),
}

impl Payload {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Payload::LastImports(_) => Endpoint::LastImports,
            Payload::Summary(_) => Endpoint::Summary,
            Payload::Brief(_) => Endpoint::Brief,
            Payload::FeedbackReport(_) => Endpoint::FeedbackReport,
        }
    }

    /// An empty payload is shown but never replaces a stored snapshot.
    pub fn is_empty(&self) -> bool {
        match self {
            Payload::LastImports(p) => p.is_empty(),
            Payload::Summary(p) => p.is_empty(),
            Payload::Brief(p) => p.is_empty(),
            Payload::FeedbackReport(p) => p.is_empty(),
        }
    }
}

#[derive(Debug)]
pub enum LoadEvent {
    Phase(LoadPhase),
    Fetched(Payload),
    Failed(Endpoint, FetchError),
}

#[derive(Debug)]
pub struct LoadUpdate {
    pub generation: u64,
    pub page: Page,
    pub event: LoadEvent,
}

/// Persists successful payloads and hands back the last one on failure.
pub trait SnapshotStore {
    fn save(&self, payload: &Payload);
    fn load(&self, endpoint: Endpoint) -> Option<Payload>;
}

/// For callers that keep nothing between runs.
pub struct NoSnapshots;

impl SnapshotStore for NoSnapshots {
    fn save(&self, _payload: &Payload) {}

    fn load(&self, _endpoint: Endpoint) -> Option<Payload> {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct PayloadSet {
    pub last_imports: Option<LastImports>,
    pub summary: Option<DashboardSummary>,
    pub brief: Option<BriefSummary>,
    pub feedback_report: Option<FeedbackReport>,
}

impl PayloadSet {
    pub fn insert(&mut self, payload: Payload) {
        match payload {
            Payload::LastImports(p) => self.last_imports = Some(p),
            Payload::Summary(p) => self.summary = Some(*p),
            Payload::Brief(p) => self.brief = Some(p),
            Payload::FeedbackReport(p) => self.feedback_report = Some(p),
        }
    }
}

/// Page-local state for one visit. Rebuilt from scratch on every load.
#[derive(Debug, Clone, Default)]
pub struct PageSession {
    pub phase: LoadPhase,
    pub live: PayloadSet,
    pub last_known: PayloadSet,
    pub errors: Vec<String>,
}

impl PageSession {
    pub fn apply(&mut self, event: LoadEvent, store: &dyn SnapshotStore) {
        match event {
            LoadEvent::Phase(phase) => self.phase = phase,
            LoadEvent::Fetched(payload) => {
                let endpoint = payload.endpoint();
                if let Some(previous) = store.load(endpoint) {
                    self.last_known.insert(previous);
                }
                if payload.is_empty() {
                    warn!("Backend returned empty {} data, keeping the stored snapshot", endpoint.key());
                } else {
                    store.save(&payload);
                }
                self.live.insert(payload);
            }
            LoadEvent::Failed(endpoint, err) => {
                error!("{}: {}", endpoint.failure_message(), err);
                if let Some(payload) = store.load(endpoint) {
                    warn!("Showing last known {} data", endpoint.key());
                    self.last_known.insert(payload);
                }
                self.errors.push(endpoint.failure_message().to_string());
            }
        }
    }
}

// --- Load sequence ---

struct UpdateSink {
    tx: UnboundedSender<LoadUpdate>,
    generation: u64,
    page: Page,
}

impl UpdateSink {
    fn emit(&self, event: LoadEvent) {
        // The receiver is gone once the dashboard has shut down.
        let _ = self.tx.send(LoadUpdate {
            generation: self.generation,
            page: self.page,
            event,
        });
    }

    fn phase(&self, phase: LoadPhase) -> LoadPhase {
        self.emit(LoadEvent::Phase(phase));
        phase
    }
}

async fn check_status<A: DashboardApi>(api: &A, sink: &UpdateSink) -> LoadPhase {
    let phase = sink.phase(LoadPhase::Unknown.begin_check());
    let status = api.is_analyzing().await;
    if let Err(err) = &status {
        warn!("Analysis status check failed, continuing: {}", err);
    }
    sink.phase(phase.status_resolved(&status))
}

/// Run the single load of `page`, reporting every step to `sink`.
async fn run_page_load<A: DashboardApi>(
    api: &A,
    page: Page,
    query: &SummaryQuery,
    sink: &UpdateSink,
) {
    debug!("Loading page {}", page.title());

    let phase = match page {
        Page::Overview => return,
        Page::Import => sink.phase(LoadPhase::Unknown.skip_check()),
        Page::Analysis | Page::Reports => check_status(api, sink).await,
    };
    if phase.is_analyzing() {
        info!("Analysis in progress, skipping {} fetches", page.title());
        return;
    }
    let phase = sink.phase(phase.begin_fetch());

    let results = match page {
        Page::Overview => Vec::new(),
        Page::Import => vec![fetch(Endpoint::LastImports, api.last_imports().await, Payload::LastImports)],
        Page::Analysis => vec![fetch(Endpoint::Summary, api.summary(query).await, |s| {
            Payload::Summary(Box::new(s))
        })],
        Page::Reports => {
            let brief = fetch(Endpoint::Brief, api.brief().await, Payload::Brief);
            let report = fetch(
                Endpoint::FeedbackReport,
                api.feedback_report().await,
                Payload::FeedbackReport,
            );
            vec![brief, report]
        }
    };

    let ok = results.iter().all(|event| matches!(event, LoadEvent::Fetched(_)));
    for event in results {
        sink.emit(event);
    }
    sink.phase(phase.fetch_finished(ok));
    info!("Page {} loaded - ok={}", page.title(), ok);
}

fn fetch<T>(endpoint: Endpoint, result: Result<T, FetchError>, wrap: impl FnOnce(T) -> Payload) -> LoadEvent {
    match result {
        Ok(value) => LoadEvent::Fetched(wrap(value)),
        Err(err) => LoadEvent::Failed(endpoint, err),
    }
}

/// Load a page to completion and collect its session. Used by one-shot commands.
pub async fn load_session<A: DashboardApi>(
    api: &A,
    page: Page,
    query: &SummaryQuery,
    store: &dyn SnapshotStore,
) -> PageSession {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = UpdateSink { tx, generation: 0, page };
    run_page_load(api, page, query, &sink).await;
    drop(sink);

    let mut session = PageSession::default();
    while let Some(update) = rx.recv().await {
        session.apply(update.event, store);
    }
    session
}

// --- Background loader ---

/// Owns the in-flight load of the visible page. Starting a new load or
/// cancelling aborts the previous task, and updates it already queued are
/// dropped by generation.
pub struct PageLoader<A: DashboardApi> {
    api: Arc<A>,
    runtime: Handle,
    tx: UnboundedSender<LoadUpdate>,
    rx: UnboundedReceiver<LoadUpdate>,
    generation: u64,
    current: Option<JoinHandle<()>>,
}

impl<A: DashboardApi> PageLoader<A> {
    pub fn new(api: Arc<A>, runtime: Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            api,
            runtime,
            tx,
            rx,
            generation: 0,
            current: None,
        }
    }

    pub fn start(&mut self, page: Page, query: SummaryQuery) -> u64 {
        self.cancel();

        let sink = UpdateSink {
            tx: self.tx.clone(),
            generation: self.generation,
            page,
        };
        let api = Arc::clone(&self.api);
        self.current = Some(self.runtime.spawn(async move {
            run_page_load(api.as_ref(), page, &query, &sink).await;
        }));
        self.generation
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.current.take() {
            if !handle.is_finished() {
                debug!("Aborting page load generation {}", self.generation);
            }
            handle.abort();
        }
        self.generation += 1;
    }

    /// Drain updates that belong to the current generation.
    pub fn poll(&mut self) -> Vec<LoadUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.rx.try_recv() {
            if update.generation == self.generation {
                updates.push(update);
            } else {
                debug!("Dropping stale update from generation {}", update.generation);
            }
        }
        updates
    }
}

impl<A: DashboardApi> Drop for PageLoader<A> {
    fn drop(&mut self) {
        if let Some(handle) = self.current.take() {
            handle.abort();
        }
    }
}
