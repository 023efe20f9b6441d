//! Duty-Cycle Scan Controller
//!
//! Owns the scan-loop lifecycle: a background worker repeatedly opens a
//! hardware scan window, forwards qualified detections to the handshake
//! coordinator, closes the window and pauses. Tag reads have no duty
//! cycle; a second pump thread drains the tag stream for the whole
//! session. Exactly one session may be running at a time, and `stop()`
//! guarantees the hardware scan is closed before it returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::api::events::{EventSink, PairingEvent};
use crate::handshake::coordinator::HandshakeCoordinator;

use super::error::ScanError;
use super::filter::{DetectionEvent, FilterCriteria, ProximityFilter};
use super::radio::{RadioPort, ScanHandle};

/// Granularity of cancellable waits inside a scan window. Cancellation
/// is observed within one slice, well under a full window.
const POLL_SLICE: Duration = Duration::from_millis(50);

/// Cooperative cancellation token, checked at every suspension point of
/// the scan loop. `cancel()` wakes any in-flight wait immediately.
pub struct CancellationToken {
    cancelled: Mutex<bool>,
    wakeup: Condvar,
}

impl CancellationToken {
    /// Creates a live token.
    pub fn new() -> Self {
        CancellationToken {
            cancelled: Mutex::new(false),
            wakeup: Condvar::new(),
        }
    }

    /// Cancels the token and wakes all pending waits.
    pub fn cancel(&self) {
        *self.cancelled.lock().expect("mutex poisoned") = true;
        self.wakeup.notify_all();
    }

    /// Returns true once cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().expect("mutex poisoned")
    }

    /// Waits up to `timeout`, returning early with `true` on cancel.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.cancelled.lock().expect("mutex poisoned");
        while !*cancelled {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(remaining) => remaining,
                None => return false,
            };
            let (guard, _) = self
                .wakeup
                .wait_timeout(cancelled, remaining)
                .expect("mutex poisoned");
            cancelled = guard;
        }
        true
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Collaborator-supplied go/no-go flags. `start()` refuses unless both
/// are set; a running session is unaffected by later changes.
#[derive(Debug, Default)]
pub struct Preconditions {
    profile_ready: AtomicBool,
    radio_permission_granted: AtomicBool,
}

impl Preconditions {
    /// Marks the local profile record as ready (or not).
    pub fn set_profile_ready(&self, ready: bool) {
        self.profile_ready.store(ready, Ordering::SeqCst);
    }

    /// Marks the radio permission as granted (or revoked).
    pub fn set_radio_permission(&self, granted: bool) {
        self.radio_permission_granted.store(granted, Ordering::SeqCst);
    }

    /// Returns the first unmet precondition, if any.
    pub fn unmet(&self) -> Option<&'static str> {
        if !self.profile_ready.load(Ordering::SeqCst) {
            return Some("profile not ready");
        }
        if !self.radio_permission_granted.load(Ordering::SeqCst) {
            return Some("radio permission not granted");
        }
        None
    }
}

/// Controller lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// No session; `stop()` here is a no-op.
    Stopped,
    /// `start()` is bringing a session up.
    Starting,
    /// The duty-cycle loop is running.
    Active,
    /// `stop()` is winding the session down.
    Stopping,
}

/// State of one scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Duty cycle in progress.
    Running,
    /// Cancellation requested, workers winding down.
    Stopping,
    /// Fully stopped.
    Stopped,
}

/// One active duty-cycle run. Owned exclusively by the controller; at
/// most one session is `Running` at any time.
#[derive(Debug, Clone)]
pub struct ScanSession {
    id: Uuid,
    criteria: FilterCriteria,
    state: SessionState,
}

impl ScanSession {
    fn new(criteria: FilterCriteria) -> Self {
        ScanSession {
            id: Uuid::new_v4(),
            criteria,
            state: SessionState::Running,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Criteria this session scans with.
    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }
}

/// Tunables for the duty cycle and the filter it drives.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Name criterion forwarded to the radio and the filter.
    pub criteria: FilterCriteria,
    /// Strict lower bound on beacon signal strength, in dBm.
    pub rssi_threshold_dbm: i16,
    /// Length of one active scan window.
    pub scan_window: Duration,
    /// Pause between windows.
    pub pause: Duration,
    /// De-duplication window for repeat detections.
    pub debounce_window: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            criteria: FilterCriteria::default(),
            rssi_threshold_dbm: -50,
            scan_window: Duration::from_millis(2000),
            pause: Duration::from_millis(500),
            debounce_window: Duration::from_millis(2000),
        }
    }
}

struct Inner {
    state: ScanState,
    session: Option<ScanSession>,
    cancel: Option<Arc<CancellationToken>>,
    workers: Vec<thread::JoinHandle<()>>,
}

/// Everything a worker thread needs, cloned out of the controller so
/// workers never borrow it.
struct WorkerCtx<R: RadioPort> {
    radio: Arc<R>,
    config: ScanConfig,
    filter: Arc<Mutex<ProximityFilter>>,
    coordinator: Arc<Mutex<HandshakeCoordinator>>,
    sink: EventSink,
    token: Arc<CancellationToken>,
    inner: Arc<Mutex<Inner>>,
    session_id: Uuid,
}

/// Duty-cycle scan controller.
///
/// Holds the only reference to the hardware scan handle; no other
/// component starts or stops the radio directly.
pub struct ScanController<R: RadioPort + 'static> {
    radio: Arc<R>,
    config: ScanConfig,
    preconditions: Arc<Preconditions>,
    coordinator: Arc<Mutex<HandshakeCoordinator>>,
    sink: EventSink,
    filter: Arc<Mutex<ProximityFilter>>,
    inner: Arc<Mutex<Inner>>,
}

impl<R: RadioPort + 'static> ScanController<R> {
    /// Creates a stopped controller. The radio adapter is injected once
    /// and owned here from then on.
    pub fn new(
        radio: R,
        config: ScanConfig,
        preconditions: Arc<Preconditions>,
        coordinator: Arc<Mutex<HandshakeCoordinator>>,
        sink: EventSink,
    ) -> Self {
        let filter = ProximityFilter::new(
            config.criteria.clone(),
            config.rssi_threshold_dbm,
            config.debounce_window,
        );
        ScanController {
            radio: Arc::new(radio),
            config,
            preconditions,
            coordinator,
            sink,
            filter: Arc::new(Mutex::new(filter)),
            inner: Arc::new(Mutex::new(Inner {
                state: ScanState::Stopped,
                session: None,
                cancel: None,
                workers: Vec::new(),
            })),
        }
    }

    /// Starts a scan session.
    ///
    /// Idempotent: while a session is active this returns its id without
    /// touching the hardware. Refuses with `PreconditionNotMet` when the
    /// collaborator flags are missing, and propagates a capability error
    /// from the radio without retrying (the controller stays `Stopped`).
    pub fn start(&self) -> Result<Uuid, ScanError> {
        let mut inner = self.inner.lock().expect("mutex poisoned");

        match inner.state {
            ScanState::Active => {
                let session = inner.session.as_ref().expect("active without session");
                return Ok(session.id());
            }
            ScanState::Stopping => {
                return Err(ScanError::PreconditionNotMet(
                    "previous session still stopping",
                ));
            }
            ScanState::Stopped | ScanState::Starting => {}
        }

        if let Some(reason) = self.preconditions.unmet() {
            return Err(ScanError::PreconditionNotMet(reason));
        }

        inner.state = ScanState::Starting;
        let first = match self.radio.start_beacon_scan(&self.config.criteria) {
            Ok(handle) => handle,
            Err(error) => {
                inner.state = ScanState::Stopped;
                inner.session = None;
                tracing::warn!(%error, "scan start refused by radio");
                return Err(error.into());
            }
        };

        let token = Arc::new(CancellationToken::new());
        let session = ScanSession::new(self.config.criteria.clone());
        let id = session.id();

        inner.workers.clear();
        let beacon_ctx = self.worker_ctx(token.clone(), id);
        inner
            .workers
            .push(thread::spawn(move || Self::beacon_loop(beacon_ctx, first)));

        if self.radio.is_tag_reader_available() {
            let tag_ctx = self.worker_ctx(token.clone(), id);
            inner
                .workers
                .push(thread::spawn(move || Self::tag_loop(tag_ctx)));
        }

        inner.cancel = Some(token);
        inner.session = Some(session);
        inner.state = ScanState::Active;
        tracing::info!(session = %id, "scan session started");
        Ok(id)
    }

    /// Stops the running session.
    ///
    /// Cancels the in-flight wait, joins the workers and only returns
    /// once the hardware scan is closed. Calling this while already
    /// stopped is a no-op.
    pub fn stop(&self) {
        let (token, workers) = {
            let mut inner = self.inner.lock().expect("mutex poisoned");
            match inner.state {
                ScanState::Stopped | ScanState::Stopping => return,
                ScanState::Starting | ScanState::Active => {}
            }
            inner.state = ScanState::Stopping;
            if let Some(session) = inner.session.as_mut() {
                session.state = SessionState::Stopping;
            }
            (inner.cancel.take(), std::mem::take(&mut inner.workers))
        };

        if let Some(token) = token {
            token.cancel();
        }
        for worker in workers {
            let _ = worker.join();
        }

        let mut inner = self.inner.lock().expect("mutex poisoned");
        inner.state = ScanState::Stopped;
        inner.session = None;
        tracing::info!("scan session stopped");
    }

    /// Current controller state.
    pub fn state(&self) -> ScanState {
        self.inner.lock().expect("mutex poisoned").state
    }

    /// Snapshot of the running session, if any.
    pub fn session(&self) -> Option<ScanSession> {
        self.inner.lock().expect("mutex poisoned").session.clone()
    }

    /// Malformed readings dropped by the filter so far.
    pub fn dropped_readings(&self) -> u64 {
        self.filter.lock().expect("mutex poisoned").dropped_count()
    }

    /// Radio capability passthrough.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    fn worker_ctx(&self, token: Arc<CancellationToken>, session_id: Uuid) -> WorkerCtx<R> {
        WorkerCtx {
            radio: self.radio.clone(),
            config: self.config.clone(),
            filter: self.filter.clone(),
            coordinator: self.coordinator.clone(),
            sink: self.sink.clone(),
            token,
            inner: self.inner.clone(),
            session_id,
        }
    }

    /// Duty cycle: scan window, pause, repeat. The first window reuses
    /// the handle opened by `start()` so a capability failure there is
    /// reported synchronously.
    fn beacon_loop(ctx: WorkerCtx<R>, first: ScanHandle) {
        let mut handle = Some(first);
        loop {
            let scan = match handle.take() {
                Some(handle) => handle,
                None => match ctx.radio.start_beacon_scan(&ctx.config.criteria) {
                    Ok(handle) => handle,
                    Err(error) => {
                        // Surfaced to the collaborator exactly once; no
                        // automatic retry.
                        tracing::warn!(%error, "scan window failed to open");
                        ctx.sink.emit(PairingEvent::CapabilityError(error));
                        ctx.token.cancel();
                        break;
                    }
                },
            };

            let deadline = Instant::now() + ctx.config.scan_window;
            while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
                if ctx.token.is_cancelled() {
                    break;
                }
                if let Some(reading) = ctx.radio.poll_beacon(&scan, remaining.min(POLL_SLICE)) {
                    let now = Instant::now();
                    let qualified = ctx
                        .filter
                        .lock()
                        .expect("mutex poisoned")
                        .qualify_beacon(reading, now);
                    if let Some(event) = qualified {
                        Self::deliver(&ctx, event, now);
                    }
                }
            }

            // The hardware scan is closed before every exit path.
            ctx.radio.stop_beacon_scan(scan);
            if ctx.token.is_cancelled() {
                break;
            }

            let update = ctx
                .coordinator
                .lock()
                .expect("mutex poisoned")
                .tick(Instant::now());
            if let Some(update) = update {
                ctx.sink.emit(update.into());
            }

            if ctx.token.wait(ctx.config.pause) {
                break;
            }
        }
        Self::mark_self_stopped(&ctx);
    }

    /// Tag pump: always-on for the whole session, no duty cycle.
    fn tag_loop(ctx: WorkerCtx<R>) {
        while !ctx.token.is_cancelled() {
            if let Some(raw) = ctx.radio.next_tag_read(POLL_SLICE) {
                let now = Instant::now();
                let qualified = ctx
                    .filter
                    .lock()
                    .expect("mutex poisoned")
                    .qualify_tag(&raw, now);
                if let Some(event) = qualified {
                    Self::deliver(&ctx, event, now);
                }
            }
        }
    }

    fn deliver(ctx: &WorkerCtx<R>, event: DetectionEvent, now: Instant) {
        ctx.sink.emit(PairingEvent::DeviceDetected(event.clone()));
        let update = ctx
            .coordinator
            .lock()
            .expect("mutex poisoned")
            .on_detection(event, now);
        if let Some(update) = update {
            ctx.sink.emit(update.into());
        }
    }

    /// A worker that terminated on its own (capability failure mid
    /// session) releases the controller bookkeeping; a worker exiting
    /// because of `stop()` leaves it to `stop()`.
    fn mark_self_stopped(ctx: &WorkerCtx<R>) {
        let mut inner = ctx.inner.lock().expect("mutex poisoned");
        let ours = inner.session.as_ref().map(ScanSession::id) == Some(ctx.session_id);
        if ours && inner.state == ScanState::Active {
            inner.state = ScanState::Stopped;
            inner.session = None;
            inner.cancel = None;
        }
    }
}

impl<R: RadioPort + 'static> Drop for ScanController<R> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::events::event_channel;
    use crate::discovery::error::CapabilityError;
    use crate::discovery::radio::MockRadio;
    use crate::handshake::coordinator::DEFAULT_PROPOSAL_TIMEOUT;

    fn fast_config() -> ScanConfig {
        ScanConfig {
            criteria: FilterCriteria::named("Alex"),
            scan_window: Duration::from_millis(40),
            pause: Duration::from_millis(10),
            ..ScanConfig::default()
        }
    }

    fn ready_preconditions() -> Arc<Preconditions> {
        let preconditions = Arc::new(Preconditions::default());
        preconditions.set_profile_ready(true);
        preconditions.set_radio_permission(true);
        preconditions
    }

    fn controller(radio: MockRadio) -> (ScanController<MockRadio>, crate::api::events::EventStream)
    {
        let (sink, stream) = event_channel();
        let coordinator = Arc::new(Mutex::new(HandshakeCoordinator::new(
            DEFAULT_PROPOSAL_TIMEOUT,
        )));
        (
            ScanController::new(radio, fast_config(), ready_preconditions(), coordinator, sink),
            stream,
        )
    }

    #[test]
    fn start_is_idempotent() {
        let (controller, _stream) = controller(MockRadio::new());

        let first = controller.start().unwrap();
        let second = controller.start().unwrap();
        assert_eq!(first, second);
        assert_eq!(controller.state(), ScanState::Active);

        controller.stop();
    }

    #[test]
    fn stop_when_stopped_is_noop() {
        let (controller, _stream) = controller(MockRadio::new());
        assert_eq!(controller.state(), ScanState::Stopped);
        controller.stop();
        assert_eq!(controller.state(), ScanState::Stopped);
    }

    #[test]
    fn stop_releases_the_hardware_scan() {
        let (controller, _stream) = controller(MockRadio::new());

        controller.start().unwrap();
        // Give the loop a moment to be inside a scan window.
        thread::sleep(Duration::from_millis(20));
        controller.stop();

        assert!(!controller.radio().scan_active());
        assert_eq!(controller.state(), ScanState::Stopped);
    }

    #[test]
    fn restart_after_stop_yields_new_session() {
        let (controller, _stream) = controller(MockRadio::new());

        let first = controller.start().unwrap();
        controller.stop();
        let second = controller.start().unwrap();
        assert_ne!(first, second);

        controller.stop();
    }

    #[test]
    fn missing_profile_refuses_start() {
        let (sink, _stream) = event_channel();
        let preconditions = Arc::new(Preconditions::default());
        preconditions.set_radio_permission(true);
        let coordinator = Arc::new(Mutex::new(HandshakeCoordinator::default()));
        let controller = ScanController::new(
            MockRadio::new(),
            fast_config(),
            preconditions,
            coordinator,
            sink,
        );

        assert_eq!(
            controller.start(),
            Err(ScanError::PreconditionNotMet("profile not ready"))
        );
        assert_eq!(controller.state(), ScanState::Stopped);
    }

    #[test]
    fn permission_denied_leaves_controller_stopped() {
        let radio = MockRadio::new();
        radio.fail_next_start(CapabilityError::PermissionDenied);
        let (controller, _stream) = controller(radio);

        assert_eq!(
            controller.start(),
            Err(ScanError::Capability(CapabilityError::PermissionDenied))
        );
        assert_eq!(controller.state(), ScanState::Stopped);
        assert!(controller.session().is_none());
    }

    #[test]
    fn session_snapshot_reports_running() {
        let (controller, _stream) = controller(MockRadio::new());

        controller.start().unwrap();
        let session = controller.session().unwrap();
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(session.criteria(), &FilterCriteria::named("Alex"));

        controller.stop();
        assert!(controller.session().is_none());
    }

    #[test]
    fn cancellation_token_wakes_waiters() {
        let token = Arc::new(CancellationToken::new());
        let waiter = token.clone();
        let handle = thread::spawn(move || waiter.wait(Duration::from_secs(10)));

        thread::sleep(Duration::from_millis(10));
        token.cancel();
        let started = Instant::now();
        assert!(handle.join().unwrap());
        // Join must be immediate, not after the 10 s wait.
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn token_wait_times_out_uncancelled() {
        let token = CancellationToken::new();
        assert!(!token.wait(Duration::from_millis(5)));
        assert!(!token.is_cancelled());
    }
}
