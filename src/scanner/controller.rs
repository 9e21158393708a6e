use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    audio::Feedback,
    camera::{CameraDevice, FrameSource},
    clock::Clock,
    config::{ScanDriver, ScannerConfig},
    decoder::Decoder,
    detection::{BarcodeFormat, Confirmation, ConfirmationEngine},
    error::{CameraError, ScanError},
    history::{HistoryStore, ScanRecord, ScanSource},
    product::{ProductCard, ProductLookup},
    settings::{ScannerSettings, SettingsStore},
    storage::Storage,
};

use super::{
    events::{CurrentScan, ScannerEvent},
    loop_worker::scan_loop,
    state::{ScanPhase, ScanStats, SessionState},
};

const EVENT_CHANNEL_CAPACITY: usize = 64;
const DECODE_TIMEOUT: Duration = Duration::from_secs(5);

/// External collaborators the controller is wired to.
#[derive(Clone)]
pub struct Collaborators {
    pub camera: Arc<dyn FrameSource>,
    pub decoder: Arc<dyn Decoder>,
    pub lookup: Arc<dyn ProductLookup>,
    pub storage: Arc<dyn Storage>,
    pub feedback: Arc<dyn Feedback>,
    pub clock: Arc<dyn Clock>,
}

/// Result of a single scan-loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Confirmed(ScanRecord),
    /// Scanning is no longer running; the loop must not reschedule.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAgain {
    Scanning,
    ManualEntry,
}

struct ControllerState {
    session: SessionState,
    engine: ConfirmationEngine,
    stats: ScanStats,
    settings: SettingsStore,
    history: HistoryStore,
    current: Option<CurrentScan>,
    /// Bumped whenever a scan session starts or ends. A decode that began
    /// under an older generation is discarded.
    generation: u64,
}

impl ControllerState {
    fn next_generation(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }
}

struct ScanTask {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns session state, settings and history, and drives the scan loop.
/// Cheap to clone; clones share the same scanner.
#[derive(Clone)]
pub struct ScanController {
    state: Arc<Mutex<ControllerState>>,
    camera: Arc<dyn FrameSource>,
    decoder: Arc<dyn Decoder>,
    lookup: Arc<dyn ProductLookup>,
    feedback: Arc<dyn Feedback>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<ScannerEvent>,
    scan_task: Arc<Mutex<Option<ScanTask>>>,
    lookup_tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    config: Arc<ScannerConfig>,
}

impl ScanController {
    /// Loads settings and history through the persistence adapter and
    /// returns an idle controller.
    pub async fn open(parts: Collaborators, config: ScannerConfig) -> Self {
        let settings = SettingsStore::load(parts.storage.clone()).await;
        let history = HistoryStore::load(parts.storage.clone(), config.history_capacity).await;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!(
            "Scanner ready: decoder={}, {} record(s) in history",
            parts.decoder.name(),
            history.len()
        );

        Self {
            state: Arc::new(Mutex::new(ControllerState {
                session: SessionState::new(),
                engine: ConfirmationEngine::new(),
                stats: ScanStats::default(),
                settings,
                history,
                current: None,
                generation: 0,
            })),
            camera: parts.camera,
            decoder: parts.decoder,
            lookup: parts.lookup,
            feedback: parts.feedback,
            clock: parts.clock,
            events,
            scan_task: Arc::new(Mutex::new(None)),
            lookup_tasks: Arc::new(Mutex::new(Vec::new())),
            config: Arc::new(config),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScannerEvent> {
        self.events.subscribe()
    }

    pub async fn session(&self) -> SessionState {
        self.state.lock().await.session.clone()
    }

    pub async fn phase(&self) -> ScanPhase {
        self.state.lock().await.session.phase
    }

    pub async fn stats(&self) -> ScanStats {
        self.state.lock().await.stats.clone()
    }

    pub async fn current_scan(&self) -> Option<CurrentScan> {
        self.state.lock().await.current.clone()
    }

    pub async fn history(&self) -> Vec<ScanRecord> {
        self.state.lock().await.history.snapshot()
    }

    pub async fn settings(&self) -> ScannerSettings {
        self.state.lock().await.settings.current().clone()
    }

    /// Checks for capture devices. With none, the scanner parks in
    /// `CameraUnavailable` and only manual entry remains.
    pub async fn initialize(&self) -> Vec<CameraDevice> {
        let devices = self.camera.devices().await;
        let mut state = self.state.lock().await;

        if devices.is_empty() {
            state.session.camera_available = false;
            state.session.phase = ScanPhase::CameraUnavailable;
            state.session.last_error = Some(CameraError::NoDevice.to_string());
            warn!("No capture device found; manual entry only");
        } else {
            state.session.camera_available = true;
            if state.session.phase == ScanPhase::CameraUnavailable {
                state.session.phase = ScanPhase::Idle;
                state.session.last_error = None;
            }
            info!("Found {} capture device(s)", devices.len());
        }
        self.emit_phase(&state.session);

        devices
    }

    pub async fn request_permission(&self) -> Result<ScanPhase, ScanError> {
        let facing = {
            let mut state = self.state.lock().await;
            let session = &state.session;
            match session.phase {
                ScanPhase::Idle | ScanPhase::Error => {}
                ScanPhase::Confirmed if !session.stream_active => {}
                ScanPhase::Streaming | ScanPhase::Scanning | ScanPhase::Confirmed => {
                    return Ok(session.phase);
                }
                ScanPhase::CameraUnavailable => return Err(CameraError::NoDevice.into()),
                phase @ ScanPhase::AwaitingPermission => {
                    return Err(ScanError::InvalidState {
                        operation: "request camera permission",
                        phase,
                    });
                }
            }

            state.session.phase = ScanPhase::AwaitingPermission;
            state.session.last_error = None;
            self.emit_phase(&state.session);
            state.session.facing
        };

        let timeout = self.config.camera_start_timeout;
        let started = match tokio::time::timeout(timeout, self.camera.start(facing)).await {
            Ok(result) => result,
            Err(_) => {
                self.camera.stop().await;
                Err(CameraError::StartTimeout(timeout))
            }
        };

        let mut state = self.state.lock().await;
        match started {
            Ok(()) => {
                state.session.stream_started(self.camera.has_torch());
                info!("Camera streaming ({} facing)", facing.as_str());
                self.emit_phase(&state.session);
                Ok(state.session.phase)
            }
            Err(err) => {
                warn!("Camera start failed: {err}");
                state.session.stream_failed(err.to_string());
                self.emit_phase(&state.session);
                Err(err.into())
            }
        }
    }

    pub async fn start_scanning(&self) -> Result<(), ScanError> {
        let generation = {
            let mut state = self.state.lock().await;
            match state.session.phase {
                ScanPhase::Scanning => return Ok(()),
                ScanPhase::Streaming => {}
                phase => {
                    return Err(ScanError::InvalidState {
                        operation: "start scanning",
                        phase,
                    })
                }
            }

            state.engine.reset();
            state.stats = ScanStats::begin(self.clock.now());
            state.session.running = true;
            state.session.phase = ScanPhase::Scanning;
            self.decoder.reset();
            info!("Scanning started");
            self.emit_phase(&state.session);
            state.next_generation()
        };

        self.spawn_scan_loop(generation).await;
        Ok(())
    }

    /// Idempotent. Returns once the loop task has exited.
    pub async fn stop_scanning(&self) {
        {
            let mut state = self.state.lock().await;
            if state.session.phase != ScanPhase::Scanning {
                return;
            }
            state.session.running = false;
            state.session.phase = ScanPhase::Streaming;
            state.engine.reset();
            state.next_generation();
            info!(
                "Scanning stopped after {} frame(s)",
                state.stats.frames_processed
            );
            self.emit_phase(&state.session);
        }

        self.decoder.reset();
        self.join_scan_task().await;
    }

    /// One scan-loop iteration: grab a frame, decode it off the async
    /// threads, and feed any hit to the confirmation engine.
    pub async fn tick(&self) -> TickOutcome {
        self.tick_session(None).await
    }

    /// Tick on behalf of the loop spawned for `generation`; stops as soon
    /// as that session is over.
    pub(super) async fn tick_in(&self, generation: u64) -> TickOutcome {
        self.tick_session(Some(generation)).await
    }

    async fn tick_session(&self, expected: Option<u64>) -> TickOutcome {
        let generation = {
            let mut state = self.state.lock().await;
            if !state.session.running || state.session.phase != ScanPhase::Scanning {
                return TickOutcome::Stopped;
            }
            if expected.is_some_and(|expected| expected != state.generation) {
                return TickOutcome::Stopped;
            }
            state.stats.frames_processed += 1;
            state.generation
        };

        let Some(frame) = self.camera.grab_frame() else {
            return TickOutcome::Continue;
        };

        let decoder = self.decoder.clone();
        let decode = tokio::task::spawn_blocking(move || decoder.decode(&frame));
        let decoded = match tokio::time::timeout(DECODE_TIMEOUT, decode).await {
            Ok(Ok(decoded)) => decoded,
            Ok(Err(err)) => {
                warn!("Decoder task failed: {err}");
                None
            }
            Err(_) => {
                warn!("Frame decode took longer than {DECODE_TIMEOUT:?}; skipping frame");
                None
            }
        };
        let Some(result) = decoded else {
            return TickOutcome::Continue;
        };

        let mut state = self.state.lock().await;
        // The session may have ended, or been replaced, while the frame was decoding.
        if state.generation != generation
            || !state.session.running
            || state.session.phase != ScanPhase::Scanning
        {
            debug!("Dropping decode result for {} from an ended scan", result.code);
            return TickOutcome::Stopped;
        }

        state.stats.raw_detections += 1;
        let code = result.code.trim();
        if code.is_empty() {
            return TickOutcome::Continue;
        }
        let format = result.barcode_format();
        if !state.settings.current().is_format_enabled(format) {
            state.stats.filtered_detections += 1;
            debug!("Ignoring {code} ({format}): format disabled");
            return TickOutcome::Continue;
        }

        let policy = state.settings.current().confirmation_policy();
        let now = self.clock.now_ms();
        match state.engine.observe(code, format, now, &policy) {
            Confirmation::Pending { count, needed } => {
                debug!("Saw {code} ({format}) {count}/{needed}");
                TickOutcome::Continue
            }
            Confirmation::Confirmed(event) => {
                let record = self
                    .confirm(&mut state, event.code, event.format, ScanSource::Camera)
                    .await;
                TickOutcome::Confirmed(record)
            }
        }
    }

    /// Typed-in code, accepted without the confirmation engine.
    pub async fn submit_manual_code(
        &self,
        code: &str,
        format: BarcodeFormat,
    ) -> Result<ScanRecord, ScanError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ScanError::EmptyCode);
        }

        let mut state = self.state.lock().await;
        Ok(self
            .confirm(&mut state, code.to_string(), format, ScanSource::Manual)
            .await)
    }

    pub async fn scan_again(&self) -> Result<ScanAgain, ScanError> {
        {
            let mut state = self.state.lock().await;
            if state.session.phase != ScanPhase::Confirmed {
                return Err(ScanError::InvalidState {
                    operation: "scan again",
                    phase: state.session.phase,
                });
            }
            state.current = None;

            if !state.session.stream_active {
                state.session.phase = if state.session.camera_available {
                    ScanPhase::Idle
                } else {
                    ScanPhase::CameraUnavailable
                };
                self.emit_phase(&state.session);
                self.emit(ScannerEvent::ManualEntryRequested);
                return Ok(ScanAgain::ManualEntry);
            }

            state.session.phase = ScanPhase::Streaming;
            self.emit_phase(&state.session);
        }

        self.start_scanning().await?;
        Ok(ScanAgain::Scanning)
    }

    /// Flips facing mode, tears the stream down and asks for the camera again.
    pub async fn switch_camera(&self) -> Result<ScanPhase, ScanError> {
        {
            let mut state = self.state.lock().await;
            match state.session.phase {
                ScanPhase::CameraUnavailable => return Err(CameraError::NoDevice.into()),
                phase @ ScanPhase::AwaitingPermission => {
                    return Err(ScanError::InvalidState {
                        operation: "switch camera",
                        phase,
                    })
                }
                _ => {}
            }
            state.session.facing = state.session.facing.toggled();
            state.session.running = false;
            state.engine.reset();
            state.next_generation();
            info!("Switching to {} camera", state.session.facing.as_str());
        }

        self.teardown_stream().await;
        self.request_permission().await
    }

    /// Returns the flash state after the call. Silently leaves it alone when
    /// the active stream has no torch.
    pub async fn toggle_flash(&self) -> Result<bool, ScanError> {
        let mut state = self.state.lock().await;
        if !state.session.stream_active
            || !state.session.torch_available
            || !self.camera.has_torch()
        {
            return Ok(state.session.flash_on);
        }

        let target = !state.session.flash_on;
        match self.camera.set_torch(target).await {
            Ok(()) => {
                state.session.flash_on = target;
                self.emit(ScannerEvent::FlashChanged { on: target });
            }
            Err(err) => {
                let wanted = if target { "on" } else { "off" };
                warn!("Failed to switch torch {wanted}: {err}");
            }
        }
        Ok(state.session.flash_on)
    }

    /// Stops scanning and releases the capture device.
    pub async fn release_camera(&self) {
        {
            let mut state = self.state.lock().await;
            state.session.running = false;
            state.engine.reset();
            state.next_generation();
        }
        self.teardown_stream().await;
    }

    pub async fn update_settings(&self, settings: ScannerSettings) -> Result<(), ScanError> {
        let mut state = self.state.lock().await;
        state.settings.update(settings).await?;
        self.emit(ScannerEvent::SettingsChanged {
            settings: state.settings.current().clone(),
        });
        Ok(())
    }

    pub async fn clear_history(&self) {
        let mut state = self.state.lock().await;
        state.history.clear().await;
        self.emit(ScannerEvent::HistoryChanged { len: 0 });
    }

    /// Product search for the displayed result, for when auto search is off
    /// or the user wants to retry.
    pub async fn lookup_product(&self) -> Result<(), ScanError> {
        let record = {
            let mut state = self.state.lock().await;
            let phase = state.session.phase;
            let Some(current) = state.current.as_mut() else {
                return Err(ScanError::InvalidState {
                    operation: "look up a product",
                    phase,
                });
            };
            current.card = ProductCard::Pending;
            current.record.clone()
        };

        self.spawn_lookup(record).await;
        Ok(())
    }

    /// Waits for every product lookup issued so far, stale ones included.
    pub async fn await_pending_lookup(&self) {
        let handles = std::mem::take(&mut *self.lookup_tasks.lock().await);
        for handle in handles {
            if let Err(err) = handle.await {
                warn!("Product lookup task failed: {err}");
            }
        }
    }

    async fn confirm(
        &self,
        state: &mut ControllerState,
        code: String,
        format: BarcodeFormat,
        source: ScanSource,
    ) -> ScanRecord {
        // Stop first so no second confirmation can race the lookup below.
        state.session.running = false;
        state.engine.reset();
        state.next_generation();
        self.cancel_scan_task().await;
        self.decoder.reset();

        let settings = state.settings.current().clone();
        if settings.audio_feedback {
            self.feedback.detection_beep();
        }
        self.emit(ScannerEvent::DetectionFeedback { code: code.clone() });

        let record = ScanRecord {
            id: Uuid::new_v4().to_string(),
            code,
            format,
            timestamp: self.clock.now().to_rfc3339(),
            source,
            product: None,
        };
        info!(
            "Confirmed {} ({}) via {:?}",
            record.code, record.format, record.source
        );

        state.session.phase = ScanPhase::Confirmed;
        state.history.push(record.clone()).await;
        state.current = Some(CurrentScan {
            record: record.clone(),
            card: if settings.auto_search {
                ProductCard::Pending
            } else {
                ProductCard::Skipped
            },
        });

        self.emit_phase(&state.session);
        self.emit(ScannerEvent::ScanConfirmed {
            record: record.clone(),
        });
        self.emit(ScannerEvent::HistoryChanged {
            len: state.history.len(),
        });

        if settings.auto_search {
            self.spawn_lookup(record.clone()).await;
        }

        record
    }

    async fn spawn_lookup(&self, record: ScanRecord) {
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            controller.resolve_product(record).await;
        });

        // A lookup still in flight for an older record keeps running; its
        // result is discarded when it no longer matches the history head.
        let mut tasks = self.lookup_tasks.lock().await;
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    async fn resolve_product(&self, record: ScanRecord) -> ProductCard {
        let card = match self.lookup.lookup(&record.code).await {
            Ok(Some(product)) => ProductCard::Found { product },
            Ok(None) => ProductCard::not_found(&record.code),
            Err(err) => {
                warn!("Product lookup for {} failed: {err}", record.code);
                ProductCard::not_found(&record.code)
            }
        };

        let mut state = self.state.lock().await;
        let still_head = state
            .history
            .head()
            .map(|head| head.id == record.id && head.code == record.code)
            .unwrap_or(false);
        if !still_head {
            debug!("Discarding stale product lookup for {}", record.code);
            return card;
        }

        let display_name = match &card {
            ProductCard::Found { product } => product.display_name(),
            _ => None,
        };
        if let Some(name) = display_name.clone() {
            state
                .history
                .backfill_head_product(&record.id, &record.code, name)
                .await;
        }

        if let Some(current) = state
            .current
            .as_mut()
            .filter(|current| current.record.id == record.id)
        {
            current.card = card.clone();
            if display_name.is_some() {
                current.record.product = display_name;
            }
        }

        self.emit(ScannerEvent::ProductResolved {
            record_id: record.id.clone(),
            card: card.clone(),
        });
        card
    }

    async fn spawn_scan_loop(&self, generation: u64) {
        let period = match self.config.driver {
            ScanDriver::Manual => return,
            ScanDriver::Interval(period) => period,
        };

        let previous = self.scan_task.lock().await.take();
        if let Some(previous) = previous {
            previous.cancel_token.cancel();
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(scan_loop(
            self.clone(),
            generation,
            period,
            cancel_token.clone(),
        ));

        *self.scan_task.lock().await = Some(ScanTask {
            handle,
            cancel_token,
        });
    }

    /// Signals the loop without waiting for it. Safe to call from inside
    /// the loop task itself.
    async fn cancel_scan_task(&self) {
        let task = self.scan_task.lock().await.take();
        if let Some(task) = task {
            task.cancel_token.cancel();
        }
    }

    async fn join_scan_task(&self) {
        let task = self.scan_task.lock().await.take();
        if let Some(task) = task {
            task.cancel_token.cancel();
            if let Err(err) = task.handle.await {
                warn!("Scan loop task failed to join: {err}");
            }
        }
    }

    async fn teardown_stream(&self) {
        self.decoder.reset();
        self.join_scan_task().await;
        self.camera.stop().await;

        let mut state = self.state.lock().await;
        state.session.stream_stopped();
        if state.session.phase == ScanPhase::Idle && !state.session.camera_available {
            state.session.phase = ScanPhase::CameraUnavailable;
        }
        self.emit_phase(&state.session);
    }

    fn emit_phase(&self, session: &SessionState) {
        self.emit(ScannerEvent::PhaseChanged {
            session: session.clone(),
        });
    }

    fn emit(&self, event: ScannerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
