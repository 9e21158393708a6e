#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Condvar, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use codescan_lib::{
    audio::Feedback,
    camera::{CameraDevice, FacingMode, Frame, FrameSource},
    clock::ManualClock,
    decoder::{Decoder, DetectionResult, SimulatedDecoder},
    error::{CameraError, LookupError, PersistenceError},
    product::{ProductInfo, ProductLookup},
    storage::{MemoryStorage, Storage, HISTORY_KEY},
    Collaborators, ScanController, ScanDriver, ScannerConfig,
};
use image::GrayImage;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartBehavior {
    Succeed,
    Deny,
    /// Never finishes; the controller's start timeout has to fire.
    Hang,
}

/// Capture device double: blank frames, configurable start outcome.
pub struct FakeCamera {
    pub has_devices: bool,
    pub torch: bool,
    behaviors: std::sync::Mutex<Vec<StartBehavior>>,
    streaming: AtomicBool,
    pub starts: AtomicUsize,
    pub last_facing: std::sync::Mutex<Option<FacingMode>>,
}

impl FakeCamera {
    pub fn working() -> Self {
        Self::with_starts(vec![])
    }

    /// Start attempts consume `behaviors` in order, then succeed.
    pub fn with_starts(behaviors: Vec<StartBehavior>) -> Self {
        Self {
            has_devices: true,
            torch: false,
            behaviors: std::sync::Mutex::new(behaviors),
            streaming: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            last_facing: std::sync::Mutex::new(None),
        }
    }

    pub fn without_devices() -> Self {
        Self {
            has_devices: false,
            ..Self::working()
        }
    }

    pub fn with_torch() -> Self {
        Self {
            torch: true,
            ..Self::working()
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for FakeCamera {
    async fn devices(&self) -> Vec<CameraDevice> {
        if !self.has_devices {
            return Vec::new();
        }
        vec![CameraDevice {
            id: "fake-0".into(),
            label: "Fake camera".into(),
            facing: Some(FacingMode::Environment),
        }]
    }

    async fn start(&self, facing: FacingMode) -> Result<(), CameraError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.last_facing.lock().unwrap() = Some(facing);
        let behavior = {
            let mut behaviors = self.behaviors.lock().unwrap();
            if behaviors.is_empty() {
                StartBehavior::Succeed
            } else {
                behaviors.remove(0)
            }
        };
        match behavior {
            StartBehavior::Succeed => {
                self.streaming.store(true, Ordering::SeqCst);
                Ok(())
            }
            StartBehavior::Deny => Err(CameraError::PermissionDenied),
            StartBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    async fn stop(&self) {
        self.streaming.store(false, Ordering::SeqCst);
    }

    fn grab_frame(&self) -> Option<Frame> {
        self.is_streaming()
            .then(|| Frame::new(0, GrayImage::new(8, 8)))
    }

    fn has_torch(&self) -> bool {
        self.torch
    }

    async fn set_torch(&self, _on: bool) -> Result<(), CameraError> {
        if self.torch {
            Ok(())
        } else {
            Err(CameraError::TorchUnsupported)
        }
    }
}

/// Product database double. Codes listed in `gated` wait for `release`.
#[derive(Default)]
pub struct StubLookup {
    products: HashMap<String, ProductInfo>,
    gated: Vec<String>,
    pub gate: Notify,
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl StubLookup {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, code: &str, brand: &str, name: &str) -> Self {
        self.products.insert(
            code.to_string(),
            ProductInfo {
                code: code.to_string(),
                name: Some(name.to_string()),
                brand: Some(brand.to_string()),
                ..Default::default()
            },
        );
        self
    }

    pub fn gate_code(mut self, code: &str) -> Self {
        self.gated.push(code.to_string());
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ProductLookup for StubLookup {
    async fn lookup(&self, code: &str) -> Result<Option<ProductInfo>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gated.iter().any(|gated| gated == code) {
            self.gate.notified().await;
        }
        if self.fail {
            return Err(LookupError::Status(503));
        }
        Ok(self.products.get(code).cloned())
    }
}

#[derive(Default)]
pub struct CountingFeedback {
    pub beeps: AtomicUsize,
}

impl CountingFeedback {
    pub fn count(&self) -> usize {
        self.beeps.load(Ordering::SeqCst)
    }
}

impl Feedback for CountingFeedback {
    fn detection_beep(&self) {
        self.beeps.fetch_add(1, Ordering::SeqCst);
    }
}

/// Decoder whose first decode blocks until `release`, then reports `code`.
/// Later decodes find nothing. `reset` does not unblock it.
pub struct GatedDecoder {
    code: String,
    pub entered: Notify,
    released: Mutex<bool>,
    wake: Condvar,
    used: AtomicBool,
}

impl GatedDecoder {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            entered: Notify::new(),
            released: Mutex::new(false),
            wake: Condvar::new(),
            used: AtomicBool::new(false),
        }
    }

    pub fn release(&self) {
        *self.released.lock().unwrap() = true;
        self.wake.notify_all();
    }
}

impl Decoder for GatedDecoder {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn decode(&self, _frame: &Frame) -> Option<DetectionResult> {
        if self.used.swap(true, Ordering::SeqCst) {
            return None;
        }
        self.entered.notify_one();
        let mut released = self.released.lock().unwrap();
        while !*released {
            released = self.wake.wait(released).unwrap();
        }
        hit(&self.code, "ean_13")
    }
}

/// Memory storage whose history writes take `delay`.
pub struct SlowHistoryStorage {
    inner: MemoryStorage,
    delay: Duration,
}

impl SlowHistoryStorage {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStorage::new(),
            delay,
        }
    }
}

#[async_trait]
impl Storage for SlowHistoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        if key == HISTORY_KEY {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.set(key, value).await
    }
}

pub fn hit(code: &str, format: &str) -> Option<DetectionResult> {
    Some(DetectionResult::new(code, format))
}

pub struct Harness {
    pub controller: ScanController,
    pub camera: Arc<FakeCamera>,
    pub decoder: Arc<SimulatedDecoder>,
    pub lookup: Arc<StubLookup>,
    pub feedback: Arc<CountingFeedback>,
    pub clock: Arc<ManualClock>,
    pub storage: Arc<dyn Storage>,
}

pub struct HarnessBuilder {
    camera: FakeCamera,
    decoder: SimulatedDecoder,
    custom_decoder: Option<Arc<dyn Decoder>>,
    lookup: StubLookup,
    storage: Arc<dyn Storage>,
    config: ScannerConfig,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            camera: FakeCamera::working(),
            decoder: SimulatedDecoder::scripted(Vec::new()),
            custom_decoder: None,
            lookup: StubLookup::empty(),
            storage: Arc::new(MemoryStorage::new()),
            config: ScannerConfig {
                driver: ScanDriver::Manual,
                ..ScannerConfig::default()
            },
        }
    }

    pub fn camera(mut self, camera: FakeCamera) -> Self {
        self.camera = camera;
        self
    }

    pub fn decoder(mut self, decoder: SimulatedDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Replaces the simulated decoder; `Harness::decoder` is then unused.
    pub fn custom_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.custom_decoder = Some(decoder);
        self
    }

    pub fn lookup(mut self, lookup: StubLookup) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn driver(mut self, driver: ScanDriver) -> Self {
        self.config.driver = driver;
        self
    }

    pub fn camera_timeout(mut self, timeout: Duration) -> Self {
        self.config.camera_start_timeout = timeout;
        self
    }

    pub async fn build(self) -> Harness {
        let camera = Arc::new(self.camera);
        let decoder = Arc::new(self.decoder);
        let lookup = Arc::new(self.lookup);
        let feedback = Arc::new(CountingFeedback::default());
        let clock = Arc::new(ManualClock::default());

        let controller = ScanController::open(
            Collaborators {
                camera: camera.clone(),
                decoder: self
                    .custom_decoder
                    .unwrap_or_else(|| decoder.clone() as Arc<dyn Decoder>),
                lookup: lookup.clone(),
                storage: self.storage.clone(),
                feedback: feedback.clone(),
                clock: clock.clone(),
            },
            self.config,
        )
        .await;

        Harness {
            controller,
            camera,
            decoder,
            lookup,
            feedback,
            clock,
            storage: self.storage,
        }
    }
}

impl Harness {
    /// Camera streaming and the loop armed.
    pub async fn scanning(self) -> Self {
        self.controller.initialize().await;
        self.controller.request_permission().await.unwrap();
        self.controller.start_scanning().await.unwrap();
        self
    }
}
