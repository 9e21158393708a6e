use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{DetectionResult, Decoder};
use crate::camera::Frame;

/// Codes the demo mode picks from, paired with their format labels.
pub const SAMPLE_CODES: &[(&str, &str)] = &[
    ("5901234123457", "ean_13"),
    ("012345678905", "upc_a"),
    ("3017620422003", "ean_13"),
    ("96385074", "ean_8"),
    ("https://world.openfoodfacts.org", "qr_code"),
];

enum Mode {
    /// One entry per decode call; exhausted script decodes nothing.
    Scripted(VecDeque<Option<DetectionResult>>),
    /// After a random number of empty frames, reports one sample code for
    /// `burst` consecutive frames, then re-arms.
    Demo {
        rng: StdRng,
        min_frames: u32,
        max_frames: u32,
        burst: u32,
        countdown: u32,
        remaining_burst: u32,
        current: Option<DetectionResult>,
    },
}

/// Deterministic stand-in for a decoding library.
pub struct SimulatedDecoder {
    mode: Mutex<Mode>,
    attempts: AtomicU64,
}

impl SimulatedDecoder {
    pub fn scripted<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Option<DetectionResult>>,
    {
        Self {
            mode: Mutex::new(Mode::Scripted(script.into_iter().collect())),
            attempts: AtomicU64::new(0),
        }
    }

    /// Reports `result` on every frame.
    pub fn always(result: DetectionResult) -> Self {
        Self::scripted(std::iter::repeat(Some(result)).take(10_000))
    }

    pub fn demo(seed: u64, min_frames: u32, max_frames: u32, burst: u32) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let min_frames = min_frames.max(1);
        let max_frames = max_frames.max(min_frames);
        let countdown = rng.gen_range(min_frames..=max_frames);
        Self {
            mode: Mutex::new(Mode::Demo {
                rng,
                min_frames,
                max_frames,
                burst: burst.max(1),
                countdown,
                remaining_burst: 0,
                current: None,
            }),
            attempts: AtomicU64::new(0),
        }
    }

    /// Queues more scripted results. No effect in demo mode.
    pub fn push(&self, result: Option<DetectionResult>) {
        if let Ok(mut mode) = self.mode.lock() {
            if let Mode::Scripted(script) = &mut *mode {
                script.push_back(result);
            }
        }
    }

    /// Number of decode calls made so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Decoder for SimulatedDecoder {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn decode(&self, _frame: &Frame) -> Option<DetectionResult> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let mut mode = self.mode.lock().ok()?;

        match &mut *mode {
            Mode::Scripted(script) => script.pop_front().flatten(),
            Mode::Demo {
                rng,
                min_frames,
                max_frames,
                burst,
                countdown,
                remaining_burst,
                current,
            } => {
                if *remaining_burst > 0 {
                    *remaining_burst -= 1;
                    return current.clone();
                }
                if *countdown > 1 {
                    *countdown -= 1;
                    return None;
                }

                let (code, format) = SAMPLE_CODES[rng.gen_range(0..SAMPLE_CODES.len())];
                let picked = DetectionResult::new(code, format);
                *current = Some(picked.clone());
                *remaining_burst = *burst - 1;
                *countdown = rng.gen_range(*min_frames..=*max_frames);
                Some(picked)
            }
        }
    }

    fn reset(&self) {
        let Ok(mut mode) = self.mode.lock() else {
            return;
        };
        if let Mode::Demo {
            rng,
            min_frames,
            max_frames,
            countdown,
            remaining_burst,
            current,
            ..
        } = &mut *mode
        {
            *countdown = rng.gen_range(*min_frames..=*max_frames);
            *remaining_burst = 0;
            *current = None;
        }
    }
}
