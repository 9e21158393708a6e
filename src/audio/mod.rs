//! Detection feedback. The scanner only asks for a beep; whether anything
//! is audible depends on the `audio` feature.

#[cfg(feature = "audio")]
pub mod beep;
#[cfg(feature = "audio")]
mod engine;

#[cfg(feature = "audio")]
pub use engine::AudioFeedback;

pub trait Feedback: Send + Sync {
    /// Must not block; called with the controller lock held.
    fn detection_beep(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentFeedback;

impl Feedback for SilentFeedback {
    fn detection_beep(&self) {
        log::debug!("detection beep (silent)");
    }
}

/// Best available feedback for this build.
pub fn default_feedback() -> std::sync::Arc<dyn Feedback> {
    #[cfg(feature = "audio")]
    {
        std::sync::Arc::new(AudioFeedback::new())
    }

    #[cfg(not(feature = "audio"))]
    {
        std::sync::Arc::new(SilentFeedback)
    }
}
