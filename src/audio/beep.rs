use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
const FADE_SAMPLES: u32 = 220;

/// Short sine tone with a linear fade at both ends to avoid clicks.
pub struct Beep {
    frequency: f32,
    volume: f32,
    position: u32,
    total_samples: u32,
}

impl Beep {
    pub fn new(frequency: f32, duration: Duration, volume: f32) -> Self {
        let total_samples = (duration.as_secs_f32() * SAMPLE_RATE as f32) as u32;
        Self {
            frequency,
            volume: volume.clamp(0.0, 1.0),
            position: 0,
            total_samples,
        }
    }

    /// The tone played on a confirmed detection.
    pub fn detection() -> Self {
        Self::new(880.0, Duration::from_millis(150), 0.3)
    }

    fn envelope(&self) -> f32 {
        let from_start = self.position;
        let to_end = self.total_samples.saturating_sub(self.position);
        let edge = from_start.min(to_end).min(FADE_SAMPLES);
        edge as f32 / FADE_SAMPLES as f32
    }
}

impl Iterator for Beep {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total_samples {
            return None;
        }
        let t = self.position as f32 / SAMPLE_RATE as f32;
        let sample = (2.0 * PI * self.frequency * t).sin() * self.volume * self.envelope();
        self.position += 1;
        Some(sample)
    }
}

impl Source for Beep {
    fn current_frame_len(&self) -> Option<usize> {
        Some((self.total_samples - self.position.min(self.total_samples)) as usize)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / SAMPLE_RATE as f32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beep_is_finite_and_bounded() {
        let beep = Beep::new(440.0, Duration::from_millis(10), 0.5);
        let samples: Vec<f32> = beep.collect();
        assert!((440..=441).contains(&samples.len()));
        assert!(samples.iter().all(|s| s.abs() <= 0.5));
        assert_eq!(samples[0], 0.0);
    }
}
