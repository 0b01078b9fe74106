use std::fmt;

/// Playback volume as a ratio between silence (`0.0`) and full (`1.0`).
///
/// Every way of constructing or adjusting a `Volume` clamps to that range,
/// so a `Volume` is always valid.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Volume(f32);

impl Volume {
    /// Silence.
    pub const MIN: Self = Self(0.0);

    /// Full volume.
    pub const MAX: Self = Self(1.0);

    /// Amount by which [`increase`](Self::increase) and
    /// [`decrease`](Self::decrease) adjust the volume.
    pub const STEP: f32 = 0.1;

    /// Creates a volume from a ratio, clamping it to `0.0..=1.0`.
    ///
    /// `NaN` is treated as silence.
    #[must_use]
    pub fn from_ratio(ratio: f32) -> Self {
        if ratio.is_nan() {
            return Self::MIN;
        }
        Self(ratio.clamp(Self::MIN.0, Self::MAX.0))
    }

    #[must_use]
    pub fn as_ratio(self) -> f32 {
        self.0
    }

    #[must_use]
    pub fn as_percent(self) -> f32 {
        self.0 * 100.0
    }

    /// Returns the volume one step louder, saturating at full volume.
    #[must_use]
    pub fn increase(self) -> Self {
        Self::from_ratio(self.0 + Self::STEP)
    }

    /// Returns the volume one step softer, saturating at silence.
    #[must_use]
    pub fn decrease(self) -> Self {
        Self::from_ratio(self.0 - Self::STEP)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::MAX
    }
}

impl fmt::Display for Volume {
    /// Formats a `Volume` for display with a `%` sign.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}%", self.as_percent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrease_saturates_at_silence() {
        let mut volume = Volume::from_ratio(0.05);
        for _ in 0..5 {
            volume = volume.decrease();
            assert!(volume.as_ratio() >= 0.0);
        }
        assert_eq!(volume, Volume::MIN);
    }

    #[test]
    fn increase_saturates_at_full() {
        let mut volume = Volume::from_ratio(0.95);
        for _ in 0..5 {
            volume = volume.increase();
            assert!(volume.as_ratio() <= 1.0);
        }
        assert_eq!(volume, Volume::MAX);
    }

    #[test]
    fn construction_clamps() {
        assert_eq!(Volume::from_ratio(-3.0), Volume::MIN);
        assert_eq!(Volume::from_ratio(7.5), Volume::MAX);
        assert_eq!(Volume::from_ratio(f32::NAN), Volume::MIN);
        assert_eq!(Volume::default().to_string(), "100%");
    }
}
