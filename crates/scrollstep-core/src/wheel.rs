#![forbid(unsafe_code)]

//! Wheel input normalisation.
//!
//! Browsers report wheel deltas in three units (`WheelEvent.deltaMode`):
//! pixels, lines, or pages. The step machine only cares about the sign of the
//! vertical delta, but hosts hand over whatever the platform produced, so the
//! raw magnitude and unit are kept for logging and session traces.

/// Unit of a wheel delta, mirroring DOM `WheelEvent.deltaMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeltaMode {
    /// `DOM_DELTA_PIXEL` (0). Trackpads and most mice.
    #[default]
    Pixel,
    /// `DOM_DELTA_LINE` (1). Firefox with a notched wheel.
    Line,
    /// `DOM_DELTA_PAGE` (2).
    Page,
}

impl DeltaMode {
    /// Map a DOM `deltaMode` code. Unknown codes fall back to [`DeltaMode::Pixel`].
    #[must_use]
    pub const fn from_dom_code(code: u32) -> Self {
        match code {
            1 => Self::Line,
            2 => Self::Page,
            _ => Self::Pixel,
        }
    }

    /// DOM `deltaMode` code for this unit.
    #[must_use]
    pub const fn dom_code(self) -> u32 {
        match self {
            Self::Pixel => 0,
            Self::Line => 1,
            Self::Page => 2,
        }
    }
}

/// Direction of a wheel gesture relative to the step sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WheelDirection {
    /// Positive vertical delta: toward the next item.
    Forward,
    /// Negative vertical delta: toward the previous item.
    Backward,
    /// Zero or non-finite delta.
    None,
}

/// One vertical wheel delta as delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelDelta {
    /// Vertical delta (`WheelEvent.deltaY`). Positive scrolls down the page.
    pub dy: f64,
    /// Unit of `dy`.
    pub mode: DeltaMode,
}

impl WheelDelta {
    /// Pixel-mode delta.
    #[must_use]
    pub const fn pixels(dy: f64) -> Self {
        Self {
            dy,
            mode: DeltaMode::Pixel,
        }
    }

    /// Delta with an explicit unit.
    #[must_use]
    pub const fn new(dy: f64, mode: DeltaMode) -> Self {
        Self { dy, mode }
    }

    /// Direction implied by the sign of `dy`.
    #[must_use]
    pub fn direction(self) -> WheelDirection {
        if !self.dy.is_finite() || self.dy == 0.0 {
            WheelDirection::None
        } else if self.dy > 0.0 {
            WheelDirection::Forward
        } else {
            WheelDirection::Backward
        }
    }
}

impl From<f64> for WheelDelta {
    fn from(dy: f64) -> Self {
        Self::pixels(dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_determines_direction() {
        assert_eq!(WheelDelta::pixels(120.0).direction(), WheelDirection::Forward);
        assert_eq!(WheelDelta::pixels(-0.5).direction(), WheelDirection::Backward);
        assert_eq!(WheelDelta::pixels(0.0).direction(), WheelDirection::None);
        assert_eq!(WheelDelta::pixels(-0.0).direction(), WheelDirection::None);
    }

    #[test]
    fn non_finite_delta_has_no_direction() {
        assert_eq!(WheelDelta::pixels(f64::NAN).direction(), WheelDirection::None);
        assert_eq!(
            WheelDelta::pixels(f64::INFINITY).direction(),
            WheelDirection::None
        );
    }

    #[test]
    fn dom_codes_map_both_ways() {
        for mode in [DeltaMode::Pixel, DeltaMode::Line, DeltaMode::Page] {
            assert_eq!(DeltaMode::from_dom_code(mode.dom_code()), mode);
        }
        assert_eq!(DeltaMode::from_dom_code(7), DeltaMode::Pixel);
    }
}
