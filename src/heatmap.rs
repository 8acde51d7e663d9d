//! Stress-ratio heat map used by renderers.
//!
//! Pure display contract: cyan through green, yellow and orange to red as the
//! ratio climbs to one, flashing magenta beyond it.

use std::fmt;

/// Colour assigned to a bar for a given stress ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeatColor {
    /// Opaque colour for ratios up to one.
    Rgb {
        /// Red channel.
        r: u8,
        /// Green channel.
        g: u8,
        /// Blue channel.
        b: u8,
    },
    /// Ratio above one: drawn as magenta flashing between full and half opacity.
    Overstressed,
}

impl HeatColor {
    /// Opacity of the colour at `time_ms`; only overstressed bars flash.
    #[must_use]
    pub fn alpha(self, time_ms: f64) -> f64 {
        match self {
            HeatColor::Rgb { .. } => 1.0,
            HeatColor::Overstressed if (time_ms * 0.01).sin() > 0.0 => 1.0,
            HeatColor::Overstressed => 0.5,
        }
    }

    /// CSS colour string at `time_ms`.
    #[must_use]
    pub fn to_css(self, time_ms: f64) -> String {
        match self {
            HeatColor::Rgb { .. } => self.to_string(),
            HeatColor::Overstressed => format!("rgba(255, 0, 255, {})", self.alpha(time_ms)),
        }
    }
}

impl fmt::Display for HeatColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeatColor::Rgb { r, g, b } => write!(f, "rgb({r}, {g}, {b})"),
            HeatColor::Overstressed => write!(f, "rgb(255, 0, 255)"),
        }
    }
}

/// Map a stress ratio to its heat-map colour.
///
/// # Examples
/// ```
/// use trusslab::{heatmap_color, HeatColor};
///
/// assert_eq!(heatmap_color(0.0), HeatColor::Rgb { r: 0, g: 229, b: 255 });
/// assert_eq!(heatmap_color(1.0), HeatColor::Rgb { r: 255, g: 0, b: 0 });
/// assert_eq!(heatmap_color(1.2), HeatColor::Overstressed);
/// ```
#[must_use]
pub fn heatmap_color(stress_ratio: f64) -> HeatColor {
    if stress_ratio > 1.0 {
        return HeatColor::Overstressed;
    }
    let t = if stress_ratio.is_nan() {
        0.0
    } else {
        stress_ratio.max(0.0)
    };

    let (r, g, b) = if t < 0.25 {
        let local = t / 0.25;
        (0.0, 229.0 + 26.0 * local, 255.0 * (1.0 - local))
    } else if t < 0.5 {
        let local = (t - 0.25) / 0.25;
        (255.0 * local, 255.0, 0.0)
    } else if t < 0.75 {
        let local = (t - 0.5) / 0.25;
        (255.0, 255.0 - 119.0 * local, 0.0)
    } else {
        let local = (t - 0.75) / 0.25;
        (255.0, 136.0 * (1.0 - local), 0.0)
    };

    // Channels are truncated, not rounded.
    HeatColor::Rgb {
        r: r as u8,
        g: g as u8,
        b: b as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoints_hit_named_colours() {
        assert_eq!(heatmap_color(0.25), HeatColor::Rgb { r: 0, g: 255, b: 0 });
        assert_eq!(heatmap_color(0.5), HeatColor::Rgb { r: 255, g: 255, b: 0 });
        assert_eq!(heatmap_color(0.75), HeatColor::Rgb { r: 255, g: 136, b: 0 });
    }

    #[test]
    fn segments_interpolate_linearly() {
        assert_eq!(heatmap_color(0.125), HeatColor::Rgb { r: 0, g: 242, b: 127 });
        assert_eq!(heatmap_color(0.375), HeatColor::Rgb { r: 127, g: 255, b: 0 });
    }

    #[test]
    fn negative_and_nan_ratios_clamp_to_cool_end() {
        assert_eq!(heatmap_color(-3.0), heatmap_color(0.0));
        assert_eq!(heatmap_color(f64::NAN), heatmap_color(0.0));
    }

    #[test]
    fn overstress_flashes() {
        let color = heatmap_color(1.5);
        assert_eq!(color.alpha(100.0), 1.0);
        assert_eq!(color.alpha(400.0), 0.5);
        assert_eq!(color.to_css(100.0), "rgba(255, 0, 255, 1)");
        assert_eq!(heatmap_color(0.5).to_css(0.0), "rgb(255, 255, 0)");
    }
}
