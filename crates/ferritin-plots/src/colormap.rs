//! Colormaps
//!
//! Piecewise versions of the two matplotlib maps the plots use. Inputs are
//! clamped to `[0, 1]`.
use std::f64::consts::PI;

/// An RGB color with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f64, pub f64, pub f64);

impl Rgb {
    pub fn to_css(self) -> String {
        let channel = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("rgb({},{},{})", channel(self.0), channel(self.1), channel(self.2))
    }
}

/// Blue to white to red.
pub fn bwr(t: f64) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        let s = t * 2.0;
        Rgb(s, s, 1.0)
    } else {
        let s = (1.0 - t) * 2.0;
        Rgb(1.0, s, s)
    }
}

/// Matplotlib `rainbow`: purple at 0, red at 1.
pub fn rainbow(t: f64) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    Rgb(
        (2.0 * t - 0.5).abs().min(1.0),
        (PI * t).sin(),
        (PI * t / 2.0).cos(),
    )
}

/// Reversed `rainbow`: red at 0, purple at 1.
pub fn rainbow_r(t: f64) -> Rgb {
    rainbow(1.0 - t.clamp(0.0, 1.0))
}

/// Map `value` in `[vmin, vmax]` onto `[0, 1]`.
pub fn normalize(value: f64, vmin: f64, vmax: f64) -> f64 {
    if vmax <= vmin {
        return 0.0;
    }
    ((value - vmin) / (vmax - vmin)).clamp(0.0, 1.0)
}
