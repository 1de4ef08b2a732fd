use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Shapes an EFX can trace. Everything except `Triangle`, `Square` and
/// `Diamond` is a Lissajous figure with fixed frequency and phase ratios.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default, Serialize, Deserialize)]
pub enum PatternKind {
    #[default]
    Circle,
    Eight,
    Line,
    Diamond,
    Triangle,
    Square,
    Lissajous,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Circle => "Circle",
            PatternKind::Eight => "Eight",
            PatternKind::Line => "Line",
            PatternKind::Diamond => "Diamond",
            PatternKind::Triangle => "Triangle",
            PatternKind::Square => "Square",
            PatternKind::Lissajous => "Lissajous",
        }
    }
}

/// Shape parameters. Sizes and offsets are normalized to the travel of an
/// axis: a width of 1.0 sweeps the full range, an offset of 0.0 is centered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PatternParams {
    pub width: f64,
    pub height: f64,
    pub x_offset: f64,
    pub y_offset: f64,
    /// Degrees, counter-clockwise.
    pub rotation: f64,
    pub x_frequency: f64,
    pub y_frequency: f64,
    /// Degrees.
    pub x_phase: f64,
    /// Degrees.
    pub y_phase: f64,
}

impl Default for PatternParams {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            x_offset: 0.0,
            y_offset: 0.0,
            rotation: 0.0,
            x_frequency: 2.0,
            y_frequency: 3.0,
            x_phase: 90.0,
            y_phase: 0.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub kind: PatternKind,
    pub params: PatternParams,
}

impl Pattern {
    pub fn new(kind: PatternKind) -> Self {
        Self {
            kind,
            params: PatternParams::default(),
        }
    }

    pub fn with_params(kind: PatternKind, params: PatternParams) -> Self {
        Self { kind, params }
    }

    pub fn validate(&self) -> Result<(), String> {
        let p = &self.params;
        let values = [
            ("width", p.width),
            ("height", p.height),
            ("x_offset", p.x_offset),
            ("y_offset", p.y_offset),
            ("rotation", p.rotation),
            ("x_frequency", p.x_frequency),
            ("y_frequency", p.y_frequency),
            ("x_phase", p.x_phase),
            ("y_phase", p.y_phase),
        ];
        if let Some((name, _)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(format!("{} is not a finite number", name));
        }
        if p.width < 0.0 || p.height < 0.0 {
            return Err("width and height must not be negative".to_string());
        }
        if self.kind == PatternKind::Lissajous && (p.x_frequency < 0.0 || p.y_frequency < 0.0) {
            return Err("frequencies must not be negative".to_string());
        }
        Ok(())
    }

    /// Raw shape at phase `t` (0.0 to 1.0), both axes within -1.0 to 1.0.
    pub fn shape(&self, t: f64) -> (f64, f64) {
        let theta = 2.0 * PI * t;
        match self.kind {
            PatternKind::Circle => (theta.sin(), theta.cos()),
            PatternKind::Eight => (theta.sin(), (2.0 * theta).sin()),
            PatternKind::Line => (theta.sin(), theta.sin()),
            PatternKind::Diamond => (theta.sin().powi(3), theta.cos().powi(3)),
            PatternKind::Triangle => polygon(&[(0.0, 1.0), (1.0, -1.0), (-1.0, -1.0)], t),
            PatternKind::Square => polygon(&[(-1.0, 1.0), (1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)], t),
            PatternKind::Lissajous => {
                let p = &self.params;
                (
                    (theta * p.x_frequency + p.x_phase.to_radians()).sin(),
                    (theta * p.y_frequency + p.y_phase.to_radians()).sin(),
                )
            }
        }
    }

    /// Final position at phase `t`: scaled, rotated and offset. `reverse`
    /// mirrors the shape through its center before the offset is applied.
    /// Non-finite results collapse to the offset point.
    pub fn point(&self, t: f64, reverse: bool) -> (f64, f64) {
        let p = &self.params;
        let (x, y) = self.shape(t);
        let (x, y) = (x * p.width, y * p.height);

        let (sin, cos) = p.rotation.to_radians().sin_cos();
        let (mut x, mut y) = (x * cos - y * sin, x * sin + y * cos);

        if reverse {
            x = -x;
            y = -y;
        }

        let x = if x.is_finite() { x } else { 0.0 };
        let y = if y.is_finite() { y } else { 0.0 };
        (x + p.x_offset, y + p.y_offset)
    }
}

/// Map a pattern coordinate (-1.0 to 1.0) onto a unit axis position.
pub fn to_unit(value: f64) -> f64 {
    ((value + 1.0) / 2.0).clamp(0.0, 1.0)
}

// Walk a closed polygon at constant speed per edge.
fn polygon(points: &[(f64, f64)], t: f64) -> (f64, f64) {
    let t = if t.is_finite() { t.rem_euclid(1.0) } else { 0.0 };
    let segments = points.len() as f64;
    let position = t * segments;
    let index = (position.floor() as usize).min(points.len() - 1);
    let local = position - index as f64;

    let (x0, y0) = points[index];
    let (x1, y1) = points[(index + 1) % points.len()];
    (x0 + (x1 - x0) * local, y0 + (y1 - y0) * local)
}
