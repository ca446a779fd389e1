//! Chain states and their presentation attributes.
//!
//! Position and colour are carried for the presentation layer only; the sampler
//! and the validator never look at them.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Width of the drawing canvas, in canvas units.
pub const CANVAS_WIDTH: f64 = 800.0;

/// Height of the drawing canvas, in canvas units.
pub const CANVAS_HEIGHT: f64 = 600.0;

/// Radius of a drawn state.
pub const NODE_RADIUS: f64 = 25.0;

/// Radius of the circle generated chains are laid out on.
pub const LAYOUT_RADIUS: f64 = 200.0;

/// Colours assigned to states in creation order.
pub const NODE_PALETTE: [&str; 10] = [
    "#4f46e5", // indigo
    "#06b6d4", // cyan
    "#10b981", // emerald
    "#f59e0b", // amber
    "#ef4444", // red
    "#8b5cf6", // violet
    "#f97316", // orange
    "#84cc16", // lime
    "#ec4899", // pink
    "#6b7280", // gray
];

/// Palette colour for the state created at `index`.
pub fn palette_color(index: usize) -> &'static str {
    NODE_PALETTE[index % NODE_PALETTE.len()]
}

/// A point on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Canvas centre.
    pub fn center() -> Self {
        Self::new(CANVAS_WIDTH / 2.0, CANVAS_HEIGHT / 2.0)
    }

    /// Clamp so a state drawn here stays fully on the canvas.
    pub fn clamped_to_canvas(self) -> Self {
        Self {
            x: self.x.clamp(NODE_RADIUS, CANVAS_WIDTH - NODE_RADIUS),
            y: self.y.clamp(NODE_RADIUS, CANVAS_HEIGHT - NODE_RADIUS),
        }
    }

    /// True when both coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A single state of the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateNode {
    /// Display identity. Renumbered to 0..N-1 after a deletion.
    pub id: u64,

    /// Where the state is drawn.
    pub position: Position,

    /// Fill colour, as a CSS colour string.
    pub color: String,
}

impl StateNode {
    pub fn new(id: u64, position: Position, color: impl Into<String>) -> Self {
        Self {
            id,
            position,
            color: color.into(),
        }
    }
}

/// Positions of `count` states evenly spaced on a circle around the canvas centre.
///
/// State `i` sits at angle `2πi / count`, starting on the positive x axis.
pub fn circle_layout(count: usize) -> Vec<Position> {
    let center = Position::center();
    (0..count)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / count as f64;
            Position::new(
                center.x + LAYOUT_RADIUS * angle.cos(),
                center.y + LAYOUT_RADIUS * angle.sin(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_wraps() {
        assert_eq!(palette_color(0), "#4f46e5");
        assert_eq!(palette_color(9), "#6b7280");
        assert_eq!(palette_color(10), palette_color(0));
    }

    #[test]
    fn test_circle_layout() {
        let positions = circle_layout(4);
        assert_eq!(positions.len(), 4);

        // First state sits on the positive x axis
        assert!((positions[0].x - 600.0).abs() < 1e-9);
        assert!((positions[0].y - 300.0).abs() < 1e-9);

        // Every state is on the layout circle
        for p in &positions {
            assert!((p.distance(&Position::center()) - LAYOUT_RADIUS).abs() < 1e-9);
        }
    }

    #[test]
    fn test_empty_layout() {
        assert!(circle_layout(0).is_empty());
    }

    #[test]
    fn test_clamp_to_canvas() {
        let p = Position::new(-10.0, 900.0).clamped_to_canvas();
        assert_eq!(p, Position::new(NODE_RADIUS, CANVAS_HEIGHT - NODE_RADIUS));

        let inside = Position::new(100.0, 100.0);
        assert_eq!(inside.clamped_to_canvas(), inside);
    }

    #[test]
    fn test_is_finite() {
        assert!(Position::new(0.0, -3.5).is_finite());
        assert!(!Position::new(f64::NAN, 10.0).is_finite());
        assert!(!Position::new(10.0, f64::INFINITY).is_finite());
        assert!(!Position::new(f64::NEG_INFINITY, 0.0).is_finite());
    }
}
