//! Timeline layout and SVG rendering.

pub mod layout;
pub mod render;

pub use layout::*;
pub use render::*;

use crate::error::Result;
use crate::models::Activity;

/// Lay out sorted activities and draw them. `None` when there is nothing to draw.
pub fn render_activities(activities: &[Activity], options: &ChartOptions) -> Result<Option<String>> {
    match TimelineLayout::build(activities) {
        Some(layout) => render_svg(&layout, options).map(Some),
        None => Ok(None),
    }
}
