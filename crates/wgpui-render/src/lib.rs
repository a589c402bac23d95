pub mod renderer;
pub mod svg;

pub use renderer::{RenderMetrics, Renderer};
pub use svg::{SvgRasterized, SvgRenderer};
