pub mod color;
pub mod curve;
pub mod geometry;
pub mod input;
pub mod scene;

pub use color::Hsla;
pub use curve::{CurvePrimitive, LineSegment};
pub use geometry::{Bounds, Edges, Point, Size};
pub use input::{Cursor, InputEvent, Key, KeyCode, Modifiers, MouseButton, NamedKey};
pub use scene::{
    GlyphInstance, GpuImageQuad, GpuLine, GpuQuad, GpuTextQuad, Quad, Scene, SvgQuad, TextRun,
};
