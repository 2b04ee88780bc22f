//! Programmable CPU software rasterizer
//!
//! A small Direct3D-shaped pipeline rendered entirely in software:
//! - vertex and pixel programs as plain closures
//! - perspective-correct interpolation of arbitrary varyings
//! - integer edge equations with the top-left fill rule (no seams,
//!   no double coverage on shared edges)
//! - 1/w depth buffer
//! - BMP input/output and bilinear texture sampling
//! - optional wireframe overlay
//!
//! Bind a vertex and a pixel program, call [`Renderer::draw_primitive`]
//! once per triangle, then [`Renderer::save`] the image.

pub mod bitmap;
pub mod math;
pub mod model;
pub mod render;
pub mod shader;

pub use bitmap::{Bitmap, BitmapError};
pub use math::{saturate, Mat4, Vec2, Vec2i, Vec3, Vec4};
pub use model::{Model, ModelError};
pub use render::Renderer;
pub use shader::{PixelShader, Varyings, VertexShader};
