//! Shader program types and the varying store
//!
//! The vertex program fills a [`Varyings`] for each of the three vertices;
//! the rasterizer interpolates every key across the triangle and hands the
//! result to the pixel program.

use std::collections::HashMap;

use crate::math::{Vec2, Vec3, Vec4};

/// Per-vertex (and, after interpolation, per-pixel) shader outputs, keyed by
/// integer identifier. The four kinds are independent namespaces: the same
/// key may appear in more than one of them.
#[derive(Debug, Clone, Default)]
pub struct Varyings {
    pub scalar: HashMap<u32, f32>,
    pub vec2: HashMap<u32, Vec2>,
    pub vec3: HashMap<u32, Vec3>,
    pub vec4: HashMap<u32, Vec4>,
}

impl Varyings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty all four kinds; called before each vertex program invocation
    pub fn clear(&mut self) {
        self.scalar.clear();
        self.vec2.clear();
        self.vec3.clear();
        self.vec4.clear();
    }
}

/// Vertex program: receives the vertex index (0, 1 or 2) and the vertex's
/// varying store to fill, returns the homogeneous clip-space position.
/// Mapping the index onto application data is the caller's business.
pub type VertexShader = Box<dyn FnMut(usize, &mut Varyings) -> Vec4>;

/// Pixel program: receives the interpolated varyings, returns an RGBA color
/// with channels nominally in [0, 1].
pub type PixelShader = Box<dyn FnMut(&Varyings) -> Vec4>;
