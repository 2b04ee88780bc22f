//! The triangle pipeline: vertex program, trivial reject, perspective
//! divide, viewport mapping, edge-equation coverage with the top-left fill
//! rule, perspective-correct varying interpolation, depth test, pixel
//! program dispatch.

use std::path::Path;

use log::info;

use crate::bitmap::{Bitmap, BitmapError};
use crate::math::{Vec2, Vec2i, Vec4};
use crate::shader::{PixelShader, Varyings, VertexShader};

/// Transient per-draw vertex record
#[derive(Debug, Default)]
struct Vertex {
    context: Varyings,
    rhw: f32,
    pos: Vec4,
    spf: Vec2,
    spi: Vec2i,
}

struct RenderTarget {
    frame: Bitmap,
    // 1/w per pixel, flat row-major; larger is nearer, 0 is infinitely far
    depth: Vec<f32>,
}

/// Software rasterizer bound to a frame and depth buffer
pub struct Renderer {
    target: Option<RenderTarget>,
    vertex_shader: Option<VertexShader>,
    pixel_shader: Option<PixelShader>,
    color_bg: u32,
    color_fg: u32,
    render_frame: bool,
    render_pixel: bool,
}

const DEFAULT_BG: u32 = 0xff191970;
const DEFAULT_FG: u32 = 0xffffffff;

// Horizontal top edge, or an edge heading up the y-down screen; pixels on
// these edges count as inside, pixels on right/bottom edges do not.
fn is_top_left(a: Vec2i, b: Vec2i) -> bool {
    (a.y == b.y && a.x < b.x) || a.y > b.y
}

impl Renderer {
    /// Construct with allocated, cleared buffers
    pub fn new(width: usize, height: usize) -> Self {
        let mut rh = Self {
            target: None,
            vertex_shader: None,
            pixel_shader: None,
            color_bg: DEFAULT_BG,
            color_fg: DEFAULT_FG,
            render_frame: false,
            render_pixel: true,
        };
        rh.init(width, height);
        rh
    }

    /// Allocate the frame and depth buffers; resets any previous state first
    pub fn init(&mut self, width: usize, height: usize) {
        self.reset();
        self.target = Some(RenderTarget {
            frame: Bitmap::new(width, height),
            depth: vec![0.0; width * height],
        });
        self.clear();
        info!("rasterizer initialized at {}x{}", width, height);
    }

    /// Drop buffers and shaders, restore default colors
    pub fn reset(&mut self) {
        self.vertex_shader = None;
        self.pixel_shader = None;
        self.target = None;
        self.color_fg = DEFAULT_FG;
        self.color_bg = DEFAULT_BG;
    }

    /// Fill the frame buffer with the background color, zero the depth buffer
    pub fn clear(&mut self) {
        if let Some(target) = self.target.as_mut() {
            target.frame.fill(self.color_bg);
            target.depth.fill(0.0);
        }
    }

    pub fn set_vertex_shader<F>(&mut self, vs: F)
    where
        F: FnMut(usize, &mut Varyings) -> Vec4 + 'static,
    {
        self.vertex_shader = Some(Box::new(vs));
    }

    pub fn set_pixel_shader<F>(&mut self, ps: F)
    where
        F: FnMut(&Varyings) -> Vec4 + 'static,
    {
        self.pixel_shader = Some(Box::new(ps));
    }

    /// Background color used by [`clear`](Self::clear)
    pub fn set_background(&mut self, color: u32) {
        self.color_bg = color;
    }

    /// Foreground color used by line and wireframe drawing
    pub fn set_foreground(&mut self, color: u32) {
        self.color_fg = color;
    }

    /// Toggle the wireframe overlay and the pixel fill stage
    pub fn set_render_state(&mut self, wireframe: bool, fill: bool) {
        self.render_frame = wireframe;
        self.render_pixel = fill;
    }

    pub fn width(&self) -> usize {
        self.target.as_ref().map_or(0, |t| t.frame.width)
    }

    pub fn height(&self) -> usize {
        self.target.as_ref().map_or(0, |t| t.frame.height)
    }

    pub fn frame(&self) -> Option<&Bitmap> {
        self.target.as_ref().map(|t| &t.frame)
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> u32 {
        self.target.as_ref().map_or(0, |t| t.frame.get_pixel(x, y))
    }

    /// Stored 1/w at a pixel; 0 where nothing has been drawn
    pub fn depth_at(&self, x: usize, y: usize) -> f32 {
        self.target
            .as_ref()
            .and_then(|t| t.depth.get(y * t.frame.width + x).copied())
            .unwrap_or(0.0)
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if let Some(target) = self.target.as_mut() {
            target.frame.set_pixel(x, y, color);
        }
    }

    /// Line in the foreground color
    pub fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        let color = self.color_fg;
        if let Some(target) = self.target.as_mut() {
            target.frame.draw_line(x1, y1, x2, y2, color);
        }
    }

    /// Write the frame buffer to disk; no-op when uninitialized
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), BitmapError> {
        match self.target.as_ref() {
            Some(target) => target.frame.save(path),
            None => Ok(()),
        }
    }

    /// Rasterize the currently bound triangle. Returns false when nothing
    /// was filled: missing buffers or vertex program, a rejected or
    /// degenerate primitive, or fill disabled.
    pub fn draw_primitive(&mut self) -> bool {
        let (Some(target), Some(vs)) = (self.target.as_mut(), self.vertex_shader.as_mut()) else {
            return false;
        };
        let width = target.frame.width;
        let height = target.frame.height;

        let mut vertices: [Vertex; 3] = Default::default();

        for (k, vertex) in vertices.iter_mut().enumerate() {
            vertex.context.clear();
            vertex.pos = vs(k, &mut vertex.context);

            // Trivial reject against the view volume: one vertex out drops
            // the whole triangle, there is no partial clipping.
            let w = vertex.pos.w;
            if w == 0.0 {
                return false;
            }
            if vertex.pos.z < 0.0 || vertex.pos.z > w {
                return false;
            }
            if vertex.pos.x < -w || vertex.pos.x > w {
                return false;
            }
            if vertex.pos.y < -w || vertex.pos.y > w {
                return false;
            }

            // 1/w is linear in screen space, keep it for interpolation
            vertex.rhw = 1.0 / w;
            vertex.pos = vertex.pos * vertex.rhw;

            // Viewport mapping, y flipped so the origin is top-left
            vertex.spf.x = (vertex.pos.x + 1.0) * width as f32 * 0.5;
            vertex.spf.y = (1.0 - vertex.pos.y) * height as f32 * 0.5;

            // Snap to the integer grid, half-pixel centered
            vertex.spi.x = (vertex.spf.x + 0.5).floor() as i32;
            vertex.spi.y = (vertex.spf.y + 0.5).floor() as i32;
        }

        let min_x = vertices[0]
            .spi
            .x
            .min(vertices[1].spi.x)
            .min(vertices[2].spi.x)
            .clamp(0, width as i32 - 1);
        let max_x = vertices[0]
            .spi
            .x
            .max(vertices[1].spi.x)
            .max(vertices[2].spi.x)
            .clamp(0, width as i32 - 1);
        let min_y = vertices[0]
            .spi
            .y
            .min(vertices[1].spi.y)
            .min(vertices[2].spi.y)
            .clamp(0, height as i32 - 1);
        let max_y = vertices[0]
            .spi
            .y
            .max(vertices[1].spi.y)
            .max(vertices[2].spi.y)
            .clamp(0, height as i32 - 1);

        if self.render_frame {
            let [v0, v1, v2] = [vertices[0].spi, vertices[1].spi, vertices[2].spi];
            target.frame.draw_line(v0.x, v0.y, v1.x, v1.y, self.color_fg);
            target.frame.draw_line(v0.x, v0.y, v2.x, v2.y, self.color_fg);
            target.frame.draw_line(v2.x, v2.y, v1.x, v1.y, self.color_fg);
        }

        if !self.render_pixel {
            return false;
        }

        // Facing from the post-divide winding; clockwise triangles get
        // vertices 1 and 2 swapped so the edge equations stay non-negative
        // inside.
        let v01 = vertices[1].pos - vertices[0].pos;
        let v02 = vertices[2].pos - vertices[0].pos;
        let normal = v01.cross(v02);
        let order: [usize; 3] = if normal.z > 0.0 {
            [0, 2, 1]
        } else if normal.z == 0.0 {
            return false;
        } else {
            [0, 1, 2]
        };
        let vtx = [
            &vertices[order[0]],
            &vertices[order[1]],
            &vertices[order[2]],
        ];

        let p0 = vtx[0].spi;
        let p1 = vtx[1].spi;
        let p2 = vtx[2].spi;

        // Collinear on the integer grid, nothing to fill
        if (p1 - p0).cross(p2 - p0) == 0 {
            return false;
        }

        // Pixels on a top-left edge belong to the triangle, pixels on a
        // right/bottom edge do not; the +1 bias turns >= into a strict test.
        let bias01 = if is_top_left(p0, p1) { 0 } else { 1 };
        let bias12 = if is_top_left(p1, p2) { 0 } else { 1 };
        let bias20 = if is_top_left(p2, p0) { 0 } else { 1 };

        for cy in min_y..=max_y {
            for cx in min_x..=max_x {
                // Integer edge equations; signs flipped for the left-handed
                // y-down screen so inside is non-negative.
                let e01 = -(cx - p0.x) * (p1.y - p0.y) + (cy - p0.y) * (p1.x - p0.x);
                if e01 < bias01 {
                    continue;
                }
                let e12 = -(cx - p1.x) * (p2.y - p1.y) + (cy - p1.y) * (p2.x - p1.x);
                if e12 < bias12 {
                    continue;
                }
                let e20 = -(cx - p2.x) * (p0.y - p2.y) + (cy - p2.y) * (p0.x - p2.x);
                if e20 < bias20 {
                    continue;
                }

                // Screen barycentrics from sub-triangle areas at the pixel
                // center
                let px = Vec2::new(cx as f32 + 0.5, cy as f32 + 0.5);
                let s0 = vtx[0].spf - px;
                let s1 = vtx[1].spf - px;
                let s2 = vtx[2].spf - px;
                let a = s1.cross(s2).abs();
                let b = s2.cross(s0).abs();
                let c = s0.cross(s1).abs();
                let s = a + b + c;
                if s == 0.0 {
                    continue;
                }
                let a = a / s;
                let b = b / s;
                let c = c / s;

                let rhw = vtx[0].rhw * a + vtx[1].rhw * b + vtx[2].rhw * c;

                // Depth on 1/w, greater is nearer; the write happens before
                // shading, the pixel program cannot cancel it
                let idx = cy as usize * width + cx as usize;
                if rhw < target.depth[idx] {
                    continue;
                }
                target.depth[idx] = rhw;

                let w = 1.0 / if rhw != 0.0 { rhw } else { 1.0 };

                // Perspective-correct weights: attributes are carried as
                // attr/w (through rhw), interpolated linearly on screen,
                // then scaled back by this pixel's w
                let c0 = vtx[0].rhw * a * w;
                let c1 = vtx[1].rhw * b * w;
                let c2 = vtx[2].rhw * c * w;

                let i0 = &vtx[0].context;
                let i1 = &vtx[1].context;
                let i2 = &vtx[2].context;
                let mut input = Varyings::new();

                // Keys come from the first vertex; a key the other vertices
                // did not set interpolates from zero
                for (&key, &f0) in &i0.scalar {
                    let f1 = i1.scalar.get(&key).copied().unwrap_or_default();
                    let f2 = i2.scalar.get(&key).copied().unwrap_or_default();
                    input.scalar.insert(key, f0 * c0 + f1 * c1 + f2 * c2);
                }
                for (&key, &f0) in &i0.vec2 {
                    let f1 = i1.vec2.get(&key).copied().unwrap_or_default();
                    let f2 = i2.vec2.get(&key).copied().unwrap_or_default();
                    input.vec2.insert(key, f0 * c0 + f1 * c1 + f2 * c2);
                }
                for (&key, &f0) in &i0.vec3 {
                    let f1 = i1.vec3.get(&key).copied().unwrap_or_default();
                    let f2 = i2.vec3.get(&key).copied().unwrap_or_default();
                    input.vec3.insert(key, f0 * c0 + f1 * c1 + f2 * c2);
                }
                for (&key, &f0) in &i0.vec4 {
                    let f1 = i1.vec4.get(&key).copied().unwrap_or_default();
                    let f2 = i2.vec4.get(&key).copied().unwrap_or_default();
                    input.vec4.insert(key, f0 * c0 + f1 * c1 + f2 * c2);
                }

                let color = match self.pixel_shader.as_mut() {
                    Some(ps) => ps(&input),
                    None => Vec4::default(),
                };
                target.frame.set_pixel(cx, cy, color.to_color());
            }
        }

        if self.render_frame {
            let [v0, v1, v2] = [vertices[0].spi, vertices[1].spi, vertices[2].spi];
            target.frame.draw_line(v0.x, v0.y, v1.x, v1.y, self.color_fg);
            target.frame.draw_line(v0.x, v0.y, v2.x, v2.y, self.color_fg);
            target.frame.draw_line(v2.x, v2.y, v1.x, v1.y, self.color_fg);
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Mat4, Vec3};
    use std::cell::RefCell;
    use std::rc::Rc;

    const VARYING_COLOR: u32 = 0;
    const VARYING_UV: u32 = 0;

    const RED: Vec4 = Vec4 { x: 1.0, y: 0.0, z: 0.0, w: 1.0 };
    const GREEN: Vec4 = Vec4 { x: 0.0, y: 1.0, z: 0.0, w: 1.0 };
    const BLUE: Vec4 = Vec4 { x: 0.0, y: 0.0, z: 1.0, w: 1.0 };

    fn channels(c: u32) -> (u32, u32, u32, u32) {
        ((c >> 16) & 0xff, (c >> 8) & 0xff, c & 0xff, (c >> 24) & 0xff)
    }

    fn bind_color_triangle(rh: &mut Renderer, verts: [Vec4; 3], colors: [Vec4; 3]) {
        rh.set_vertex_shader(move |index, output| {
            output.vec4.insert(VARYING_COLOR, colors[index]);
            verts[index]
        });
        rh.set_pixel_shader(|input| {
            input.vec4.get(&VARYING_COLOR).copied().unwrap_or_default()
        });
    }

    fn spec_triangle() -> [Vec4; 3] {
        [
            Vec4::new(0.0, 0.7, 0.9, 1.0),
            Vec4::new(-0.6, -0.2, 0.01, 1.0),
            Vec4::new(0.6, -0.2, 0.01, 1.0),
        ]
    }

    #[test]
    fn test_draw_without_vertex_shader_is_noop() {
        let mut rh = Renderer::new(64, 64);
        assert!(!rh.draw_primitive());
    }

    #[test]
    fn test_draw_after_reset_is_noop() {
        let mut rh = Renderer::new(64, 64);
        bind_color_triangle(&mut rh, spec_triangle(), [RED, GREEN, BLUE]);
        assert!(rh.draw_primitive());
        rh.reset();
        assert!(!rh.draw_primitive());
    }

    #[test]
    fn test_reinit_clears_shaders() {
        let mut rh = Renderer::new(64, 64);
        bind_color_triangle(&mut rh, spec_triangle(), [RED, GREEN, BLUE]);
        rh.init(64, 64);
        assert!(!rh.draw_primitive());
    }

    #[test]
    fn test_colored_triangle_center_and_corners() {
        let mut rh = Renderer::new(800, 600);
        bind_color_triangle(&mut rh, spec_triangle(), [RED, GREEN, BLUE]);
        assert!(rh.draw_primitive());

        // all three colors blend at the center
        let (r, g, b, _) = channels(rh.get_pixel(400, 240));
        assert!(r > 0 && g > 0 && b > 0);

        // near each vertex its own color dominates
        let (r, g, b, _) = channels(rh.get_pixel(400, 95));
        assert!(r > g && r > b);
        let (r, g, b, _) = channels(rh.get_pixel(170, 355));
        assert!(g > r && g > b);
        let (r, g, b, _) = channels(rh.get_pixel(630, 355));
        assert!(b > r && b > g);
    }

    #[test]
    fn test_out_of_frustum_rejects_whole_triangle() {
        let mut rh = Renderer::new(800, 600);
        let mut verts = spec_triangle();
        verts[0].z = -0.1;
        bind_color_triangle(&mut rh, verts, [RED, GREEN, BLUE]);
        let before = rh.frame().unwrap().pixels.clone();
        assert!(!rh.draw_primitive());
        assert_eq!(rh.frame().unwrap().pixels, before);
    }

    #[test]
    fn test_w_zero_rejects() {
        let mut rh = Renderer::new(64, 64);
        let mut verts = spec_triangle();
        verts[1].w = 0.0;
        bind_color_triangle(&mut rh, verts, [RED, GREEN, BLUE]);
        assert!(!rh.draw_primitive());
    }

    #[test]
    fn test_reversed_winding_draws_identically() {
        let verts = spec_triangle();
        let colors = [RED, GREEN, BLUE];

        let mut forward = Renderer::new(200, 150);
        bind_color_triangle(&mut forward, verts, colors);
        assert!(forward.draw_primitive());

        let mut reversed = Renderer::new(200, 150);
        bind_color_triangle(
            &mut reversed,
            [verts[0], verts[2], verts[1]],
            [colors[0], colors[2], colors[1]],
        );
        assert!(reversed.draw_primitive());

        assert_eq!(
            forward.frame().unwrap().pixels,
            reversed.frame().unwrap().pixels
        );
    }

    #[test]
    fn test_degenerate_triangle_dropped() {
        let mut rh = Renderer::new(64, 64);
        let v = Vec4::new(0.1, 0.1, 0.5, 1.0);
        bind_color_triangle(&mut rh, [v, v, v], [RED, GREEN, BLUE]);
        assert!(!rh.draw_primitive());
    }

    // Two triangles sharing a diagonal: every covered pixel is shaded
    // exactly once and the union leaves no gap.
    fn assert_exactly_once(quad_order: [[usize; 3]; 2]) {
        let quad = [
            Vec4::new(-0.5, -0.5, 0.5, 1.0),
            Vec4::new(0.5, -0.5, 0.5, 1.0),
            Vec4::new(0.5, 0.5, 0.5, 1.0),
            Vec4::new(-0.5, 0.5, 0.5, 1.0),
        ];
        let mut rh = Renderer::new(64, 64);
        let invocations = Rc::new(RefCell::new(0u32));
        let current = Rc::new(RefCell::new([quad[0]; 3]));
        {
            let current = Rc::clone(&current);
            rh.set_vertex_shader(move |index, _output| current.borrow()[index]);
        }
        {
            let invocations = Rc::clone(&invocations);
            rh.set_pixel_shader(move |_input| {
                *invocations.borrow_mut() += 1;
                Vec4::new(1.0, 1.0, 1.0, 1.0)
            });
        }
        for tri in quad_order {
            *current.borrow_mut() = [quad[tri[0]], quad[tri[1]], quad[tri[2]]];
            assert!(rh.draw_primitive());
        }

        let painted = rh
            .frame()
            .unwrap()
            .pixels
            .iter()
            .filter(|&&p| p == 0xffffffff)
            .count() as u32;
        // the quad spans pixels [16, 48) in both axes
        assert_eq!(painted, 32 * 32);
        assert_eq!(*invocations.borrow(), painted);
    }

    #[test]
    fn test_shared_edge_no_seam_no_overdraw() {
        assert_exactly_once([[0, 1, 2], [2, 3, 0]]);
    }

    #[test]
    fn test_shared_edge_exactly_once_with_swapped_winding() {
        assert_exactly_once([[2, 1, 0], [0, 3, 2]]);
    }

    #[test]
    fn test_fullscreen_quad_covers_every_pixel() {
        let quad = [
            Vec4::new(-1.0, -1.0, 0.5, 1.0),
            Vec4::new(1.0, -1.0, 0.5, 1.0),
            Vec4::new(1.0, 1.0, 0.5, 1.0),
            Vec4::new(-1.0, 1.0, 0.5, 1.0),
        ];
        let mut rh = Renderer::new(32, 24);
        let current = Rc::new(RefCell::new([quad[0]; 3]));
        {
            let current = Rc::clone(&current);
            rh.set_vertex_shader(move |index, _output| current.borrow()[index]);
        }
        rh.set_pixel_shader(|_input| Vec4::new(1.0, 1.0, 1.0, 1.0));
        for tri in [[0usize, 1, 2], [2, 3, 0]] {
            *current.borrow_mut() = [quad[tri[0]], quad[tri[1]], quad[tri[2]]];
            assert!(rh.draw_primitive());
        }
        assert!(rh
            .frame()
            .unwrap()
            .pixels
            .iter()
            .all(|&p| p == 0xffffffff));
    }

    #[test]
    fn test_depth_later_draw_wins_on_equal_rhw() {
        let verts = [
            Vec4::new(0.0, 0.5, 0.01, 1.0),
            Vec4::new(-0.5, -0.5, 0.01, 1.0),
            Vec4::new(0.5, -0.5, 0.01, 1.0),
        ];
        let mut rh = Renderer::new(800, 600);
        bind_color_triangle(&mut rh, verts, [RED, RED, RED]);
        assert!(rh.draw_primitive());
        let mut far = verts;
        for v in &mut far {
            v.z = 0.9;
        }
        bind_color_triangle(&mut rh, far, [BLUE, BLUE, BLUE]);
        assert!(rh.draw_primitive());
        let (r, _, b, _) = channels(rh.get_pixel(400, 300));
        assert!(b > 0 && r == 0);
    }

    // Same screen-space triangle at homogeneous depth w: (x*w, y*w, z*w, w)
    fn tri_at_w(w: f32) -> [Vec4; 3] {
        let ndc = [
            Vec3::new(0.0, 0.5, 0.5),
            Vec3::new(-0.5, -0.5, 0.5),
            Vec3::new(0.5, -0.5, 0.5),
        ];
        [
            Vec4::new(ndc[0].x * w, ndc[0].y * w, ndc[0].z * w, w),
            Vec4::new(ndc[1].x * w, ndc[1].y * w, ndc[1].z * w, w),
            Vec4::new(ndc[2].x * w, ndc[2].y * w, ndc[2].z * w, w),
        ]
    }

    #[test]
    fn test_depth_nearer_wins_regardless_of_order() {
        let far = tri_at_w(10.0);
        let near = tri_at_w(1.25);

        let mut rh = Renderer::new(800, 600);
        bind_color_triangle(&mut rh, far, [RED, RED, RED]);
        assert!(rh.draw_primitive());
        bind_color_triangle(&mut rh, near, [BLUE, BLUE, BLUE]);
        assert!(rh.draw_primitive());
        let (r, _, b, _) = channels(rh.get_pixel(400, 300));
        assert!(b > 0 && r == 0);
        assert!((rh.depth_at(400, 300) - 0.8).abs() < 1e-4);

        let mut rh = Renderer::new(800, 600);
        bind_color_triangle(&mut rh, near, [BLUE, BLUE, BLUE]);
        assert!(rh.draw_primitive());
        bind_color_triangle(&mut rh, far, [RED, RED, RED]);
        assert!(rh.draw_primitive());
        let (r, _, b, _) = channels(rh.get_pixel(400, 300));
        assert!(b > 0 && r == 0);
        assert!((rh.depth_at(400, 300) - 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_pixel_color_clamped_to_bytes() {
        let mut rh = Renderer::new(64, 64);
        let verts = tri_at_w(1.0);
        let current = verts;
        rh.set_vertex_shader(move |index, _output| current[index]);
        rh.set_pixel_shader(|_input| Vec4::new(2.0, -1.0, 0.5, 1.0));
        assert!(rh.draw_primitive());
        assert_eq!(rh.get_pixel(32, 32), 0xffff007f);
    }

    #[test]
    fn test_missing_pixel_shader_writes_zero_and_depth() {
        let mut rh = Renderer::new(64, 64);
        let verts = tri_at_w(2.0);
        rh.set_vertex_shader(move |index, _output| verts[index]);
        assert!(rh.draw_primitive());
        assert_eq!(rh.get_pixel(32, 32), 0);
        assert!(rh.depth_at(32, 32) > 0.0);
    }

    #[test]
    fn test_missing_varying_key_interpolates_from_zero() {
        let mut rh = Renderer::new(64, 64);
        let verts = tri_at_w(1.0);
        rh.set_vertex_shader(move |index, output| {
            if index == 0 {
                output.scalar.insert(5, 3.0);
            }
            verts[index]
        });
        let observed = Rc::new(RefCell::new(f32::NAN));
        {
            let observed = Rc::clone(&observed);
            rh.set_pixel_shader(move |input| {
                let v = input.scalar.get(&5).copied().unwrap_or(f32::NAN);
                *observed.borrow_mut() = v;
                Vec4::new(v, v, v, 1.0)
            });
        }
        assert!(rh.draw_primitive());
        let v = *observed.borrow();
        assert!(v.is_finite());
        assert!(v >= 0.0 && v < 3.0);
    }

    #[test]
    fn test_wireframe_only_touches_edge_lines() {
        let mut rh = Renderer::new(800, 600);
        rh.set_render_state(true, false);
        bind_color_triangle(&mut rh, spec_triangle(), [RED, GREEN, BLUE]);
        // fill disabled: the call reports nothing filled
        assert!(!rh.draw_primitive());

        let mut expected = Bitmap::new(800, 600);
        expected.fill(DEFAULT_BG);
        expected.draw_line(400, 90, 160, 360, DEFAULT_FG);
        expected.draw_line(400, 90, 640, 360, DEFAULT_FG);
        expected.draw_line(640, 360, 160, 360, DEFAULT_FG);
        assert_eq!(rh.frame().unwrap().pixels, expected.pixels);
    }

    // Wall quad seen at a slant: u runs along the view axis so screen-space
    // interpolation would drift toward the near edge.
    fn draw_perspective_wall(rh: &mut Renderer) -> Mat4 {
        let mat_view = Mat4::look_at(
            Vec3::new(3.5, 0.0, 0.0),
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 1.0),
        );
        let mat_proj = Mat4::perspective(std::f32::consts::FRAC_PI_2, 800.0 / 600.0, 1.0, 500.0);
        let mvp = mat_view * mat_proj;

        let corners = [
            (Vec3::new(1.0, -1.0, -1.0), Vec2::new(0.0, 0.0)),
            (Vec3::new(-1.0, -1.0, -1.0), Vec2::new(1.0, 0.0)),
            (Vec3::new(-1.0, -1.0, 1.0), Vec2::new(1.0, 1.0)),
            (Vec3::new(1.0, -1.0, 1.0), Vec2::new(0.0, 1.0)),
        ];
        let current = Rc::new(RefCell::new([corners[0]; 3]));
        {
            let current = Rc::clone(&current);
            rh.set_vertex_shader(move |index, output| {
                let (pos, uv) = current.borrow()[index];
                output.vec2.insert(VARYING_UV, uv);
                pos.xyz1() * mvp
            });
        }
        // encode interpolated uv into the color channels for readback
        rh.set_pixel_shader(|input| {
            let uv = input.vec2.get(&VARYING_UV).copied().unwrap_or_default();
            Vec4::new(uv.x, uv.y, 0.0, 1.0)
        });
        for tri in [[0usize, 1, 2], [2, 3, 0]] {
            *current.borrow_mut() = [corners[tri[0]], corners[tri[1]], corners[tri[2]]];
            assert!(rh.draw_primitive());
        }
        mvp
    }

    fn decode_uv(c: u32) -> (f32, f32) {
        let (r, g, _, _) = channels(c);
        (r as f32 / 255.0, g as f32 / 255.0)
    }

    #[test]
    fn test_perspective_correct_midpoint_uv() {
        let mut rh = Renderer::new(800, 600);
        let mvp = draw_perspective_wall(&mut rh);

        // project the object-space midpoint, uv (0.5, 0.5)
        let mid = Vec3::new(0.0, -1.0, 0.0).xyz1() * mvp;
        let ndc = mid * (1.0 / mid.w);
        let sx = (ndc.x + 1.0) * 400.0;
        let sy = (1.0 - ndc.y) * 300.0;

        let (u, v) = decode_uv(rh.get_pixel(sx as i32, sy as i32));
        assert!((u - 0.5).abs() < 0.05, "u = {}", u);
        assert!((v - 0.5).abs() < 0.05, "v = {}", v);
    }

    #[test]
    fn test_perspective_near_edge_taller_than_far() {
        let mut rh = Renderer::new(800, 600);
        draw_perspective_wall(&mut rh);

        let column_height = |x: i32| {
            (0..600)
                .filter(|&y| rh.get_pixel(x, y) != DEFAULT_BG)
                .count()
        };
        // near edge projects around x = 520, far edge around x = 467
        let near = column_height(516);
        let far = column_height(470);
        assert!(near > far + 20, "near = {}, far = {}", near, far);
    }

    #[test]
    fn test_quad_diagonal_stays_straight() {
        let mut rh = Renderer::new(800, 600);
        draw_perspective_wall(&mut rh);

        // per row, the pixel where u is nearest v lies on the uv diagonal
        let diagonal_x = |y: i32| -> Option<i32> {
            let mut best: Option<(f32, i32)> = None;
            for x in 0..800 {
                let c = rh.get_pixel(x, y);
                if c == DEFAULT_BG {
                    continue;
                }
                let (u, v) = decode_uv(c);
                let d = (u - v).abs();
                if best.map_or(true, |(bd, _)| d < bd) {
                    best = Some((d, x));
                }
            }
            best.map(|(_, x)| x)
        };

        let rows: Vec<i32> = (260..=340).step_by(20).collect();
        let pts: Vec<(i32, i32)> = rows
            .iter()
            .filter_map(|&y| diagonal_x(y).map(|x| (y, x)))
            .collect();
        assert_eq!(pts.len(), rows.len());

        let (y0, x0) = pts[0];
        let (y1, x1) = pts[pts.len() - 1];
        for &(y, x) in &pts {
            let expected = x0 as f32
                + (y - y0) as f32 * (x1 - x0) as f32 / (y1 - y0) as f32;
            assert!(
                (x as f32 - expected).abs() <= 2.5,
                "row {}: x = {}, expected {}",
                y,
                x,
                expected
            );
        }
    }

    #[test]
    fn test_clear_restores_background_and_depth() {
        let mut rh = Renderer::new(64, 64);
        rh.set_background(0xff336699);
        bind_color_triangle(&mut rh, tri_at_w(1.0), [RED, GREEN, BLUE]);
        assert!(rh.draw_primitive());
        assert!(rh.depth_at(32, 32) > 0.0);
        rh.clear();
        assert!(rh.frame().unwrap().pixels.iter().all(|&p| p == 0xff336699));
        assert_eq!(rh.depth_at(32, 32), 0.0);
    }
}
