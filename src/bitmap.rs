//! Pixel container with BMP load/save, line drawing, and bilinear sampling
//!
//! Pixels are packed `0xAARRGGBB`, stored row-major with the origin at the
//! top-left. The rasterizer draws into one of these; user shaders sample
//! textures from them.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::math::{Vec2, Vec4};

#[derive(Debug, Error)]
pub enum BitmapError {
    #[error("failed to load {path}: {source}")]
    Load {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("failed to save {path}: {source}")]
    Save {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Image of packed `0xAARRGGBB` pixels
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<u32>,
}

impl Bitmap {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
        }
    }

    /// Load from a BMP or PNG file; 24-bit input gets alpha 255
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BitmapError> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|e| BitmapError::Load {
            path: path.to_path_buf(),
            source: e,
        })?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let pixels = rgba
            .pixels()
            .map(|p| {
                let [r, g, b, a] = p.0;
                ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
            })
            .collect();
        Ok(Self {
            width: width as usize,
            height: height as usize,
            pixels,
        })
    }

    /// Save as 24-bit color, format chosen by the file extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), BitmapError> {
        let path = path.as_ref();
        let mut img = image::RgbImage::new(self.width as u32, self.height as u32);
        for (x, y, px) in img.enumerate_pixels_mut() {
            let c = self.pixels[y as usize * self.width + x as usize];
            *px = image::Rgb([
                ((c >> 16) & 0xff) as u8,
                ((c >> 8) & 0xff) as u8,
                (c & 0xff) as u8,
            ]);
        }
        img.save(path).map_err(|e| BitmapError::Save {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Create a checkerboard test pattern with square cells of `cell` pixels
    pub fn checkerboard(width: usize, height: usize, cell: usize, c1: u32, c2: u32) -> Self {
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let k = (x / cell + y / cell) & 1;
                pixels.push(if k == 0 { c1 } else { c2 });
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn fill(&mut self, color: u32) {
        self.pixels.fill(color);
    }

    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, color: u32) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.pixels[y as usize * self.width + x as usize] = color;
        }
    }

    #[inline]
    pub fn get_pixel(&self, x: i32, y: i32) -> u32 {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.pixels[y as usize * self.width + x as usize]
        } else {
            0
        }
    }

    /// Integer midpoint line, endpoints inclusive
    pub fn draw_line(&mut self, mut x1: i32, mut y1: i32, mut x2: i32, mut y2: i32, color: u32) {
        if x1 == x2 && y1 == y2 {
            self.set_pixel(x1, y1, color);
        } else if x1 == x2 {
            let inc = if y1 <= y2 { 1 } else { -1 };
            let mut y = y1;
            while y != y2 {
                self.set_pixel(x1, y, color);
                y += inc;
            }
            self.set_pixel(x2, y2, color);
        } else if y1 == y2 {
            let inc = if x1 <= x2 { 1 } else { -1 };
            let mut x = x1;
            while x != x2 {
                self.set_pixel(x, y1, color);
                x += inc;
            }
            self.set_pixel(x2, y2, color);
        } else {
            let dx = (x2 - x1).abs();
            let dy = (y2 - y1).abs();
            if dx >= dy {
                if x2 < x1 {
                    std::mem::swap(&mut x1, &mut x2);
                    std::mem::swap(&mut y1, &mut y2);
                }
                let mut y = y1;
                let mut rem = 0;
                for x in x1..=x2 {
                    self.set_pixel(x, y, color);
                    rem += dy;
                    if rem >= dx {
                        rem -= dx;
                        y += if y2 >= y1 { 1 } else { -1 };
                        self.set_pixel(x, y, color);
                    }
                }
                self.set_pixel(x2, y2, color);
            } else {
                if y2 < y1 {
                    std::mem::swap(&mut x1, &mut x2);
                    std::mem::swap(&mut y1, &mut y2);
                }
                let mut x = x1;
                let mut rem = 0;
                for y in y1..=y2 {
                    self.set_pixel(x, y, color);
                    rem += dx;
                    if rem >= dy {
                        rem -= dy;
                        x += if x2 >= x1 { 1 } else { -1 };
                        self.set_pixel(x, y, color);
                    }
                }
                self.set_pixel(x2, y2, color);
            }
        }
    }

    pub fn flip_vertical(&mut self) {
        for y in 0..self.height / 2 {
            let (a, b) = (y * self.width, (self.height - 1 - y) * self.width);
            for x in 0..self.width {
                self.pixels.swap(a + x, b + x);
            }
        }
    }

    pub fn flip_horizontal(&mut self) {
        for y in 0..self.height {
            let row = y * self.width;
            let (mut i, mut j) = (0, self.width - 1);
            while i < j {
                self.pixels.swap(row + i, row + j);
                i += 1;
                j -= 1;
            }
        }
    }

    /// Bilinear sample in texel space with 16.16 fixed-point weights
    pub fn sample_bilinear(&self, x: f32, y: f32) -> u32 {
        if self.width == 0 || self.height == 0 {
            return 0;
        }
        let fx = (x * 0x10000 as f32) as i32;
        let fy = (y * 0x10000 as f32) as i32;
        let x1 = (fx >> 16).clamp(0, self.width as i32 - 1);
        let y1 = (fy >> 16).clamp(0, self.height as i32 - 1);
        let x2 = (x1 + 1).min(self.width as i32 - 1);
        let y2 = (y1 + 1).min(self.height as i32 - 1);
        let dx = (fx >> 8) & 0xff;
        let dy = (fy >> 8) & 0xff;
        let c00 = self.get_pixel(x1, y1);
        let c01 = self.get_pixel(x2, y1);
        let c10 = self.get_pixel(x1, y2);
        let c11 = self.get_pixel(x2, y2);
        bilinear_interp(c00, c01, c10, c11, dx, dy)
    }

    /// Sample at normalized UV in [0, 1]^2, offset to texel centers
    pub fn sample_2d(&self, uv: Vec2) -> Vec4 {
        let rgba = self.sample_bilinear(
            uv.x * self.width as f32 + 0.5,
            uv.y * self.height as f32 + 0.5,
        );
        Vec4::from_color(rgba)
    }
}

// Blend four packed colors with 8-bit weights derived from the fractional
// texel offsets; two channels are mixed per multiply pass.
fn bilinear_interp(tl: u32, tr: u32, bl: u32, br: u32, distx: i32, disty: i32) -> u32 {
    let distxy = (distx * disty) as u32;
    let distxiy = ((distx << 8) - distx * disty) as u32;
    let distixy = ((disty << 8) - distx * disty) as u32;
    let distixiy = (256 * 256 - (disty << 8) - (distx << 8) + distx * disty) as u32;
    let mut tl = tl;
    let mut tr = tr;
    let mut bl = bl;
    let mut br = br;
    let mut r = (tl & 0x000000ff) * distixiy
        + (tr & 0x000000ff) * distxiy
        + (bl & 0x000000ff) * distixy
        + (br & 0x000000ff) * distxy;
    let mut f = (tl & 0x0000ff00) * distixiy
        + (tr & 0x0000ff00) * distxiy
        + (bl & 0x0000ff00) * distixy
        + (br & 0x0000ff00) * distxy;
    r |= f & 0xff000000;
    tl >>= 16;
    tr >>= 16;
    bl >>= 16;
    br >>= 16;
    r >>= 16;
    f = (tl & 0x000000ff) * distixiy
        + (tr & 0x000000ff) * distxiy
        + (bl & 0x000000ff) * distixy
        + (br & 0x000000ff) * distxy;
    r |= f & 0x00ff0000;
    f = (tl & 0x0000ff00) * distixiy
        + (tr & 0x0000ff00) * distxiy
        + (bl & 0x0000ff00) * distixy
        + (br & 0x0000ff00) * distxy;
    r |= f & 0xff000000;
    r
}
