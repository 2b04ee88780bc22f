//! Checkerboard-textured quad under a perspective camera.

use std::cell::RefCell;
use std::rc::Rc;

use softrender::{Bitmap, Mat4, Renderer, Vec2, Vec3, Vec4};

const VARYING_UV: u32 = 0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut rh = Renderer::new(800, 600);

    let texture = Bitmap::checkerboard(256, 256, 32, 0xffffffff, 0xff3fbcef);

    let mat_view = Mat4::look_at(
        Vec3::new(-0.7, 0.0, 1.5),
        Vec3::ZERO,
        Vec3::new(0.0, 0.0, 1.0),
    );
    let mat_proj = Mat4::perspective(
        std::f32::consts::FRAC_PI_2,
        800.0 / 600.0,
        1.0,
        500.0,
    );
    let mat_mvp = mat_view * mat_proj;

    // 0 1
    // 3 2
    let quad: [(Vec4, Vec2); 4] = [
        (Vec4::new(1.0, -1.0, -1.0, 1.0), Vec2::new(0.0, 0.0)),
        (Vec4::new(1.0, 1.0, -1.0, 1.0), Vec2::new(1.0, 0.0)),
        (Vec4::new(-1.0, 1.0, -1.0, 1.0), Vec2::new(1.0, 1.0)),
        (Vec4::new(-1.0, -1.0, -1.0, 1.0), Vec2::new(0.0, 1.0)),
    ];

    let vs_input = Rc::new(RefCell::new([quad[0]; 3]));

    {
        let vs_input = Rc::clone(&vs_input);
        rh.set_vertex_shader(move |index, output| {
            let (pos, uv) = vs_input.borrow()[index];
            output.vec2.insert(VARYING_UV, uv);
            pos * mat_mvp
        });
    }
    rh.set_pixel_shader(move |input| {
        let uv = input.vec2.get(&VARYING_UV).copied().unwrap_or_default();
        texture.sample_2d(uv)
    });

    for tri in [[0usize, 1, 2], [2, 3, 0]] {
        *vs_input.borrow_mut() = [quad[tri[0]], quad[tri[1]], quad[tri[2]]];
        rh.draw_primitive();
    }

    rh.save("texture_quad.bmp")?;
    Ok(())
}
