//! Single colored triangle, vertices straight in clip space.

use softrender::{Renderer, Vec4};

const VARYING_COLOR: u32 = 0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut rh = Renderer::new(800, 600);

    let positions = [
        Vec4::new(0.0, 0.7, 0.9, 1.0),
        Vec4::new(-0.6, -0.2, 0.01, 1.0),
        Vec4::new(0.6, -0.2, 0.01, 1.0),
    ];
    let colors = [
        Vec4::new(1.0, 0.0, 0.0, 1.0),
        Vec4::new(0.0, 1.0, 0.0, 1.0),
        Vec4::new(0.0, 0.0, 1.0, 1.0),
    ];

    rh.set_vertex_shader(move |index, output| {
        output.vec4.insert(VARYING_COLOR, colors[index]);
        positions[index]
    });
    rh.set_pixel_shader(|input| {
        input.vec4.get(&VARYING_COLOR).copied().unwrap_or_default()
    });

    rh.draw_primitive();
    rh.save("triangle.bmp")?;
    Ok(())
}
