//! Rotating textured box with a Gouraud-interpolated diffuse term.

use std::cell::RefCell;
use std::rc::Rc;

use softrender::{Bitmap, Mat4, Renderer, Vec2, Vec3};

const VARYING_UV: u32 = 0;
const VARYING_LIGHT: u32 = 1;

#[derive(Clone, Copy, Default)]
struct VertexAttrib {
    pos: Vec3,
    uv: Vec2,
    normal: Vec3,
}

fn draw_plane(
    rh: &mut Renderer,
    vs_input: &Rc<RefCell<[VertexAttrib; 3]>>,
    mesh: &[Vec3; 8],
    a: usize,
    b: usize,
    c: usize,
    d: usize,
) {
    let corners = [mesh[a], mesh[b], mesh[c], mesh[d]];
    let uvs = [
        Vec2::new(0.0, 0.0),
        Vec2::new(0.0, 1.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(1.0, 0.0),
    ];
    let normal = (corners[2] - corners[0])
        .cross(corners[1] - corners[0])
        .normalize();

    for tri in [[0usize, 1, 2], [2, 3, 0]] {
        let mut input = [VertexAttrib::default(); 3];
        for (slot, &i) in input.iter_mut().zip(tri.iter()) {
            *slot = VertexAttrib {
                pos: corners[i],
                uv: uvs[i],
                normal,
            };
        }
        *vs_input.borrow_mut() = input;
        rh.draw_primitive();
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut rh = Renderer::new(800, 600);

    let texture = Bitmap::checkerboard(256, 256, 32, 0xffffffff, 0xff3fbcef);

    let mat_model = Mat4::rotate(-1.0, -0.5, 1.0, 1.0);
    let mat_view = Mat4::look_at(
        Vec3::new(3.5, 0.0, 0.0),
        Vec3::ZERO,
        Vec3::new(0.0, 0.0, 1.0),
    );
    let mat_proj = Mat4::perspective(
        std::f32::consts::FRAC_PI_2,
        800.0 / 600.0,
        1.0,
        500.0,
    );
    let mat_mvp = mat_model * mat_view * mat_proj;

    let light_dir = Vec3::new(1.0, 0.0, 2.0).normalize();

    let mesh = [
        Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(-1.0, 1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(1.0, -1.0, -1.0),
        Vec3::new(-1.0, -1.0, -1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(1.0, 1.0, -1.0),
    ];

    let vs_input = Rc::new(RefCell::new([VertexAttrib::default(); 3]));

    {
        let vs_input = Rc::clone(&vs_input);
        rh.set_vertex_shader(move |index, output| {
            let attr = vs_input.borrow()[index];
            output.vec2.insert(VARYING_UV, attr.uv);
            // normals rotate with the model but ignore view and projection
            let normal = (attr.normal.xyz1() * mat_model).xyz();
            let intense = normal.dot(light_dir).max(0.0) + 0.1;
            output.scalar.insert(VARYING_LIGHT, intense.min(1.0));
            attr.pos.xyz1() * mat_mvp
        });
    }
    rh.set_pixel_shader(move |input| {
        let uv = input.vec2.get(&VARYING_UV).copied().unwrap_or_default();
        let light = input.scalar.get(&VARYING_LIGHT).copied().unwrap_or(1.0);
        texture.sample_2d(uv) * light
    });

    draw_plane(&mut rh, &vs_input, &mesh, 0, 1, 2, 3);
    draw_plane(&mut rh, &vs_input, &mesh, 7, 6, 5, 4);
    draw_plane(&mut rh, &vs_input, &mesh, 0, 4, 5, 1);
    draw_plane(&mut rh, &vs_input, &mesh, 1, 5, 6, 2);
    draw_plane(&mut rh, &vs_input, &mesh, 2, 6, 7, 3);
    draw_plane(&mut rh, &vs_input, &mesh, 3, 7, 4, 0);

    rh.save("cube.bmp")?;
    Ok(())
}
