//! OBJ model with normal-mapped lighting plus a specular highlight.
//!
//! Expects `_diffuse.bmp`, `_nm.bmp` and `_spec.bmp` companions, e.g.
//! `cargo run --example specular -- res/diablo3_pose.obj`

use std::cell::RefCell;
use std::rc::Rc;

use indicatif::{ProgressBar, ProgressStyle};
use softrender::{saturate, Mat4, Model, Renderer, Vec2, Vec3};

const VARYING_UV: u32 = 0;
const VARYING_EYE: u32 = 1;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "res/diablo3_pose.obj".to_string());
    let model = Rc::new(Model::load(&path)?);

    let mut rh = Renderer::new(600, 800);

    let eye_pos = Vec3::new(0.0, -0.5, 1.7);
    let light_dir = Vec3::new(1.0, 1.0, 0.85);

    let mat_model = Mat4::scale(1.0, 1.0, 1.0);
    let mat_view = Mat4::look_at(eye_pos, Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0));
    let mat_proj = Mat4::perspective(std::f32::consts::FRAC_PI_2, 6.0 / 8.0, 1.0, 500.0);
    let mat_mvp = mat_model * mat_view * mat_proj;

    let mat_model_it = mat_model.inverse().transpose();

    let vs_input = Rc::new(RefCell::new([(Vec3::ZERO, Vec2::ZERO); 3]));

    {
        let vs_input = Rc::clone(&vs_input);
        rh.set_vertex_shader(move |index, output| {
            let (pos, uv) = vs_input.borrow()[index];
            let pos_world = (pos.xyz1() * mat_model).xyz();
            output.vec2.insert(VARYING_UV, uv);
            // direction from the surface toward the eye, per vertex
            output.vec3.insert(VARYING_EYE, eye_pos - pos_world);
            pos.xyz1() * mat_mvp
        });
    }
    {
        let model = Rc::clone(&model);
        rh.set_pixel_shader(move |input| {
            let uv = input.vec2.get(&VARYING_UV).copied().unwrap_or_default();
            let eye_dir = input.vec3.get(&VARYING_EYE).copied().unwrap_or_default();
            let l = light_dir.normalize();
            let n = (model.normal_at(uv).xyz1() * mat_model_it).xyz();
            let s = model.specular_at(uv);
            // reflected light direction
            let r = (n * (n.dot(l) * 2.0) - l).normalize();
            let p = saturate(r.dot(eye_dir));
            let spec = saturate(p.powf(s * 20.0) * 0.05);
            let intense = saturate(n.dot(l)) + 0.2 + spec;
            model.diffuse(uv) * intense
        });
    }

    let pb = ProgressBar::new(model.nfaces() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Rendering [{bar:30}] {pos}/{len}")?
            .progress_chars("█▓░"),
    );
    for i in 0..model.nfaces() {
        let mut tri = [(Vec3::ZERO, Vec2::ZERO); 3];
        for (j, slot) in tri.iter_mut().enumerate() {
            *slot = (model.vert(i, j), model.uv(i, j));
        }
        *vs_input.borrow_mut() = tri;
        rh.draw_primitive();
        pb.inc(1);
    }
    pb.finish();

    rh.save("specular.bmp")?;
    Ok(())
}
