//! Wavefront OBJ meshes with optional companion texture maps
//!
//! A model named `thing.obj` may ship `thing_diffuse.bmp`, `thing_nm.bmp`
//! and `thing_spec.bmp` next to it; whichever exist are picked up on load.

use std::fs;
use std::path::Path;

use log::{info, warn};
use thiserror::Error;

use crate::bitmap::Bitmap;
use crate::math::{Vec2, Vec3, Vec4};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed `{kind}` directive at line {line}")]
    Malformed { kind: &'static str, line: usize },
    #[error("face index out of range")]
    IndexOutOfRange,
}

/// Triangle-ish mesh: faces hold [position, uv, normal] index triples
#[derive(Debug)]
pub struct Model {
    verts: Vec<Vec3>,
    norms: Vec<Vec3>,
    uvs: Vec<Vec2>,
    faces: Vec<Vec<[usize; 3]>>,
    diffuse_map: Option<Bitmap>,
    normal_map: Option<Bitmap>,
    specular_map: Option<Bitmap>,
}

fn parse_floats(rest: &str, out: &mut [f32]) -> Option<()> {
    let mut words = rest.split_whitespace();
    for slot in out.iter_mut() {
        *slot = words.next()?.parse().ok()?;
    }
    Some(())
}

// "v/vt/vn" with 1-based indices
fn parse_index_triple(word: &str) -> Option<[usize; 3]> {
    let mut out = [0usize; 3];
    let mut parts = word.split('/');
    for slot in out.iter_mut() {
        let n: usize = parts.next()?.parse().ok()?;
        *slot = n.checked_sub(1)?;
    }
    Some(out)
}

impl Model {
    /// Load an OBJ file and any companion maps next to it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut model = Self::parse(&text)?;
        info!(
            "loaded {}: {} vertices, {} faces",
            path.display(),
            model.nverts(),
            model.nfaces()
        );
        model.diffuse_map = load_map(path, "_diffuse.bmp");
        model.normal_map = load_map(path, "_nm.bmp");
        model.specular_map = load_map(path, "_spec.bmp");
        Ok(model)
    }

    /// Parse OBJ text: `v`, `vn`, `vt` and `f` directives, anything else
    /// is ignored
    pub fn parse(text: &str) -> Result<Self, ModelError> {
        let mut verts = Vec::new();
        let mut norms = Vec::new();
        let mut uvs = Vec::new();
        let mut faces: Vec<Vec<[usize; 3]>> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if let Some(rest) = trimmed.strip_prefix("v ") {
                let mut m = [0.0f32; 3];
                parse_floats(rest, &mut m)
                    .ok_or(ModelError::Malformed { kind: "v", line })?;
                verts.push(Vec3::new(m[0], m[1], m[2]));
            } else if let Some(rest) = trimmed.strip_prefix("vn ") {
                let mut m = [0.0f32; 3];
                parse_floats(rest, &mut m)
                    .ok_or(ModelError::Malformed { kind: "vn", line })?;
                norms.push(Vec3::new(m[0], m[1], m[2]));
            } else if let Some(rest) = trimmed.strip_prefix("vt ") {
                let mut m = [0.0f32; 2];
                parse_floats(rest, &mut m)
                    .ok_or(ModelError::Malformed { kind: "vt", line })?;
                uvs.push(Vec2::new(m[0], m[1]));
            } else if let Some(rest) = trimmed.strip_prefix("f ") {
                let mut face = Vec::new();
                for word in rest.split_whitespace() {
                    let triple = parse_index_triple(word)
                        .ok_or(ModelError::Malformed { kind: "f", line })?;
                    face.push(triple);
                }
                faces.push(face);
            }
        }

        for face in &faces {
            for &[vi, ti, ni] in face {
                if vi >= verts.len() || ti >= uvs.len() || ni >= norms.len() {
                    return Err(ModelError::IndexOutOfRange);
                }
            }
        }

        Ok(Self {
            verts,
            norms,
            uvs,
            faces,
            diffuse_map: None,
            normal_map: None,
            specular_map: None,
        })
    }

    pub fn nverts(&self) -> usize {
        self.verts.len()
    }

    pub fn nfaces(&self) -> usize {
        self.faces.len()
    }

    pub fn vert(&self, iface: usize, nth: usize) -> Vec3 {
        self.verts[self.faces[iface][nth][0]]
    }

    pub fn uv(&self, iface: usize, nth: usize) -> Vec2 {
        self.uvs[self.faces[iface][nth][1]]
    }

    pub fn normal(&self, iface: usize, nth: usize) -> Vec3 {
        self.norms[self.faces[iface][nth][2]].normalize()
    }

    pub fn has_diffuse(&self) -> bool {
        self.diffuse_map.is_some()
    }

    /// Sample the diffuse map. Panics when the model has none.
    pub fn diffuse(&self, uv: Vec2) -> Vec4 {
        self.diffuse_map
            .as_ref()
            .expect("model has no diffuse map")
            .sample_2d(uv)
    }

    /// Sample the normal map, expanded from [0, 1] to [-1, 1] per channel.
    /// Panics when the model has none.
    pub fn normal_at(&self, uv: Vec2) -> Vec3 {
        let c = self
            .normal_map
            .as_ref()
            .expect("model has no normal map")
            .sample_2d(uv);
        Vec3::new(c.x * 2.0 - 1.0, c.y * 2.0 - 1.0, c.z * 2.0 - 1.0)
    }

    /// Specular exponent factor from the blue channel of the specular map.
    /// Panics when the model has none.
    pub fn specular_at(&self, uv: Vec2) -> f32 {
        self.specular_map
            .as_ref()
            .expect("model has no specular map")
            .sample_2d(uv)
            .z
    }
}

fn load_map(obj_path: &Path, suffix: &str) -> Option<Bitmap> {
    let stem = obj_path.file_stem()?.to_str()?;
    let candidate = obj_path.with_file_name(format!("{}{}", stem, suffix));
    if !candidate.exists() {
        return None;
    }
    match Bitmap::load(&candidate) {
        Ok(mut bmp) => {
            // companion maps are authored bottom-up, flip to top-left origin
            bmp.flip_vertical();
            info!("loaded texture {}", candidate.display());
            Some(bmp)
        }
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE_OBJ: &str = "\
# comment
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 0.0 1.0
vn 0.0 0.0 1.0
f 1/1/1 2/2/1 3/3/1
";

    #[test]
    fn test_parse_counts() {
        let model = Model::parse(TRIANGLE_OBJ).unwrap();
        assert_eq!(model.nverts(), 3);
        assert_eq!(model.nfaces(), 1);
    }

    #[test]
    fn test_face_accessors() {
        let model = Model::parse(TRIANGLE_OBJ).unwrap();
        assert_eq!(model.vert(0, 1), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(model.uv(0, 2), Vec2::new(0.0, 1.0));
        let n = model.normal(0, 0);
        assert!((n.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_malformed_vertex_reports_line() {
        let err = Model::parse("v 1.0 nope 3.0\n").unwrap_err();
        match err {
            ModelError::Malformed { kind, line } => {
                assert_eq!(kind, "v");
                assert_eq!(line, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_face_index_out_of_range() {
        let text = "v 0 0 0\nvt 0 0\nvn 0 0 1\nf 1/1/1 2/1/1 1/1/1\n";
        assert!(matches!(
            Model::parse(text),
            Err(ModelError::IndexOutOfRange)
        ));
    }

    #[test]
    fn test_zero_index_is_malformed() {
        let text = "v 0 0 0\nvt 0 0\nvn 0 0 1\nf 0/1/1 1/1/1 1/1/1\n";
        assert!(matches!(
            Model::parse(text),
            Err(ModelError::Malformed { kind: "f", .. })
        ));
    }

    #[test]
    fn test_missing_maps() {
        let model = Model::parse(TRIANGLE_OBJ).unwrap();
        assert!(!model.has_diffuse());
    }
}
