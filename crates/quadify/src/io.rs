//! Mesh file I/O.
//!
//! Only Wavefront OBJ is supported. Faces are read as polygons, without
//! triangulation, so quads and n-gons in the file survive a load/save cycle.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::Point3;
use tracing::{debug, info};

use crate::error::{QuadError, QuadResult};
use crate::types::{Face, PolyMesh};

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    Obj,
}

impl MeshFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .and_then(|ext| match ext.as_str() {
                "obj" => Some(MeshFormat::Obj),
                _ => None,
            })
    }
}

fn format_for(path: &Path) -> QuadResult<MeshFormat> {
    MeshFormat::from_path(path).ok_or_else(|| QuadError::UnsupportedFormat {
        extension: path.extension().and_then(|e| e.to_str()).map(String::from),
    })
}

/// Load a mesh, detecting the format from the extension. All faces are
/// selected.
pub fn load_mesh(path: &Path) -> QuadResult<PolyMesh> {
    let format = format_for(path)?;
    info!("Loading mesh from {:?} (format: {:?})", path, format);

    let mesh = match format {
        MeshFormat::Obj => load_obj(path)?,
    };

    info!(
        "Loaded mesh: {} vertices, {} faces ({} triangles)",
        mesh.vertex_count(),
        mesh.faces().len(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Save a mesh, detecting the format from the extension.
pub fn save_mesh(mesh: &PolyMesh, path: &Path) -> QuadResult<()> {
    match format_for(path)? {
        MeshFormat::Obj => save_obj(mesh, path),
    }
}

/// Load an OBJ file, merging all of its objects into one mesh.
pub fn load_obj(path: &Path) -> QuadResult<PolyMesh> {
    if !path.exists() {
        return Err(QuadError::io_read(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        ));
    }

    // Faces are built from position indices alone, so texture and normal
    // seams do not split the topology.
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: false,
            single_index: false,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        },
    )
    .map_err(|e| QuadError::parse_error(path, e.to_string()))?;

    if models.is_empty() {
        return Err(QuadError::empty_mesh("OBJ file contains no objects"));
    }

    let mut vertices: Vec<Point3<f64>> = Vec::new();
    let mut faces: Vec<Face> = Vec::new();

    for model in &models {
        let obj = &model.mesh;
        let offset = vertices.len() as u32;
        debug!(
            "OBJ model '{}': {} positions, {} indices",
            model.name,
            obj.positions.len() / 3,
            obj.indices.len()
        );

        vertices.extend(
            obj.positions
                .chunks_exact(3)
                .map(|c| Point3::new(c[0] as f64, c[1] as f64, c[2] as f64)),
        );

        // No arities means every face is a triangle.
        let mut start = 0usize;
        let mut push_face = |arity: usize| -> QuadResult<()> {
            let end = start + arity;
            let loop_ = obj.indices.get(start..end).ok_or_else(|| {
                QuadError::parse_error(
                    path,
                    format!("face {} runs past the index list", faces.len()),
                )
            })?;
            faces.push(Face::new(loop_.iter().map(|&i| i + offset)));
            start = end;
            Ok(())
        };
        if obj.face_arities.is_empty() {
            for _ in 0..obj.indices.len() / 3 {
                push_face(3)?;
            }
        } else {
            for &arity in &obj.face_arities {
                push_face(arity as usize)?;
            }
        }
    }

    debug!(
        "OBJ loaded: {} vertices, {} faces from {} models",
        vertices.len(),
        faces.len(),
        models.len()
    );

    PolyMesh::from_faces(vertices, faces)
}

/// Save a mesh as OBJ with polygon faces.
pub fn save_obj(mesh: &PolyMesh, path: &Path) -> QuadResult<()> {
    info!("Saving mesh to {:?} (OBJ format)", path);

    let file = File::create(path).map_err(|e| QuadError::io_write(path, e))?;
    let mut writer = BufWriter::new(file);
    write_obj(mesh, &mut writer).map_err(|e| QuadError::io_write(path, e))?;

    debug!(
        "OBJ saved: {} vertices, {} faces",
        mesh.vertex_count(),
        mesh.faces().len()
    );
    Ok(())
}

fn write_obj(mesh: &PolyMesh, writer: &mut impl Write) -> std::io::Result<()> {
    writeln!(writer, "# OBJ file exported by quadify")?;
    writeln!(writer, "# Vertices: {}", mesh.vertex_count())?;
    writeln!(writer, "# Faces: {}", mesh.faces().len())?;
    writeln!(writer)?;

    for v in mesh.vertices() {
        writeln!(writer, "v {:.6} {:.6} {:.6}", v.x, v.y, v.z)?;
    }
    writeln!(writer)?;

    // OBJ indices are 1-based.
    for face in mesh.faces() {
        write!(writer, "f")?;
        for &v in &face.vertices {
            write!(writer, " {}", v + 1)?;
        }
        writeln!(writer)?;
    }
    writer.flush()
}
