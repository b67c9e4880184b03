//! Applying a solution to a mesh.
//!
//! Every selected edge is removed and its two triangles are replaced by one
//! quad. The whole solution is validated before the mesh is touched, so a
//! failure leaves the mesh unchanged. Afterwards the selection is reset to
//! the faces that are still not quads, which is what a modeling tool shows
//! the user after the operation.

use crate::candidates::CandidateEdge;
use crate::error::{QuadError, QuadResult};
use crate::optimizer::Solution;
use crate::tracing_ext::{OperationTimer, log_mesh_stats};
use crate::types::{Face, FaceId, PolyMesh, RegionReader, validate_loop};
use hashbrown::HashMap;
use tracing::{debug, info};

/// Statistics from applying a solution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DissolveReport {
    /// Edges removed, one per quad created.
    pub edges_dissolved: usize,
    pub faces_before: usize,
    pub faces_after: usize,
    /// Triangles left in the mesh.
    pub triangles_remaining: usize,
    /// Faces selected afterwards (side count other than four).
    pub non_quads_selected: usize,
}

/// Merge the two triangles of a candidate into a quad.
///
/// The quad follows the winding of the first triangle: with the shared edge
/// running `a -> b` in that triangle, third vertex `c`, and the other
/// triangle's third vertex `d`, the loop is `[b, c, a, d]`.
pub fn merge_triangles(tri1: &[u32], tri2: &[u32], shared: (u32, u32)) -> Option<[u32; 4]> {
    if tri1.len() != 3 || tri2.len() != 3 {
        return None;
    }
    let (s0, s1) = shared;
    let i = (0..3).find(|&i| {
        let (p, q) = (tri1[i], tri1[(i + 1) % 3]);
        (p == s0 && q == s1) || (p == s1 && q == s0)
    })?;
    let a = tri1[i];
    let b = tri1[(i + 1) % 3];
    let c = tri1[(i + 2) % 3];
    if !(tri2.contains(&a) && tri2.contains(&b)) {
        return None;
    }
    let d = tri2.iter().copied().find(|&v| v != a && v != b)?;
    Some([b, c, a, d])
}

/// Dissolve the edges chosen by `solution`.
///
/// Solutions that are not solved leave the mesh untouched and return an
/// empty report.
///
/// # Errors
///
/// [`QuadError::DissolveFailed`] when the mesh no longer matches the
/// solution: an edge is missing, no longer joins the same two triangles, or a
/// triangle would be merged twice. The mesh is not modified in that case.
pub fn apply_solution(mesh: &mut PolyMesh, solution: &Solution) -> QuadResult<DissolveReport> {
    let faces_before = mesh.face_count();
    if !solution.is_solved() {
        debug!(
            target: "quadify::dissolve",
            status = %solution.status(),
            "Solution not solved, mesh left unchanged"
        );
        return Ok(DissolveReport {
            faces_before,
            faces_after: faces_before,
            triangles_remaining: mesh.triangle_count(),
            ..DissolveReport::default()
        });
    }

    let _timer = OperationTimer::new("dissolve");
    log_mesh_stats(mesh, "before dissolve");

    // Validate everything first.
    let mut merges: HashMap<FaceId, [u32; 4]> = HashMap::new();
    let mut absorbed: HashMap<FaceId, FaceId> = HashMap::new();
    for candidate in solution.selected() {
        let (keep, quad) = plan_merge(mesh, candidate)?;
        let other = if keep == candidate.faces[0] {
            candidate.faces[1]
        } else {
            candidate.faces[0]
        };
        for face in [keep, other] {
            if merges.contains_key(&face) || absorbed.contains_key(&face) {
                return Err(QuadError::dissolve_failed(
                    candidate.edge,
                    format!("triangle {} is merged more than once", face),
                ));
            }
        }
        validate_loop(keep, &quad, mesh.vertex_count()).map_err(|e| {
            QuadError::dissolve_failed(candidate.edge, format!("merged face is invalid: {}", e))
        })?;
        merges.insert(keep, quad);
        absorbed.insert(other, keep);
    }

    // Then rebuild the face list.
    let faces: Vec<Face> = mesh
        .faces()
        .iter()
        .enumerate()
        .filter(|(id, _)| !absorbed.contains_key(id))
        .map(|(id, face)| match merges.get(&id) {
            Some(quad) => Face::new(*quad),
            None => {
                let mut kept = Face::new(face.vertices.iter().copied());
                kept.selected = face.selected;
                kept
            }
        })
        .collect();

    mesh.replace_faces(faces);
    mesh.deselect_all();
    let non_quads_selected = mesh.select_faces_by_sides_not_equal(4);

    let report = DissolveReport {
        edges_dissolved: merges.len(),
        faces_before,
        faces_after: mesh.face_count(),
        triangles_remaining: mesh.triangle_count(),
        non_quads_selected,
    };

    info!(
        target: "quadify::dissolve",
        edges_dissolved = report.edges_dissolved,
        faces_before = report.faces_before,
        faces_after = report.faces_after,
        non_quads = report.non_quads_selected,
        "Edges dissolved"
    );
    log_mesh_stats(mesh, "after dissolve");

    Ok(report)
}

/// Check one candidate against the mesh and build its quad.
///
/// Returns the face that keeps its slot and the quad loop.
fn plan_merge(mesh: &PolyMesh, candidate: &CandidateEdge) -> QuadResult<(FaceId, [u32; 4])> {
    let edge_id = candidate.edge;
    let edge = mesh
        .edge(edge_id)
        .ok_or_else(|| QuadError::dissolve_failed(edge_id, "missing edge"))?;

    let mut faces = [edge.faces.first().copied(), edge.faces.get(1).copied()];
    if edge.faces.len() != 2 {
        return Err(QuadError::dissolve_failed(
            edge_id,
            format!("edge is used by {} faces, expected 2", edge.faces.len()),
        ));
    }
    faces.sort();
    if faces != [Some(candidate.faces[0]), Some(candidate.faces[1])] {
        return Err(QuadError::dissolve_failed(
            edge_id,
            "edge no longer joins the same two triangles",
        ));
    }

    let [t1, t2] = candidate.faces;
    let (Some(f1), Some(f2)) = (mesh.face(t1), mesh.face(t2)) else {
        return Err(QuadError::dissolve_failed(edge_id, "face does not exist"));
    };
    if !f1.is_triangle() || !f2.is_triangle() {
        return Err(QuadError::dissolve_failed(
            edge_id,
            "both faces must be triangles",
        ));
    }

    let shared = (edge.vertices[0], edge.vertices[1]);
    let quad = merge_triangles(&f1.vertices, &f2.vertices, shared).ok_or_else(|| {
        QuadError::dissolve_failed(edge_id, "triangles do not share the edge")
    })?;
    Ok((t1, quad))
}
