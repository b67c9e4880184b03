//! Candidate detection: which shared edges may be dissolved.
//!
//! An edge is a candidate when dissolving it would merge two selected
//! triangles into a single quad:
//!
//! - the edge itself is selected,
//! - it is used by exactly two faces and those faces are distinct,
//! - both faces are selected,
//! - both faces have exactly three edges.
//!
//! Candidates are listed in ascending edge id, so the decision variable for
//! candidate `i` is always named `v{i:03}` for a given mesh.

use crate::types::{EdgeId, FaceId, RegionReader};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// An edge shared by two selected triangles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateEdge {
    /// Edge id in the source mesh.
    pub edge: EdgeId,

    /// The two incident triangles, smaller id first.
    pub faces: [FaceId; 2],

    /// Euclidean length, finite and non-negative.
    pub length: f64,
}

impl CandidateEdge {
    /// Whether this candidate touches the given triangle.
    #[inline]
    pub fn touches(&self, face: FaceId) -> bool {
        self.faces[0] == face || self.faces[1] == face
    }
}

/// Name of the decision variable for candidate `index`.
#[inline]
pub fn variable_name(index: usize) -> String {
    format!("v{:03}", index)
}

/// Ordered list of candidate edges for one optimization run.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    candidates: Vec<CandidateEdge>,
}

impl CandidateSet {
    /// Build a set from candidates, sorting them by edge id.
    pub fn from_candidates(mut candidates: Vec<CandidateEdge>) -> Self {
        candidates.sort_by_key(|c| c.edge);
        candidates.dedup_by_key(|c| c.edge);
        Self { candidates }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidate at a variable index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&CandidateEdge> {
        self.candidates.get(index)
    }

    /// Candidates in variable order.
    pub fn iter(&self) -> impl Iterator<Item = &CandidateEdge> + '_ {
        self.candidates.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[CandidateEdge] {
        &self.candidates
    }

    /// Variable index of an edge, if it is a candidate.
    pub fn position(&self, edge: EdgeId) -> Option<usize> {
        self.candidates.binary_search_by_key(&edge, |c| c.edge).ok()
    }

    /// Longest candidate length, or 1.0 when the set is empty or every
    /// candidate is degenerate.
    pub fn max_length(&self) -> f64 {
        let max = self
            .candidates
            .iter()
            .map(|c| c.length)
            .fold(0.0_f64, f64::max);
        if max > 0.0 { max } else { 1.0 }
    }

    /// Candidate indices per triangle, in ascending triangle id.
    ///
    /// A triangle appears only if at least one candidate touches it; each
    /// list is in ascending candidate order. Sets found on a mesh have at most
    /// three entries per triangle.
    pub fn triangle_incidence(&self) -> Vec<(FaceId, SmallVec<[usize; 3]>)> {
        let mut incidence: BTreeMap<FaceId, SmallVec<[usize; 3]>> = BTreeMap::new();
        for (i, c) in self.candidates.iter().enumerate() {
            for &face in &c.faces {
                incidence.entry(face).or_default().push(i);
            }
        }
        incidence.into_iter().collect()
    }

    /// Number of triangles shared by at least two candidates. Each becomes a
    /// constraint of the integer program.
    pub fn contested_triangle_count(&self) -> usize {
        self.triangle_incidence()
            .iter()
            .filter(|(_, s)| s.len() > 1)
            .count()
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a CandidateEdge;
    type IntoIter = std::slice::Iter<'a, CandidateEdge>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

/// Check whether a single edge qualifies as a candidate.
///
/// Returns the two incident faces, smaller id first, when it does.
pub fn eligible_faces<R: RegionReader + ?Sized>(region: &R, edge: EdgeId) -> Option<[FaceId; 2]> {
    if !region.edge_selected(edge) {
        return None;
    }
    let faces = region.edge_faces(edge);
    let &[a, b] = faces else {
        return None;
    };
    if a == b {
        return None;
    }
    for f in [a, b] {
        if !region.face_selected(f) || region.face_edges(f).len() != 3 {
            return None;
        }
    }
    Some(if a < b { [a, b] } else { [b, a] })
}

/// Scan the selected region for candidate edges.
///
/// No side effects. An empty result means there is nothing to merge; it is
/// not an error.
pub fn find_candidates<R: RegionReader + ?Sized>(region: &R) -> CandidateSet {
    let mut candidates = Vec::new();

    for edge in 0..region.edge_count() {
        let Some(faces) = eligible_faces(region, edge) else {
            continue;
        };

        let mut length = region.edge_length(edge);
        if !length.is_finite() || length < 0.0 {
            warn!(
                target: "quadify::candidates",
                edge,
                length,
                "Edge length is not a finite non-negative number, using 0"
            );
            length = 0.0;
        }

        candidates.push(CandidateEdge {
            edge,
            faces,
            length,
        });
    }

    // Edge ids are scanned in order, so the list is already sorted.
    let set = CandidateSet { candidates };

    debug!(
        target: "quadify::candidates",
        edges_scanned = region.edge_count(),
        candidates = set.len(),
        max_length = set.max_length(),
        "Candidate scan complete"
    );

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PolyMesh;
    use nalgebra::Point3;

    /// Square split on the 0-2 diagonal, plus a quad hanging off edge 1-2.
    fn make_mixed_mesh() -> PolyMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
        ];
        let faces: Vec<Vec<u32>> = vec![vec![0, 1, 2], vec![0, 2, 3], vec![1, 4, 5, 2]];
        PolyMesh::new(vertices, faces).unwrap()
    }

    /// Fan of three triangles around vertex 0.
    fn make_fan() -> PolyMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.5, 1.5, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(-1.0, 0.5, 0.0),
        ];
        PolyMesh::from_triangles(vertices, &[[0, 1, 2], [0, 2, 3], [0, 3, 4]]).unwrap()
    }

    #[test]
    fn test_single_diagonal() {
        let mesh = make_mixed_mesh();
        let set = find_candidates(&mesh);
        assert_eq!(set.len(), 1);

        let c = set.get(0).unwrap();
        assert_eq!(c.edge, mesh.find_edge(0, 2).unwrap());
        assert_eq!(c.faces, [0, 1]);
        assert!((c.length - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_edge_to_quad_is_not_candidate() {
        let mesh = make_mixed_mesh();
        let shared = mesh.find_edge(1, 2).unwrap();
        assert_eq!(mesh.edge_faces(shared).len(), 2);
        assert!(eligible_faces(&mesh, shared).is_none());
    }

    #[test]
    fn test_unselected_edge_excluded() {
        let mut mesh = make_mixed_mesh();
        let diagonal = mesh.find_edge(0, 2).unwrap();
        mesh.set_edge_selected(diagonal, false);
        assert!(find_candidates(&mesh).is_empty());
    }

    #[test]
    fn test_unselected_face_excluded() {
        let mut mesh = make_mixed_mesh();
        mesh.set_face_selected(1, false);
        assert!(find_candidates(&mesh).is_empty());
    }

    #[test]
    fn test_boundary_edges_excluded() {
        let vertices = vec![
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mesh = PolyMesh::from_triangles(vertices, &[[0, 1, 2]]).unwrap();
        assert!(find_candidates(&mesh).is_empty());
    }

    #[test]
    fn test_non_manifold_edge_excluded() {
        // Three triangles on edge 0-1.
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
            Point3::new(0.5, 0.0, 1.0),
        ];
        let mesh = PolyMesh::from_triangles(vertices, &[[0, 1, 2], [1, 0, 3], [0, 1, 4]]).unwrap();
        let e01 = mesh.find_edge(0, 1).unwrap();
        assert_eq!(mesh.edge_faces(e01).len(), 3);
        assert!(find_candidates(&mesh).position(e01).is_none());
    }

    #[test]
    fn test_fan_incidence() {
        let mesh = make_fan();
        let set = find_candidates(&mesh);
        assert_eq!(set.len(), 2);

        let incidence = set.triangle_incidence();
        let ids: Vec<FaceId> = incidence.iter().map(|(f, _)| *f).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(incidence[1].1.as_slice(), &[0, 1]);
        assert_eq!(set.contested_triangle_count(), 1);
    }

    #[test]
    fn test_ascending_order_and_position() {
        let mesh = make_fan();
        let set = find_candidates(&mesh);
        let edges: Vec<EdgeId> = set.iter().map(|c| c.edge).collect();
        let mut sorted = edges.clone();
        sorted.sort();
        assert_eq!(edges, sorted);
        for (i, c) in set.iter().enumerate() {
            assert_eq!(set.position(c.edge), Some(i));
        }
    }

    #[test]
    fn test_max_length_defaults() {
        assert_eq!(CandidateSet::default().max_length(), 1.0);

        let degenerate = CandidateSet::from_candidates(vec![CandidateEdge {
            edge: 3,
            faces: [0, 1],
            length: 0.0,
        }]);
        assert_eq!(degenerate.max_length(), 1.0);
    }

    #[test]
    fn test_from_candidates_sorts() {
        let set = CandidateSet::from_candidates(vec![
            CandidateEdge {
                edge: 9,
                faces: [2, 3],
                length: 1.0,
            },
            CandidateEdge {
                edge: 4,
                faces: [0, 1],
                length: 3.0,
            },
        ]);
        assert_eq!(set.get(0).unwrap().edge, 4);
        assert_eq!(set.max_length(), 3.0);
    }

    #[test]
    fn test_variable_names() {
        assert_eq!(variable_name(0), "v000");
        assert_eq!(variable_name(42), "v042");
        assert_eq!(variable_name(1234), "v1234");
    }
}
