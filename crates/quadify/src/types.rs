//! Core mesh data types.
//!
//! [`PolyMesh`] is a small polygon mesh with face and edge selection, the
//! shape a host modeling application exposes to an edit-mode operator. The
//! optimizer never touches it directly; it reads the selected region through
//! the [`RegionReader`] trait so any host mesh can be plugged in.

use crate::error::{QuadError, QuadResult};
use hashbrown::HashMap;
use nalgebra::Point3;
use smallvec::SmallVec;

/// Index of a face, stable for the duration of one optimization run.
pub type FaceId = usize;

/// Index of an edge, stable for the duration of one optimization run.
pub type EdgeId = usize;

/// Read-only view of a mesh region, as consumed by candidate detection.
///
/// Ids are dense in `0..face_count()` and `0..edge_count()`. Implementations
/// must return the same answers for the whole run; the optimizer does not
/// expect the mesh to change under it.
pub trait RegionReader {
    /// Number of faces in the mesh.
    fn face_count(&self) -> usize;

    /// Whether the face is part of the selected region.
    fn face_selected(&self, face: FaceId) -> bool;

    /// Edges bounding the face. A triangle has exactly three.
    fn face_edges(&self, face: FaceId) -> &[EdgeId];

    /// Number of edges in the mesh.
    fn edge_count(&self) -> usize;

    /// Whether the edge is selected.
    fn edge_selected(&self, edge: EdgeId) -> bool;

    /// Faces that use this edge. Boundary edges have one, manifold interior
    /// edges two, non-manifold edges more.
    fn edge_faces(&self, edge: EdgeId) -> &[FaceId];

    /// Euclidean length of the edge.
    fn edge_length(&self, edge: EdgeId) -> f64;
}

/// A polygonal face as a loop of vertex indices.
#[derive(Debug, Clone)]
pub struct Face {
    /// Vertex loop. Edge `i` runs from `vertices[i]` to `vertices[(i + 1) % n]`.
    pub vertices: SmallVec<[u32; 4]>,

    /// Edges in loop order, derived from `vertices`.
    edges: SmallVec<[EdgeId; 4]>,

    /// Selection flag.
    pub selected: bool,
}

impl Face {
    /// Create a selected face from a vertex loop. Edges are filled in when
    /// the face is added to a mesh.
    pub fn new(vertices: impl IntoIterator<Item = u32>) -> Self {
        Self {
            vertices: vertices.into_iter().collect(),
            edges: SmallVec::new(),
            selected: true,
        }
    }

    /// Number of sides (vertices == edges).
    #[inline]
    pub fn sides(&self) -> usize {
        self.vertices.len()
    }

    /// Edge ids in loop order.
    #[inline]
    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    #[inline]
    pub fn is_triangle(&self) -> bool {
        self.vertices.len() == 3
    }

    #[inline]
    pub fn is_quad(&self) -> bool {
        self.vertices.len() == 4
    }
}

/// An undirected edge between two vertices.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Endpoints, smaller index first.
    pub vertices: [u32; 2],

    /// Faces using this edge, in ascending face order.
    pub faces: SmallVec<[FaceId; 2]>,

    /// Selection flag.
    pub selected: bool,
}

/// Summary counts for a mesh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshStats {
    pub vertices: usize,
    pub faces: usize,
    pub edges: usize,
    pub triangles: usize,
    pub quads: usize,
    /// Faces with more than four sides.
    pub ngons: usize,
    pub selected_faces: usize,
    pub selected_edges: usize,
}

impl std::fmt::Display for MeshStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} vertices, {} faces ({} tris, {} quads, {} ngons), {} edges",
            self.vertices, self.faces, self.triangles, self.quads, self.ngons, self.edges
        )
    }
}

/// Normalize an edge to have the smaller vertex index first.
#[inline]
pub(crate) fn normalize_edge(a: u32, b: u32) -> (u32, u32) {
    if a < b { (a, b) } else { (b, a) }
}

/// A polygon mesh with indexed vertices, polygonal faces and a derived edge
/// table.
///
/// Edge ids are assigned in order of first use while walking faces in order,
/// so they are deterministic for a given face list. A freshly built mesh has
/// every face and edge selected.
#[derive(Debug, Clone)]
pub struct PolyMesh {
    vertices: Vec<Point3<f64>>,
    faces: Vec<Face>,
    edges: Vec<Edge>,
    edge_lookup: HashMap<(u32, u32), EdgeId>,
}

impl PolyMesh {
    /// Build a mesh from vertex positions and polygon loops.
    ///
    /// Fails with [`QuadError::EmptyMesh`] when there are no vertices or no
    /// faces, [`QuadError::InvalidCoordinate`] for NaN/Infinity positions,
    /// [`QuadError::InvalidVertexIndex`] for out-of-range indices, and
    /// [`QuadError::InvalidTopology`] for loops with fewer than three
    /// distinct vertices.
    pub fn new<F>(
        vertices: Vec<Point3<f64>>,
        faces: impl IntoIterator<Item = F>,
    ) -> QuadResult<Self>
    where
        F: IntoIterator<Item = u32>,
    {
        let faces: Vec<Face> = faces.into_iter().map(Face::new).collect();
        Self::from_faces(vertices, faces)
    }

    /// Build a mesh made of triangles only.
    pub fn from_triangles(vertices: Vec<Point3<f64>>, triangles: &[[u32; 3]]) -> QuadResult<Self> {
        Self::new(vertices, triangles.iter().map(|t| t.iter().copied()))
    }

    /// Build a mesh from prepared faces, keeping their selection flags.
    pub fn from_faces(vertices: Vec<Point3<f64>>, faces: Vec<Face>) -> QuadResult<Self> {
        if vertices.is_empty() {
            return Err(QuadError::empty_mesh("no vertices"));
        }
        if faces.is_empty() {
            return Err(QuadError::empty_mesh("no faces"));
        }

        for (i, p) in vertices.iter().enumerate() {
            for (coordinate, value) in [("x", p.x), ("y", p.y), ("z", p.z)] {
                if !value.is_finite() {
                    return Err(QuadError::InvalidCoordinate {
                        vertex_index: i,
                        coordinate,
                        value,
                    });
                }
            }
        }

        for (face_index, face) in faces.iter().enumerate() {
            validate_loop(face_index, &face.vertices, vertices.len())?;
        }

        let mut mesh = Self {
            vertices,
            faces,
            edges: Vec::new(),
            edge_lookup: HashMap::new(),
        };
        mesh.rebuild_edges();
        Ok(mesh)
    }

    /// Vertex positions.
    #[inline]
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// Faces in id order.
    #[inline]
    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    /// Edges in id order.
    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[inline]
    pub fn face(&self, face: FaceId) -> Option<&Face> {
        self.faces.get(face)
    }

    #[inline]
    pub fn edge(&self, edge: EdgeId) -> Option<&Edge> {
        self.edges.get(edge)
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of sides of a face, 0 for an unknown id.
    #[inline]
    pub fn face_sides(&self, face: FaceId) -> usize {
        self.faces.get(face).map_or(0, Face::sides)
    }

    /// Look up the edge between two vertices.
    pub fn find_edge(&self, a: u32, b: u32) -> Option<EdgeId> {
        self.edge_lookup.get(&normalize_edge(a, b)).copied()
    }

    /// Number of triangular faces.
    pub fn triangle_count(&self) -> usize {
        self.faces.iter().filter(|f| f.is_triangle()).count()
    }

    /// Number of quadrilateral faces.
    pub fn quad_count(&self) -> usize {
        self.faces.iter().filter(|f| f.is_quad()).count()
    }

    /// Summary counts.
    pub fn stats(&self) -> MeshStats {
        let mut stats = MeshStats {
            vertices: self.vertices.len(),
            faces: self.faces.len(),
            edges: self.edges.len(),
            ..MeshStats::default()
        };
        for face in &self.faces {
            match face.sides() {
                3 => stats.triangles += 1,
                4 => stats.quads += 1,
                _ => stats.ngons += 1,
            }
            if face.selected {
                stats.selected_faces += 1;
            }
        }
        stats.selected_edges = self.edges.iter().filter(|e| e.selected).count();
        stats
    }

    // ==================== Selection ====================

    /// Select every face and edge.
    pub fn select_all(&mut self) {
        self.faces.iter_mut().for_each(|f| f.selected = true);
        self.edges.iter_mut().for_each(|e| e.selected = true);
    }

    /// Clear the selection on every face and edge.
    pub fn deselect_all(&mut self) {
        self.faces.iter_mut().for_each(|f| f.selected = false);
        self.edges.iter_mut().for_each(|e| e.selected = false);
    }

    /// Add faces to the selection. Their bounding edges become selected too.
    /// Unknown ids are ignored.
    pub fn select_faces(&mut self, faces: impl IntoIterator<Item = FaceId>) {
        for id in faces {
            let Some(face) = self.faces.get_mut(id) else {
                continue;
            };
            face.selected = true;
            for &e in &face.edges {
                self.edges[e].selected = true;
            }
        }
    }

    /// Add every face whose side count differs from `sides` to the selection.
    /// Returns how many faces matched.
    pub fn select_faces_by_sides_not_equal(&mut self, sides: usize) -> usize {
        let matching: Vec<FaceId> = self
            .faces
            .iter()
            .enumerate()
            .filter(|(_, f)| f.sides() != sides)
            .map(|(i, _)| i)
            .collect();
        let count = matching.len();
        self.select_faces(matching);
        count
    }

    /// Set the selection flag of a single face without touching its edges.
    pub fn set_face_selected(&mut self, face: FaceId, selected: bool) {
        if let Some(f) = self.faces.get_mut(face) {
            f.selected = selected;
        }
    }

    /// Set the selection flag of a single edge.
    pub fn set_edge_selected(&mut self, edge: EdgeId, selected: bool) {
        if let Some(e) = self.edges.get_mut(edge) {
            e.selected = selected;
        }
    }

    // ==================== Topology updates ====================

    /// Replace the face list and rebuild the edge table.
    ///
    /// Edges that survive keep their selection; new edges are selected when
    /// any face using them is selected. Callers validate the loops.
    pub(crate) fn replace_faces(&mut self, faces: Vec<Face>) {
        let previous: HashMap<(u32, u32), bool> = self
            .edges
            .iter()
            .map(|e| ((e.vertices[0], e.vertices[1]), e.selected))
            .collect();
        self.faces = faces;
        self.rebuild_edges();
        for edge in &mut self.edges {
            if let Some(&selected) = previous.get(&(edge.vertices[0], edge.vertices[1])) {
                edge.selected = selected;
            }
        }
    }

    /// Derive the edge table from the face loops.
    fn rebuild_edges(&mut self) {
        self.edges.clear();
        self.edge_lookup.clear();

        for (face_id, face) in self.faces.iter_mut().enumerate() {
            face.edges.clear();
            let n = face.vertices.len();
            for i in 0..n {
                let key = normalize_edge(face.vertices[i], face.vertices[(i + 1) % n]);
                let edge_id = *self.edge_lookup.entry(key).or_insert_with(|| {
                    self.edges.push(Edge {
                        vertices: [key.0, key.1],
                        faces: SmallVec::new(),
                        selected: false,
                    });
                    self.edges.len() - 1
                });
                let edge = &mut self.edges[edge_id];
                edge.faces.push(face_id);
                edge.selected |= face.selected;
                face.edges.push(edge_id);
            }
        }
    }
}

/// Check one vertex loop against the vertex count.
pub(crate) fn validate_loop(
    face_index: usize,
    loop_: &[u32],
    vertex_count: usize,
) -> QuadResult<()> {
    if loop_.len() < 3 {
        return Err(QuadError::invalid_face(
            face_index,
            format!("face {} has only {} vertices", face_index, loop_.len()),
        ));
    }
    for (i, &v) in loop_.iter().enumerate() {
        if v as usize >= vertex_count {
            return Err(QuadError::InvalidVertexIndex {
                face_index,
                vertex_index: v,
                vertex_count,
            });
        }
        if loop_[..i].contains(&v) {
            return Err(QuadError::invalid_face(
                face_index,
                format!("face {} repeats vertex {}", face_index, v),
            ));
        }
    }
    Ok(())
}

impl RegionReader for PolyMesh {
    #[inline]
    fn face_count(&self) -> usize {
        self.faces.len()
    }

    #[inline]
    fn face_selected(&self, face: FaceId) -> bool {
        self.faces.get(face).is_some_and(|f| f.selected)
    }

    #[inline]
    fn face_edges(&self, face: FaceId) -> &[EdgeId] {
        self.faces.get(face).map(Face::edges).unwrap_or(&[])
    }

    #[inline]
    fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    fn edge_selected(&self, edge: EdgeId) -> bool {
        self.edges.get(edge).is_some_and(|e| e.selected)
    }

    #[inline]
    fn edge_faces(&self, edge: EdgeId) -> &[FaceId] {
        self.edges
            .get(edge)
            .map(|e| e.faces.as_slice())
            .unwrap_or(&[])
    }

    fn edge_length(&self, edge: EdgeId) -> f64 {
        match self.edges.get(edge) {
            Some(e) => {
                let a = &self.vertices[e.vertices[0] as usize];
                let b = &self.vertices[e.vertices[1] as usize];
                (b - a).norm()
            }
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    /// Unit square split along the 0-2 diagonal.
    fn make_split_square() -> PolyMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        PolyMesh::from_triangles(vertices, &[[0, 1, 2], [0, 2, 3]]).unwrap()
    }

    #[test]
    fn test_edge_table() {
        let mesh = make_split_square();
        assert_eq!(mesh.face_count(), 2);
        assert_eq!(mesh.edge_count(), 5);

        let diagonal = mesh.find_edge(2, 0).unwrap();
        assert_eq!(mesh.edge_faces(diagonal), &[0, 1]);
        assert!(approx_eq(mesh.edge_length(diagonal), 2.0_f64.sqrt()));

        let boundary = mesh.find_edge(0, 1).unwrap();
        assert_eq!(mesh.edge_faces(boundary), &[0]);
        assert!(approx_eq(mesh.edge_length(boundary), 1.0));
    }

    #[test]
    fn test_edge_ids_follow_face_order() {
        let mesh = make_split_square();
        assert_eq!(mesh.face_edges(0), &[0, 1, 2]);
        // Second face: 0-2 reuses edge 2, then 2-3 and 3-0 are new.
        assert_eq!(mesh.face_edges(1), &[2, 3, 4]);
    }

    #[test]
    fn test_new_mesh_fully_selected() {
        let mesh = make_split_square();
        let stats = mesh.stats();
        assert_eq!(stats.selected_faces, 2);
        assert_eq!(stats.selected_edges, 5);
        assert_eq!(stats.triangles, 2);
        assert_eq!(stats.quads, 0);
    }

    #[test]
    fn test_select_faces_flushes_edges() {
        let mut mesh = make_split_square();
        mesh.deselect_all();
        assert!(!mesh.face_selected(0));
        assert!(!mesh.edge_selected(0));

        mesh.select_faces([1]);
        assert!(mesh.face_selected(1));
        assert!(!mesh.face_selected(0));
        for &e in mesh.face_edges(1) {
            assert!(mesh.edge_selected(e));
        }
        assert!(!mesh.edge_selected(mesh.find_edge(0, 1).unwrap()));
    }

    #[test]
    fn test_select_by_sides() {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        let faces: Vec<Vec<u32>> = vec![vec![0, 1, 2, 3], vec![1, 4, 2]];
        let mut mesh = PolyMesh::new(vertices, faces).unwrap();
        mesh.deselect_all();

        let matched = mesh.select_faces_by_sides_not_equal(4);
        assert_eq!(matched, 1);
        assert!(!mesh.face_selected(0));
        assert!(mesh.face_selected(1));
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.quad_count(), 1);
    }

    #[test]
    fn test_rejects_empty() {
        let err = PolyMesh::from_triangles(vec![], &[]).unwrap_err();
        assert!(matches!(err, QuadError::EmptyMesh { .. }));

        let err = PolyMesh::from_triangles(vec![Point3::origin()], &[]).unwrap_err();
        assert!(matches!(err, QuadError::EmptyMesh { .. }));
    }

    #[test]
    fn test_rejects_bad_index() {
        let vertices = vec![
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let err = PolyMesh::from_triangles(vertices, &[[0, 1, 9]]).unwrap_err();
        match err {
            QuadError::InvalidVertexIndex {
                face_index,
                vertex_index,
                vertex_count,
            } => {
                assert_eq!(face_index, 0);
                assert_eq!(vertex_index, 9);
                assert_eq!(vertex_count, 3);
            }
            other => panic!("Expected InvalidVertexIndex, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_degenerate_loop() {
        let vertices = vec![
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let err = PolyMesh::from_triangles(vertices.clone(), &[[0, 1, 1]]).unwrap_err();
        assert!(matches!(
            err,
            QuadError::InvalidTopology {
                face_index: Some(0),
                ..
            }
        ));

        let faces: Vec<Vec<u32>> = vec![vec![0, 1]];
        let err = PolyMesh::new(vertices, faces).unwrap_err();
        assert!(matches!(err, QuadError::InvalidTopology { .. }));
    }

    #[test]
    fn test_rejects_nan() {
        let vertices = vec![
            Point3::origin(),
            Point3::new(f64::NAN, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let err = PolyMesh::from_triangles(vertices, &[[0, 1, 2]]).unwrap_err();
        assert!(matches!(
            err,
            QuadError::InvalidCoordinate { vertex_index: 1, coordinate: "x", .. }
        ));
    }

    #[test]
    fn test_replace_faces_keeps_edge_selection() {
        let mut mesh = make_split_square();
        let boundary = mesh.find_edge(0, 1).unwrap();
        mesh.set_edge_selected(boundary, false);

        mesh.replace_faces(vec![Face::new([0, 1, 2, 3])]);
        assert_eq!(mesh.edge_count(), 4);
        assert!(mesh.find_edge(0, 2).is_none());
        assert!(!mesh.edge_selected(mesh.find_edge(0, 1).unwrap()));
        assert!(mesh.edge_selected(mesh.find_edge(1, 2).unwrap()));
    }

    #[test]
    fn test_out_of_range_queries() {
        let mesh = make_split_square();
        assert!(!mesh.face_selected(99));
        assert!(mesh.face_edges(99).is_empty());
        assert!(mesh.edge_faces(99).is_empty());
        assert_eq!(mesh.face_sides(99), 0);
    }
}
