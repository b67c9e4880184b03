//! Error types for quad conversion with rich diagnostics.
//!
//! This module provides:
//! - Machine-readable error codes for programmatic handling
//! - Context (which face, which edge, which backend)
//! - Recovery suggestions for common issues
//! - Terminal display via miette
//!
//! # Error Codes
//!
//! Each error has a unique code in the format `QUAD-XXXX`:
//! - `QUAD-1xxx`: I/O errors (file reading, writing, parsing)
//! - `QUAD-2xxx`: Mesh validation errors (topology, coordinates)
//! - `QUAD-3xxx`: Optimization errors (backend missing, solver failure)
//! - `QUAD-4xxx`: Format and configuration errors
//!
//! Outcomes that are not failures (no eligible triangle pairs, solver found no
//! solution) are reported through [`SolutionStatus`](crate::SolutionStatus)
//! rather than through this type.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for quad conversion operations.
pub type QuadResult<T> = Result<T, QuadError>;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // I/O errors (1xxx)
    /// QUAD-1001: Failed to read file
    IoRead = 1001,
    /// QUAD-1002: Failed to write file
    IoWrite = 1002,
    /// QUAD-1003: Failed to parse file format
    ParseError = 1003,

    // Mesh validation errors (2xxx)
    /// QUAD-2001: Face references invalid vertex index
    InvalidVertexIndex = 2001,
    /// QUAD-2002: Vertex has NaN or Infinity coordinate
    InvalidCoordinate = 2002,
    /// QUAD-2003: Mesh has no vertices or faces
    EmptyMesh = 2003,
    /// QUAD-2004: Invalid topology (degenerate loop, edge shared wrongly)
    InvalidTopology = 2004,

    // Optimization errors (3xxx)
    /// QUAD-3001: Requested solver backend is not available
    SolverUnavailable = 3001,
    /// QUAD-3002: Solver crashed or rejected the model
    SolverFailure = 3002,
    /// QUAD-3003: Selected edges cannot be dissolved on this mesh
    DissolveFailed = 3003,

    // Format / configuration errors (4xxx)
    /// QUAD-4001: Unsupported file format
    UnsupportedFormat = 4001,
    /// QUAD-4002: Invalid optimizer configuration
    InvalidConfig = 4002,
}

impl ErrorCode {
    /// Returns the error code as a string in the format `QUAD-XXXX`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IoRead => "QUAD-1001",
            ErrorCode::IoWrite => "QUAD-1002",
            ErrorCode::ParseError => "QUAD-1003",
            ErrorCode::InvalidVertexIndex => "QUAD-2001",
            ErrorCode::InvalidCoordinate => "QUAD-2002",
            ErrorCode::EmptyMesh => "QUAD-2003",
            ErrorCode::InvalidTopology => "QUAD-2004",
            ErrorCode::SolverUnavailable => "QUAD-3001",
            ErrorCode::SolverFailure => "QUAD-3002",
            ErrorCode::DissolveFailed => "QUAD-3003",
            ErrorCode::UnsupportedFormat => "QUAD-4001",
            ErrorCode::InvalidConfig => "QUAD-4002",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recovery suggestions for quad conversion errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Re-export the file from the original software.
    ReexportFile { format: Option<String> },
    /// Check the source mesh.
    CheckSourceMesh { checks: Vec<String> },
    /// Use another solver backend.
    UseDifferentBackend { available: Vec<String> },
    /// Adjust optimizer parameters.
    AdjustParameters { parameters: Vec<(String, String)> },
    /// Re-run candidate detection on the current mesh state.
    RecomputeCandidates,
    /// No automatic recovery available.
    None,
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoverySuggestion::ReexportFile { format } => {
                if let Some(fmt) = format {
                    write!(
                        f,
                        "Try re-exporting the mesh as {} from the original software",
                        fmt
                    )
                } else {
                    write!(f, "Try re-exporting the mesh from the original software")
                }
            }
            RecoverySuggestion::CheckSourceMesh { checks } => {
                write!(f, "Check the source mesh for: {}", checks.join(", "))
            }
            RecoverySuggestion::UseDifferentBackend { available } => {
                write!(
                    f,
                    "Use one of the available backends: {}",
                    available.join(", ")
                )
            }
            RecoverySuggestion::AdjustParameters { parameters } => {
                let params: Vec<String> = parameters
                    .iter()
                    .map(|(k, v)| format!("{} = {}", k, v))
                    .collect();
                write!(f, "Try adjusting: {}", params.join(", "))
            }
            RecoverySuggestion::RecomputeCandidates => {
                write!(
                    f,
                    "The mesh changed since optimization; find candidates and optimize again"
                )
            }
            RecoverySuggestion::None => {
                write!(f, "No automatic recovery available")
            }
        }
    }
}

/// Location information for errors.
#[derive(Debug, Clone)]
pub enum MeshLocation {
    /// Error at a specific vertex.
    Vertex { index: usize },
    /// Error at a specific face.
    Face { index: usize, sides: Option<usize> },
    /// Error at a specific edge.
    Edge { index: usize },
    /// Error in a file.
    File { path: PathBuf },
}

impl std::fmt::Display for MeshLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MeshLocation::Vertex { index } => write!(f, "vertex {}", index),
            MeshLocation::Face { index, sides } => {
                if let Some(n) = sides {
                    write!(f, "face {} ({} sides)", index, n)
                } else {
                    write!(f, "face {}", index)
                }
            }
            MeshLocation::Edge { index } => write!(f, "edge {}", index),
            MeshLocation::File { path } => write!(f, "{}", path.display()),
        }
    }
}

/// Errors that can occur while converting triangles to quads.
#[derive(Debug, Error, Diagnostic)]
pub enum QuadError {
    /// Error reading from a file.
    #[error("failed to read mesh from {path}")]
    #[diagnostic(
        code(quad::io::read),
        help("Check that the file exists and is readable")
    )]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing to a file.
    #[error("failed to write mesh to {path}")]
    #[diagnostic(
        code(quad::io::write),
        help("Check that the directory exists and is writable")
    )]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing a mesh file.
    #[error("failed to parse mesh from {path}: {details}")]
    #[diagnostic(
        code(quad::parse::error),
        help("The file may be corrupted. Try re-exporting from the original software.")
    )]
    ParseError { path: PathBuf, details: String },

    /// Unsupported file format.
    #[error("unsupported mesh format: {extension:?}")]
    #[diagnostic(code(quad::format::unsupported), help("Supported formats: OBJ"))]
    UnsupportedFormat { extension: Option<String> },

    /// Empty mesh (no vertices or faces).
    #[error("mesh is empty: {details}")]
    #[diagnostic(
        code(quad::validation::empty),
        help("The mesh must have at least one vertex and one face.")
    )]
    EmptyMesh { details: String },

    /// Face references a vertex that does not exist.
    #[error(
        "invalid vertex index: face {face_index} references vertex {vertex_index}, but mesh only has {vertex_count} vertices"
    )]
    #[diagnostic(
        code(quad::validation::vertex_index),
        help("Check the mesh export settings.")
    )]
    InvalidVertexIndex {
        face_index: usize,
        vertex_index: u32,
        vertex_count: usize,
    },

    /// Invalid coordinate value (NaN or Infinity).
    #[error("invalid coordinate at vertex {vertex_index}: {coordinate} is {value}")]
    #[diagnostic(
        code(quad::validation::coordinate),
        help("Check for numerical issues in the source data.")
    )]
    InvalidCoordinate {
        vertex_index: usize,
        coordinate: &'static str,
        value: f64,
    },

    /// Invalid topology.
    #[error("invalid mesh topology: {details}")]
    #[diagnostic(
        code(quad::validation::topology),
        help("Faces need at least three distinct vertices and edges may not repeat within a face.")
    )]
    InvalidTopology {
        details: String,
        face_index: Option<usize>,
    },

    /// The requested optimization backend cannot be used.
    #[error("solver backend '{backend}' is not available: {details}")]
    #[diagnostic(
        code(quad::solver::unavailable),
        help("Rebuild with the matching cargo feature or pick the built-in branch-and-bound backend.")
    )]
    SolverUnavailable { backend: String, details: String },

    /// The solver crashed, rejected the model, or returned garbage.
    #[error("solver '{backend}' failed: {details}")]
    #[diagnostic(
        code(quad::solver::failed),
        help("No edges were dissolved. Retry with a different backend or a smaller selection.")
    )]
    SolverFailure { backend: String, details: String },

    /// The solution cannot be applied to the mesh.
    #[error("cannot dissolve edge {edge_index}: {details}")]
    #[diagnostic(
        code(quad::dissolve::failed),
        help("The mesh was modified after the optimization ran.")
    )]
    DissolveFailed { edge_index: usize, details: String },

    /// Configuration is out of range.
    #[error("invalid optimizer configuration: {details}")]
    #[diagnostic(code(quad::config::invalid))]
    InvalidConfig { details: String },
}

impl QuadError {
    /// Returns the machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            QuadError::IoRead { .. } => ErrorCode::IoRead,
            QuadError::IoWrite { .. } => ErrorCode::IoWrite,
            QuadError::ParseError { .. } => ErrorCode::ParseError,
            QuadError::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            QuadError::EmptyMesh { .. } => ErrorCode::EmptyMesh,
            QuadError::InvalidVertexIndex { .. } => ErrorCode::InvalidVertexIndex,
            QuadError::InvalidCoordinate { .. } => ErrorCode::InvalidCoordinate,
            QuadError::InvalidTopology { .. } => ErrorCode::InvalidTopology,
            QuadError::SolverUnavailable { .. } => ErrorCode::SolverUnavailable,
            QuadError::SolverFailure { .. } => ErrorCode::SolverFailure,
            QuadError::DissolveFailed { .. } => ErrorCode::DissolveFailed,
            QuadError::InvalidConfig { .. } => ErrorCode::InvalidConfig,
        }
    }

    /// Returns a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            QuadError::IoRead { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["file exists".into(), "file permissions".into()],
            },
            QuadError::IoWrite { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["directory exists".into(), "write permissions".into()],
            },
            QuadError::ParseError { .. } => RecoverySuggestion::ReexportFile {
                format: Some("OBJ".into()),
            },
            QuadError::UnsupportedFormat { .. } => RecoverySuggestion::ReexportFile {
                format: Some("OBJ".into()),
            },
            QuadError::EmptyMesh { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["mesh has geometry".into()],
            },
            QuadError::InvalidVertexIndex { .. } | QuadError::InvalidTopology { .. } => {
                RecoverySuggestion::CheckSourceMesh {
                    checks: vec!["face indices".into(), "degenerate faces".into()],
                }
            }
            QuadError::InvalidCoordinate { .. } => RecoverySuggestion::CheckSourceMesh {
                checks: vec!["coordinate values".into(), "export precision".into()],
            },
            QuadError::SolverUnavailable { .. } => RecoverySuggestion::UseDifferentBackend {
                available: crate::solver::SolverBackend::available()
                    .map(|b| b.name().to_string())
                    .collect(),
            },
            QuadError::SolverFailure { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![("backend".into(), "branch-and-bound".into())],
            },
            QuadError::DissolveFailed { .. } => RecoverySuggestion::RecomputeCandidates,
            QuadError::InvalidConfig { .. } => RecoverySuggestion::AdjustParameters {
                parameters: vec![
                    ("relative_gap".into(), "a finite value >= 0".into()),
                    ("time_limit".into(), "a finite number of seconds >= 0".into()),
                ],
            },
        }
    }

    /// Returns location information if available.
    pub fn location(&self) -> Option<MeshLocation> {
        match self {
            QuadError::InvalidVertexIndex { face_index, .. } => Some(MeshLocation::Face {
                index: *face_index,
                sides: None,
            }),
            QuadError::InvalidTopology {
                face_index: Some(face_index),
                ..
            } => Some(MeshLocation::Face {
                index: *face_index,
                sides: None,
            }),
            QuadError::InvalidCoordinate { vertex_index, .. } => Some(MeshLocation::Vertex {
                index: *vertex_index,
            }),
            QuadError::DissolveFailed { edge_index, .. } => Some(MeshLocation::Edge {
                index: *edge_index,
            }),
            QuadError::IoRead { path, .. }
            | QuadError::IoWrite { path, .. }
            | QuadError::ParseError { path, .. } => {
                Some(MeshLocation::File { path: path.clone() })
            }
            _ => None,
        }
    }

    // Constructor helpers for common error patterns

    /// Create an IoRead error.
    pub fn io_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        QuadError::IoRead {
            path: path.into(),
            source,
        }
    }

    /// Create an IoWrite error.
    pub fn io_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        QuadError::IoWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a ParseError.
    pub fn parse_error(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        QuadError::ParseError {
            path: path.into(),
            details: details.into(),
        }
    }

    /// Create an EmptyMesh error.
    pub fn empty_mesh(details: impl Into<String>) -> Self {
        QuadError::EmptyMesh {
            details: details.into(),
        }
    }

    /// Create an InvalidTopology error for a face.
    pub fn invalid_face(face_index: usize, details: impl Into<String>) -> Self {
        QuadError::InvalidTopology {
            details: details.into(),
            face_index: Some(face_index),
        }
    }

    /// Create a SolverUnavailable error.
    pub fn solver_unavailable(backend: impl Into<String>, details: impl Into<String>) -> Self {
        QuadError::SolverUnavailable {
            backend: backend.into(),
            details: details.into(),
        }
    }

    /// Create a SolverFailure error.
    pub fn solver_failure(backend: impl Into<String>, details: impl Into<String>) -> Self {
        QuadError::SolverFailure {
            backend: backend.into(),
            details: details.into(),
        }
    }

    /// Create a DissolveFailed error.
    pub fn dissolve_failed(edge_index: usize, details: impl Into<String>) -> Self {
        QuadError::DissolveFailed {
            edge_index,
            details: details.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(details: impl Into<String>) -> Self {
        QuadError::InvalidConfig {
            details: details.into(),
        }
    }

    /// Whether the caller must abort the whole run without touching the mesh.
    pub fn is_solver_error(&self) -> bool {
        matches!(
            self,
            QuadError::SolverUnavailable { .. } | QuadError::SolverFailure { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = QuadError::solver_failure("branch-and-bound", "lp failed");
        assert_eq!(err.code(), ErrorCode::SolverFailure);
        assert_eq!(err.code().as_str(), "QUAD-3002");
        assert!(err.is_solver_error());
    }

    #[test]
    fn test_unavailable_suggests_backends() {
        let err = QuadError::solver_unavailable("highs", "feature disabled");
        match err.recovery_suggestion() {
            RecoverySuggestion::UseDifferentBackend { available } => {
                assert!(available.iter().any(|b| b == "branch-and-bound"));
            }
            other => panic!("Expected UseDifferentBackend, got {:?}", other),
        }
    }

    #[test]
    fn test_location_info() {
        let err = QuadError::invalid_face(7, "repeated vertex");
        match err.location() {
            Some(MeshLocation::Face { index, .. }) => assert_eq!(index, 7),
            other => panic!("Expected Face location, got {:?}", other),
        }

        let err = QuadError::dissolve_failed(3, "edge has one face");
        assert!(matches!(
            err.location(),
            Some(MeshLocation::Edge { index: 3 })
        ));
    }

    #[test]
    fn test_error_display() {
        let err = QuadError::InvalidVertexIndex {
            face_index: 5,
            vertex_index: 100,
            vertex_count: 50,
        };
        let display = format!("{}", err);
        assert!(display.contains("face 5"));
        assert!(display.contains("vertex 100"));
        assert!(display.contains("50 vertices"));
    }

    #[test]
    fn test_suggestion_display() {
        let s = RecoverySuggestion::AdjustParameters {
            parameters: vec![("relative_gap".into(), "0.01".into())],
        };
        assert_eq!(s.to_string(), "Try adjusting: relative_gap = 0.01");
    }
}
