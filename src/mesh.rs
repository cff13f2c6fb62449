//! Grid traversal primitives consumed by the assemblers.
//!
//! The assemblers only require the [`Grid`] trait: element iteration, the faces of an element and
//! whether a face is shared with a neighbor or lies on the domain boundary. [`AdjacencyGrid`] is a
//! simple index-based implementation that derives neighbor relationships from cell connectivity.
use eyre::bail;
use itertools::Itertools;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;

/// The reference geometry of a grid element.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeometryType {
    Vertex,
    Line,
    Triangle,
    Quadrilateral,
    Tetrahedron,
    Hexahedron,
}

const NO_FACES: &[&[usize]] = &[];
const LINE_FACES: &[&[usize]] = &[&[0], &[1]];
const TRIANGLE_FACES: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 0]];
const QUADRILATERAL_FACES: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 3], &[3, 0]];
const TETRAHEDRON_FACES: &[&[usize]] = &[&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[0, 3, 2]];
const HEXAHEDRON_FACES: &[&[usize]] = &[
    &[0, 3, 2, 1],
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[0, 4, 7, 3],
    &[4, 5, 6, 7],
];

impl GeometryType {
    pub fn dim(&self) -> usize {
        match self {
            Self::Vertex => 0,
            Self::Line => 1,
            Self::Triangle | Self::Quadrilateral => 2,
            Self::Tetrahedron | Self::Hexahedron => 3,
        }
    }

    pub fn num_vertices(&self) -> usize {
        match self {
            Self::Vertex => 1,
            Self::Line => 2,
            Self::Triangle => 3,
            Self::Quadrilateral | Self::Tetrahedron => 4,
            Self::Hexahedron => 8,
        }
    }

    pub fn is_cube(&self) -> bool {
        matches!(self, Self::Line | Self::Quadrilateral | Self::Hexahedron)
    }

    pub fn is_simplex(&self) -> bool {
        matches!(self, Self::Vertex | Self::Line | Self::Triangle | Self::Tetrahedron)
    }

    /// Local vertex indices of each face of the reference element.
    pub fn faces(&self) -> &'static [&'static [usize]] {
        match self {
            Self::Vertex => NO_FACES,
            Self::Line => LINE_FACES,
            Self::Triangle => TRIANGLE_FACES,
            Self::Quadrilateral => QUADRILATERAL_FACES,
            Self::Tetrahedron => TETRAHEDRON_FACES,
            Self::Hexahedron => HEXAHEDRON_FACES,
        }
    }

    pub fn num_faces(&self) -> usize {
        self.faces().len()
    }
}

/// A face of an element, either shared with a neighbor or lying on the domain boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Intersection {
    /// Index of the face among the faces of the inside element.
    pub local_face: usize,
    /// The element on the other side of the face, if any.
    pub neighbor: Option<usize>,
}

impl Intersection {
    pub fn is_boundary(&self) -> bool {
        self.neighbor.is_none()
    }
}

/// Element and face iteration as required by the assemblers.
///
/// Elements are identified by their position `0 .. num_elements()`, and they are visited in that
/// order.
pub trait Grid {
    fn num_elements(&self) -> usize;

    fn geometry_type(&self, element: usize) -> GeometryType;

    /// Index of the element among all elements sharing its geometry type.
    ///
    /// Together with the geometry type, this must identify the element uniquely.
    fn element_index(&self, element: usize) -> usize;

    fn num_faces(&self, element: usize) -> usize;

    fn intersection(&self, element: usize, local_face: usize) -> Intersection;
}

/// Access to the vertices of each element, used by vertex-based function spaces.
pub trait VertexConnectivity {
    fn num_vertices(&self) -> usize;

    fn element_vertices(&self, element: usize) -> &[usize];
}

/// A cell described by its geometry and its vertex indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridCell {
    pub geometry_type: GeometryType,
    pub vertices: Vec<usize>,
}

impl GridCell {
    pub fn new(geometry_type: GeometryType, vertices: impl Into<Vec<usize>>) -> Self {
        Self {
            geometry_type,
            vertices: vertices.into(),
        }
    }
}

/// Index-based grid whose neighbor relationships are derived from shared faces.
///
/// Two cells are neighbors across a face if the face has the same set of vertex indices in both
/// cells. Faces that belong to exactly one cell are boundary faces. Cells of different geometry
/// types may be mixed freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyGrid {
    cells: Vec<GridCell>,
    type_indices: Vec<usize>,
    face_offsets: Vec<usize>,
    neighbors: Vec<Option<usize>>,
    num_vertices: usize,
}

impl AdjacencyGrid {
    /// Construct a grid from cells, matching faces to determine neighbors.
    ///
    /// Returns an error if a cell has the wrong number of vertices for its geometry type, or if
    /// a face is shared by more than two cells.
    pub fn from_cells(cells: Vec<GridCell>) -> eyre::Result<Self> {
        let mut type_counts = FxHashMap::default();
        let mut type_indices = Vec::with_capacity(cells.len());
        let mut face_offsets = Vec::with_capacity(cells.len() + 1);
        let mut num_vertices = 0;

        face_offsets.push(0);
        for (cell_index, cell) in cells.iter().enumerate() {
            let expected = cell.geometry_type.num_vertices();
            if cell.vertices.len() != expected {
                bail!(
                    "cell {} of type {:?} has {} vertices, expected {}",
                    cell_index,
                    cell.geometry_type,
                    cell.vertices.len(),
                    expected
                );
            }

            let count = type_counts.entry(cell.geometry_type).or_insert(0);
            type_indices.push(*count);
            *count += 1;

            if let Some(max_vertex) = cell.vertices.iter().max() {
                num_vertices = num_vertices.max(max_vertex + 1);
            }

            let num_faces = cell.geometry_type.num_faces();
            face_offsets.push(face_offsets[cell_index] + num_faces);
        }

        let total_faces = face_offsets.last().copied().unwrap_or(0);
        let mut neighbors = vec![None; total_faces];

        // Sorted face vertices serve as keys, so the orientation of a face within its cell
        // does not matter
        let mut open_faces: FxHashMap<Vec<usize>, (usize, usize, usize)> = FxHashMap::default();
        for (cell_index, cell) in cells.iter().enumerate() {
            for (local_face, face) in cell.geometry_type.faces().iter().enumerate() {
                let mut key: Vec<usize> = face.iter().map(|&v| cell.vertices[v]).collect();
                key.sort_unstable();
                let slot = face_offsets[cell_index] + local_face;

                match open_faces.entry(key) {
                    Entry::Vacant(entry) => {
                        entry.insert((cell_index, slot, 1));
                    }
                    Entry::Occupied(mut entry) => {
                        let (other_cell, other_slot, count) = entry.get_mut();
                        if *count > 1 {
                            bail!("face {:?} is shared by more than two cells", entry.key());
                        }
                        neighbors[slot] = Some(*other_cell);
                        neighbors[*other_slot] = Some(cell_index);
                        *count += 1;
                    }
                }
            }
        }

        Ok(Self {
            cells,
            type_indices,
            face_offsets,
            neighbors,
            num_vertices,
        })
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// Faces that belong to a single cell, as `(cell, local_face)` pairs.
    pub fn boundary_faces(&self) -> Vec<(usize, usize)> {
        let mut faces = Vec::new();
        for cell_index in 0..self.cells.len() {
            for local_face in 0..Grid::num_faces(self, cell_index) {
                if self.intersection(cell_index, local_face).is_boundary() {
                    faces.push((cell_index, local_face));
                }
            }
        }
        faces
    }

    /// Returns a sorted list of vertices that belong to at least one boundary face.
    pub fn boundary_vertices(&self) -> Vec<usize> {
        self.boundary_faces()
            .into_iter()
            .flat_map(|(cell_index, local_face)| {
                let cell = &self.cells[cell_index];
                let face = cell.geometry_type.faces()[local_face];
                face.iter().map(move |&v| cell.vertices[v])
            })
            .sorted_unstable()
            .dedup()
            .collect()
    }
}

impl Grid for AdjacencyGrid {
    fn num_elements(&self) -> usize {
        self.cells.len()
    }

    fn geometry_type(&self, element: usize) -> GeometryType {
        self.cells[element].geometry_type
    }

    fn element_index(&self, element: usize) -> usize {
        self.type_indices[element]
    }

    fn num_faces(&self, element: usize) -> usize {
        self.face_offsets[element + 1] - self.face_offsets[element]
    }

    fn intersection(&self, element: usize, local_face: usize) -> Intersection {
        Intersection {
            local_face,
            neighbor: self.neighbors[self.face_offsets[element] + local_face],
        }
    }
}

impl VertexConnectivity for AdjacencyGrid {
    fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    fn element_vertices(&self, element: usize) -> &[usize] {
        &self.cells[element].vertices
    }
}

/// Creates a grid of `num_cells` line segments, where segment `i` connects vertices `i` and `i + 1`.
pub fn create_uniform_interval_grid(num_cells: usize) -> AdjacencyGrid {
    let cells = (0..num_cells)
        .map(|i| GridCell::new(GeometryType::Line, [i, i + 1]))
        .collect();
    AdjacencyGrid::from_cells(cells).expect("Procedurally generated cells are always valid")
}

/// Creates a grid of `cells_x * cells_y` quadrilaterals in row-major order.
///
/// Vertex `(i, j)` has the index `j * (cells_x + 1) + i`, and each quadrilateral lists its vertices
/// in counter-clockwise order.
pub fn create_rectangular_quad_grid(cells_x: usize, cells_y: usize) -> AdjacencyGrid {
    let vertex = |i: usize, j: usize| j * (cells_x + 1) + i;
    let mut cells = Vec::with_capacity(cells_x * cells_y);
    for j in 0..cells_y {
        for i in 0..cells_x {
            cells.push(GridCell::new(
                GeometryType::Quadrilateral,
                [vertex(i, j), vertex(i + 1, j), vertex(i + 1, j + 1), vertex(i, j + 1)],
            ));
        }
    }
    AdjacencyGrid::from_cells(cells).expect("Procedurally generated cells are always valid")
}
