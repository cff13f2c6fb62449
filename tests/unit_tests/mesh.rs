use gridop::mesh::{
    create_rectangular_quad_grid, create_uniform_interval_grid, AdjacencyGrid, GeometryType, Grid, GridCell,
    Intersection, VertexConnectivity,
};

#[test]
fn geometry_type_reference_data() {
    use GeometryType::*;
    let expected = [
        (Vertex, 0, 1, 0),
        (Line, 1, 2, 2),
        (Triangle, 2, 3, 3),
        (Quadrilateral, 2, 4, 4),
        (Tetrahedron, 3, 4, 4),
        (Hexahedron, 3, 8, 6),
    ];
    for (geometry_type, dim, num_vertices, num_faces) in expected {
        assert_eq!(geometry_type.dim(), dim);
        assert_eq!(geometry_type.num_vertices(), num_vertices);
        assert_eq!(geometry_type.num_faces(), num_faces);
        for face in geometry_type.faces() {
            assert!(face.iter().all(|&v| v < num_vertices));
        }
    }

    assert!(Quadrilateral.is_cube());
    assert!(!Quadrilateral.is_simplex());
    assert!(Line.is_cube() && Line.is_simplex());
    assert!(Tetrahedron.is_simplex());
}

#[test]
fn interval_grid_adjacency() {
    let grid = create_uniform_interval_grid(3);
    assert_eq!(grid.num_elements(), 3);
    assert_eq!(grid.num_vertices(), 4);
    assert_eq!(grid.element_vertices(1), &[1, 2]);

    assert_eq!(
        grid.intersection(0, 0),
        Intersection {
            local_face: 0,
            neighbor: None
        }
    );
    assert_eq!(grid.intersection(0, 1).neighbor, Some(1));
    assert_eq!(grid.intersection(1, 0).neighbor, Some(0));
    assert_eq!(grid.intersection(1, 1).neighbor, Some(2));
    assert_eq!(grid.intersection(2, 0).neighbor, Some(1));
    assert!(grid.intersection(2, 1).is_boundary());

    assert_eq!(grid.boundary_faces(), vec![(0, 0), (2, 1)]);
    assert_eq!(grid.boundary_vertices(), vec![0, 3]);
}

#[test]
fn empty_interval_grid() {
    let grid = create_uniform_interval_grid(0);
    assert_eq!(grid.num_elements(), 0);
    assert_eq!(grid.num_vertices(), 0);
    assert!(grid.boundary_faces().is_empty());
}

#[test]
fn rectangular_quad_grid_adjacency() {
    let grid = create_rectangular_quad_grid(2, 1);
    assert_eq!(grid.num_elements(), 2);
    assert_eq!(grid.num_vertices(), 6);
    assert_eq!(grid.element_vertices(0), &[0, 1, 4, 3]);
    assert_eq!(grid.element_vertices(1), &[1, 2, 5, 4]);

    assert_eq!(grid.intersection(0, 1).neighbor, Some(1));
    assert_eq!(grid.intersection(1, 3).neighbor, Some(0));
    assert_eq!(grid.boundary_faces().len(), 6);
    assert_eq!(grid.boundary_vertices(), vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn rectangular_quad_grid_interior_face_count() {
    let (nx, ny) = (3, 2);
    let grid = create_rectangular_quad_grid(nx, ny);
    let interior_face_sides: usize = (0..grid.num_elements())
        .map(|e| {
            (0..grid.num_faces(e))
                .filter(|&f| !grid.intersection(e, f).is_boundary())
                .count()
        })
        .sum();
    // Each interior face is seen from both of its cells
    assert_eq!(interior_face_sides, 2 * ((nx - 1) * ny + nx * (ny - 1)));
    assert_eq!(grid.boundary_faces().len(), 2 * (nx + ny));
}

#[test]
fn mixed_grid_element_indices_and_adjacency() {
    let cells = vec![
        GridCell::new(GeometryType::Quadrilateral, [0, 1, 4, 3]),
        GridCell::new(GeometryType::Triangle, [1, 2, 4]),
        GridCell::new(GeometryType::Quadrilateral, [3, 4, 6, 5]),
    ];
    let grid = AdjacencyGrid::from_cells(cells).unwrap();

    assert_eq!(grid.geometry_type(0), GeometryType::Quadrilateral);
    assert_eq!(grid.geometry_type(1), GeometryType::Triangle);
    assert_eq!(grid.element_index(0), 0);
    assert_eq!(grid.element_index(1), 0);
    assert_eq!(grid.element_index(2), 1);

    assert_eq!(grid.num_faces(0), 4);
    assert_eq!(grid.num_faces(1), 3);

    // Quad face [1, 4] is the triangle face [4, 1]
    assert_eq!(grid.intersection(0, 1).neighbor, Some(1));
    assert_eq!(grid.intersection(1, 2).neighbor, Some(0));
    // Quad face [4, 3] is the upper quad face [3, 4]
    assert_eq!(grid.intersection(0, 2).neighbor, Some(2));
    assert_eq!(grid.intersection(2, 0).neighbor, Some(0));
}

#[test]
fn tetrahedra_sharing_a_face() {
    let cells = vec![
        GridCell::new(GeometryType::Tetrahedron, [0, 1, 2, 3]),
        GridCell::new(GeometryType::Tetrahedron, [1, 2, 3, 4]),
    ];
    let grid = AdjacencyGrid::from_cells(cells).unwrap();
    assert_eq!(grid.intersection(0, 2).neighbor, Some(1));
    assert_eq!(grid.intersection(1, 0).neighbor, Some(0));
    assert_eq!(grid.boundary_faces().len(), 6);
    assert_eq!(grid.boundary_vertices(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn hexahedra_sharing_a_face() {
    let cells = vec![
        GridCell::new(GeometryType::Hexahedron, [0, 1, 2, 3, 4, 5, 6, 7]),
        GridCell::new(GeometryType::Hexahedron, [1, 8, 9, 2, 5, 10, 11, 6]),
    ];
    let grid = AdjacencyGrid::from_cells(cells).unwrap();
    assert_eq!(grid.intersection(0, 2).neighbor, Some(1));
    assert_eq!(grid.intersection(1, 4).neighbor, Some(0));
    assert_eq!(grid.boundary_faces().len(), 10);
}

#[test]
fn wrong_vertex_count_is_rejected() {
    let cells = vec![GridCell::new(GeometryType::Triangle, [0, 1, 2, 3])];
    assert!(AdjacencyGrid::from_cells(cells).is_err());
}

#[test]
fn non_manifold_face_is_rejected() {
    let cells = vec![
        GridCell::new(GeometryType::Triangle, [0, 1, 2]),
        GridCell::new(GeometryType::Triangle, [1, 0, 3]),
        GridCell::new(GeometryType::Triangle, [0, 1, 4]),
    ];
    assert!(AdjacencyGrid::from_cells(cells).is_err());
}

#[test]
fn grid_cell_serde_roundtrip() {
    let cell = GridCell::new(GeometryType::Quadrilateral, [0, 1, 4, 3]);
    let json = serde_json::to_string(&cell).unwrap();
    let deserialized: GridCell = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, cell);
}
