//! Function spaces and their local restrictions.
//!
//! A [`FunctionSpace`] maps every element of a grid to the global indices of the degrees of
//! freedom that are supported on it. A [`LocalFunctionSpace`] is a reusable buffer that holds the
//! indices of a single bound element during traversal.
use crate::mesh::VertexConnectivity;
use crate::Real;
use itertools::izip;
use nalgebra::DVector;

/// Element-wise degree of freedom layout of a function space.
pub trait FunctionSpace {
    /// Total number of global degrees of freedom.
    fn global_size(&self) -> usize;

    fn element_dof_count(&self, element: usize) -> usize;

    /// Writes the global indices of the degrees of freedom of an element.
    ///
    /// The output slice has length `element_dof_count(element)`.
    fn populate_element_dofs(&self, output: &mut [usize], element: usize);
}

impl<S: FunctionSpace + ?Sized> FunctionSpace for &S {
    fn global_size(&self) -> usize {
        S::global_size(self)
    }

    fn element_dof_count(&self, element: usize) -> usize {
        S::element_dof_count(self, element)
    }

    fn populate_element_dofs(&self, output: &mut [usize], element: usize) {
        S::populate_element_dofs(self, output, element)
    }
}

/// The restriction of a function space to a single element.
///
/// The local function space is unbound after construction. Binding it to an element gathers the
/// global indices of that element's degrees of freedom, after which local index `i` refers to
/// global index `global_index(i)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalFunctionSpace {
    element: Option<usize>,
    dofs: Vec<usize>,
}

impl LocalFunctionSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind<S: FunctionSpace + ?Sized>(&mut self, space: &S, element: usize) {
        let count = space.element_dof_count(element);
        self.dofs.resize(count, 0);
        space.populate_element_dofs(&mut self.dofs, element);
        self.element = Some(element);
    }

    pub fn unbind(&mut self) {
        self.element = None;
        self.dofs.clear();
    }

    /// The element the local space is currently bound to.
    pub fn element(&self) -> Option<usize> {
        self.element
    }

    pub fn is_bound(&self) -> bool {
        self.element.is_some()
    }

    pub fn size(&self) -> usize {
        self.dofs.len()
    }

    pub fn global_index(&self, local_index: usize) -> usize {
        self.dofs[local_index]
    }

    pub fn global_indices(&self) -> &[usize] {
        &self.dofs
    }

    /// Gathers the coefficients of the bound element from a global vector.
    pub fn read<T: Real>(&self, global: &DVector<T>, local: &mut Vec<T>) {
        local.clear();
        local.extend(self.dofs.iter().map(|&i| global[i]));
    }

    /// Adds local contributions to a global vector.
    pub fn add<T: Real>(&self, local: &[T], global: &mut DVector<T>) {
        assert_eq!(local.len(), self.dofs.len(), "Local vector size must match local space size");
        for (&i, &value) in izip!(&self.dofs, local) {
            global[i] += value;
        }
    }
}

/// A discontinuous space where every element owns a contiguous block of degrees of freedom.
///
/// Element `e` owns the global indices `e * n .. (e + 1) * n`, where `n` is the number of degrees
/// of freedom per element.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DiscontinuousSpace {
    num_elements: usize,
    dofs_per_element: usize,
}

impl DiscontinuousSpace {
    pub fn new(num_elements: usize, dofs_per_element: usize) -> Self {
        Self {
            num_elements,
            dofs_per_element,
        }
    }

    /// A discontinuous tensor-product space of polynomial order `order` on `dim`-dimensional cubes,
    /// with `(order + 1)^dim` degrees of freedom per element.
    pub fn qk(num_elements: usize, order: usize, dim: usize) -> Self {
        let dim = u32::try_from(dim).expect("Dimension must fit in u32");
        Self::new(num_elements, (order + 1).pow(dim))
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn dofs_per_element(&self) -> usize {
        self.dofs_per_element
    }
}

impl FunctionSpace for DiscontinuousSpace {
    fn global_size(&self) -> usize {
        self.num_elements * self.dofs_per_element
    }

    fn element_dof_count(&self, _element: usize) -> usize {
        self.dofs_per_element
    }

    fn populate_element_dofs(&self, output: &mut [usize], element: usize) {
        let offset = element * self.dofs_per_element;
        for (i, dof) in output.iter_mut().enumerate() {
            *dof = offset + i;
        }
    }
}

/// A continuous space with `solution_dim` degrees of freedom per grid vertex.
///
/// The degree of freedom for component `s` of vertex `v` has the global index
/// `solution_dim * v + s`. Element-local degrees of freedom are ordered by vertex first.
#[derive(Debug)]
pub struct ContinuousSpace<'a, C: ?Sized> {
    connectivity: &'a C,
    solution_dim: usize,
}

impl<'a, C: ?Sized> Clone for ContinuousSpace<'a, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, C: ?Sized> Copy for ContinuousSpace<'a, C> {}

impl<'a, C: VertexConnectivity + ?Sized> ContinuousSpace<'a, C> {
    pub fn new(connectivity: &'a C, solution_dim: usize) -> Self {
        Self {
            connectivity,
            solution_dim,
        }
    }

    pub fn solution_dim(&self) -> usize {
        self.solution_dim
    }
}

impl<'a, C: VertexConnectivity + ?Sized> FunctionSpace for ContinuousSpace<'a, C> {
    fn global_size(&self) -> usize {
        self.solution_dim * self.connectivity.num_vertices()
    }

    fn element_dof_count(&self, element: usize) -> usize {
        self.solution_dim * self.connectivity.element_vertices(element).len()
    }

    fn populate_element_dofs(&self, output: &mut [usize], element: usize) {
        let s = self.solution_dim;
        let vertices = self.connectivity.element_vertices(element);
        for (local_vertex, &vertex) in vertices.iter().enumerate() {
            for component in 0..s {
                output[s * local_vertex + component] = s * vertex + component;
            }
        }
    }
}

/// A space given by an explicit table of global indices per element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DofTableSpace {
    global_size: usize,
    element_dofs: Vec<Vec<usize>>,
}

impl DofTableSpace {
    /// Returns an error if any index is out of bounds.
    pub fn try_new(global_size: usize, element_dofs: Vec<Vec<usize>>) -> eyre::Result<Self> {
        for (element, dofs) in element_dofs.iter().enumerate() {
            if let Some(&index) = dofs.iter().find(|&&i| i >= global_size) {
                eyre::bail!(
                    "element {} references degree of freedom {}, but the space only has {}",
                    element,
                    index,
                    global_size
                );
            }
        }
        Ok(Self {
            global_size,
            element_dofs,
        })
    }

    pub fn element_dofs(&self) -> &[Vec<usize>] {
        &self.element_dofs
    }
}

impl FunctionSpace for DofTableSpace {
    fn global_size(&self) -> usize {
        self.global_size
    }

    fn element_dof_count(&self, element: usize) -> usize {
        self.element_dofs[element].len()
    }

    fn populate_element_dofs(&self, output: &mut [usize], element: usize) {
        output.copy_from_slice(&self.element_dofs[element]);
    }
}
