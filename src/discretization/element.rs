use super::space::V2D;
use crate::transfer::TransferError;

use smallvec::{smallvec, SmallVec};

#[cfg(feature = "json_export")]
use json::{object, JsonValue};

const TRI_REF_COORDS: [V2D; 3] = [
    V2D::from([0.0, 0.0]),
    V2D::from([1.0, 0.0]),
    V2D::from([0.0, 1.0]),
];

const QUAD_REF_COORDS: [V2D; 4] = [
    V2D::from([0.0, 0.0]),
    V2D::from([1.0, 0.0]),
    V2D::from([1.0, 1.0]),
    V2D::from([0.0, 1.0]),
];

const TRI_TRIS: [[usize; 3]; 1] = [[0, 1, 2]];

// the quad splits along its 0-2 diagonal; both halves keep corner 0 first
const QUAD_TRIS: [[usize; 3]; 2] = [[0, 1, 2], [0, 2, 3]];

const TRI_DATA_REF: V2D = V2D::from([1.0 / 3.0, 1.0 / 3.0]);
const QUAD_DATA_REF: V2D = V2D::from([0.5, 0.5]);

/// The catalog of recognized reference elements
///
/// Each variant fixes the number of geometric reference nodes, the data
/// location (nodal or cell-centered), the reference corner coordinates and
/// the constituent triangulation used by point location.
///
/// ## Corner Layout
/// Reference corners are numbered counter-clockwise in local (s,t) space:
///
/// ```text
///    t                       t
///    |                       |
///    2                       3 --------- 2
///    | \                     |           |
///    |   \                   |           |
///    |     \                 |           |
///    0 ----- 1 -- s          0 --------- 1 -- s
/// ```
///
/// Quadrilateral shape functions are exact bilinear blends over the unit
/// square; the two constituent triangles exist only for containment search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElemKind {
    NodalTri,
    NodalQuad,
    CellTri,
    CellQuad,
}

impl ElemKind {
    /// Number of geometric reference nodes (3 for triangles, 4 for quads)
    pub const fn nref(&self) -> usize {
        match self {
            Self::NodalTri | Self::CellTri => 3,
            Self::NodalQuad | Self::CellQuad => 4,
        }
    }

    /// Number of auxiliary data positions (0 = nodal data, 1 = cell-centered)
    pub const fn ndata(&self) -> usize {
        match self {
            Self::NodalTri | Self::NodalQuad => 0,
            Self::CellTri | Self::CellQuad => 1,
        }
    }

    pub const fn is_quad(&self) -> bool {
        self.nref() == 4
    }

    /// Reference (s,t) coordinates of each geometric node
    pub const fn ref_coords(&self) -> &'static [V2D] {
        match self {
            Self::NodalTri | Self::CellTri => &TRI_REF_COORDS,
            Self::NodalQuad | Self::CellQuad => &QUAD_REF_COORDS,
        }
    }

    /// Constituent reference triangles as local corner indices
    ///
    /// The triangles partition the reference element without gaps, so a
    /// containment search over them covers the whole element.
    pub const fn tris(&self) -> &'static [[usize; 3]] {
        match self {
            Self::NodalTri | Self::CellTri => &TRI_TRIS,
            Self::NodalQuad | Self::CellQuad => &QUAD_TRIS,
        }
    }

    /// Reference position of the cell-centered data value, if any
    pub const fn data_ref(&self) -> Option<V2D> {
        match self {
            Self::NodalTri | Self::NodalQuad => None,
            Self::CellTri => Some(TRI_DATA_REF),
            Self::CellQuad => Some(QUAD_DATA_REF),
        }
    }

    /// Shape-function weights at a local (s,t) coordinate, in corner order
    ///
    /// Triangles use the linear barycentric weights `(1-s-t, s, t)`;
    /// quadrilaterals use the bilinear tensor product. Both families sum to
    /// 1 at every (s,t).
    pub fn shape_weights(&self, coords: V2D) -> SmallVec<[f64; 4]> {
        let s = coords[0];
        let t = coords[1];

        match self {
            Self::NodalTri | Self::CellTri => smallvec![1.0 - s - t, s, t],
            Self::NodalQuad | Self::CellQuad => smallvec![
                (1.0 - s) * (1.0 - t),
                s * (1.0 - t),
                s * t,
                (1.0 - s) * t,
            ],
        }
    }

    /// Parse an element kind from its mesh-file name
    pub fn from_name(name: &str, cell_centered: bool) -> Result<Self, TransferError> {
        match (name, cell_centered) {
            ("Triangle", false) => Ok(Self::NodalTri),
            ("Triangle", true) => Ok(Self::CellTri),
            ("Quadrilateral", false) => Ok(Self::NodalQuad),
            ("Quadrilateral", true) => Ok(Self::CellQuad),
            _ => Err(TransferError::UnknownElemType(String::from(name))),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::NodalTri | Self::CellTri => "Triangle",
            Self::NodalQuad | Self::CellQuad => "Quadrilateral",
        }
    }
}

/// Index pair tying one reference node of an [Elem] to the caller's arrays
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElemNode {
    /// Global vertex index: physical coordinates and node-based field values
    pub vert: usize,
    /// Body-local parametric index: (u,v) location after the body's offset
    pub param: usize,
}

impl ElemNode {
    pub const fn new(vert: usize, param: usize) -> Self {
        Self { vert, param }
    }
}

/// One mesh cell of a [Body](super::Body)
///
/// `Elem`s keep track of:
/// * their [ElemKind] (geometry and data location)
/// * one [ElemNode] index pair per reference node, in catalog corner order
/// * the index of their single data value when the kind is cell-centered
#[derive(Clone, Debug)]
pub struct Elem {
    pub kind: ElemKind,
    pub nodes: SmallVec<[ElemNode; 4]>,
    pub data_index: Option<usize>,
}

impl Elem {
    /// Construct an Elem from its kind and node index pairs
    pub fn new(kind: ElemKind, nodes: SmallVec<[ElemNode; 4]>, data_index: Option<usize>) -> Self {
        assert_eq!(
            nodes.len(),
            kind.nref(),
            "{} Elems must have exactly {} nodes; cannot construct Elem!",
            kind.name(),
            kind.nref(),
        );

        Self {
            kind,
            nodes,
            data_index,
        }
    }

    /// Produce a Json Object that describes this Elem
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "type": self.kind.name(),
            "cell_centered": self.kind.ndata() == 1,
            "vert_ids": JsonValue::from(self.nodes.iter().map(|n| n.vert).collect::<Vec<_>>()),
            "param_ids": JsonValue::from(self.nodes.iter().map(|n| n.param).collect::<Vec<_>>()),
            "data_index": self.data_index,
        }
    }
}
