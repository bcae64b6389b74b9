use crate::discretization::element::{ElemKind, ElemNode};
use crate::discretization::space::V2D;
use crate::discretization::Discretization;

use smallvec::{smallvec, SmallVec};
use std::fmt;

/// Everything that can go wrong inside the transfer engine
///
/// All variants are caller-visible and caller-recoverable; the engine never
/// aborts. Index variants indicate a caller programming error and are checked
/// at every entry point before any dereference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferError {
    /// No body with this index exists in the discretization
    BodyDoesntExist(usize),
    /// No element with this (body, element) index pair exists
    ElemDoesntExist(usize, usize),
    /// A global vertex index points outside the discretization's vertex array
    VertDoesntExist(usize),
    /// A mesh file named an element type outside the recognized catalog
    UnknownElemType(String),
    /// A cell-centered element carries no data index
    MissingDataIndex(usize, usize),
    /// A field array is too short for the indices this element reads
    FieldTooShort { expected: usize, found: usize },
    /// A result or upstream-gradient slice does not match the requested rank
    RankMismatch { rank: usize, found: usize },
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::BodyDoesntExist(body_index) => {
                write!(f, "Body {} does not exist!", body_index)
            }
            Self::ElemDoesntExist(body_index, elem_index) => {
                write!(
                    f,
                    "Elem {} does not exist on Body {}!",
                    elem_index, body_index
                )
            }
            Self::VertDoesntExist(vert_index) => {
                write!(
                    f,
                    "Global vertex index {} points outside the Discretization!",
                    vert_index
                )
            }
            Self::UnknownElemType(name) => {
                write!(f, "'{}' is not a recognized element type", name)
            }
            Self::MissingDataIndex(body_index, elem_index) => {
                write!(
                    f,
                    "Cell-centered Elem {} on Body {} has no data index!",
                    elem_index, body_index
                )
            }
            Self::FieldTooShort { expected, found } => {
                write!(
                    f,
                    "Field array of length {} is too short; element access requires {}!",
                    found, expected
                )
            }
            Self::RankMismatch { rank, found } => {
                write!(
                    f,
                    "Slice of length {} does not match rank {}!",
                    found, rank
                )
            }
        }
    }
}

impl std::error::Error for TransferError {}

// One (index, weight) term of a forward read / adjoint accumulation. The
// forward operators compute `result[k] = sum_i w_i * data[rank*idx_i + k]`
// and the bar operators scatter `d_bar[rank*idx_i + k] += w_i * r_bar[k]`
// from the same terms, so the two directions cannot drift apart.
type Stencil = SmallVec<[(usize, f64); 6]>;

impl Discretization {
    /// Interpolate a `rank`-component field at a located element's (s,t)
    ///
    /// `data` is indexed by global vertex index for nodal elements and by the
    /// element's data index for cell-centered elements (which interpolate as
    /// piecewise constants, independent of `coords`). `result` is fully
    /// overwritten. Pure read of `data`.
    pub fn interpolate(
        &self,
        body_index: usize,
        elem_index: usize,
        coords: V2D,
        rank: usize,
        data: &[f64],
        result: &mut [f64],
    ) -> Result<(), TransferError> {
        let stencil = self.interpolation_stencil(body_index, elem_index, coords)?;
        check_rank(rank, result.len())?;
        check_field(rank, &stencil, data.len())?;

        result.fill(0.0);
        for &(index, weight) in stencil.iter() {
            for k in 0..rank {
                result[k] += weight * data[rank * index + k];
            }
        }

        Ok(())
    }

    /// Reverse-mode counterpart of [interpolate](Self::interpolate)
    ///
    /// Accumulates `weight * r_bar` into `d_bar` at every index the forward
    /// operator reads; never overwrites, so multiple query points may scatter
    /// into one gradient buffer in any order. Concurrent scatters into the
    /// same buffer are a read-modify-write on shared memory; callers must
    /// provide their own mutual exclusion or merge per-thread buffers.
    pub fn interpolate_bar(
        &self,
        body_index: usize,
        elem_index: usize,
        coords: V2D,
        rank: usize,
        r_bar: &[f64],
        d_bar: &mut [f64],
    ) -> Result<(), TransferError> {
        let stencil = self.interpolation_stencil(body_index, elem_index, coords)?;
        check_rank(rank, r_bar.len())?;
        check_field(rank, &stencil, d_bar.len())?;

        for &(index, weight) in stencil.iter() {
            for k in 0..rank {
                d_bar[rank * index + k] += weight * r_bar[k];
            }
        }

        Ok(())
    }

    /// Integrate a `rank`-component field over a single element's physical area
    ///
    /// The element's area comes from the 3D vertex coordinates (half
    /// cross-product magnitude per constituent triangle). Nodal data is
    /// integrated with the nodal-average rule (one third of each triangle's
    /// area per corner); cell-centered data is multiplied by the exact total
    /// area. With `data == None` the element's area is written to
    /// `result[0]` and the remaining entries are zeroed.
    pub fn integrate(
        &self,
        body_index: usize,
        elem_index: usize,
        rank: usize,
        data: Option<&[f64]>,
        result: &mut [f64],
    ) -> Result<(), TransferError> {
        let (stencil, area) = self.integration_stencil(body_index, elem_index)?;
        check_rank(rank, result.len())?;

        result.fill(0.0);
        match data {
            Some(data) => {
                check_field(rank, &stencil, data.len())?;
                for &(index, weight) in stencil.iter() {
                    for k in 0..rank {
                        result[k] += weight * data[rank * index + k];
                    }
                }
            }
            None => {
                if let Some(slot) = result.first_mut() {
                    *slot = area;
                }
            }
        }

        Ok(())
    }

    /// Reverse-mode counterpart of [integrate](Self::integrate)
    ///
    /// Accumulate-only, like [interpolate_bar](Self::interpolate_bar).
    pub fn integrate_bar(
        &self,
        body_index: usize,
        elem_index: usize,
        rank: usize,
        r_bar: &[f64],
        d_bar: &mut [f64],
    ) -> Result<(), TransferError> {
        let (stencil, _) = self.integration_stencil(body_index, elem_index)?;
        check_rank(rank, r_bar.len())?;
        check_field(rank, &stencil, d_bar.len())?;

        for &(index, weight) in stencil.iter() {
            for k in 0..rank {
                d_bar[rank * index + k] += weight * r_bar[k];
            }
        }

        Ok(())
    }

    // Shared forward/adjoint term list for interpolation
    fn interpolation_stencil(
        &self,
        body_index: usize,
        elem_index: usize,
        coords: V2D,
    ) -> Result<Stencil, TransferError> {
        let elem = self.elem(body_index, elem_index)?;

        match elem.kind {
            ElemKind::NodalTri | ElemKind::NodalQuad => {
                let weights = elem.kind.shape_weights(coords);
                Ok(elem
                    .nodes
                    .iter()
                    .zip(weights.iter())
                    .map(|(node, &weight)| (node.vert, weight))
                    .collect())
            }
            ElemKind::CellTri | ElemKind::CellQuad => {
                let data_index = elem
                    .data_index
                    .ok_or(TransferError::MissingDataIndex(body_index, elem_index))?;
                Ok(smallvec![(data_index, 1.0)])
            }
        }
    }

    // Shared forward/adjoint term list for integration, plus the element area
    fn integration_stencil(
        &self,
        body_index: usize,
        elem_index: usize,
    ) -> Result<(Stencil, f64), TransferError> {
        let elem = self.elem(body_index, elem_index)?;

        let mut stencil = Stencil::new();
        let mut total_area = 0.0;

        for tri in elem.kind.tris() {
            let corners = [
                elem.nodes[tri[0]],
                elem.nodes[tri[1]],
                elem.nodes[tri[2]],
            ];
            let area = self.tri_area(&corners)?;
            total_area += area;

            if elem.kind.ndata() == 0 {
                for corner in corners {
                    stencil.push((corner.vert, area / 3.0));
                }
            }
        }

        if elem.kind.ndata() == 1 {
            let data_index = elem
                .data_index
                .ok_or(TransferError::MissingDataIndex(body_index, elem_index))?;
            stencil.push((data_index, total_area));
        }

        Ok((stencil, total_area))
    }

    // Physical area of one constituent triangle, from 3D vertex coordinates
    fn tri_area(&self, corners: &[ElemNode; 3]) -> Result<f64, TransferError> {
        for corner in corners {
            if corner.vert >= self.verts.len() {
                return Err(TransferError::VertDoesntExist(corner.vert));
            }
        }

        let p0 = self.vert_of(corners[0]);
        let p1 = self.vert_of(corners[1]);
        let p2 = self.vert_of(corners[2]);

        Ok(0.5 * (p1 - p0).cross_with(&(p2 - p0)).norm())
    }
}

fn check_rank(rank: usize, found: usize) -> Result<(), TransferError> {
    if found != rank {
        Err(TransferError::RankMismatch { rank, found })
    } else {
        Ok(())
    }
}

fn check_field(rank: usize, stencil: &Stencil, field_len: usize) -> Result<(), TransferError> {
    for &(index, _) in stencil.iter() {
        let expected = rank * (index + 1);
        if expected > field_len {
            return Err(TransferError::FieldTooShort {
                expected,
                found: field_len,
            });
        }
    }

    Ok(())
}
