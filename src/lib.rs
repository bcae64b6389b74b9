//! A data-transfer engine for unstructured surface discretizations.
//!
//! The crate bridges two existing surface meshes: it locates a parametric
//! query point inside a target [Discretization], interpolates or integrates
//! field data defined on that discretization, and propagates reverse-mode
//! sensitivities through those operations via exact transpose (bar)
//! operators.
//!
//! The engine is stateless and re-entrant: every call reads caller-owned
//! structures passed in explicitly, and the only mutation anywhere is the
//! additive scatter of the bar operators into a caller-provided gradient
//! buffer.

/// The discretization data model: bodies, elements and coordinate spaces
pub mod discretization;
/// Point location: containment testing, the bilinear inverse map and the
/// exact-then-extrapolate element search
pub mod location;
/// Forward interpolation/integration and their adjoint counterparts
pub mod transfer;

pub use discretization::element::{Elem, ElemKind, ElemNode};
pub use discretization::space::{M2D, Point, V2D, V3D};
pub use discretization::{Body, Discretization, LocatedPoint};
pub use location::{invert_bilinear, raw_triangle_weights, triangle_weights, QuadInverse};
pub use transfer::TransferError;
