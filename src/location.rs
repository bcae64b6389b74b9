use crate::discretization::element::Elem;
use crate::discretization::space::{M2D, V2D};
use crate::discretization::{Body, Discretization, LocatedPoint};

use rayon::prelude::*;

/// Relative tolerance on normalized barycentric weights for containment.
/// Weights are normalized by the triangle's signed area, so classification of
/// a point near a shared edge is consistent between the two adjacent triangles.
pub const CONTAINMENT_TOL: f64 = 1e-12;

/// Triangles whose area denominator falls below this are treated as degenerate
pub const DEGENERATE_AREA_TOL: f64 = 1e-14;

/// Iteration cap for the bilinear inverse map
pub const MAX_NEWTON_ITERATIONS: usize = 20;

/// Newton convergence threshold on the (s,t) step norm
pub const NEWTON_STEP_TOL: f64 = 1e-8;

/// Barycentric weights of `query` in the triangle `(a, b, c)` without any
/// containment filter
///
/// Weights may be negative for points outside the triangle; they always sum
/// to 1. Returns `None` only for degenerate (near-zero-area) triangles. The
/// extrapolation fallback ranks near-misses with these raw weights.
pub fn raw_triangle_weights(a: V2D, b: V2D, c: V2D, query: V2D) -> Option<[f64; 3]> {
    let denom = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
    if denom.abs() < DEGENERATE_AREA_TOL {
        return None;
    }

    let w0 = ((b[1] - c[1]) * (query[0] - c[0]) + (c[0] - b[0]) * (query[1] - c[1])) / denom;
    let w1 = ((c[1] - a[1]) * (query[0] - c[0]) + (a[0] - c[0]) * (query[1] - c[1])) / denom;

    Some([w0, w1, 1.0 - w0 - w1])
}

/// Containment test: non-negative unit-sum barycentric weights of `query` if
/// it lies inside or on the triangle `(a, b, c)`, `None` otherwise
///
/// Points within [CONTAINMENT_TOL] of an edge count as inside; their weights
/// are clamped to zero and renormalized so boundary results are exact.
/// Degenerate triangles are rejected.
pub fn triangle_weights(a: V2D, b: V2D, c: V2D, query: V2D) -> Option<[f64; 3]> {
    let [w0, w1, w2] = raw_triangle_weights(a, b, c, query)?;

    if w0 < -CONTAINMENT_TOL || w1 < -CONTAINMENT_TOL || w2 < -CONTAINMENT_TOL {
        return None;
    }

    let clamped = [w0.max(0.0), w1.max(0.0), w2.max(0.0)];
    let sum: f64 = clamped.iter().sum();

    Some([clamped[0] / sum, clamped[1] / sum, clamped[2] / sum])
}

/// The outcome of a bilinear inverse-map solve
///
/// `coords` always holds the last computed (s,t), whether or not the Newton
/// iteration converged, so callers keep a best-effort value on failure.
#[derive(Clone, Copy, Debug)]
pub struct QuadInverse {
    pub coords: V2D,
    pub converged: bool,
}

/// Solve the bilinear map of `corners` for the local (s,t) of `target`
///
/// Newton iteration on the 2x2 Jacobian of the bilinear blend, starting from
/// `seed` (typically a barycentric estimate, or (0.5, 0.5)). Terminates on a
/// step norm below [NEWTON_STEP_TOL], a growing step norm, a singular
/// Jacobian, or after [MAX_NEWTON_ITERATIONS] steps.
pub fn invert_bilinear(corners: &[V2D; 4], target: V2D, seed: V2D) -> QuadInverse {
    let [p0, p1, p2, p3] = *corners;
    let mut st = seed;
    let mut prev_step_norm = f64::MAX;

    for _ in 0..MAX_NEWTON_ITERATIONS {
        let s = st[0];
        let t = st[1];

        let pos = p0 * ((1.0 - s) * (1.0 - t))
            + p1 * (s * (1.0 - t))
            + p2 * (s * t)
            + p3 * ((1.0 - s) * t);
        let residual = target - pos;

        let dp_ds = (p1 - p0) * (1.0 - t) + (p2 - p3) * t;
        let dp_dt = (p3 - p0) * (1.0 - s) + (p2 - p1) * s;

        // rows are the (u,v) components; columns the (s,t) sensitivities
        let jacobian = M2D::from([dp_ds[0], dp_dt[0]], [dp_ds[1], dp_dt[1]]);
        if jacobian.det().abs() < DEGENERATE_AREA_TOL {
            return QuadInverse {
                coords: st,
                converged: false,
            };
        }

        let step = jacobian.inverse() * residual;
        st = st + step;

        let step_norm = step.norm();
        if step_norm < NEWTON_STEP_TOL {
            return QuadInverse {
                coords: st,
                converged: true,
            };
        }
        if step_norm > prev_step_norm {
            return QuadInverse {
                coords: st,
                converged: false,
            };
        }
        prev_step_norm = step_norm;
    }

    QuadInverse {
        coords: st,
        converged: false,
    }
}

impl Discretization {
    /// Locate the element containing a parametric query point
    ///
    /// Searches every constituent triangle of every element of every body in
    /// enumeration order; the first containment hit wins, which makes the
    /// tie-break at shared edges deterministic. If no triangle contains the
    /// point, the least-bad near-miss across the whole search is returned as
    /// an extrapolated result (its negative [quality](LocatedPoint::quality)
    /// records how far outside the point fell), so any discretization with at
    /// least one element always yields a location. Returns `None` only for a
    /// discretization with zero elements.
    pub fn locate(&self, query: V2D) -> Option<LocatedPoint> {
        self.locate_exact(query)
            .or_else(|| self.locate_nearest(query))
    }

    /// Locate a batch of query points
    pub fn locate_batch(&self, queries: &[V2D]) -> Vec<Option<LocatedPoint>> {
        queries.iter().map(|&query| self.locate(query)).collect()
    }

    /// Same as `locate_batch`, except queries are processed in parallel using
    /// the Rayon Global ThreadPool
    pub fn locate_batch_parallel(&self, queries: &[V2D]) -> Vec<Option<LocatedPoint>> {
        queries
            .par_iter()
            .map(|&query| self.locate(query))
            .collect()
    }

    // Phase 1: exact containment search with first-hit short circuit
    fn locate_exact(&self, query: V2D) -> Option<LocatedPoint> {
        for (body_index, body) in self.bodies.iter().enumerate() {
            for (elem_index, elem) in body.elems.iter().enumerate() {
                for tri in elem.kind.tris() {
                    let [a, b, c] = self.tri_params(body, elem, tri);

                    if let Some(weights) = triangle_weights(a, b, c, query) {
                        let quality = weights.iter().copied().fold(f64::MAX, f64::min);
                        return Some(LocatedPoint {
                            body: body_index,
                            elem: elem_index,
                            coords: self.elem_local_coords(body, elem, tri, weights, query),
                            quality,
                        });
                    }
                }
            }
        }

        None
    }

    // Phase 2: fold over every (body, elem, triangle) triple, keeping the
    // near-miss with the largest minimum raw barycentric weight
    fn locate_nearest(&self, query: V2D) -> Option<LocatedPoint> {
        let mut best: Option<(usize, usize, &[usize; 3], [f64; 3], f64)> = None;

        for (body_index, body) in self.bodies.iter().enumerate() {
            for (elem_index, elem) in body.elems.iter().enumerate() {
                for tri in elem.kind.tris() {
                    let [a, b, c] = self.tri_params(body, elem, tri);

                    if let Some(weights) = raw_triangle_weights(a, b, c, query) {
                        let min_weight = weights.iter().copied().fold(f64::MAX, f64::min);

                        if best
                            .map_or(true, |(.., best_weight)| min_weight > best_weight)
                        {
                            best = Some((body_index, elem_index, tri, weights, min_weight));
                        }
                    }
                }
            }
        }

        match best {
            Some((body_index, elem_index, tri, weights, min_weight)) => {
                let body = &self.bodies[body_index];
                let elem = &body.elems[elem_index];

                Some(LocatedPoint {
                    body: body_index,
                    elem: elem_index,
                    coords: self.elem_local_coords(body, elem, tri, weights, query),
                    quality: min_weight,
                })
            }
            // every triangle was degenerate; fall back to the first element
            // with uniform weights so a location is still always available
            None => self.bodies.iter().enumerate().find_map(|(body_index, body)| {
                (!body.elems.is_empty()).then(|| {
                    let elem = &body.elems[0];
                    let tri = &elem.kind.tris()[0];
                    let uniform = [1.0 / 3.0; 3];

                    LocatedPoint {
                        body: body_index,
                        elem: 0,
                        coords: self.elem_local_coords(body, elem, tri, uniform, query),
                        quality: f64::NEG_INFINITY,
                    }
                })
            }),
        }
    }

    // Parametric corner coordinates of one constituent triangle
    fn tri_params(&self, body: &Body, elem: &Elem, tri: &[usize; 3]) -> [V2D; 3] {
        [
            self.param_of(body, elem.nodes[tri[0]]),
            self.param_of(body, elem.nodes[tri[1]]),
            self.param_of(body, elem.nodes[tri[2]]),
        ]
    }

    // Map barycentric weights on a constituent triangle back to the element's
    // local (s,t); quads refine the estimate with the bilinear inverse map
    fn elem_local_coords(
        &self,
        body: &Body,
        elem: &Elem,
        tri: &[usize; 3],
        weights: [f64; 3],
        query: V2D,
    ) -> V2D {
        let ref_coords = elem.kind.ref_coords();
        let mut st = V2D::default();
        for (&weight, &corner) in weights.iter().zip(tri.iter()) {
            st = st + ref_coords[corner] * weight;
        }

        if elem.kind.is_quad() {
            let corners = [
                self.param_of(body, elem.nodes[0]),
                self.param_of(body, elem.nodes[1]),
                self.param_of(body, elem.nodes[2]),
                self.param_of(body, elem.nodes[3]),
            ];

            let refined = invert_bilinear(&corners, query, st);
            if refined.converged {
                st = refined.coords;
            }
        }

        st
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::element::{Elem, ElemKind, ElemNode};
    use crate::discretization::space::Point;
    use approx::assert_relative_eq;
    use smallvec::smallvec;

    // unit square split into two triangles along the (1,0)-(0,1) diagonal
    fn two_tri_discr() -> Discretization {
        let tri_0 = Elem::new(
            ElemKind::NodalTri,
            smallvec![
                ElemNode::new(0, 0),
                ElemNode::new(1, 1),
                ElemNode::new(3, 3)
            ],
            None,
        );
        let tri_1 = Elem::new(
            ElemKind::NodalTri,
            smallvec![
                ElemNode::new(1, 1),
                ElemNode::new(2, 2),
                ElemNode::new(3, 3)
            ],
            None,
        );

        Discretization::new(
            vec![Body::new(1, vec![tri_0, tri_1], 0)],
            vec![
                Point::new(0.0, 0.0, 0.0),
                Point::new(1.0, 0.0, 0.0),
                Point::new(1.0, 1.0, 0.0),
                Point::new(0.0, 1.0, 0.0),
            ],
            vec![
                V2D::from([0.0, 0.0]),
                V2D::from([1.0, 0.0]),
                V2D::from([1.0, 1.0]),
                V2D::from([0.0, 1.0]),
            ],
        )
    }

    fn one_quad_discr() -> Discretization {
        let quad = Elem::new(
            ElemKind::NodalQuad,
            smallvec![
                ElemNode::new(0, 0),
                ElemNode::new(1, 1),
                ElemNode::new(2, 2),
                ElemNode::new(3, 3)
            ],
            None,
        );

        Discretization::new(
            vec![Body::new(1, vec![quad], 0)],
            vec![
                Point::new(0.0, 0.0, 0.0),
                Point::new(2.0, 0.0, 0.0),
                Point::new(2.0, 1.0, 0.0),
                Point::new(0.0, 1.0, 0.0),
            ],
            vec![
                V2D::from([0.0, 0.0]),
                V2D::from([2.0, 0.0]),
                V2D::from([2.0, 1.0]),
                V2D::from([0.0, 1.0]),
            ],
        )
    }

    #[test]
    fn centroid_containment() {
        let a = V2D::from([0.0, 0.0]);
        let b = V2D::from([4.0, 1.0]);
        let c = V2D::from([1.0, 3.0]);
        let centroid = (a + b + c) / 3.0;

        let weights = triangle_weights(a, b, c, centroid).unwrap();
        for w in weights {
            assert_relative_eq!(w, 1.0 / 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn degenerate_triangle_rejected() {
        let a = V2D::from([0.0, 0.0]);
        let b = V2D::from([1.0, 1.0]);
        let c = V2D::from([2.0, 2.0]);

        assert!(raw_triangle_weights(a, b, c, V2D::from([0.5, 0.5])).is_none());
        assert!(triangle_weights(a, b, c, V2D::from([0.5, 0.5])).is_none());
    }

    #[test]
    fn outside_point_rejected_inside_point_accepted() {
        let a = V2D::from([0.0, 0.0]);
        let b = V2D::from([1.0, 0.0]);
        let c = V2D::from([0.0, 1.0]);

        assert!(triangle_weights(a, b, c, V2D::from([0.7, 0.7])).is_none());

        let weights = triangle_weights(a, b, c, V2D::from([0.25, 0.25])).unwrap();
        assert_relative_eq!(weights.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn quad_inverse_round_trip() {
        let corners = [
            V2D::from([0.0, 0.0]),
            V2D::from([2.0, 0.0]),
            V2D::from([3.0, 2.0]),
            V2D::from([0.0, 1.0]),
        ];
        let (s_star, t_star) = (0.3, 0.7);

        let target = corners[0] * ((1.0 - s_star) * (1.0 - t_star))
            + corners[1] * (s_star * (1.0 - t_star))
            + corners[2] * (s_star * t_star)
            + corners[3] * ((1.0 - s_star) * t_star);

        let result = invert_bilinear(&corners, target, V2D::from([0.5, 0.5]));
        assert!(result.converged);
        assert_relative_eq!(result.coords[0], s_star, epsilon = 1e-6);
        assert_relative_eq!(result.coords[1], t_star, epsilon = 1e-6);
    }

    #[test]
    fn locate_in_triangles() {
        let discr = two_tri_discr();

        let first = discr.locate(V2D::from([0.25, 0.25])).unwrap();
        assert_eq!((first.body, first.elem), (0, 0));
        assert!(first.quality >= 0.0);

        let second = discr.locate(V2D::from([0.75, 0.75])).unwrap();
        assert_eq!((second.body, second.elem), (0, 1));
    }

    #[test]
    fn shared_edge_tie_break_is_first_hit() {
        let discr = two_tri_discr();

        // exactly on the diagonal shared by both triangles
        let located = discr.locate(V2D::from([0.5, 0.5])).unwrap();
        assert_eq!((located.body, located.elem), (0, 0));
    }

    #[test]
    fn locate_in_quad_recovers_bilinear_coords() {
        let discr = one_quad_discr();

        let located = discr.locate(V2D::from([1.0, 0.5])).unwrap();
        assert_eq!((located.body, located.elem), (0, 0));
        assert_relative_eq!(located.coords[0], 0.5, epsilon = 1e-8);
        assert_relative_eq!(located.coords[1], 0.5, epsilon = 1e-8);
    }

    #[test]
    fn extrapolation_outside_mesh() {
        let discr = two_tri_discr();

        let located = discr.locate(V2D::from([2.0, 2.0])).unwrap();
        assert!(located.quality < 0.0);
    }

    #[test]
    fn extrapolation_with_only_a_degenerate_element() {
        let tri = Elem::new(
            ElemKind::NodalTri,
            smallvec![
                ElemNode::new(0, 0),
                ElemNode::new(1, 1),
                ElemNode::new(2, 2)
            ],
            None,
        );
        let discr = Discretization::new(
            vec![Body::new(1, vec![tri], 0)],
            vec![
                Point::new(0.0, 0.0, 0.0),
                Point::new(1.0, 1.0, 0.0),
                Point::new(2.0, 2.0, 0.0),
            ],
            vec![
                V2D::from([0.0, 0.0]),
                V2D::from([1.0, 1.0]),
                V2D::from([2.0, 2.0]),
            ],
        );

        let located = discr.locate(V2D::from([5.0, -3.0])).unwrap();
        assert_eq!((located.body, located.elem), (0, 0));
        assert!(located.quality == f64::NEG_INFINITY);
    }

    #[test]
    fn empty_discretization_locates_nothing() {
        let discr = Discretization::blank();
        assert!(discr.locate(V2D::from([0.0, 0.0])).is_none());
    }

    #[test]
    fn batch_variants_agree() {
        let discr = two_tri_discr();
        let queries = [
            V2D::from([0.25, 0.25]),
            V2D::from([0.75, 0.75]),
            V2D::from([2.0, 2.0]),
        ];

        let serial = discr.locate_batch(&queries);
        let parallel = discr.locate_batch_parallel(&queries);

        for (s, p) in serial.iter().zip(parallel.iter()) {
            let s = s.unwrap();
            let p = p.unwrap();
            assert_eq!((s.body, s.elem), (p.body, p.elem));
            assert_relative_eq!(s.coords[0], p.coords[0]);
            assert_relative_eq!(s.coords[1], p.coords[1]);
        }
    }
}
