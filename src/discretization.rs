/// The catalog of reference elements and the per-element records
pub mod element;
/// Structures describing the 2D parametric and 3D real spaces of a Discretization
pub mod space;

use crate::transfer::TransferError;
use element::{Elem, ElemKind, ElemNode};
use space::{Point, V2D};

use json::JsonValue;
use smallvec::SmallVec;
use std::fs::read_to_string;

#[cfg(feature = "json_export")]
use json::object;
#[cfg(feature = "json_export")]
use std::fs::File;
#[cfg(feature = "json_export")]
use std::io::BufWriter;

/// The surface mesh of a single geometric part
///
/// A `Body` owns its [Elem]s and an opaque geometry handle. It does not own
/// vertex or parametric coordinates; those live in flattened arrays on the
/// parent [Discretization], with `global_offset` mapping this body's local
/// parametric indices into the shared array.
#[derive(Clone, Debug)]
pub struct Body {
    /// Opaque handle to the externally-owned geometry. Never dereferenced here
    pub geom: usize,
    pub elems: Vec<Elem>,
    pub global_offset: usize,
}

impl Body {
    pub fn new(geom: usize, elems: Vec<Elem>, global_offset: usize) -> Self {
        Self {
            geom,
            elems,
            global_offset,
        }
    }

    /// Produce a Json Object that describes this Body
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "geom": self.geom,
            "global_offset": self.global_offset,
            "Elems": JsonValue::from(self.elems.iter().map(|e| e.to_json()).collect::<Vec<_>>()),
        }
    }
}

/// An ordered collection of [Body]s sharing flattened coordinate arrays
///
/// The engine treats a `Discretization` as immutable: every location,
/// interpolation and integration call reads it without modification, and
/// field arrays passed alongside it must be indexed consistently with
/// `verts` (node-based data) or the elements' data indices (cell-centered
/// data).
#[derive(Clone, Debug)]
pub struct Discretization {
    pub bodies: Vec<Body>,
    /// Physical location of each global vertex index
    pub verts: Vec<Point>,
    /// Flattened (u,v) array shared by all bodies; indexed by
    /// `body.global_offset + node.param`
    pub params: Vec<V2D>,
}

impl Discretization {
    /// Construct a completely empty Discretization
    pub fn blank() -> Self {
        Self {
            bodies: Vec::new(),
            verts: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn new(bodies: Vec<Body>, verts: Vec<Point>, params: Vec<V2D>) -> Self {
        Self {
            bodies,
            verts,
            params,
        }
    }

    /// Total number of elements across all bodies
    pub fn elem_count(&self) -> usize {
        self.bodies.iter().map(|body| body.elems.len()).sum()
    }

    /// Retrieve a [Body] by index
    pub fn body(&self, body_index: usize) -> Result<&Body, TransferError> {
        self.bodies
            .get(body_index)
            .ok_or(TransferError::BodyDoesntExist(body_index))
    }

    /// Retrieve an [Elem] by body and element index
    pub fn elem(&self, body_index: usize, elem_index: usize) -> Result<&Elem, TransferError> {
        self.body(body_index)?
            .elems
            .get(elem_index)
            .ok_or(TransferError::ElemDoesntExist(body_index, elem_index))
    }

    /// Parametric (u,v) location of one element node
    pub fn param_of(&self, body: &Body, node: ElemNode) -> V2D {
        self.params[body.global_offset + node.param]
    }

    /// Physical location of one element node
    pub fn vert_of(&self, node: ElemNode) -> Point {
        self.verts[node.vert]
    }

    /// Construct a Discretization from a JSON file with the following format
    ///
    /// The `Verts` array holds the physical xyz of each global vertex index;
    /// the `Params` array holds the flattened (u,v) parametric coordinates
    /// shared by all bodies. Each element lists its vertex indices (into
    /// `Verts`) and its body-local parametric indices (offset by the body's
    /// `global_offset` into `Params`), both in catalog corner order.
    ///
    /// discr.json
    /// ```JSON
    /// {
    ///     "Verts": [
    ///         [0.0, 0.0, 0.0],
    ///         [1.0, 0.0, 0.0],
    ///         [0.0, 1.0, 0.5]
    ///     ],
    ///     "Params": [
    ///         [0.0, 0.0],
    ///         [1.0, 0.0],
    ///         [0.0, 1.0]
    ///     ],
    ///     "Bodies": [
    ///         {
    ///             "geom": 1,
    ///             "global_offset": 0,
    ///             "Elems": [
    ///                 {
    ///                     "type": "Triangle",
    ///                     "cell_centered": false,
    ///                     "vert_ids": [0, 1, 2],
    ///                     "param_ids": [0, 1, 2]
    ///                 }
    ///             ]
    ///         }
    ///     ]
    /// }
    /// ```
    ///
    /// Cell-centered elements additionally carry a `data_index`.
    pub fn from_file(path: impl AsRef<str>) -> std::io::Result<Self> {
        let discr_file_contents = read_to_string(path.as_ref())?;
        let discr_json = json::parse(&discr_file_contents)
            .expect("Unable to parse Discretization File as JSON!");

        let verts = parse_vert_information(&discr_json);
        let params = parse_param_information(&discr_json);
        let bodies = parse_body_information(&discr_json, verts.len(), params.len());

        Ok(Self {
            bodies,
            verts,
            params,
        })
    }

    /// Print the discretization to a JSON file specified by path
    #[cfg(feature = "json_export")]
    pub fn export_to_json(&self, path: impl AsRef<str>) -> std::io::Result<()> {
        let f = File::create(path.as_ref())?;
        let mut w = BufWriter::new(&f);

        let discr_object = object! {
            "Verts": JsonValue::from(
                self.verts.iter().map(|v| json::array![v.x, v.y, v.z]).collect::<Vec<_>>()
            ),
            "Params": JsonValue::from(self.params.to_vec()),
            "Bodies": JsonValue::from(self.bodies.iter().map(|b| b.to_json()).collect::<Vec<_>>()),
        };

        discr_object.write_pretty(&mut w, 4)?;

        Ok(())
    }
}

/// The result of locating a query point within a [Discretization]
///
/// Transient; recomputed per query and never stored by the engine. For
/// triangles `coords` holds two independent barycentric weights (the third
/// is `1 - s - t`); for quadrilaterals it holds bilinear (s,t) in the unit
/// square.
///
/// `quality` is the smallest barycentric weight of the winning constituent
/// triangle. Contained points have `quality >= 0` (up to tolerance);
/// extrapolated results carry the (negative) weight of the least-bad
/// near-miss, so callers can detect how far outside the discretization the
/// query fell.
#[derive(Clone, Copy, Debug)]
pub struct LocatedPoint {
    pub body: usize,
    pub elem: usize,
    pub coords: V2D,
    pub quality: f64,
}

fn parse_vert_information(discr_json: &JsonValue) -> Vec<Point> {
    assert!(discr_json["Verts"].is_array(), "Verts must be an Array!");

    discr_json["Verts"]
        .members()
        .map(|json_vert| {
            assert_eq!(
                json_vert.members().count(),
                3,
                "Verts must be arrays of length 3!"
            );

            let x = json_vert[0]
                .as_f64()
                .expect("Verts must be composed of numerical values!");
            let y = json_vert[1]
                .as_f64()
                .expect("Verts must be composed of numerical values!");
            let z = json_vert[2]
                .as_f64()
                .expect("Verts must be composed of numerical values!");

            Point::new(x, y, z)
        })
        .collect()
}

fn parse_param_information(discr_json: &JsonValue) -> Vec<V2D> {
    assert!(discr_json["Params"].is_array(), "Params must be an Array!");

    discr_json["Params"]
        .members()
        .map(|json_param| {
            assert_eq!(
                json_param.members().count(),
                2,
                "Params must be arrays of length 2!"
            );

            let u = json_param[0]
                .as_f64()
                .expect("Params must be composed of numerical values!");
            let v = json_param[1]
                .as_f64()
                .expect("Params must be composed of numerical values!");

            V2D::from([u, v])
        })
        .collect()
}

fn parse_body_information(
    discr_json: &JsonValue,
    num_verts: usize,
    num_params: usize,
) -> Vec<Body> {
    assert!(discr_json["Bodies"].is_array(), "Bodies must be an Array!");

    discr_json["Bodies"]
        .members()
        .map(|json_body| {
            let geom = json_body["geom"]
                .as_usize()
                .expect("Bodies must have a 'geom' handle!");
            let global_offset = json_body["global_offset"]
                .as_usize()
                .expect("Bodies must have a 'global_offset'!");

            assert!(
                json_body["Elems"].is_array(),
                "Bodies must have an Array of Elems!"
            );

            let elems = json_body["Elems"]
                .members()
                .map(|json_elem| parse_elem(json_elem, global_offset, num_verts, num_params))
                .collect();

            Body::new(geom, elems, global_offset)
        })
        .collect()
}

fn parse_elem(
    json_elem: &JsonValue,
    global_offset: usize,
    num_verts: usize,
    num_params: usize,
) -> Elem {
    let type_name = json_elem["type"]
        .as_str()
        .expect("Elems must have a 'type' name!");
    let cell_centered = json_elem["cell_centered"].as_bool().unwrap_or(false);

    let kind = ElemKind::from_name(type_name, cell_centered)
        .unwrap_or_else(|err| panic!("{}; cannot construct Discretization from file!", err));

    assert!(
        json_elem["vert_ids"].is_array() && json_elem["param_ids"].is_array(),
        "Elems must have Arrays of vert_ids and param_ids!"
    );
    assert_eq!(
        json_elem["vert_ids"].members().count(),
        kind.nref(),
        "{} Elems must have {} vert_ids!",
        kind.name(),
        kind.nref(),
    );
    assert_eq!(
        json_elem["param_ids"].members().count(),
        kind.nref(),
        "{} Elems must have {} param_ids!",
        kind.name(),
        kind.nref(),
    );

    let nodes: SmallVec<[ElemNode; 4]> = json_elem["vert_ids"]
        .members()
        .zip(json_elem["param_ids"].members())
        .map(|(vert_json, param_json)| {
            let vert = vert_json
                .as_usize()
                .expect("vert_ids must be positive integers!");
            let param = param_json
                .as_usize()
                .expect("param_ids must be positive integers!");

            assert!(
                vert < num_verts,
                "vert_ids must be smaller than the total number of Verts!"
            );
            assert!(
                global_offset + param < num_params,
                "param_ids (plus the body's global_offset) must be smaller than the total number of Params!"
            );

            ElemNode::new(vert, param)
        })
        .collect();

    let data_index = if kind.ndata() == 1 {
        Some(
            json_elem["data_index"]
                .as_usize()
                .expect("cell-centered Elems must have a 'data_index'!"),
        )
    } else {
        None
    };

    Elem::new(kind, nodes, data_index)
}
