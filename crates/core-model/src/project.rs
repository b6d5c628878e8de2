//! 3D camera and projection types (spec.md §4.9 "Project3DTo2D (optional)").
//!
//! All arithmetic here is single-precision so repeated compilations of the
//! same program are deterministic (spec.md §4.9).

use crate::expr::FieldExprId;
use crate::materialize::{ClipMode, CullMode};
use crate::slot::SlotId;

/// Row-major 4x4 view-projection matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4(pub [[f32; 4]; 4]);

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);

    /// Multiply a homogeneous point `(x, y, z, 1)` by this matrix, returning
    /// clip-space `(x, y, z, w)`.
    pub fn mul_point(&self, x: f32, y: f32, z: f32) -> [f32; 4] {
        let m = &self.0;
        let mut out = [0f32; 4];
        let p = [x, y, z, 1.0];
        for (row, out_val) in m.iter().zip(out.iter_mut()) {
            *out_val = row[0] * p[0] + row[1] * p[1] + row[2] * p[2] + row[3] * p[3];
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub view_projection: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Configuration for a `Project3DTo2D` step.
///
/// Only world-space position feeds the projection math here: the step
/// produces a 2D *point* instance batch, not oriented meshes, so rotation
/// and scale (relevant to per-vertex mesh transforms under
/// `MeshMaterialize`) don't apply.
#[derive(Debug, Clone, Copy)]
pub struct ProjectConfig {
    pub domain_slot: SlotId,
    pub camera_slot: SlotId,
    pub pos_x: FieldExprId,
    pub pos_y: FieldExprId,
    pub pos_z: FieldExprId,
    pub cull: CullMode,
    pub clip: ClipMode,
    pub sort_by_depth: bool,
    /// Screen dimensions the NDC `[-1, 1]` square maps onto (origin at
    /// center, Y down).
    pub viewport_w: f32,
    pub viewport_h: f32,
    pub out_slot: SlotId,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectCounters {
    pub non_finite: u64,
    pub culled: u64,
}
