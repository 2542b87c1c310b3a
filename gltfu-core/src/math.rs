//! Double-precision node transform math.

use crate::document::Node;
use glam::{DMat4, DQuat, DVec3};

/// Local transform of a node as a column-major matrix.
///
/// A stored 16-element matrix wins over the TRS triple. Missing TRS parts
/// default to identity. Quaternions are `(x, y, z, w)` with `w` real.
pub fn node_local_matrix(node: &Node) -> DMat4 {
    if let Some(matrix) = &node.matrix {
        return DMat4::from_cols_array(matrix);
    }

    let translation = node
        .translation
        .map(DVec3::from_array)
        .unwrap_or(DVec3::ZERO);
    let rotation = node
        .rotation
        .map(|[x, y, z, w]| DQuat::from_xyzw(x, y, z, w))
        .unwrap_or(DQuat::IDENTITY);
    let scale = node.scale.map(DVec3::from_array).unwrap_or(DVec3::ONE);

    DMat4::from_scale_rotation_translation(scale, rotation, translation)
}
