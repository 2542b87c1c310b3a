//! Min/max recomputation for position accessors.

use crate::accessor;
use crate::document::{Document, COMPONENT_FLOAT, TYPE_VEC3};

/// Recompute `min`/`max` for every accessor reached through a primitive's
/// `POSITION` attribute. Returns the number of accessors updated.
///
/// Only `VEC3`/float accessors are touched; empty accessors are left
/// unchanged. Safe to run any number of times.
pub fn compute_all_bounds(document: &mut Document) -> usize {
    let mut position_accessors = Vec::new();
    for mesh in &document.meshes {
        for primitive in &mesh.primitives {
            if let Some(&accessor_index) = primitive.attributes.get("POSITION") {
                position_accessors.push(accessor_index);
            }
        }
    }

    let mut updated = 0;
    for accessor_index in position_accessors {
        if compute_accessor_bounds(document, accessor_index) {
            updated += 1;
        }
    }
    updated
}

/// Recompute bounds for one accessor. Returns whether it was updated.
pub fn compute_accessor_bounds(document: &mut Document, accessor_index: usize) -> bool {
    let Some(accessor) = document.accessors.get(accessor_index) else {
        return false;
    };
    if accessor.element_type != TYPE_VEC3 || accessor.component_type != COMPONENT_FLOAT {
        return false;
    }
    if accessor.count == 0 {
        return false;
    }

    let Some(view) = accessor::resolve(document, accessor_index) else {
        return false;
    };

    let mut min_values = [f64::INFINITY; 3];
    let mut max_values = [f64::NEG_INFINITY; 3];

    for i in 0..view.count {
        let element = view.element(document, i);
        for (component, (min, max)) in min_values.iter_mut().zip(&mut max_values).enumerate() {
            let bytes = &element[component * 4..component * 4 + 4];
            let value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64;
            if value < *min {
                *min = value;
            }
            if value > *max {
                *max = value;
            }
        }
    }

    let accessor = &mut document.accessors[accessor_index];
    accessor.min_values = Some(min_values.to_vec());
    accessor.max_values = Some(max_values.to_vec());
    true
}
