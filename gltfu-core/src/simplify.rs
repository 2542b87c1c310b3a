//! Triangle reduction through quadric-error simplification.
//!
//! Positions and indices are handed to meshoptimizer; a successful result is
//! spliced back as a fresh index accessor with the narrowest component type
//! that fits the surviving indices. Primitives that cannot or need not be
//! reduced are skipped and counted.

use crate::accessor::{self, index_component_for_max};
use crate::document::{
    Document, COMPONENT_FLOAT, MODE_TRIANGLES, MODE_TRIANGLE_FAN, MODE_TRIANGLE_STRIP,
    TARGET_ELEMENT_ARRAY_BUFFER, TYPE_VEC3,
};
use tracing::debug;

/// Options for the simplify pass.
#[derive(Debug, Clone, Copy)]
pub struct SimplifyOptions {
    /// Target ratio of triangles to keep, 0.0–1.0.
    pub ratio: f32,
    /// Error threshold as a fraction of the mesh extent.
    pub error: f32,
    /// Lock topological border vertices.
    pub lock_border: bool,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            ratio: 0.5,
            error: 0.01,
            lock_border: false,
        }
    }
}

/// Outcome for one primitive.
#[derive(Debug, Clone)]
pub struct PrimitiveReport {
    pub mesh: usize,
    pub primitive: usize,
    pub original_triangles: usize,
    pub simplified_triangles: usize,
    pub error: f32,
    /// Present when the primitive was skipped instead of simplified.
    pub skip_reason: Option<String>,
}

/// Counts and per-primitive reports from one simplify run.
#[derive(Debug, Default)]
pub struct SimplifySummary {
    pub total_primitives: usize,
    pub simplified: usize,
    pub skipped: usize,
    pub reports: Vec<PrimitiveReport>,
}

/// Simplify every triangle primitive in the document.
pub fn process(document: &mut Document, options: SimplifyOptions) -> SimplifySummary {
    let mut summary = SimplifySummary::default();

    for mesh_index in 0..document.meshes.len() {
        for primitive_index in 0..document.meshes[mesh_index].primitives.len() {
            summary.total_primitives += 1;

            let mode = document.meshes[mesh_index].primitives[primitive_index].mode;
            if !matches!(
                mode,
                MODE_TRIANGLES | MODE_TRIANGLE_STRIP | MODE_TRIANGLE_FAN
            ) {
                skip(&mut summary, mesh_index, primitive_index, "non-triangle mode");
                continue;
            }
            if mode != MODE_TRIANGLES {
                // Strip/fan expansion is not implemented; the index stream is
                // already a triangle list for the assets this tool targets.
                debug!(mesh = mesh_index, primitive = primitive_index, mode, "treating strip/fan as triangles");
                document.meshes[mesh_index].primitives[primitive_index].mode = MODE_TRIANGLES;
            }

            match simplify_primitive(document, mesh_index, primitive_index, options) {
                Ok(report) => {
                    summary.simplified += 1;
                    summary.reports.push(report);
                }
                Err(reason) => skip(&mut summary, mesh_index, primitive_index, &reason),
            }
        }
    }

    summary
}

fn skip(summary: &mut SimplifySummary, mesh: usize, primitive: usize, reason: &str) {
    summary.skipped += 1;
    summary.reports.push(PrimitiveReport {
        mesh,
        primitive,
        original_triangles: 0,
        simplified_triangles: 0,
        error: 0.0,
        skip_reason: Some(reason.to_string()),
    });
}

fn simplify_primitive(
    document: &mut Document,
    mesh_index: usize,
    primitive_index: usize,
    options: SimplifyOptions,
) -> Result<PrimitiveReport, String> {
    let primitive = &document.meshes[mesh_index].primitives[primitive_index];

    let &position = primitive
        .attributes
        .get("POSITION")
        .ok_or("missing POSITION attribute")?;
    let position_accessor = document
        .accessors
        .get(position)
        .ok_or("invalid POSITION accessor")?;
    if position_accessor.element_type != TYPE_VEC3
        || position_accessor.component_type != COMPONENT_FLOAT
    {
        return Err("POSITION is not vec3<f32>".to_string());
    }
    let position_view = accessor::resolve(document, position).ok_or("unreadable POSITION data")?;
    let vertex_count = position_view.count;
    if vertex_count == 0 {
        return Err("empty primitive".to_string());
    }

    let index_accessor = primitive.indices.ok_or("missing indices")?;
    let indices =
        accessor::read_index_accessor(document, index_accessor).ok_or("unreadable indices")?;
    if indices.is_empty() || indices.len() % 3 != 0 {
        return Err("index count is not a multiple of three".to_string());
    }

    // Tightly packed position stream for the simplifier.
    let mut positions: Vec<f32> = Vec::with_capacity(vertex_count * 3);
    for i in 0..vertex_count {
        let floats: &[f32] = bytemuck::cast_slice(position_view.element(document, i));
        positions.extend_from_slice(floats);
    }

    let target_index_count = ((indices.len() as f32 * options.ratio) as usize / 3 * 3).max(3);
    if indices.len() <= target_index_count {
        return Err("already at or below target".to_string());
    }

    let adapter = meshopt::VertexDataAdapter::new(bytemuck::cast_slice(&positions), 12, 0)
        .map_err(|e| format!("simplifier rejected vertex data: {e}"))?;
    let mut flags = meshopt::SimplifyOptions::empty();
    if options.lock_border {
        flags |= meshopt::SimplifyOptions::LockBorder;
    }

    let mut result_error = 0.0f32;
    let simplified = meshopt::simplify(
        &indices,
        &adapter,
        target_index_count,
        options.error,
        flags,
        Some(&mut result_error),
    );

    if simplified.is_empty() || simplified.len() >= indices.len() {
        return Err("no reduction achieved".to_string());
    }

    let max_index = simplified.iter().copied().max().unwrap_or(0);
    let min_index = simplified.iter().copied().min().unwrap_or(0);
    let component_type = index_component_for_max(max_index);
    let new_accessor = accessor::allocate_index_accessor(
        document,
        &simplified,
        component_type,
        Some(TARGET_ELEMENT_ARRAY_BUFFER),
    );
    {
        let entry = &mut document.accessors[new_accessor];
        entry.min_values = Some(vec![min_index as f64]);
        entry.max_values = Some(vec![max_index as f64]);
    }

    document.meshes[mesh_index].primitives[primitive_index].indices = Some(new_accessor);

    Ok(PrimitiveReport {
        mesh: mesh_index,
        primitive: primitive_index,
        original_triangles: indices.len() / 3,
        simplified_triangles: simplified.len() / 3,
        error: result_error,
        skip_reason: None,
    })
}
