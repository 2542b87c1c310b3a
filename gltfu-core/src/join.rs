//! Primitive joining: concatenate compatible primitives within a mesh.
//!
//! Primitives group on `(material, mode, indexed-ness, attribute layout,
//! morph-target count)`; each group of two or more becomes one primitive
//! whose vertex streams are concatenated and whose indices are rebased by
//! the running vertex count. A group that turns out to be incompatible
//! mid-flight rolls the document's table tails back and is skipped.

use crate::accessor::{self};
use crate::document::{
    Document, Primitive, COMPONENT_UNSIGNED_BYTE, COMPONENT_UNSIGNED_INT,
    COMPONENT_UNSIGNED_SHORT, TARGET_ARRAY_BUFFER, TARGET_ELEMENT_ARRAY_BUFFER, TYPE_SCALAR,
};
use std::collections::HashMap;
use std::fmt::Write as _;
use tracing::debug;

/// Options for the join pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinOptions {
    /// Reserved: joining already never crosses mesh boundaries.
    pub keep_meshes: bool,
    /// Include the mesh name in the group key.
    pub keep_named: bool,
}

/// Counts from one join run.
#[derive(Debug, Default, Clone)]
pub struct JoinSummary {
    pub meshes_modified: usize,
    pub groups_merged: usize,
    pub groups_failed: usize,
    pub primitives_removed: usize,
    pub last_error: Option<String>,
}

/// Join compatible primitives in every mesh.
pub fn process(document: &mut Document, options: JoinOptions) -> JoinSummary {
    let mut summary = JoinSummary::default();

    for mesh_index in 0..document.meshes.len() {
        if document.meshes[mesh_index].primitives.len() < 2 {
            continue;
        }

        let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
        for (primitive_index, primitive) in
            document.meshes[mesh_index].primitives.iter().enumerate()
        {
            // Joining independent morph target sets is ill-defined.
            if !primitive.morph_targets().is_empty() {
                continue;
            }
            let mut key = primitive_group_key(document, primitive);
            if options.keep_named {
                if let Some(name) = &document.meshes[mesh_index].name {
                    let _ = write!(key, "|mesh:{name}");
                }
            }
            buckets.entry(key).or_default().push(primitive_index);
        }

        let mut keys: Vec<&String> = buckets.keys().collect();
        keys.sort(); // deterministic group order

        let mut removal: Vec<usize> = Vec::new();
        for key in keys {
            let group = &buckets[key];
            if group.len() < 2 {
                continue;
            }

            let accessor_mark = document.accessors.len();
            let view_mark = document.buffer_views.len();
            let buffer_mark = document.buffers.len();
            let primitive_mark = document.meshes[mesh_index].primitives.len();

            match join_group(document, mesh_index, group) {
                Ok(()) => {
                    removal.extend_from_slice(group);
                    summary.groups_merged += 1;
                    summary.primitives_removed += group.len();
                }
                Err(reason) => {
                    document.accessors.truncate(accessor_mark);
                    document.buffer_views.truncate(view_mark);
                    document.buffers.truncate(buffer_mark);
                    document.meshes[mesh_index]
                        .primitives
                        .truncate(primitive_mark);

                    debug!(mesh = mesh_index, %reason, "join group rolled back");
                    summary.groups_failed += 1;
                    summary.last_error = Some(reason);
                }
            }
        }

        if !removal.is_empty() {
            removal.sort_unstable();
            removal.dedup();
            for &primitive_index in removal.iter().rev() {
                document.meshes[mesh_index].primitives.remove(primitive_index);
            }
            summary.meshes_modified += 1;
        }
    }

    summary
}

/// Group key: material, mode, indexed-ness, sorted attribute semantics with
/// their element/component types, morph-target count.
fn primitive_group_key(document: &Document, primitive: &Primitive) -> String {
    let mut key = String::new();
    let _ = write!(
        key,
        "mat:{:?}|mode:{}|idx:{}|attrs:",
        primitive.material,
        primitive.mode,
        primitive.indices.is_some() as u8
    );
    for (semantic, &accessor_index) in &primitive.attributes {
        if let Some(entry) = document.accessors.get(accessor_index) {
            let _ = write!(
                key,
                "{semantic}:{}:{}+",
                entry.element_type, entry.component_type
            );
        }
    }
    let _ = write!(key, "|targets:{}", primitive.morph_targets().len());
    key
}

fn join_group(document: &mut Document, mesh_index: usize, group: &[usize]) -> Result<(), String> {
    let sources: Vec<Primitive> = group
        .iter()
        .map(|&i| document.meshes[mesh_index].primitives[i].clone())
        .collect();
    let template = &sources[0];
    let template_has_indices = template.indices.is_some();

    // Collect per-source vertex/index extents.
    let mut vertex_bases = Vec::with_capacity(sources.len());
    let mut index_bases = Vec::with_capacity(sources.len());
    let mut total_vertices = 0usize;
    let mut total_indices = 0usize;

    for source in &sources {
        let &position = source
            .attributes
            .get("POSITION")
            .ok_or("primitive missing POSITION attribute")?;
        let position_view =
            accessor::resolve(document, position).ok_or("invalid POSITION accessor")?;

        vertex_bases.push(total_vertices);
        total_vertices += position_view.count;

        index_bases.push(total_indices);
        if template_has_indices {
            let indices = source.indices.ok_or("primitive missing indices")?;
            let index_view =
                accessor::resolve(document, indices).ok_or("invalid index accessor")?;
            total_indices += index_view.count;
        } else {
            total_indices += position_view.count;
        }
    }

    if total_vertices == 0 {
        return Err("group has no vertices".to_string());
    }

    // Attribute compatibility: same semantics, same element and component
    // types, resolvable data, everywhere.
    for (semantic, &template_accessor) in &template.attributes {
        let template_entry = document
            .accessors
            .get(template_accessor)
            .ok_or("invalid template attribute accessor")?
            .clone();

        for source in &sources {
            let &source_accessor = source
                .attributes
                .get(semantic)
                .ok_or("attribute mismatch across primitives")?;
            let entry = document
                .accessors
                .get(source_accessor)
                .ok_or("invalid attribute accessor")?;
            if entry.element_type != template_entry.element_type
                || entry.component_type != template_entry.component_type
            {
                return Err("attribute type mismatch".to_string());
            }
            accessor::resolve(document, source_accessor)
                .ok_or("failed to access attribute data")?;
        }
    }

    // Allocate destinations.
    let mut joined = Primitive {
        mode: template.mode,
        material: template.material,
        ..Default::default()
    };

    let template_attributes: Vec<(String, usize)> = template
        .attributes
        .iter()
        .map(|(semantic, &index)| (semantic.clone(), index))
        .collect();

    for (semantic, template_accessor) in &template_attributes {
        let entry = document.accessors[*template_accessor].clone();
        let destination = accessor::allocate(
            document,
            total_vertices,
            &entry.element_type,
            entry.component_type,
            Some(TARGET_ARRAY_BUFFER),
        );
        joined.attributes.insert(semantic.clone(), destination);
    }

    let index_component = index_component_for_vertex_count(total_vertices);
    let joined_indices = template_has_indices.then(|| {
        accessor::allocate(
            document,
            total_indices,
            TYPE_SCALAR,
            index_component,
            Some(TARGET_ELEMENT_ARRAY_BUFFER),
        )
    });
    joined.indices = joined_indices;

    // Copy vertex data at each primitive's vertex base.
    for (source, &vertex_base) in sources.iter().zip(&vertex_bases) {
        for (semantic, _) in &template_attributes {
            let source_view = accessor::resolve(document, source.attributes[semantic])
                .ok_or("failed to read attribute data")?;
            let destination_view = accessor::resolve(document, joined.attributes[semantic])
                .ok_or("failed to allocate attribute buffer")?;

            for i in 0..source_view.count {
                let element = source_view.element(document, i).to_vec();
                destination_view
                    .element_mut(document, vertex_base + i)
                    .copy_from_slice(&element);
            }
        }
    }

    // Copy indices, rebased by the vertex base.
    if let Some(joined_indices) = joined_indices {
        let destination_view =
            accessor::resolve(document, joined_indices).ok_or("failed to allocate index buffer")?;
        for ((source, &vertex_base), &index_base) in
            sources.iter().zip(&vertex_bases).zip(&index_bases)
        {
            let source_indices = source.indices.ok_or("primitive missing indices")?;
            let indices = accessor::read_index_accessor(document, source_indices)
                .ok_or("failed to read index data")?;

            for (i, &value) in indices.iter().enumerate() {
                accessor::write_index_value(
                    document,
                    &destination_view,
                    index_base + i,
                    value + vertex_base as u32,
                    index_component,
                );
            }
        }
    }

    document.meshes[mesh_index].primitives.push(joined);
    Ok(())
}

/// Index width able to address `vertex_count` vertices.
fn index_component_for_vertex_count(vertex_count: usize) -> u32 {
    if vertex_count == 0 {
        COMPONENT_UNSIGNED_SHORT
    } else if vertex_count - 1 <= u8::MAX as usize {
        COMPONENT_UNSIGNED_BYTE
    } else if vertex_count - 1 <= u16::MAX as usize {
        COMPONENT_UNSIGNED_SHORT
    } else {
        COMPONENT_UNSIGNED_INT
    }
}
