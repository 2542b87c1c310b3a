//! Vertex welding: merge bitwise-identical vertices into shared slots.
//!
//! Each primitive is rebuilt around an open-addressing hash table keyed on
//! the concatenated attribute bytes of a vertex. Vertices that agree on
//! every attribute stream collapse into one destination slot; the index
//! stream is rewritten to match. Freshly welded data always lands in new
//! buffers; the originals are left for prune.

use crate::accessor::{self, AccessorView};
use crate::document::{
    Document, COMPONENT_UNSIGNED_BYTE, COMPONENT_UNSIGNED_INT, COMPONENT_UNSIGNED_SHORT,
    MODE_POINTS, TARGET_ARRAY_BUFFER, TARGET_ELEMENT_ARRAY_BUFFER,
};
use tracing::warn;

const EMPTY: u32 = u32::MAX;

/// Options for the weld pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeldOptions {
    /// Rebuild primitives that already have indices.
    pub overwrite: bool,
}

/// Counts from one weld run.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeldSummary {
    pub primitives_welded: usize,
    pub primitives_skipped: usize,
    pub vertices_before: usize,
    pub vertices_after: usize,
}

/// Weld every primitive in the document.
pub fn process(document: &mut Document, options: WeldOptions) -> WeldSummary {
    let mut summary = WeldSummary::default();

    for mesh_index in 0..document.meshes.len() {
        for primitive_index in 0..document.meshes[mesh_index].primitives.len() {
            weld_primitive(document, mesh_index, primitive_index, options, &mut summary);
        }
    }

    summary
}

/// Murmur-style mixer over one vertex's attribute bytes.
fn hash_vertex(document: &Document, attributes: &[AccessorView], index: usize) -> u32 {
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;

    let mut h: u32 = 0;
    let mut mix = |mut k: u32| {
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
    };

    for view in attributes {
        let bytes = view.element(document, index);
        let mut chunks = bytes.chunks_exact(4);
        for word in &mut chunks {
            mix(u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
        }

        let tail = chunks.remainder();
        if !tail.is_empty() {
            let mut k = 0u32;
            for (i, &byte) in tail.iter().enumerate() {
                k |= (byte as u32) << (i * 8);
            }
            mix(k);
        }
    }

    h
}

/// Byte equality across every attribute stream: 64-bit words, then the tail.
fn vertices_equal(document: &Document, attributes: &[AccessorView], a: usize, b: usize) -> bool {
    if a == b {
        return true;
    }
    for view in attributes {
        let lhs = view.element(document, a);
        let rhs = view.element(document, b);

        let mut lhs_words = lhs.chunks_exact(8);
        let mut rhs_words = rhs.chunks_exact(8);
        for (lw, rw) in (&mut lhs_words).zip(&mut rhs_words) {
            if u64::from_le_bytes(lw.try_into().unwrap()) != u64::from_le_bytes(rw.try_into().unwrap()) {
                return false;
            }
        }
        if lhs_words.remainder() != rhs_words.remainder() {
            return false;
        }
    }
    true
}

fn find_slot(
    document: &Document,
    table: &[u32],
    attributes: &[AccessorView],
    key: usize,
) -> usize {
    let mask = table.len() as u32 - 1;
    let mut bucket = hash_vertex(document, attributes, key) & mask;

    for probe in 0..=mask {
        let value = table[bucket as usize];
        if value == EMPTY || vertices_equal(document, attributes, value as usize, key) {
            return bucket as usize;
        }
        bucket = (bucket + probe + 1) & mask;
    }

    bucket as usize
}

fn weld_primitive(
    document: &mut Document,
    mesh_index: usize,
    primitive_index: usize,
    options: WeldOptions,
    summary: &mut WeldSummary,
) {
    let primitive = &document.meshes[mesh_index].primitives[primitive_index];
    if primitive.indices.is_some() && !options.overwrite {
        return;
    }
    if primitive.mode == MODE_POINTS {
        return;
    }

    let Some(&position) = primitive.attributes.get("POSITION") else {
        warn!(mesh = mesh_index, primitive = primitive_index, "primitive has no POSITION, skipping weld");
        summary.primitives_skipped += 1;
        return;
    };
    let Some(position_view) = accessor::resolve(document, position) else {
        summary.primitives_skipped += 1;
        return;
    };
    let vertex_count = position_view.count as u32;
    if vertex_count == 0 {
        return;
    }

    let Some(source_indices) =
        accessor::read_primitive_indices(document, primitive, vertex_count)
    else {
        warn!(mesh = mesh_index, primitive = primitive_index, "unreadable index stream, skipping weld");
        summary.primitives_skipped += 1;
        return;
    };

    // Resolve every attribute stream once; unresolvable streams do not take
    // part in hashing and are rebuilt from slot 0 bytes they do have.
    let semantics: Vec<(String, usize)> = primitive
        .attributes
        .iter()
        .map(|(semantic, &index)| (semantic.clone(), index))
        .collect();
    let attribute_views: Vec<AccessorView> = semantics
        .iter()
        .filter_map(|(_, index)| accessor::resolve(document, *index))
        .collect();

    let table_size = (vertex_count + vertex_count / 4).max(1).next_power_of_two() as usize;
    let mut table = vec![EMPTY; table_size];
    let mut remap = vec![EMPTY; vertex_count as usize];

    let mut dst_vertex_count: u32 = 0;
    for &source in &source_indices {
        if source >= vertex_count || remap[source as usize] != EMPTY {
            continue;
        }
        let slot = find_slot(document, &table, &attribute_views, source as usize);
        if table[slot] == EMPTY {
            table[slot] = source;
            remap[source as usize] = dst_vertex_count;
            dst_vertex_count += 1;
        } else {
            remap[source as usize] = remap[table[slot] as usize];
        }
    }

    if dst_vertex_count == 0 {
        return;
    }

    // New index stream, narrowest width that fits the destination count.
    let component_type = if dst_vertex_count <= u8::MAX as u32 {
        COMPONENT_UNSIGNED_BYTE
    } else if dst_vertex_count <= u16::MAX as u32 {
        COMPONENT_UNSIGNED_SHORT
    } else {
        COMPONENT_UNSIGNED_INT
    };
    let new_indices: Vec<u32> = source_indices
        .iter()
        .filter(|&&source| source < vertex_count)
        .map(|&source| remap[source as usize])
        .collect();
    let index_accessor = accessor::allocate_index_accessor(
        document,
        &new_indices,
        component_type,
        Some(TARGET_ELEMENT_ARRAY_BUFFER),
    );

    // One fresh tightly packed buffer per attribute semantic.
    for (semantic, old_accessor_index) in &semantics {
        let Some(source_view) = accessor::resolve(document, *old_accessor_index) else {
            continue;
        };
        let old_accessor = document.accessors[*old_accessor_index].clone();

        let new_accessor_index = accessor::allocate(
            document,
            dst_vertex_count as usize,
            &old_accessor.element_type,
            old_accessor.component_type,
            Some(TARGET_ARRAY_BUFFER),
        );
        let dst_view =
            accessor::resolve(document, new_accessor_index).expect("fresh accessor resolves");

        let mut written = vec![false; dst_vertex_count as usize];
        for &source in &source_indices {
            if source >= vertex_count {
                continue;
            }
            let dst = remap[source as usize] as usize;
            if written[dst] {
                continue;
            }
            written[dst] = true;

            let element =
                source_view.element(document, source as usize).to_vec();
            dst_view
                .element_mut(document, dst)
                .copy_from_slice(&element);
        }

        {
            let new_accessor = &mut document.accessors[new_accessor_index];
            new_accessor.normalized = old_accessor.normalized;
            new_accessor.min_values = old_accessor.min_values.clone();
            new_accessor.max_values = old_accessor.max_values.clone();
        }
        document.meshes[mesh_index].primitives[primitive_index]
            .attributes
            .insert(semantic.clone(), new_accessor_index);
    }

    document.meshes[mesh_index].primitives[primitive_index].indices = Some(index_accessor);

    summary.primitives_welded += 1;
    summary.vertices_before += vertex_count as usize;
    summary.vertices_after += dst_vertex_count as usize;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Mesh, Primitive, COMPONENT_FLOAT, TYPE_VEC3};

    fn primitive_with_positions(doc: &mut Document, positions: &[[f32; 3]]) -> (usize, usize) {
        let accessor_index = accessor::allocate(
            doc,
            positions.len(),
            TYPE_VEC3,
            COMPONENT_FLOAT,
            Some(TARGET_ARRAY_BUFFER),
        );
        let view = accessor::resolve(doc, accessor_index).unwrap();
        for (i, p) in positions.iter().enumerate() {
            view.element_mut(doc, i)
                .copy_from_slice(bytemuck::cast_slice(p));
        }
        let mut primitive = Primitive::default();
        primitive
            .attributes
            .insert("POSITION".to_string(), accessor_index);
        doc.meshes.push(Mesh {
            primitives: vec![primitive],
            ..Default::default()
        });
        (doc.meshes.len() - 1, 0)
    }

    fn read_positions(doc: &Document, accessor_index: usize) -> Vec<[f32; 3]> {
        let view = accessor::resolve(doc, accessor_index).unwrap();
        (0..view.count)
            .map(|i| {
                let floats: &[f32] = bytemuck::cast_slice(view.element(doc, i));
                [floats[0], floats[1], floats[2]]
            })
            .collect()
    }

    #[test]
    fn duplicated_quad_welds_to_four_vertices() {
        let mut doc = Document::new();
        let quad = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 0.0, 0.0], // dup of 0
            [1.0, 1.0, 0.0], // dup of 2
            [0.0, 1.0, 0.0],
        ];
        let (mesh, prim) = primitive_with_positions(&mut doc, &quad);

        let summary = process(&mut doc, WeldOptions::default());
        assert_eq!(summary.primitives_welded, 1);
        assert_eq!(summary.vertices_before, 6);
        assert_eq!(summary.vertices_after, 4);

        let primitive = &doc.meshes[mesh].primitives[prim];
        let indices =
            accessor::read_index_accessor(&doc, primitive.indices.unwrap()).unwrap();
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3]);

        let positions = read_positions(&doc, primitive.attributes["POSITION"]);
        assert_eq!(positions.len(), 4);
        // Expansion through the indices reproduces the original stream.
        let expanded: Vec<[f32; 3]> = indices.iter().map(|&i| positions[i as usize]).collect();
        assert_eq!(expanded, quad);
    }

    #[test]
    fn all_distinct_vertices_yield_identity_indices() {
        let mut doc = Document::new();
        let positions: Vec<[f32; 3]> = (0..5).map(|i| [i as f32, 0.0, 0.0]).collect();
        let (mesh, prim) = primitive_with_positions(&mut doc, &positions);

        let summary = process(&mut doc, WeldOptions::default());
        assert_eq!(summary.vertices_after, 5);

        let primitive = &doc.meshes[mesh].primitives[prim];
        let indices =
            accessor::read_index_accessor(&doc, primitive.indices.unwrap()).unwrap();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn existing_indices_respected_without_overwrite() {
        let mut doc = Document::new();
        let (mesh, prim) =
            primitive_with_positions(&mut doc, &[[0.0; 3], [0.0; 3], [1.0, 0.0, 0.0]]);
        let index_accessor = accessor::allocate_index_accessor(
            &mut doc,
            &[0, 1, 2],
            COMPONENT_UNSIGNED_SHORT,
            Some(TARGET_ELEMENT_ARRAY_BUFFER),
        );
        doc.meshes[mesh].primitives[prim].indices = Some(index_accessor);

        let summary = process(&mut doc, WeldOptions::default());
        assert_eq!(summary.primitives_welded, 0);
        assert_eq!(
            doc.meshes[mesh].primitives[prim].indices,
            Some(index_accessor)
        );

        // With overwrite the duplicate pair merges.
        let summary = process(&mut doc, WeldOptions { overwrite: true });
        assert_eq!(summary.primitives_welded, 1);
        assert_eq!(summary.vertices_after, 2);
    }

    #[test]
    fn points_primitives_are_skipped() {
        let mut doc = Document::new();
        let (mesh, prim) = primitive_with_positions(&mut doc, &[[0.0; 3], [0.0; 3]]);
        doc.meshes[mesh].primitives[prim].mode = MODE_POINTS;

        let summary = process(&mut doc, WeldOptions::default());
        assert_eq!(summary.primitives_welded, 0);
        assert!(doc.meshes[mesh].primitives[prim].indices.is_none());
    }

    #[test]
    fn index_width_follows_destination_count()
    {
        let mut doc = Document::new();
        let positions: Vec<[f32; 3]> = (0..300).map(|i| [i as f32, 0.0, 0.0]).collect();
        let (mesh, prim) = primitive_with_positions(&mut doc, &positions);

        process(&mut doc, WeldOptions::default());
        let primitive = &doc.meshes[mesh].primitives[prim];
        let accessor = &doc.accessors[primitive.indices.unwrap()];
        assert_eq!(accessor.component_type, COMPONENT_UNSIGNED_SHORT);
    }
}
