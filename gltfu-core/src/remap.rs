//! Reference walking, index remapping, and table compaction.
//!
//! Any pass that reorders or removes table entries builds an `old → new`
//! mapping (`Vec<Option<usize>>`, absent = removed), rewrites every
//! reference site through the functions here, then compacts the table.
//! Centralizing the walk keeps the reference-site list in one place — the
//! buffer-view integer buried in a primitive's Draco extension included.

use crate::document::{AttributeMap, Document};
use std::collections::HashSet;
use tracing::warn;

/// Index mapping for one table: `map[old] = Some(new)` for survivors.
pub type IndexMap = Vec<Option<usize>>;

/// Build a dense `old → new` mapping that keeps `survivors` in ascending
/// old-index order.
pub fn build_index_map(len: usize, survivors: &HashSet<usize>) -> IndexMap {
    let mut next = 0;
    (0..len)
        .map(|old| {
            survivors.contains(&old).then(|| {
                let new = next;
                next += 1;
                new
            })
        })
        .collect()
}

/// Produce a fresh table containing only surviving entries, in ascending
/// old-index order.
pub fn compact_table<T>(table: Vec<T>, map: &IndexMap) -> Vec<T> {
    table
        .into_iter()
        .enumerate()
        .filter(|(old, _)| map.get(*old).copied().flatten().is_some())
        .map(|(_, entry)| entry)
        .collect()
}

/// Rewrite an optional reference; vanished targets become absent.
fn apply(slot: &mut Option<usize>, map: &IndexMap) {
    if let Some(old) = *slot {
        *slot = map.get(old).copied().flatten();
    }
}

/// Rewrite a required reference. A vanished target here means the caller
/// failed to keep the element alive; fall back to 0 rather than corrupt the
/// table shape.
fn apply_required(slot: &mut usize, map: &IndexMap, site: &'static str) {
    match map.get(*slot).copied().flatten() {
        Some(new) => *slot = new,
        None => {
            warn!(site, old = *slot, "required reference lost its target");
            *slot = 0;
        }
    }
}

/// Rewrite an index list, dropping entries whose target vanished.
fn apply_list(list: &mut Vec<usize>, map: &IndexMap) {
    list.retain_mut(|index| match map.get(*index).copied().flatten() {
        Some(new) => {
            *index = new;
            true
        }
        None => false,
    });
}

/// Rewrite attribute-map values, dropping semantics whose accessor vanished.
fn apply_attributes(attributes: &mut AttributeMap, map: &IndexMap) {
    let rewritten: AttributeMap = std::mem::take(attributes)
        .into_iter()
        .filter_map(|(semantic, old)| {
            map.get(old).copied().flatten().map(|new| (semantic, new))
        })
        .collect();
    *attributes = rewritten;
}

/// Rewrite every node reference: scene roots, node children, skin joints and
/// skeletons, animation channel targets.
pub fn remap_nodes(document: &mut Document, map: &IndexMap) {
    for scene in &mut document.scenes {
        apply_list(&mut scene.nodes, map);
    }
    for node in &mut document.nodes {
        apply_list(&mut node.children, map);
    }
    for skin in &mut document.skins {
        apply_list(&mut skin.joints, map);
        apply(&mut skin.skeleton, map);
    }
    for animation in &mut document.animations {
        for channel in &mut animation.channels {
            apply(&mut channel.target.node, map);
        }
    }
}

/// Rewrite every mesh reference (`node.mesh`).
pub fn remap_meshes(document: &mut Document, map: &IndexMap) {
    for node in &mut document.nodes {
        apply(&mut node.mesh, map);
    }
}

/// Rewrite every material reference (`primitive.material`).
pub fn remap_materials(document: &mut Document, map: &IndexMap) {
    for mesh in &mut document.meshes {
        for primitive in &mut mesh.primitives {
            apply(&mut primitive.material, map);
        }
    }
}

/// Rewrite every accessor reference: primitive indices, attributes, morph
/// targets, animation sampler inputs/outputs, skin inverse-bind matrices.
pub fn remap_accessors(document: &mut Document, map: &IndexMap) {
    for mesh in &mut document.meshes {
        for primitive in &mut mesh.primitives {
            apply(&mut primitive.indices, map);
            apply_attributes(&mut primitive.attributes, map);
            if let Some(targets) = &mut primitive.targets {
                for target in targets {
                    apply_attributes(target, map);
                }
            }
        }
    }
    for animation in &mut document.animations {
        for sampler in &mut animation.samplers {
            apply_required(&mut sampler.input, map, "animation.sampler.input");
            apply_required(&mut sampler.output, map, "animation.sampler.output");
        }
    }
    for skin in &mut document.skins {
        apply(&mut skin.inverse_bind_matrices, map);
    }
}

/// Rewrite every texture reference (all five material slots).
pub fn remap_textures(document: &mut Document, map: &IndexMap) {
    for material in &mut document.materials {
        if let Some(pbr) = &mut material.pbr_metallic_roughness {
            retain_slot(&mut pbr.base_color_texture, map, |info| &mut info.index);
            retain_slot(&mut pbr.metallic_roughness_texture, map, |info| {
                &mut info.index
            });
        }
        retain_slot(&mut material.normal_texture, map, |info| &mut info.index);
        retain_slot(&mut material.occlusion_texture, map, |info| &mut info.index);
        retain_slot(&mut material.emissive_texture, map, |info| &mut info.index);
    }
}

/// Rewrite a texture slot in place; the slot itself becomes absent when its
/// texture vanished.
fn retain_slot<T>(
    slot: &mut Option<T>,
    map: &IndexMap,
    index_of: impl Fn(&mut T) -> &mut usize,
) {
    if let Some(info) = slot {
        let index = index_of(info);
        match map.get(*index).copied().flatten() {
            Some(new) => *index = new,
            None => *slot = None,
        }
    }
}

/// Rewrite every image reference (`texture.source`).
pub fn remap_images(document: &mut Document, map: &IndexMap) {
    for texture in &mut document.textures {
        apply(&mut texture.source, map);
    }
}

/// Rewrite every sampler reference (`texture.sampler`).
pub fn remap_samplers(document: &mut Document, map: &IndexMap) {
    for texture in &mut document.textures {
        apply(&mut texture.sampler, map);
    }
}

/// Rewrite every buffer-view reference: accessors, images, and the
/// `bufferView` integer inside each primitive's Draco extension object.
pub fn remap_buffer_views(document: &mut Document, map: &IndexMap) {
    for accessor in &mut document.accessors {
        apply(&mut accessor.buffer_view, map);
    }
    for image in &mut document.images {
        apply(&mut image.buffer_view, map);
    }
    for mesh in &mut document.meshes {
        for primitive in &mut mesh.primitives {
            if let Some(old) = primitive.draco_buffer_view() {
                if let Some(new) = map.get(old).copied().flatten() {
                    primitive.set_draco_buffer_view(new);
                } else {
                    warn!(old, "Draco extension buffer view lost its target");
                }
            }
        }
    }
}

/// Rewrite every buffer reference (`bufferView.buffer`).
pub fn remap_buffers(document: &mut Document, map: &IndexMap) {
    for view in &mut document.buffer_views {
        apply_required(&mut view.buffer, map, "bufferView.buffer");
    }
}

/// Rewrite every skin reference (`node.skin`).
pub fn remap_skins(document: &mut Document, map: &IndexMap) {
    for node in &mut document.nodes {
        apply(&mut node.skin, map);
    }
}

/// Rewrite every camera reference (`node.camera`).
pub fn remap_cameras(document: &mut Document, map: &IndexMap) {
    for node in &mut document.nodes {
        apply(&mut node.camera, map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Mesh, Node, Primitive, Scene};

    #[test]
    fn index_map_is_dense_and_ordered() {
        let survivors: HashSet<usize> = [0, 2, 3].into_iter().collect();
        let map = build_index_map(5, &survivors);
        assert_eq!(map, vec![Some(0), None, Some(1), Some(2), None]);
    }

    #[test]
    fn compact_keeps_ascending_order() {
        let map = vec![Some(0), None, Some(1)];
        let table = compact_table(vec!["a", "b", "c"], &map);
        assert_eq!(table, vec!["a", "c"]);
    }

    #[test]
    fn node_remap_rewrites_all_sites() {
        let mut doc = Document::new();
        doc.nodes = vec![
            Node {
                children: vec![1, 2],
                ..Default::default()
            },
            Node::default(),
            Node::default(),
        ];
        doc.scenes.push(Scene {
            name: None,
            nodes: vec![0, 2],
        });

        // Drop node 1.
        let survivors: HashSet<usize> = [0, 2].into_iter().collect();
        let map = build_index_map(3, &survivors);
        remap_nodes(&mut doc, &map);
        doc.nodes = compact_table(std::mem::take(&mut doc.nodes), &map);

        assert_eq!(doc.scenes[0].nodes, vec![0, 1]);
        assert_eq!(doc.nodes[0].children, vec![1]);
    }

    #[test]
    fn accessor_remap_drops_vanished_attribute() {
        let mut doc = Document::new();
        let mut primitive = Primitive::default();
        primitive.attributes.insert("POSITION".to_string(), 0);
        primitive.attributes.insert("NORMAL".to_string(), 1);
        primitive.indices = Some(2);
        doc.meshes.push(Mesh {
            primitives: vec![primitive],
            ..Default::default()
        });

        let survivors: HashSet<usize> = [0, 2].into_iter().collect();
        let map = build_index_map(3, &survivors);
        remap_accessors(&mut doc, &map);

        let primitive = &doc.meshes[0].primitives[0];
        assert_eq!(primitive.attributes.get("POSITION"), Some(&0));
        assert!(!primitive.attributes.contains_key("NORMAL"));
        assert_eq!(primitive.indices, Some(1));
    }

    #[test]
    fn draco_extension_view_is_remapped() {
        let mut doc = Document::new();
        let mut primitive = Primitive::default();
        primitive.extensions.insert(
            crate::document::DRACO_EXTENSION.to_string(),
            serde_json::json!({ "bufferView": 4, "attributes": {} }),
        );
        doc.meshes.push(Mesh {
            primitives: vec![primitive],
            ..Default::default()
        });

        let survivors: HashSet<usize> = [4].into_iter().collect();
        let mut map = build_index_map(5, &survivors);
        assert_eq!(map[4], Some(0));
        map[4] = Some(0);
        remap_buffer_views(&mut doc, &map);

        assert_eq!(doc.meshes[0].primitives[0].draco_buffer_view(), Some(0));
    }
}
