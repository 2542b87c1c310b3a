//! Reachability-based removal of unreferenced entities.
//!
//! Marking starts from scene roots and the (always live) animations, then
//! flows through meshes, materials, textures, skins, accessors, buffer
//! views, and buffers. Everything unmarked is dropped and every table is
//! compacted through the walker.

use crate::document::{Document, Node};
use crate::remap::{self, build_index_map};
use std::collections::HashSet;

/// Options for the prune pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct PruneOptions {
    /// Keep empty leaf nodes.
    pub keep_leaves: bool,
    /// Keep vertex attributes no material requires.
    pub keep_attributes: bool,
    /// Never prune nodes carrying custom extras.
    pub keep_extras: bool,
}

/// Removal counts per table.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneSummary {
    pub nodes: usize,
    pub meshes: usize,
    pub materials: usize,
    pub accessors: usize,
    pub textures: usize,
    pub images: usize,
    pub samplers: usize,
    pub buffer_views: usize,
    pub buffers: usize,
    pub skins: usize,
    pub cameras: usize,
}

impl PruneSummary {
    pub fn total(&self) -> usize {
        self.nodes
            + self.meshes
            + self.materials
            + self.accessors
            + self.textures
            + self.images
            + self.samplers
            + self.buffer_views
            + self.buffers
            + self.skins
            + self.cameras
    }
}

#[derive(Default)]
struct Marks {
    nodes: HashSet<usize>,
    meshes: HashSet<usize>,
    materials: HashSet<usize>,
    accessors: HashSet<usize>,
    textures: HashSet<usize>,
    images: HashSet<usize>,
    samplers: HashSet<usize>,
    buffer_views: HashSet<usize>,
    buffers: HashSet<usize>,
    skins: HashSet<usize>,
    cameras: HashSet<usize>,
}

/// Run the prune pass; returns removal counts.
pub fn process(document: &mut Document, options: PruneOptions) -> PruneSummary {
    let mut marks = mark(document);

    if !options.keep_leaves {
        prune_empty_leaves(document, options.keep_extras);
        marks = mark(document);
    }

    if !options.keep_attributes {
        prune_unused_attributes(document);
        marks = mark(document);
    }

    let summary = PruneSummary {
        nodes: document.nodes.len() - marks.nodes.len(),
        meshes: document.meshes.len() - marks.meshes.len(),
        materials: document.materials.len() - marks.materials.len(),
        accessors: document.accessors.len() - marks.accessors.len(),
        textures: document.textures.len() - marks.textures.len(),
        images: document.images.len() - marks.images.len(),
        samplers: document.samplers.len() - marks.samplers.len(),
        buffer_views: document.buffer_views.len() - marks.buffer_views.len(),
        buffers: document.buffers.len() - marks.buffers.len(),
        skins: document.skins.len() - marks.skins.len(),
        cameras: document.cameras.len() - marks.cameras.len(),
    };

    compact(document, &marks);
    summary
}

fn mark(document: &Document) -> Marks {
    let mut marks = Marks::default();

    for scene in &document.scenes {
        for &root in &scene.nodes {
            mark_node(document, root, &mut marks);
        }
    }

    // Animations are always live: their targets and sampler accessors stay.
    for animation in &document.animations {
        for channel in &animation.channels {
            if let Some(node) = channel.target.node {
                if node < document.nodes.len() {
                    marks.nodes.insert(node);
                }
            }
        }
        for sampler in &animation.samplers {
            mark_accessor(document, sampler.input, &mut marks);
            mark_accessor(document, sampler.output, &mut marks);
        }
    }

    marks
}

fn mark_node(document: &Document, node_index: usize, marks: &mut Marks) {
    let Some(node) = document.nodes.get(node_index) else {
        return;
    };
    if !marks.nodes.insert(node_index) {
        return; // already visited; also breaks any defective cycle
    }

    if let Some(mesh) = node.mesh {
        mark_mesh(document, mesh, marks);
    }
    if let Some(skin) = node.skin {
        mark_skin(document, skin, marks);
    }
    if let Some(camera) = node.camera {
        if camera < document.cameras.len() {
            marks.cameras.insert(camera);
        }
    }
    for &child in &node.children {
        mark_node(document, child, marks);
    }
}

fn mark_mesh(document: &Document, mesh_index: usize, marks: &mut Marks) {
    let Some(mesh) = document.meshes.get(mesh_index) else {
        return;
    };
    marks.meshes.insert(mesh_index);

    for primitive in &mesh.primitives {
        if let Some(material) = primitive.material {
            mark_material(document, material, marks);
        }
        if let Some(indices) = primitive.indices {
            mark_accessor(document, indices, marks);
        }
        for &attribute in primitive.attributes.values() {
            mark_accessor(document, attribute, marks);
        }
        for target in primitive.morph_targets() {
            for &attribute in target.values() {
                mark_accessor(document, attribute, marks);
            }
        }
        // The compressed stream hides behind the extension object.
        if let Some(view_index) = primitive.draco_buffer_view() {
            if let Some(view) = document.buffer_views.get(view_index) {
                marks.buffer_views.insert(view_index);
                if view.buffer < document.buffers.len() {
                    marks.buffers.insert(view.buffer);
                }
            }
        }
    }
}

fn mark_material(document: &Document, material_index: usize, marks: &mut Marks) {
    let Some(material) = document.materials.get(material_index) else {
        return;
    };
    marks.materials.insert(material_index);

    let mut slots = Vec::with_capacity(5);
    if let Some(pbr) = &material.pbr_metallic_roughness {
        if let Some(info) = &pbr.base_color_texture {
            slots.push(info.index);
        }
        if let Some(info) = &pbr.metallic_roughness_texture {
            slots.push(info.index);
        }
    }
    if let Some(info) = &material.normal_texture {
        slots.push(info.index);
    }
    if let Some(info) = &material.occlusion_texture {
        slots.push(info.index);
    }
    if let Some(info) = &material.emissive_texture {
        slots.push(info.index);
    }

    for texture_index in slots {
        let Some(texture) = document.textures.get(texture_index) else {
            continue;
        };
        marks.textures.insert(texture_index);
        if let Some(source) = texture.source {
            if source < document.images.len() {
                marks.images.insert(source);
                if let Some(view) = document.images[source].buffer_view {
                    if let Some(buffer_view) = document.buffer_views.get(view) {
                        marks.buffer_views.insert(view);
                        if buffer_view.buffer < document.buffers.len() {
                            marks.buffers.insert(buffer_view.buffer);
                        }
                    }
                }
            }
        }
        if let Some(sampler) = texture.sampler {
            if sampler < document.samplers.len() {
                marks.samplers.insert(sampler);
            }
        }
    }
}

fn mark_skin(document: &Document, skin_index: usize, marks: &mut Marks) {
    let Some(skin) = document.skins.get(skin_index) else {
        return;
    };
    marks.skins.insert(skin_index);

    if let Some(ibm) = skin.inverse_bind_matrices {
        mark_accessor(document, ibm, marks);
    }
    if let Some(skeleton) = skin.skeleton {
        if skeleton < document.nodes.len() {
            marks.nodes.insert(skeleton);
        }
    }
    for &joint in &skin.joints {
        if joint < document.nodes.len() {
            marks.nodes.insert(joint);
        }
    }
}

fn mark_accessor(document: &Document, accessor_index: usize, marks: &mut Marks) {
    let Some(accessor) = document.accessors.get(accessor_index) else {
        return;
    };
    marks.accessors.insert(accessor_index);

    if let Some(view_index) = accessor.buffer_view {
        if let Some(view) = document.buffer_views.get(view_index) {
            marks.buffer_views.insert(view_index);
            if view.buffer < document.buffers.len() {
                marks.buffers.insert(view.buffer);
            }
        }
    }
}

/// Iteratively detach empty leaf nodes from parents and scene roots until a
/// fixed point.
fn prune_empty_leaves(document: &mut Document, keep_extras: bool) {
    let prunable = |node: &Node| {
        node.is_empty_leaf() && (!keep_extras || node.extras.is_none())
    };

    loop {
        let mut changed = false;
        let doomed: Vec<bool> = document.nodes.iter().map(prunable).collect();

        for node in &mut document.nodes {
            let before = node.children.len();
            node.children
                .retain(|&child| !doomed.get(child).copied().unwrap_or(false));
            changed |= node.children.len() != before;
        }
        for scene in &mut document.scenes {
            let before = scene.nodes.len();
            scene
                .nodes
                .retain(|&root| !doomed.get(root).copied().unwrap_or(false));
            changed |= scene.nodes.len() != before;
        }

        if !changed {
            break;
        }
    }
}

/// Drop vertex attribute semantics the primitive's material cannot use.
fn prune_unused_attributes(document: &mut Document) {
    let materials = document.materials.clone();
    for mesh in &mut document.meshes {
        for primitive in &mut mesh.primitives {
            let material = primitive.material.and_then(|m| materials.get(m));
            primitive
                .attributes
                .retain(|semantic, _| semantic_required(semantic, material));
        }
    }
}

fn semantic_required(semantic: &str, material: Option<&crate::document::Material>) -> bool {
    match semantic {
        "POSITION" => true,
        "NORMAL" => match material {
            Some(material) => !material.is_unlit(),
            None => true,
        },
        "TANGENT" => material.is_some_and(|m| m.normal_texture.is_some()),
        "COLOR_0" => true,
        _ if semantic.starts_with("TEXCOORD_") => {
            let Some(material) = material else {
                return false;
            };
            let Ok(channel) = semantic["TEXCOORD_".len()..].parse::<u32>() else {
                return false;
            };

            let mut channels = Vec::with_capacity(5);
            if let Some(pbr) = &material.pbr_metallic_roughness {
                if let Some(info) = &pbr.base_color_texture {
                    channels.push(info.tex_coord);
                }
                if let Some(info) = &pbr.metallic_roughness_texture {
                    channels.push(info.tex_coord);
                }
            }
            if let Some(info) = &material.normal_texture {
                channels.push(info.tex_coord);
            }
            if let Some(info) = &material.occlusion_texture {
                channels.push(info.tex_coord);
            }
            if let Some(info) = &material.emissive_texture {
                channels.push(info.tex_coord);
            }
            channels.contains(&channel)
        }
        _ if semantic.starts_with("COLOR_") => false,
        _ if semantic.starts_with("JOINTS_") || semantic.starts_with("WEIGHTS_") => true,
        // Unknown semantics are kept; pruning them would be guesswork.
        _ => true,
    }
}

fn compact(document: &mut Document, marks: &Marks) {
    let node_map = build_index_map(document.nodes.len(), &marks.nodes);
    let mesh_map = build_index_map(document.meshes.len(), &marks.meshes);
    let material_map = build_index_map(document.materials.len(), &marks.materials);
    let accessor_map = build_index_map(document.accessors.len(), &marks.accessors);
    let texture_map = build_index_map(document.textures.len(), &marks.textures);
    let image_map = build_index_map(document.images.len(), &marks.images);
    let sampler_map = build_index_map(document.samplers.len(), &marks.samplers);
    let view_map = build_index_map(document.buffer_views.len(), &marks.buffer_views);
    let buffer_map = build_index_map(document.buffers.len(), &marks.buffers);
    let skin_map = build_index_map(document.skins.len(), &marks.skins);
    let camera_map = build_index_map(document.cameras.len(), &marks.cameras);

    remap::remap_nodes(document, &node_map);
    remap::remap_meshes(document, &mesh_map);
    remap::remap_materials(document, &material_map);
    remap::remap_accessors(document, &accessor_map);
    remap::remap_textures(document, &texture_map);
    remap::remap_images(document, &image_map);
    remap::remap_samplers(document, &sampler_map);
    remap::remap_buffer_views(document, &view_map);
    remap::remap_buffers(document, &buffer_map);
    remap::remap_skins(document, &skin_map);
    remap::remap_cameras(document, &camera_map);

    document.nodes = remap::compact_table(std::mem::take(&mut document.nodes), &node_map);
    document.meshes = remap::compact_table(std::mem::take(&mut document.meshes), &mesh_map);
    document.materials =
        remap::compact_table(std::mem::take(&mut document.materials), &material_map);
    document.accessors =
        remap::compact_table(std::mem::take(&mut document.accessors), &accessor_map);
    document.textures = remap::compact_table(std::mem::take(&mut document.textures), &texture_map);
    document.images = remap::compact_table(std::mem::take(&mut document.images), &image_map);
    document.samplers = remap::compact_table(std::mem::take(&mut document.samplers), &sampler_map);
    document.buffer_views =
        remap::compact_table(std::mem::take(&mut document.buffer_views), &view_map);
    document.buffers = remap::compact_table(std::mem::take(&mut document.buffers), &buffer_map);
    document.skins = remap::compact_table(std::mem::take(&mut document.skins), &skin_map);
    document.cameras = remap::compact_table(std::mem::take(&mut document.cameras), &camera_map);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::allocate;
    use crate::document::{
        Image, Material, Mesh, NormalTextureInfo, Primitive, Scene, COMPONENT_FLOAT, TYPE_VEC3,
    };

    fn scene_with_mesh() -> Document {
        let mut doc = Document::new();
        let position = allocate(&mut doc, 3, TYPE_VEC3, COMPONENT_FLOAT, None);
        let mut primitive = Primitive::default();
        primitive.attributes.insert("POSITION".to_string(), position);
        doc.meshes.push(Mesh {
            primitives: vec![primitive],
            ..Default::default()
        });
        doc.nodes.push(Node {
            mesh: Some(0),
            ..Default::default()
        });
        doc.scenes.push(Scene {
            name: None,
            nodes: vec![0],
        });
        doc
    }

    #[test]
    fn unreferenced_image_is_removed() {
        let mut doc = Document::new();
        doc.nodes.push(Node::default());
        doc.scenes.push(Scene {
            name: None,
            nodes: vec![0],
        });
        doc.images.push(Image::default());

        let summary = process(&mut doc, PruneOptions::default());
        assert_eq!(summary.images, 1);
        assert!(doc.images.is_empty());
    }

    #[test]
    fn reachable_chain_survives() {
        let mut doc = scene_with_mesh();
        let summary = process(&mut doc, PruneOptions::default());
        assert_eq!(summary.total(), 0);
        assert_eq!(doc.meshes.len(), 1);
        assert_eq!(doc.accessors.len(), 1);
        assert_eq!(doc.buffers.len(), 1);
    }

    #[test]
    fn orphan_buffer_goes_with_its_accessor() {
        let mut doc = scene_with_mesh();
        // Second accessor chain nothing references.
        allocate(&mut doc, 3, TYPE_VEC3, COMPONENT_FLOAT, None);

        let summary = process(&mut doc, PruneOptions::default());
        assert_eq!(summary.accessors, 1);
        assert_eq!(summary.buffers, 1);
        assert_eq!(summary.buffer_views, 1);
        assert_eq!(doc.buffers.len(), 1);
    }

    #[test]
    fn empty_leaves_are_cut_unless_kept() {
        let mut doc = scene_with_mesh();
        doc.nodes.push(Node::default()); // empty leaf
        doc.nodes[0].children.push(1);

        let mut keep = doc.clone();
        let summary = process(&mut doc, PruneOptions::default());
        assert_eq!(summary.nodes, 1);
        assert!(doc.nodes[0].children.is_empty());

        let summary = process(
            &mut keep,
            PruneOptions {
                keep_leaves: true,
                ..Default::default()
            },
        );
        assert_eq!(summary.nodes, 0);
        assert_eq!(keep.nodes.len(), 2);
    }

    #[test]
    fn leaf_with_extras_survives_keep_extras() {
        let mut doc = scene_with_mesh();
        doc.nodes.push(Node {
            extras: Some(serde_json::json!({"tag": "anchor"})),
            ..Default::default()
        });
        doc.nodes[0].children.push(1);

        let summary = process(
            &mut doc,
            PruneOptions {
                keep_extras: true,
                ..Default::default()
            },
        );
        assert_eq!(summary.nodes, 0);
        assert_eq!(doc.nodes.len(), 2);
    }

    #[test]
    fn tangent_dropped_without_normal_map() {
        let mut doc = scene_with_mesh();
        let tangent = allocate(&mut doc, 3, crate::document::TYPE_VEC4, COMPONENT_FLOAT, None);
        doc.materials.push(Material::default());
        {
            let primitive = &mut doc.meshes[0].primitives[0];
            primitive.attributes.insert("TANGENT".to_string(), tangent);
            primitive.material = Some(0);
        }

        process(&mut doc, PruneOptions::default());
        assert!(!doc.meshes[0].primitives[0].attributes.contains_key("TANGENT"));

        // With a normal map the tangent is load-bearing.
        let mut doc = scene_with_mesh();
        let tangent = allocate(&mut doc, 3, crate::document::TYPE_VEC4, COMPONENT_FLOAT, None);
        doc.textures.push(crate::document::Texture::default());
        doc.materials.push(Material {
            normal_texture: Some(NormalTextureInfo {
                index: 0,
                tex_coord: 0,
                scale: 1.0,
            }),
            ..Default::default()
        });
        {
            let primitive = &mut doc.meshes[0].primitives[0];
            primitive.attributes.insert("TANGENT".to_string(), tangent);
            primitive.material = Some(0);
        }
        process(&mut doc, PruneOptions::default());
        assert!(doc.meshes[0].primitives[0].attributes.contains_key("TANGENT"));
    }

    #[test]
    fn animation_targets_stay_alive() {
        let mut doc = scene_with_mesh();
        doc.nodes.push(Node::default()); // target of a channel, not in scene
        let times = allocate(&mut doc, 2, crate::document::TYPE_SCALAR, COMPONENT_FLOAT, None);
        let values = allocate(&mut doc, 2, TYPE_VEC3, COMPONENT_FLOAT, None);
        doc.animations.push(crate::document::Animation {
            name: None,
            channels: vec![crate::document::AnimationChannel {
                sampler: 0,
                target: crate::document::AnimationTarget {
                    node: Some(1),
                    path: "translation".to_string(),
                },
            }],
            samplers: vec![crate::document::AnimationSampler {
                input: times,
                output: values,
                interpolation: "LINEAR".to_string(),
            }],
        });

        let summary = process(&mut doc, PruneOptions::default());
        assert_eq!(summary.nodes, 0);
        assert_eq!(summary.accessors, 0);
        assert_eq!(doc.animations[0].channels[0].target.node, Some(1));
    }

    #[test]
    fn prune_is_idempotent() {
        let mut doc = scene_with_mesh();
        doc.images.push(Image::default());
        allocate(&mut doc, 1, TYPE_VEC3, COMPONENT_FLOAT, None);

        let first = process(&mut doc, PruneOptions::default());
        assert!(first.total() > 0);
        let second = process(&mut doc, PruneOptions::default());
        assert_eq!(second.total(), 0);
    }
}
