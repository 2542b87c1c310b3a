//! Streaming concatenation of documents.
//!
//! Inputs are merged one at a time: the accumulator owns a single growing
//! buffer, every appended table entry has its cross-table indices shifted by
//! the pre-append table sizes, and buffer views are relocated into the
//! merged buffer. Source documents are consumed, not copied.

use crate::document::{Document, Scene};
use crate::error::Result;
use crate::io::{self, StoreOptions};
use std::path::Path;

/// Pre-append sizes of every index-targeted table.
#[derive(Debug, Default, Clone, Copy)]
struct MergeOffsets {
    nodes: usize,
    meshes: usize,
    materials: usize,
    textures: usize,
    images: usize,
    samplers: usize,
    accessors: usize,
    buffer_views: usize,
    skins: usize,
    cameras: usize,
}

/// Accumulating merger. Feed it documents, then take the merged result.
#[derive(Default)]
pub struct Merger {
    merged: Document,
    first: bool,
}

impl Merger {
    pub fn new() -> Self {
        Self {
            merged: Document::new(),
            first: true,
        }
    }

    /// Load a file and merge it into the accumulator. Returns loader
    /// warnings. On error the accumulator may be partially populated and
    /// must be discarded.
    pub fn load_and_merge_file(
        &mut self,
        path: &Path,
        keep_scenes: bool,
        default_scene_only: bool,
    ) -> Result<Vec<String>> {
        let (mut document, warnings) = io::load(path)?;
        // Merged output is inline-only; external URIs died at load.
        for buffer in &mut document.buffers {
            buffer.uri = None;
        }
        self.merge_document(document, keep_scenes, default_scene_only);
        Ok(warnings)
    }

    /// Merge an in-memory document into the accumulator.
    pub fn merge_document(
        &mut self,
        mut source: Document,
        keep_scenes: bool,
        default_scene_only: bool,
    ) {
        if self.first {
            self.merged.asset = source.asset.clone();
            self.merged
                .buffers
                .push(crate::document::Buffer::from_data(Vec::new()));
            self.merged.buffers[0].name = Some("merged_buffer".to_string());
            self.first = false;
        }
        for name in &source.extensions_used {
            self.merged.add_extension_used(name);
        }
        for name in &source.extensions_required {
            self.merged.add_extension_required(name);
        }

        let offsets = MergeOffsets {
            nodes: self.merged.nodes.len(),
            meshes: self.merged.meshes.len(),
            materials: self.merged.materials.len(),
            textures: self.merged.textures.len(),
            images: self.merged.images.len(),
            samplers: self.merged.samplers.len(),
            accessors: self.merged.accessors.len(),
            buffer_views: self.merged.buffer_views.len(),
            skins: self.merged.skins.len(),
            cameras: self.merged.cameras.len(),
        };

        // Relocate buffer bytes: per-source-buffer offsets into the merged
        // buffer are a running sum on top of its current size.
        let merged_base = self.merged.buffers[0].data.len();
        let mut source_offsets = Vec::with_capacity(source.buffers.len());
        let mut running = 0;
        for buffer in &source.buffers {
            source_offsets.push(running);
            running += buffer.data.len();
        }
        self.merged.buffers[0].data.reserve(running);
        for buffer in &mut source.buffers {
            self.merged
                .buffers[0]
                .data
                .append(&mut buffer.data);
        }
        self.merged.buffers[0].byte_length = self.merged.buffers[0].data.len();

        for mut view in source.buffer_views.drain(..) {
            let source_base = source_offsets.get(view.buffer).copied().unwrap_or(0);
            view.buffer = 0;
            view.byte_offset += merged_base + source_base;
            self.merged.buffer_views.push(view);
        }

        let appended_nodes = source.nodes.len();
        let appended_meshes = source.meshes.len();
        let appended_materials = source.materials.len();
        let appended_textures = source.textures.len();
        let appended_images = source.images.len();
        let appended_accessors = source.accessors.len();
        let appended_animations = source.animations.len();
        let appended_skins = source.skins.len();

        self.merged.accessors.append(&mut source.accessors);
        self.merged.samplers.append(&mut source.samplers);
        self.merged.images.append(&mut source.images);
        self.merged.textures.append(&mut source.textures);
        self.merged.materials.append(&mut source.materials);
        self.merged.meshes.append(&mut source.meshes);
        self.merged.skins.append(&mut source.skins);
        self.merged.cameras.append(&mut source.cameras);
        self.merged.nodes.append(&mut source.nodes);
        self.merged.animations.append(&mut source.animations);

        self.shift_appended(
            offsets,
            appended_nodes,
            appended_meshes,
            appended_materials,
            appended_textures,
            appended_images,
            appended_accessors,
            appended_animations,
            appended_skins,
        );

        self.merge_scenes(&source.scenes, source.default_scene, offsets.nodes, keep_scenes, default_scene_only);
    }

    /// Shift every inter-table index inside the just-appended table tails.
    #[allow(clippy::too_many_arguments)]
    fn shift_appended(
        &mut self,
        offsets: MergeOffsets,
        nodes: usize,
        meshes: usize,
        materials: usize,
        textures: usize,
        images: usize,
        accessors: usize,
        animations: usize,
        skins: usize,
    ) {
        let merged = &mut self.merged;

        let node_start = merged.nodes.len() - nodes;
        for node in &mut merged.nodes[node_start..] {
            for child in &mut node.children {
                *child += offsets.nodes;
            }
            shift(&mut node.mesh, offsets.meshes);
            shift(&mut node.skin, offsets.skins);
            shift(&mut node.camera, offsets.cameras);
        }

        let mesh_start = merged.meshes.len() - meshes;
        for mesh in &mut merged.meshes[mesh_start..] {
            for primitive in &mut mesh.primitives {
                shift(&mut primitive.material, offsets.materials);
                shift(&mut primitive.indices, offsets.accessors);
                for index in primitive.attributes.values_mut() {
                    *index += offsets.accessors;
                }
                if let Some(targets) = &mut primitive.targets {
                    for target in targets {
                        for index in target.values_mut() {
                            *index += offsets.accessors;
                        }
                    }
                }
                if let Some(view) = primitive.draco_buffer_view() {
                    primitive.set_draco_buffer_view(view + offsets.buffer_views);
                }
            }
        }

        let material_start = merged.materials.len() - materials;
        for material in &mut merged.materials[material_start..] {
            if let Some(pbr) = &mut material.pbr_metallic_roughness {
                if let Some(info) = &mut pbr.base_color_texture {
                    info.index += offsets.textures;
                }
                if let Some(info) = &mut pbr.metallic_roughness_texture {
                    info.index += offsets.textures;
                }
            }
            if let Some(info) = &mut material.normal_texture {
                info.index += offsets.textures;
            }
            if let Some(info) = &mut material.occlusion_texture {
                info.index += offsets.textures;
            }
            if let Some(info) = &mut material.emissive_texture {
                info.index += offsets.textures;
            }
        }

        let texture_start = merged.textures.len() - textures;
        for texture in &mut merged.textures[texture_start..] {
            shift(&mut texture.source, offsets.images);
            shift(&mut texture.sampler, offsets.samplers);
        }

        let image_start = merged.images.len() - images;
        for image in &mut merged.images[image_start..] {
            shift(&mut image.buffer_view, offsets.buffer_views);
        }

        let accessor_start = merged.accessors.len() - accessors;
        for accessor in &mut merged.accessors[accessor_start..] {
            shift(&mut accessor.buffer_view, offsets.buffer_views);
        }

        let animation_start = merged.animations.len() - animations;
        for animation in &mut merged.animations[animation_start..] {
            for sampler in &mut animation.samplers {
                sampler.input += offsets.accessors;
                sampler.output += offsets.accessors;
            }
            for channel in &mut animation.channels {
                shift(&mut channel.target.node, offsets.nodes);
            }
        }

        let skin_start = merged.skins.len() - skins;
        for skin in &mut merged.skins[skin_start..] {
            shift(&mut skin.inverse_bind_matrices, offsets.accessors);
            shift(&mut skin.skeleton, offsets.nodes);
            for joint in &mut skin.joints {
                *joint += offsets.nodes;
            }
        }
    }

    fn merge_scenes(
        &mut self,
        scenes: &[Scene],
        default_scene: Option<usize>,
        node_offset: usize,
        keep_scenes: bool,
        default_scene_only: bool,
    ) {
        if keep_scenes {
            let selected: Vec<&Scene> = if default_scene_only {
                let index = default_scene.unwrap_or(0);
                scenes.get(index).into_iter().collect()
            } else {
                scenes.iter().collect()
            };

            for scene in selected {
                let mut appended = scene.clone();
                for root in &mut appended.nodes {
                    *root += node_offset;
                }
                self.merged.scenes.push(appended);
            }

            if self.merged.default_scene.is_none() && !self.merged.scenes.is_empty() {
                self.merged.default_scene = Some(0);
            }
            return;
        }

        if self.merged.scenes.is_empty() {
            self.merged.scenes.push(Scene {
                name: Some("Merged Scene".to_string()),
                nodes: Vec::new(),
            });
            self.merged.default_scene = Some(0);
        }

        let selected: Vec<&Scene> = if default_scene_only {
            let index = default_scene.unwrap_or(0);
            scenes.get(index).into_iter().collect()
        } else {
            scenes.iter().collect()
        };

        for scene in selected {
            for &root in &scene.nodes {
                self.merged.scenes[0].nodes.push(root + node_offset);
            }
        }
    }

    /// Borrow the accumulated document.
    pub fn document(&self) -> &Document {
        &self.merged
    }

    /// Take the accumulated document.
    pub fn into_document(self) -> Document {
        self.merged
    }

    /// Write the accumulated document out.
    pub fn save(&self, path: &Path, options: StoreOptions) -> Result<()> {
        io::store(&self.merged, path, options)
    }
}

fn shift(slot: &mut Option<usize>, offset: usize) {
    if let Some(index) = slot {
        *index += offset;
    }
}
