//! Duplicate removal for accessors, images, textures, materials, and meshes.
//!
//! Every sub-pass has the same shape: compute a bucket key per entry, find
//! duplicates inside each bucket (first occurrence wins), rewrite references
//! through the walker, compact the table.

use crate::accessor;
use crate::document::{Document, Material, Primitive};
use crate::progress::ProgressReporter;
use crate::remap::{self, IndexMap};
use std::collections::HashMap;
use std::fmt::Write as _;
use xxhash_rust::xxh64::{xxh64, Xxh64};

/// Per-kind toggles for the dedupe pass.
pub struct DedupeOptions<'a> {
    pub accessors: bool,
    pub meshes: bool,
    pub materials: bool,
    pub textures: bool,
    /// Treat differently named entries as distinct even when content-equal.
    pub keep_unique_names: bool,
    pub progress: Option<&'a ProgressReporter>,
}

impl Default for DedupeOptions<'_> {
    fn default() -> Self {
        Self {
            accessors: true,
            meshes: true,
            materials: true,
            textures: true,
            keep_unique_names: false,
            progress: None,
        }
    }
}

/// Counts and human-readable statistics from one dedupe run.
#[derive(Debug, Default)]
pub struct DedupeSummary {
    pub accessors_merged: usize,
    pub images_merged: usize,
    pub textures_merged: usize,
    pub materials_merged: usize,
    pub meshes_merged: usize,
    pub stats: String,
}

/// Run the enabled sub-passes in order: accessors, textures (images first),
/// materials, meshes.
pub fn process(document: &mut Document, options: &DedupeOptions) -> DedupeSummary {
    let mut summary = DedupeSummary::default();

    if options.accessors {
        dedupe_accessors(document, options, &mut summary);
    }
    if options.textures {
        dedupe_textures(document, options, &mut summary);
    }
    if options.materials {
        dedupe_materials(document, options, &mut summary);
    }
    if options.meshes {
        dedupe_meshes(document, options, &mut summary);
    }

    summary
}

fn report(options: &DedupeOptions, operation: &str, message: &str, progress: f64, details: &str) {
    if let Some(reporter) = options.progress {
        reporter.report(operation, message, progress, details);
    }
}

/// Turn a `duplicate → kept` mapping into the pair of index maps the walker
/// needs: one that redirects every reference (duplicates point at the kept
/// entry's new slot) and one that drives table compaction.
fn duplicate_maps(len: usize, duplicates: &HashMap<usize, usize>) -> (IndexMap, IndexMap) {
    let mut compact: IndexMap = vec![None; len];
    let mut next = 0;
    for (old, slot) in compact.iter_mut().enumerate() {
        if !duplicates.contains_key(&old) {
            *slot = Some(next);
            next += 1;
        }
    }

    let mut references = compact.clone();
    for (&duplicate, &kept) in duplicates {
        references[duplicate] = compact[kept];
    }

    (references, compact)
}

/// Strided content hash of an accessor: one shot over tight ranges,
/// element-by-element over strided ranges.
fn accessor_content_hash(document: &Document, accessor_index: usize) -> Option<u64> {
    let view = accessor::resolve(document, accessor_index)?;
    if view.stride == view.element_size {
        return Some(xxh64(view.bytes(document), 0));
    }

    let mut state = Xxh64::new(0);
    for i in 0..view.count {
        state.update(view.element(document, i));
    }
    Some(state.digest())
}

/// Byte-exact comparison of two accessors' strided contents.
fn accessors_bytes_equal(document: &Document, a: usize, b: usize) -> bool {
    let (Some(lhs), Some(rhs)) = (
        accessor::resolve(document, a),
        accessor::resolve(document, b),
    ) else {
        return false;
    };
    if lhs.count != rhs.count || lhs.element_size != rhs.element_size {
        return false;
    }
    (0..lhs.count).all(|i| lhs.element(document, i) == rhs.element(document, i))
}

fn dedupe_accessors(document: &mut Document, options: &DedupeOptions, summary: &mut DedupeSummary) {
    let original = document.accessors.len();
    report(
        options,
        "dedupe-accessors",
        "Deduplicating accessors",
        0.0,
        &format!("{original} total"),
    );

    // Bucket by metadata, hash contents inside each bucket.
    type MetaKey = (usize, String, u32, bool, bool);
    let mut buckets: HashMap<MetaKey, Vec<usize>> = HashMap::new();
    let mut content_hashes: Vec<Option<u64>> = Vec::with_capacity(original);

    for (index, entry) in document.accessors.iter().enumerate() {
        let key = (
            entry.count,
            entry.element_type.clone(),
            entry.component_type,
            entry.normalized,
            entry.sparse.is_some(),
        );
        buckets.entry(key).or_default().push(index);
        content_hashes.push(None);
    }
    for index in 0..original {
        content_hashes[index] = accessor_content_hash(document, index);
    }

    report(
        options,
        "dedupe-accessors",
        &format!("Grouped into {} metadata buckets", buckets.len()),
        0.4,
        "",
    );

    let mut duplicates: HashMap<usize, usize> = HashMap::new();
    for indices in buckets.values() {
        if indices.len() < 2 {
            continue;
        }
        let mut first_with_hash: HashMap<u64, usize> = HashMap::new();
        for &index in indices {
            let Some(hash) = content_hashes[index] else {
                continue;
            };
            match first_with_hash.get(&hash) {
                Some(&kept) if accessors_bytes_equal(document, kept, index) => {
                    duplicates.insert(index, kept);
                }
                Some(_) => {} // hash collision, contents differ
                None => {
                    first_with_hash.insert(hash, index);
                }
            }
        }
    }

    report(
        options,
        "dedupe-accessors",
        &format!("Found {} duplicates", duplicates.len()),
        0.8,
        "",
    );
    if duplicates.is_empty() {
        return;
    }

    let (references, compact) = duplicate_maps(original, &duplicates);
    remap::remap_accessors(document, &references);
    document.accessors = remap::compact_table(std::mem::take(&mut document.accessors), &compact);

    summary.accessors_merged = duplicates.len();
    let _ = writeln!(
        summary.stats,
        "Accessors: Merged {} of {} ({} remaining)",
        duplicates.len(),
        original,
        document.accessors.len()
    );
}

/// Deterministic textual key over every scalar and reference field of a
/// material.
fn material_key(material: &Material) -> String {
    let mut key = String::new();
    if let Some(pbr) = &material.pbr_metallic_roughness {
        for v in pbr.base_color_factor {
            let _ = write!(key, "{v};");
        }
        let _ = write!(
            key,
            "bct:{:?};{};{};mrt:{:?};",
            pbr.base_color_texture
                .as_ref()
                .map(|t| (t.index, t.tex_coord)),
            pbr.metallic_factor,
            pbr.roughness_factor,
            pbr.metallic_roughness_texture
                .as_ref()
                .map(|t| (t.index, t.tex_coord)),
        );
    } else {
        key.push_str("nopbr;");
    }
    let _ = write!(
        key,
        "nrm:{:?};",
        material
            .normal_texture
            .as_ref()
            .map(|t| (t.index, t.tex_coord, t.scale.to_bits()))
    );
    let _ = write!(
        key,
        "occ:{:?};",
        material
            .occlusion_texture
            .as_ref()
            .map(|t| (t.index, t.tex_coord, t.strength.to_bits()))
    );
    let _ = write!(
        key,
        "emt:{:?};",
        material
            .emissive_texture
            .as_ref()
            .map(|t| (t.index, t.tex_coord))
    );
    for v in material.emissive_factor {
        let _ = write!(key, "{v};");
    }
    let _ = write!(
        key,
        "{};{};{};",
        material.alpha_mode, material.alpha_cutoff, material.double_sided
    );
    for name in material.extensions.keys() {
        let _ = write!(key, "ext:{name};");
    }
    let _ = write!(key, "extras:{};", material.extras.is_some());
    key
}

fn dedupe_materials(document: &mut Document, options: &DedupeOptions, summary: &mut DedupeSummary) {
    let original = document.materials.len();
    report(
        options,
        "dedupe-materials",
        "Deduplicating materials",
        0.0,
        &format!("{original} total"),
    );

    let mut first_with_key: HashMap<String, usize> = HashMap::new();
    let mut duplicates: HashMap<usize, usize> = HashMap::new();

    for (index, material) in document.materials.iter().enumerate() {
        let mut key = material_key(material);
        if options.keep_unique_names {
            if let Some(name) = &material.name {
                key = format!("{name};{key}");
            }
        }
        match first_with_key.get(&key) {
            Some(&kept) => {
                duplicates.insert(index, kept);
            }
            None => {
                first_with_key.insert(key, index);
            }
        }
    }

    if duplicates.is_empty() {
        return;
    }

    let (references, compact) = duplicate_maps(original, &duplicates);
    remap::remap_materials(document, &references);
    document.materials = remap::compact_table(std::mem::take(&mut document.materials), &compact);

    summary.materials_merged = duplicates.len();
    let _ = writeln!(
        summary.stats,
        "Materials: Merged {} of {} ({} remaining)",
        duplicates.len(),
        original,
        document.materials.len()
    );
}

/// Structural key of one primitive: mode, material, indices, sorted
/// attributes, sorted morph-target maps.
fn primitive_key(key: &mut String, primitive: &Primitive) {
    let _ = write!(
        key,
        "mode:{};material:{:?};indices:{:?};",
        primitive.mode, primitive.material, primitive.indices
    );
    for (semantic, index) in &primitive.attributes {
        let _ = write!(key, "{semantic}:{index};");
    }
    for target in primitive.morph_targets() {
        key.push_str("target:[");
        for (semantic, index) in target {
            let _ = write!(key, "{semantic}:{index};");
        }
        key.push(']');
    }
    key.push('|');
}

fn dedupe_meshes(document: &mut Document, options: &DedupeOptions, summary: &mut DedupeSummary) {
    let original = document.meshes.len();
    report(
        options,
        "dedupe-meshes",
        "Deduplicating meshes",
        0.0,
        &format!("{original} total"),
    );

    let mut first_with_key: HashMap<String, usize> = HashMap::new();
    let mut duplicates: HashMap<usize, usize> = HashMap::new();

    for (index, mesh) in document.meshes.iter().enumerate() {
        let mut key = String::new();
        if options.keep_unique_names {
            if let Some(name) = &mesh.name {
                let _ = write!(key, "{name};");
            }
        }
        for primitive in &mesh.primitives {
            primitive_key(&mut key, primitive);
        }
        match first_with_key.get(&key) {
            Some(&kept) => {
                duplicates.insert(index, kept);
            }
            None => {
                first_with_key.insert(key, index);
            }
        }
    }

    if duplicates.is_empty() {
        return;
    }

    let (references, compact) = duplicate_maps(original, &duplicates);
    remap::remap_meshes(document, &references);
    document.meshes = remap::compact_table(std::mem::take(&mut document.meshes), &compact);

    summary.meshes_merged = duplicates.len();
    let _ = writeln!(
        summary.stats,
        "Meshes: Merged {} of {} ({} remaining)",
        duplicates.len(),
        original,
        document.meshes.len()
    );
}

fn dedupe_textures(document: &mut Document, options: &DedupeOptions, summary: &mut DedupeSummary) {
    let original_images = document.images.len();
    let original_textures = document.textures.len();
    report(
        options,
        "dedupe-textures",
        "Deduplicating images",
        0.0,
        &format!("{original_images} total"),
    );

    // Images first: bucket on pixel metadata + content hash, confirm with a
    // byte-exact comparison against the bucket's first occurrence.
    type ImageKey = (Option<String>, Option<String>, u32, u32, u32, u32, usize, u64);
    let mut first_with_key: HashMap<ImageKey, usize> = HashMap::new();
    let mut image_duplicates: HashMap<usize, usize> = HashMap::new();

    for (index, image) in document.images.iter().enumerate() {
        let key: ImageKey = (
            options
                .keep_unique_names
                .then(|| image.name.clone())
                .flatten(),
            image.mime_type.clone(),
            image.width,
            image.height,
            image.component,
            image.bits,
            image.data.len(),
            xxh64(&image.data, 0),
        );
        match first_with_key.get(&key) {
            Some(&kept) if document.images[kept].data == image.data => {
                image_duplicates.insert(index, kept);
            }
            Some(_) => {}
            None => {
                first_with_key.insert(key, index);
            }
        }
    }

    if !image_duplicates.is_empty() {
        let (references, compact) = duplicate_maps(original_images, &image_duplicates);
        remap::remap_images(document, &references);
        document.images = remap::compact_table(std::mem::take(&mut document.images), &compact);
    }

    // Textures second, now that their sources are canonical.
    report(
        options,
        "dedupe-textures",
        "Deduplicating textures",
        0.5,
        &format!("{original_textures} total"),
    );

    type TextureKey = (Option<String>, Option<usize>, Option<usize>);
    let mut first_texture: HashMap<TextureKey, usize> = HashMap::new();
    let mut texture_duplicates: HashMap<usize, usize> = HashMap::new();

    for (index, texture) in document.textures.iter().enumerate() {
        let key: TextureKey = (
            options
                .keep_unique_names
                .then(|| texture.name.clone())
                .flatten(),
            texture.source,
            texture.sampler,
        );
        match first_texture.get(&key) {
            Some(&kept) => {
                texture_duplicates.insert(index, kept);
            }
            None => {
                first_texture.insert(key, index);
            }
        }
    }

    if !texture_duplicates.is_empty() {
        let (references, compact) = duplicate_maps(original_textures, &texture_duplicates);
        remap::remap_textures(document, &references);
        document.textures = remap::compact_table(std::mem::take(&mut document.textures), &compact);
    }

    summary.images_merged = image_duplicates.len();
    summary.textures_merged = texture_duplicates.len();
    if !image_duplicates.is_empty() || !texture_duplicates.is_empty() {
        let _ = writeln!(
            summary.stats,
            "Images: Merged {} of {} ({} remaining)",
            image_duplicates.len(),
            original_images,
            document.images.len()
        );
        let _ = writeln!(
            summary.stats,
            "Textures: Merged {} of {} ({} remaining)",
            texture_duplicates.len(),
            original_textures,
            document.textures.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::allocate;
    use crate::document::{
        Image, Mesh, PbrMetallicRoughness, Texture, TextureInfo, COMPONENT_FLOAT, TYPE_VEC3,
    };

    fn push_positions(doc: &mut Document, positions: &[[f32; 3]]) -> usize {
        let index = allocate(doc, positions.len(), TYPE_VEC3, COMPONENT_FLOAT, None);
        let view = accessor::resolve(doc, index).unwrap();
        for (i, p) in positions.iter().enumerate() {
            view.element_mut(doc, i)
                .copy_from_slice(bytemuck::cast_slice(p));
        }
        index
    }

    #[test]
    fn identical_accessors_collapse_to_one() {
        let mut doc = Document::new();
        let positions = vec![[1.0f32, 2.0, 3.0]; 100];
        let a = push_positions(&mut doc, &positions);
        let b = push_positions(&mut doc, &positions);

        for accessor_index in [a, b] {
            let mut primitive = Primitive::default();
            primitive
                .attributes
                .insert("POSITION".to_string(), accessor_index);
            doc.meshes.push(Mesh {
                primitives: vec![primitive],
                ..Default::default()
            });
        }

        let summary = process(&mut doc, &DedupeOptions::default());
        assert_eq!(summary.accessors_merged, 1);
        assert_eq!(doc.accessors.len(), 1);
        for mesh in &doc.meshes {
            assert_eq!(mesh.primitives[0].attributes["POSITION"], 0);
        }
    }

    #[test]
    fn differing_contents_survive() {
        let mut doc = Document::new();
        push_positions(&mut doc, &[[1.0, 2.0, 3.0]]);
        push_positions(&mut doc, &[[1.0, 2.0, 4.0]]);

        let summary = process(&mut doc, &DedupeOptions::default());
        assert_eq!(summary.accessors_merged, 0);
        assert_eq!(doc.accessors.len(), 2);
    }

    #[test]
    fn equal_materials_merge_and_primitives_follow() {
        let mut doc = Document::new();
        for _ in 0..2 {
            doc.materials.push(Material {
                pbr_metallic_roughness: Some(PbrMetallicRoughness::default()),
                ..Default::default()
            });
        }
        let mut primitive = Primitive {
            material: Some(1),
            ..Default::default()
        };
        primitive.attributes.insert("POSITION".to_string(), 0);
        push_positions(&mut doc, &[[0.0; 3]]);
        doc.meshes.push(Mesh {
            primitives: vec![primitive],
            ..Default::default()
        });

        let summary = process(&mut doc, &DedupeOptions::default());
        assert_eq!(summary.materials_merged, 1);
        assert_eq!(doc.materials.len(), 1);
        assert_eq!(doc.meshes[0].primitives[0].material, Some(0));
    }

    #[test]
    fn keep_unique_names_blocks_material_merge() {
        let mut doc = Document::new();
        for name in ["left", "right"] {
            doc.materials.push(Material {
                name: Some(name.to_string()),
                ..Default::default()
            });
        }
        let options = DedupeOptions {
            keep_unique_names: true,
            ..Default::default()
        };
        let summary = process(&mut doc, &options);
        assert_eq!(summary.materials_merged, 0);
        assert_eq!(doc.materials.len(), 2);
    }

    #[test]
    fn image_then_texture_dedupe_chains() {
        let mut doc = Document::new();
        for _ in 0..2 {
            doc.images.push(Image {
                mime_type: Some("image/png".to_string()),
                data: vec![7, 7, 7, 7],
                ..Default::default()
            });
        }
        doc.textures.push(Texture {
            source: Some(0),
            ..Default::default()
        });
        doc.textures.push(Texture {
            source: Some(1),
            ..Default::default()
        });
        doc.materials.push(Material {
            pbr_metallic_roughness: Some(PbrMetallicRoughness {
                base_color_texture: Some(TextureInfo {
                    index: 1,
                    tex_coord: 0,
                }),
                ..Default::default()
            }),
            ..Default::default()
        });

        let summary = process(&mut doc, &DedupeOptions::default());
        assert_eq!(summary.images_merged, 1);
        assert_eq!(summary.textures_merged, 1);
        assert_eq!(doc.images.len(), 1);
        assert_eq!(doc.textures.len(), 1);

        let pbr = doc.materials[0].pbr_metallic_roughness.as_ref().unwrap();
        assert_eq!(pbr.base_color_texture.as_ref().unwrap().index, 0);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let mut doc = Document::new();
        let positions = vec![[5.0f32, 5.0, 5.0]; 10];
        push_positions(&mut doc, &positions);
        push_positions(&mut doc, &positions);

        let first = process(&mut doc, &DedupeOptions::default());
        assert_eq!(first.accessors_merged, 1);
        let second = process(&mut doc, &DedupeOptions::default());
        assert_eq!(second.accessors_merged, 0);
        assert_eq!(doc.accessors.len(), 1);
    }
}
