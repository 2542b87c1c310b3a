//! Document statistics and the formatted `info` report.

use crate::document::{Document, MODE_TRIANGLES, MODE_TRIANGLE_FAN, MODE_TRIANGLE_STRIP};
use crate::error::{GltfError, Result};
use crate::io;
use std::fmt::Write as _;
use std::path::Path;

/// Everything the `info` subcommand prints.
#[derive(Debug, Default, Clone)]
pub struct InfoStats {
    pub filename: String,
    pub file_size: u64,
    pub is_binary: bool,

    pub generator: Option<String>,
    pub version: String,
    pub copyright: Option<String>,

    pub scene_count: usize,
    pub default_scene: Option<usize>,
    pub node_count: usize,

    pub mesh_count: usize,
    pub primitive_count: usize,
    pub triangle_count: usize,
    pub vertex_count: usize,

    pub material_count: usize,
    pub texture_count: usize,
    pub image_count: usize,
    pub sampler_count: usize,

    pub animation_count: usize,
    pub skin_count: usize,

    pub accessor_count: usize,
    pub buffer_view_count: usize,
    pub buffer_count: usize,

    pub buffer_bytes: usize,
    pub image_bytes: usize,
    pub total_bytes: usize,
}

/// Load a file and gather its statistics.
pub fn analyze(path: &Path) -> Result<InfoStats> {
    let file_size = std::fs::metadata(path)
        .map_err(|e| GltfError::io(path, e))?
        .len();
    let (document, _warnings) = io::load(path)?;

    let mut stats = analyze_document(&document);
    stats.filename = path.display().to_string();
    stats.file_size = file_size;
    stats.is_binary = io::is_glb_path(path);
    Ok(stats)
}

/// Gather statistics for an in-memory document.
pub fn analyze_document(document: &Document) -> InfoStats {
    let mut stats = InfoStats {
        generator: document.asset.generator.clone(),
        version: document.asset.version.clone(),
        copyright: document.asset.copyright.clone(),
        scene_count: document.scenes.len(),
        default_scene: document.default_scene,
        node_count: document.nodes.len(),
        mesh_count: document.meshes.len(),
        material_count: document.materials.len(),
        texture_count: document.textures.len(),
        image_count: document.images.len(),
        sampler_count: document.samplers.len(),
        animation_count: document.animations.len(),
        skin_count: document.skins.len(),
        accessor_count: document.accessors.len(),
        buffer_view_count: document.buffer_views.len(),
        buffer_count: document.buffers.len(),
        ..Default::default()
    };

    for mesh in &document.meshes {
        stats.primitive_count += mesh.primitives.len();

        for primitive in &mesh.primitives {
            let position_count = primitive
                .attributes
                .get("POSITION")
                .and_then(|&a| document.accessors.get(a))
                .map(|a| a.count);
            if let Some(count) = position_count {
                stats.vertex_count += count;
            }

            if let Some(indices) = primitive.indices {
                if let Some(accessor) = document.accessors.get(indices) {
                    stats.triangle_count += match primitive.mode {
                        MODE_TRIANGLES => accessor.count / 3,
                        MODE_TRIANGLE_STRIP | MODE_TRIANGLE_FAN => {
                            accessor.count.saturating_sub(2)
                        }
                        _ => 0,
                    };
                }
            } else if let Some(count) = position_count {
                // Non-indexed geometry defaults to a triangle list.
                if primitive.mode == MODE_TRIANGLES {
                    stats.triangle_count += count / 3;
                }
            }
        }
    }

    stats.buffer_bytes = document.buffers.iter().map(|b| b.data.len()).sum();
    stats.image_bytes = document.images.iter().map(|i| i.data.len()).sum();
    stats.total_bytes = stats.buffer_bytes + stats.image_bytes;

    stats
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2} {}", UNITS[unit])
}

fn format_number(number: usize) -> String {
    let digits = number.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

const RULE: &str = "─────────────────────────────────────────────────────────────────";

impl InfoStats {
    /// Render the human-readable report.
    pub fn format(&self, verbose: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "┌{RULE}");
        let _ = writeln!(out, "│ FILE");
        let _ = writeln!(out, "├{RULE}");
        let _ = writeln!(out, "│ {}", self.filename);
        let _ = writeln!(
            out,
            "│ {} ({})",
            format_bytes(self.file_size),
            if self.is_binary { "GLB" } else { "GLTF" }
        );

        if self.generator.is_some() || !self.version.is_empty() {
            let _ = writeln!(out, "├{RULE}");
            let _ = writeln!(out, "│ ASSET");
            let _ = writeln!(out, "├{RULE}");
            if let Some(generator) = &self.generator {
                let _ = writeln!(out, "│ Generator:  {generator}");
            }
            if !self.version.is_empty() {
                let _ = writeln!(out, "│ Version:    {}", self.version);
            }
            if verbose {
                if let Some(copyright) = &self.copyright {
                    let _ = writeln!(out, "│ Copyright:  {copyright}");
                }
            }
        }

        let _ = writeln!(out, "├{RULE}");
        let _ = writeln!(out, "│ SCENE");
        let _ = writeln!(out, "├{RULE}");
        match self.default_scene {
            Some(default) => {
                let _ = writeln!(out, "│ Scenes:     {} (default: {default})", self.scene_count);
            }
            None => {
                let _ = writeln!(out, "│ Scenes:     {}", self.scene_count);
            }
        };
        let _ = writeln!(out, "│ Nodes:      {}", format_number(self.node_count));

        let _ = writeln!(out, "├{RULE}");
        let _ = writeln!(out, "│ MESH");
        let _ = writeln!(out, "├{RULE}");
        let _ = writeln!(out, "│ Meshes:     {}", format_number(self.mesh_count));
        let _ = writeln!(out, "│ Primitives: {}", format_number(self.primitive_count));
        let _ = writeln!(out, "│ Triangles:  {}", format_number(self.triangle_count));
        let _ = writeln!(out, "│ Vertices:   {}", format_number(self.vertex_count));

        let _ = writeln!(out, "├{RULE}");
        let _ = writeln!(out, "│ MATERIAL");
        let _ = writeln!(out, "├{RULE}");
        let _ = writeln!(out, "│ Materials:  {}", format_number(self.material_count));
        let _ = writeln!(out, "│ Textures:   {}", format_number(self.texture_count));
        let _ = writeln!(out, "│ Images:     {}", format_number(self.image_count));
        if verbose && self.sampler_count > 0 {
            let _ = writeln!(out, "│ Samplers:   {}", format_number(self.sampler_count));
        }

        if self.animation_count > 0 || self.skin_count > 0 {
            let _ = writeln!(out, "├{RULE}");
            let _ = writeln!(out, "│ ANIMATION");
            let _ = writeln!(out, "├{RULE}");
            if self.animation_count > 0 {
                let _ = writeln!(out, "│ Animations: {}", format_number(self.animation_count));
            }
            if self.skin_count > 0 {
                let _ = writeln!(out, "│ Skins:      {}", format_number(self.skin_count));
            }
        }

        if verbose {
            let _ = writeln!(out, "├{RULE}");
            let _ = writeln!(out, "│ DATA");
            let _ = writeln!(out, "├{RULE}");
            let _ = writeln!(out, "│ Accessors:    {}", format_number(self.accessor_count));
            let _ = writeln!(out, "│ Buffer Views: {}", format_number(self.buffer_view_count));
            let _ = writeln!(out, "│ Buffers:      {}", format_number(self.buffer_count));
        }

        let _ = writeln!(out, "├{RULE}");
        let _ = writeln!(out, "│ MEMORY");
        let _ = writeln!(out, "├{RULE}");
        let _ = writeln!(out, "│ Buffers:    {}", format_bytes(self.buffer_bytes as u64));
        let _ = writeln!(out, "│ Images:     {}", format_bytes(self.image_bytes as u64));
        let _ = writeln!(out, "│ Total:      {}", format_bytes(self.total_bytes as u64));
        let _ = writeln!(out, "└{RULE}");

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::{allocate, allocate_index_accessor};
    use crate::document::{
        Mesh, Primitive, COMPONENT_FLOAT, COMPONENT_UNSIGNED_SHORT, TYPE_VEC3,
    };

    #[test]
    fn counts_triangles_per_mode() {
        let mut doc = Document::new();
        let position = allocate(&mut doc, 6, TYPE_VEC3, COMPONENT_FLOAT, None);
        let indices =
            allocate_index_accessor(&mut doc, &[0, 1, 2, 3, 4, 5], COMPONENT_UNSIGNED_SHORT, None);

        let mut list = Primitive::default();
        list.attributes.insert("POSITION".to_string(), position);
        list.indices = Some(indices);

        let mut strip = list.clone();
        strip.mode = MODE_TRIANGLE_STRIP;

        doc.meshes.push(Mesh {
            primitives: vec![list, strip],
            ..Default::default()
        });

        let stats = analyze_document(&doc);
        assert_eq!(stats.primitive_count, 2);
        assert_eq!(stats.vertex_count, 12);
        // 6 indices: 2 triangles as a list, 4 as a strip.
        assert_eq!(stats.triangle_count, 2 + 4);
    }

    #[test]
    fn number_grouping() {
        assert_eq!(format_number(5), "5");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn report_includes_sections() {
        let doc = Document::new();
        let stats = analyze_document(&doc);
        let report = stats.format(true);
        for section in ["FILE", "SCENE", "MESH", "MATERIAL", "DATA", "MEMORY"] {
            assert!(report.contains(section), "missing {section}");
        }
    }
}
