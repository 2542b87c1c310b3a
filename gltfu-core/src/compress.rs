//! Mesh compression: drive an external encoder and splice its output back.
//!
//! The pass owns everything except the codec itself: it streams each
//! primitive's attributes and faces into an encoder-input mesh, picks the
//! connectivity method, splices the opaque bytes into one new buffer with a
//! view per primitive, attaches the `KHR_draco_mesh_compression` extension
//! object, and detaches the now-redundant accessor buffer views. The codec
//! is a [`MeshEncoder`] implementation linked in by the caller.

use crate::accessor;
use crate::bounds;
use crate::document::{
    Buffer, BufferView, Document, DRACO_EXTENSION, MODE_TRIANGLES,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Options for the compress pass.
#[derive(Debug, Clone, Copy)]
pub struct CompressOptions {
    pub position_quantization_bits: u32,
    pub normal_quantization_bits: u32,
    pub tex_coord_quantization_bits: u32,
    pub color_quantization_bits: u32,
    pub generic_quantization_bits: u32,
    /// 0 = slowest/best, 10 = fastest/worst.
    pub encoding_speed: u32,
    pub decoding_speed: u32,
    /// Prefer edgebreaker connectivity encoding where legal.
    pub use_edgebreaker: bool,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            position_quantization_bits: 14,
            normal_quantization_bits: 10,
            tex_coord_quantization_bits: 12,
            color_quantization_bits: 8,
            generic_quantization_bits: 8,
            encoding_speed: 5,
            decoding_speed: 5,
            use_edgebreaker: true,
        }
    }
}

/// Canonical attribute kinds the encoder distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Position,
    Normal,
    TexCoord,
    Color,
    Generic,
}

impl AttributeKind {
    fn for_semantic(semantic: &str) -> Self {
        if semantic == "POSITION" {
            Self::Position
        } else if semantic == "NORMAL" {
            Self::Normal
        } else if semantic.starts_with("TEXCOORD_") {
            Self::TexCoord
        } else if semantic.starts_with("COLOR_") {
            Self::Color
        } else {
            Self::Generic
        }
    }
}

/// One attribute stream of an encoder-input mesh, tightly packed.
#[derive(Debug, Clone)]
pub struct EncoderAttribute {
    pub semantic: String,
    pub kind: AttributeKind,
    pub components: usize,
    pub component_type: u32,
    pub normalized: bool,
    pub data: Vec<u8>,
}

/// Encoder-input mesh: faces plus per-vertex attribute streams.
#[derive(Debug, Clone)]
pub struct EncoderMesh {
    pub vertex_count: usize,
    pub faces: Vec<[u32; 3]>,
    pub attributes: Vec<EncoderAttribute>,
}

/// Connectivity encoding method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingMethod {
    Sequential,
    Edgebreaker,
}

/// Result of encoding one primitive.
#[derive(Debug, Clone)]
pub struct EncodedPrimitive {
    pub bytes: Vec<u8>,
    /// Encoder-assigned id per original semantic name.
    pub attribute_ids: BTreeMap<String, i64>,
}

/// The external mesh codec. Implementations wrap a real Draco encoder; tests
/// use a stub.
pub trait MeshEncoder {
    fn encode(
        &mut self,
        mesh: &EncoderMesh,
        options: &CompressOptions,
        method: EncodingMethod,
    ) -> Result<EncodedPrimitive, String>;
}

/// Counts from one compress run.
#[derive(Debug, Default, Clone)]
pub struct CompressSummary {
    pub compressed: usize,
    pub skipped: usize,
    pub original_bytes: usize,
    pub compressed_bytes: usize,
}

struct PrimitiveRecord {
    mesh: usize,
    primitive: usize,
    offset: usize,
    length: usize,
    attribute_ids: BTreeMap<String, i64>,
}

/// Compress every suitable primitive, returning counts.
///
/// Fails only when no primitive could be compressed at all; individual
/// encoder failures skip the offending primitive.
pub fn process(
    document: &mut Document,
    options: &CompressOptions,
    encoder: &mut dyn MeshEncoder,
) -> crate::error::Result<CompressSummary> {
    let mut summary = CompressSummary::default();
    let mut compressed_data: Vec<u8> = Vec::new();
    let mut records: Vec<PrimitiveRecord> = Vec::new();

    for mesh_index in 0..document.meshes.len() {
        for primitive_index in 0..document.meshes[mesh_index].primitives.len() {
            let original = primitive_byte_length(document, mesh_index, primitive_index);

            let Some(encoder_mesh) = build_encoder_mesh(document, mesh_index, primitive_index)
            else {
                summary.skipped += 1;
                continue;
            };

            let has_morph_targets = !document.meshes[mesh_index].primitives[primitive_index]
                .morph_targets()
                .is_empty();
            let method = if !options.use_edgebreaker || has_morph_targets {
                EncodingMethod::Sequential
            } else {
                EncodingMethod::Edgebreaker
            };

            let encoded = match encoder.encode(&encoder_mesh, options, method) {
                Ok(encoded) => encoded,
                Err(reason) => {
                    debug!(mesh = mesh_index, primitive = primitive_index, %reason, "encoder failed, skipping primitive");
                    summary.skipped += 1;
                    continue;
                }
            };

            let offset = compressed_data.len();
            compressed_data.extend_from_slice(&encoded.bytes);

            records.push(PrimitiveRecord {
                mesh: mesh_index,
                primitive: primitive_index,
                offset,
                length: encoded.bytes.len(),
                attribute_ids: encoded.attribute_ids,
            });
            summary.compressed += 1;
            summary.original_bytes += original;
            summary.compressed_bytes += encoded.bytes.len();
        }
    }

    if records.is_empty() {
        return Err(crate::error::GltfError::pass_failed(
            "compress",
            format!("no primitives suitable for compression ({} skipped)", summary.skipped),
        ));
    }

    // One buffer holds every compressed stream; one view per record.
    document.buffers.push(Buffer::from_data(compressed_data));
    let buffer_index = document.buffers.len() - 1;

    for record in &records {
        document.buffer_views.push(BufferView {
            buffer: buffer_index,
            byte_offset: record.offset,
            byte_length: record.length,
            byte_stride: None,
            target: None,
            name: None,
        });
        let view_index = document.buffer_views.len() - 1;

        let attribute_map: Value = record
            .attribute_ids
            .iter()
            .map(|(semantic, &id)| (semantic.clone(), json!(id)))
            .collect::<serde_json::Map<String, Value>>()
            .into();
        document.meshes[record.mesh].primitives[record.primitive]
            .extensions
            .insert(
                DRACO_EXTENSION.to_string(),
                json!({ "bufferView": view_index, "attributes": attribute_map }),
            );

        // Decoders read position bounds off the accessor even though its
        // buffer view is about to disappear.
        if let Some(&position) =
            document.meshes[record.mesh].primitives[record.primitive]
                .attributes
                .get("POSITION")
        {
            if document
                .accessors
                .get(position)
                .is_some_and(|a| a.min_values.is_none())
            {
                bounds::compute_accessor_bounds(document, position);
            }
        }

        let primitive = document.meshes[record.mesh].primitives[record.primitive].clone();
        for &attribute in primitive.attributes.values() {
            if let Some(entry) = document.accessors.get_mut(attribute) {
                entry.buffer_view = None;
                entry.byte_offset = 0;
            }
        }
        if let Some(indices) = primitive.indices {
            if let Some(entry) = document.accessors.get_mut(indices) {
                entry.buffer_view = None;
                entry.byte_offset = 0;
            }
        }
    }

    document.add_extension_used(DRACO_EXTENSION);
    document.add_extension_required(DRACO_EXTENSION);

    Ok(summary)
}

/// Total bytes currently referenced by a primitive's accessors, for the
/// compression ratio report.
fn primitive_byte_length(document: &Document, mesh_index: usize, primitive_index: usize) -> usize {
    let primitive = &document.meshes[mesh_index].primitives[primitive_index];
    let view_length = |accessor_index: usize| -> usize {
        document
            .accessors
            .get(accessor_index)
            .and_then(|a| a.buffer_view)
            .and_then(|v| document.buffer_views.get(v))
            .map(|v| v.byte_length)
            .unwrap_or(0)
    };

    let mut total = 0;
    for &attribute in primitive.attributes.values() {
        total += view_length(attribute);
    }
    if let Some(indices) = primitive.indices {
        total += view_length(indices);
    }
    total
}

/// Stream a primitive's faces and attributes into an encoder-input mesh.
/// Absent for primitives the encoder cannot take: non-triangles, non-indexed
/// geometry, or geometry without positions.
fn build_encoder_mesh(
    document: &Document,
    mesh_index: usize,
    primitive_index: usize,
) -> Option<EncoderMesh> {
    let primitive = &document.meshes[mesh_index].primitives[primitive_index];
    if primitive.mode != MODE_TRIANGLES {
        return None;
    }
    let indices_accessor = primitive.indices?;
    let &position = primitive.attributes.get("POSITION")?;
    let vertex_count = accessor::resolve(document, position)?.count;
    if vertex_count == 0 {
        return None;
    }

    let indices = accessor::read_index_accessor(document, indices_accessor)?;
    if indices.len() % 3 != 0 {
        return None;
    }
    let faces = indices
        .chunks_exact(3)
        .map(|face| [face[0], face[1], face[2]])
        .collect();

    let mut attributes = Vec::with_capacity(primitive.attributes.len());
    for (semantic, &accessor_index) in &primitive.attributes {
        let Some(view) = accessor::resolve(document, accessor_index) else {
            continue;
        };
        let entry = &document.accessors[accessor_index];

        let mut data = Vec::with_capacity(view.count * view.element_size);
        for i in 0..view.count {
            data.extend_from_slice(view.element(document, i));
        }

        attributes.push(EncoderAttribute {
            semantic: semantic.clone(),
            kind: AttributeKind::for_semantic(semantic),
            components: crate::document::component_count(&entry.element_type),
            component_type: entry.component_type,
            normalized: entry.normalized,
            data,
        });
    }

    Some(EncoderMesh {
        vertex_count,
        faces,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{
        Mesh, Primitive, COMPONENT_FLOAT, COMPONENT_UNSIGNED_SHORT, TARGET_ARRAY_BUFFER,
        TARGET_ELEMENT_ARRAY_BUFFER, TYPE_VEC3,
    };

    /// Deterministic stand-in for the real codec.
    struct StubEncoder {
        fail: bool,
        seen_methods: Vec<EncodingMethod>,
    }

    impl StubEncoder {
        fn new() -> Self {
            Self {
                fail: false,
                seen_methods: Vec::new(),
            }
        }
    }

    impl MeshEncoder for StubEncoder {
        fn encode(
            &mut self,
            mesh: &EncoderMesh,
            _options: &CompressOptions,
            method: EncodingMethod,
        ) -> Result<EncodedPrimitive, String> {
            self.seen_methods.push(method);
            if self.fail {
                return Err("stub failure".to_string());
            }
            let attribute_ids = mesh
                .attributes
                .iter()
                .enumerate()
                .map(|(id, attribute)| (attribute.semantic.clone(), id as i64))
                .collect();
            Ok(EncodedPrimitive {
                bytes: vec![0xC0; 16 + mesh.faces.len()],
                attribute_ids,
            })
        }
    }

    fn triangle_document() -> Document {
        let mut doc = Document::new();
        let positions = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let position_accessor = accessor::allocate(
            &mut doc,
            3,
            TYPE_VEC3,
            COMPONENT_FLOAT,
            Some(TARGET_ARRAY_BUFFER),
        );
        let view = accessor::resolve(&doc, position_accessor).unwrap();
        for (i, p) in positions.iter().enumerate() {
            view.element_mut(&mut doc, i)
                .copy_from_slice(bytemuck::cast_slice(p));
        }
        let index_accessor = accessor::allocate_index_accessor(
            &mut doc,
            &[0, 1, 2],
            COMPONENT_UNSIGNED_SHORT,
            Some(TARGET_ELEMENT_ARRAY_BUFFER),
        );

        let mut primitive = Primitive::default();
        primitive
            .attributes
            .insert("POSITION".to_string(), position_accessor);
        primitive.indices = Some(index_accessor);
        doc.meshes.push(Mesh {
            primitives: vec![primitive],
            ..Default::default()
        });
        doc
    }

    #[test]
    fn compressed_primitive_carries_extension_and_detached_accessors() {
        let mut doc = triangle_document();
        let mut encoder = StubEncoder::new();

        let summary = process(&mut doc, &CompressOptions::default(), &mut encoder).unwrap();
        assert_eq!(summary.compressed, 1);
        assert!(summary.compressed_bytes > 0);

        let primitive = &doc.meshes[0].primitives[0];
        let draco = primitive.extensions.get(DRACO_EXTENSION).unwrap();
        let view_index = draco["bufferView"].as_u64().unwrap() as usize;
        assert_eq!(draco["attributes"]["POSITION"], 0);

        // The view points into the appended compression buffer.
        let view = &doc.buffer_views[view_index];
        assert_eq!(view.buffer, doc.buffers.len() - 1);
        assert_eq!(view.byte_length, doc.buffers[view.buffer].data.len());

        // Attribute and index accessors dropped their views but kept bounds.
        let position = primitive.attributes["POSITION"];
        assert!(doc.accessors[position].buffer_view.is_none());
        assert_eq!(doc.accessors[position].min_values.as_deref(), Some(&[0.0, 0.0, 0.0][..]));
        assert!(doc.accessors[primitive.indices.unwrap()].buffer_view.is_none());

        assert!(doc.extensions_used.iter().any(|e| e == DRACO_EXTENSION));
        assert!(doc.extensions_required.iter().any(|e| e == DRACO_EXTENSION));
    }

    #[test]
    fn edgebreaker_unless_disabled_or_morphed() {
        let mut doc = triangle_document();
        let mut encoder = StubEncoder::new();
        process(&mut doc, &CompressOptions::default(), &mut encoder).unwrap();
        assert_eq!(encoder.seen_methods, vec![EncodingMethod::Edgebreaker]);

        let mut doc = triangle_document();
        let mut encoder = StubEncoder::new();
        let options = CompressOptions {
            use_edgebreaker: false,
            ..Default::default()
        };
        process(&mut doc, &options, &mut encoder).unwrap();
        assert_eq!(encoder.seen_methods, vec![EncodingMethod::Sequential]);

        let mut doc = triangle_document();
        let target: crate::document::AttributeMap =
            [("POSITION".to_string(), 0)].into_iter().collect();
        doc.meshes[0].primitives[0].targets = Some(vec![target]);
        let mut encoder = StubEncoder::new();
        process(&mut doc, &CompressOptions::default(), &mut encoder).unwrap();
        assert_eq!(encoder.seen_methods, vec![EncodingMethod::Sequential]);
    }

    #[test]
    fn encoder_failure_skips_and_pass_reports_nothing_compressed() {
        let mut doc = triangle_document();
        let mut encoder = StubEncoder::new();
        encoder.fail = true;

        let result = process(&mut doc, &CompressOptions::default(), &mut encoder);
        assert!(result.is_err());
        assert!(doc.meshes[0].primitives[0]
            .extensions
            .get(DRACO_EXTENSION)
            .is_none());
    }

    #[test]
    fn non_indexed_primitives_are_skipped() {
        let mut doc = triangle_document();
        doc.meshes[0].primitives[0].indices = None;
        let mut encoder = StubEncoder::new();

        let result = process(&mut doc, &CompressOptions::default(), &mut encoder);
        assert!(result.is_err());
        assert!(encoder.seen_methods.is_empty());
    }

    #[test]
    fn multiple_primitives_share_one_buffer() {
        let mut doc = triangle_document();
        let extra = doc.meshes[0].primitives[0].clone();
        doc.meshes[0].primitives.push(extra);
        let mut encoder = StubEncoder::new();

        let summary = process(&mut doc, &CompressOptions::default(), &mut encoder).unwrap();
        assert_eq!(summary.compressed, 2);

        let first_view = doc.meshes[0].primitives[0].draco_buffer_view().unwrap();
        let second_view = doc.meshes[0].primitives[1].draco_buffer_view().unwrap();
        assert_ne!(first_view, second_view);
        assert_eq!(
            doc.buffer_views[first_view].buffer,
            doc.buffer_views[second_view].buffer
        );
        assert_eq!(
            doc.buffer_views[second_view].byte_offset,
            doc.buffer_views[first_view].byte_length
        );
    }
}
