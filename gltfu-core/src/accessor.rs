//! Strided accessor resolution and fresh accessor allocation.
//!
//! Every pass that touches vertex or index bytes goes through [`resolve`]
//! for reads and [`allocate`] for writes. Resolution validates the whole
//! index chain (accessor → view → buffer) and the computed end offset, so
//! callers can treat a returned view as in-bounds.

use crate::document::{
    component_count, component_size, Accessor, Buffer, BufferView, Document, Primitive,
    COMPONENT_UNSIGNED_BYTE, COMPONENT_UNSIGNED_INT, COMPONENT_UNSIGNED_SHORT, TYPE_SCALAR,
};

/// A resolved accessor: a strided window into one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessorView {
    /// Buffer table index.
    pub buffer: usize,
    /// Start of element 0 inside the buffer (view offset + accessor offset).
    pub offset: usize,
    /// Distance between consecutive elements.
    pub stride: usize,
    /// Tightly packed byte width of one element.
    pub element_size: usize,
    /// Element count.
    pub count: usize,
}

impl AccessorView {
    /// Bytes spanned from element 0 through the end of the last element.
    pub fn byte_span(&self) -> usize {
        if self.count == 0 {
            0
        } else {
            self.stride * (self.count - 1) + self.element_size
        }
    }

    /// Borrow the bytes of element `index`.
    pub fn element<'a>(&self, document: &'a Document, index: usize) -> &'a [u8] {
        let start = self.offset + index * self.stride;
        &document.buffers[self.buffer].data[start..start + self.element_size]
    }

    /// Borrow the whole strided window.
    pub fn bytes<'a>(&self, document: &'a Document) -> &'a [u8] {
        &document.buffers[self.buffer].data[self.offset..self.offset + self.byte_span()]
    }

    /// Mutably borrow the bytes of element `index`.
    pub fn element_mut<'a>(&self, document: &'a mut Document, index: usize) -> &'a mut [u8] {
        let start = self.offset + index * self.stride;
        &mut document.buffers[self.buffer].data[start..start + self.element_size]
    }
}

/// Resolve an accessor index to a strided view.
///
/// Absent on any broken link in the chain, a zero element size, or a window
/// that would read past the end of the buffer. An accessor without a buffer
/// view (a Draco-compressed stream) also resolves to absent.
pub fn resolve(document: &Document, accessor_index: usize) -> Option<AccessorView> {
    let accessor = document.accessors.get(accessor_index)?;
    let view = document.buffer_views.get(accessor.buffer_view?)?;
    let buffer = document.buffers.get(view.buffer)?;

    let element_size = accessor.element_size();
    if element_size == 0 {
        return None;
    }

    let stride = match view.byte_stride {
        Some(stride) if stride > 0 => stride,
        _ => element_size,
    };

    let offset = view.byte_offset + accessor.byte_offset;
    let resolved = AccessorView {
        buffer: view.buffer,
        offset,
        stride,
        element_size,
        count: accessor.count,
    };

    if offset + resolved.byte_span() > buffer.data.len() {
        return None;
    }

    Some(resolved)
}

/// Allocate a fresh buffer + view + accessor for `count` elements and return
/// the new accessor index. The buffer is zero-filled; callers write elements
/// through [`resolve`].
pub fn allocate(
    document: &mut Document,
    count: usize,
    element_type: &str,
    component_type: u32,
    target: Option<u32>,
) -> usize {
    let element_size = component_count(element_type) * component_size(component_type);

    let buffer_index = document.buffers.len();
    document
        .buffers
        .push(Buffer::from_data(vec![0; count * element_size]));

    let view_index = document.buffer_views.len();
    document.buffer_views.push(BufferView {
        buffer: buffer_index,
        byte_offset: 0,
        byte_length: count * element_size,
        byte_stride: None,
        target,
        name: None,
    });

    document.accessors.push(Accessor {
        buffer_view: Some(view_index),
        byte_offset: 0,
        component_type,
        count,
        element_type: element_type.to_string(),
        normalized: false,
        min_values: None,
        max_values: None,
        sparse: None,
        name: None,
    });

    document.accessors.len() - 1
}

/// Decode an index accessor into u32 values, honoring its stride.
///
/// Absent when the accessor cannot be resolved or uses a component type that
/// is not a legal index width.
pub fn read_index_accessor(document: &Document, accessor_index: usize) -> Option<Vec<u32>> {
    let accessor = document.accessors.get(accessor_index)?;
    let view = resolve(document, accessor_index)?;

    let mut indices = Vec::with_capacity(view.count);
    match accessor.component_type {
        COMPONENT_UNSIGNED_BYTE => {
            for i in 0..view.count {
                indices.push(view.element(document, i)[0] as u32);
            }
        }
        COMPONENT_UNSIGNED_SHORT => {
            for i in 0..view.count {
                let e = view.element(document, i);
                indices.push(u16::from_le_bytes([e[0], e[1]]) as u32);
            }
        }
        COMPONENT_UNSIGNED_INT => {
            for i in 0..view.count {
                let e = view.element(document, i);
                indices.push(u32::from_le_bytes([e[0], e[1], e[2], e[3]]));
            }
        }
        _ => return None,
    }

    Some(indices)
}

/// Decode a primitive's index stream; the identity sequence when non-indexed.
pub fn read_primitive_indices(
    document: &Document,
    primitive: &Primitive,
    vertex_count: u32,
) -> Option<Vec<u32>> {
    match primitive.indices {
        Some(accessor_index) => read_index_accessor(document, accessor_index),
        None => Some((0..vertex_count).collect()),
    }
}

/// Smallest index component type that can represent `max_index`.
pub fn index_component_for_max(max_index: u32) -> u32 {
    if max_index <= u8::MAX as u32 {
        COMPONENT_UNSIGNED_BYTE
    } else if max_index <= u16::MAX as u32 {
        COMPONENT_UNSIGNED_SHORT
    } else {
        COMPONENT_UNSIGNED_INT
    }
}

/// Write one index value into an allocated scalar index accessor.
pub fn write_index_value(
    document: &mut Document,
    view: &AccessorView,
    position: usize,
    value: u32,
    component_type: u32,
) {
    let element = view.element_mut(document, position);
    match component_type {
        COMPONENT_UNSIGNED_BYTE => element[0] = value as u8,
        COMPONENT_UNSIGNED_SHORT => element.copy_from_slice(&(value as u16).to_le_bytes()),
        _ => element.copy_from_slice(&value.to_le_bytes()),
    }
}

/// Allocate a scalar index accessor and fill it from `indices`.
pub fn allocate_index_accessor(
    document: &mut Document,
    indices: &[u32],
    component_type: u32,
    target: Option<u32>,
) -> usize {
    let accessor_index = allocate(document, indices.len(), TYPE_SCALAR, component_type, target);
    let view = resolve(document, accessor_index).expect("freshly allocated accessor resolves");
    for (position, &value) in indices.iter().enumerate() {
        write_index_value(document, &view, position, value, component_type);
    }
    accessor_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{COMPONENT_FLOAT, TARGET_ELEMENT_ARRAY_BUFFER, TYPE_VEC3};

    fn doc_with_strided_positions() -> Document {
        let mut doc = Document::new();
        // Two vec3 f32 elements with a 16-byte stride (12 data + 4 pad).
        let mut data = Vec::new();
        for v in [[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]] {
            data.extend_from_slice(bytemuck::cast_slice(&v));
            data.extend_from_slice(&[0u8; 4]);
        }
        doc.buffers.push(Buffer::from_data(data));
        doc.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset: 0,
            byte_length: 32,
            byte_stride: Some(16),
            target: None,
            name: None,
        });
        doc.accessors.push(Accessor {
            buffer_view: Some(0),
            byte_offset: 0,
            component_type: COMPONENT_FLOAT,
            count: 2,
            element_type: TYPE_VEC3.to_string(),
            normalized: false,
            min_values: None,
            max_values: None,
            sparse: None,
            name: None,
        });
        doc
    }

    #[test]
    fn resolve_honours_view_stride() {
        let doc = doc_with_strided_positions();
        let view = resolve(&doc, 0).unwrap();
        assert_eq!(view.stride, 16);
        assert_eq!(view.element_size, 12);
        assert_eq!(view.byte_span(), 16 + 12);

        let second: &[f32] = bytemuck::cast_slice(view.element(&doc, 1));
        assert_eq!(second, &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn resolve_rejects_overrun() {
        let mut doc = doc_with_strided_positions();
        doc.accessors[0].count = 3; // one element past the buffer
        assert!(resolve(&doc, 0).is_none());
    }

    #[test]
    fn resolve_rejects_missing_view() {
        let mut doc = doc_with_strided_positions();
        doc.accessors[0].buffer_view = None;
        assert!(resolve(&doc, 0).is_none());
    }

    #[test]
    fn allocate_then_fill_roundtrips() {
        let mut doc = Document::new();
        let accessor = allocate_index_accessor(
            &mut doc,
            &[0, 1, 2, 2, 1, 3],
            COMPONENT_UNSIGNED_SHORT,
            Some(TARGET_ELEMENT_ARRAY_BUFFER),
        );

        assert_eq!(doc.accessors[accessor].count, 6);
        assert_eq!(
            read_index_accessor(&doc, accessor).unwrap(),
            vec![0, 1, 2, 2, 1, 3]
        );
        assert_eq!(
            doc.buffer_views.last().unwrap().target,
            Some(TARGET_ELEMENT_ARRAY_BUFFER)
        );
    }

    #[test]
    fn index_component_boundaries() {
        assert_eq!(index_component_for_max(255), COMPONENT_UNSIGNED_BYTE);
        assert_eq!(index_component_for_max(256), COMPONENT_UNSIGNED_SHORT);
        assert_eq!(index_component_for_max(65535), COMPONENT_UNSIGNED_SHORT);
        assert_eq!(index_component_for_max(65536), COMPONENT_UNSIGNED_INT);
    }

    #[test]
    fn identity_indices_for_non_indexed_primitive() {
        let doc = Document::new();
        let primitive = Primitive::default();
        assert_eq!(
            read_primitive_indices(&doc, &primitive, 4).unwrap(),
            vec![0, 1, 2, 3]
        );
    }
}
