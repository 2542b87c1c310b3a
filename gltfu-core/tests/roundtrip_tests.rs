//! File round-trips: written documents load back identical, and a second
//! write of a fully inlined pretty-printed form is byte-equal.

use gltfu_core::accessor;
use gltfu_core::document::{
    Document, Mesh, Node, Primitive, Scene, COMPONENT_FLOAT, COMPONENT_UNSIGNED_SHORT,
    TARGET_ARRAY_BUFFER, TARGET_ELEMENT_ARRAY_BUFFER, TYPE_VEC3,
};
use gltfu_core::{io, StoreOptions};
use tempfile::tempdir;

fn triangle_document() -> Document {
    let mut doc = Document::new();
    let position = accessor::allocate(
        &mut doc,
        3,
        TYPE_VEC3,
        COMPONENT_FLOAT,
        Some(TARGET_ARRAY_BUFFER),
    );
    let view = accessor::resolve(&doc, position).unwrap();
    for (i, p) in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        .iter()
        .enumerate()
    {
        view.element_mut(&mut doc, i)
            .copy_from_slice(bytemuck::cast_slice(p));
    }
    let indices = accessor::allocate_index_accessor(
        &mut doc,
        &[0, 1, 2],
        COMPONENT_UNSIGNED_SHORT,
        Some(TARGET_ELEMENT_ARRAY_BUFFER),
    );

    let mut primitive = Primitive::default();
    primitive.attributes.insert("POSITION".to_string(), position);
    primitive.indices = Some(indices);
    primitive.extensions.insert(
        "VENDOR_marker".to_string(),
        serde_json::json!({ "stamp": 42 }),
    );
    doc.meshes.push(Mesh {
        name: Some("Triangle".to_string()),
        primitives: vec![primitive],
        ..Default::default()
    });
    doc.nodes.push(Node {
        name: Some("root".to_string()),
        mesh: Some(0),
        translation: Some([0.5, 0.0, 0.0]),
        ..Default::default()
    });
    doc.scenes.push(Scene {
        name: Some("Scene".to_string()),
        nodes: vec![0],
    });
    doc.default_scene = Some(0);
    doc
}

#[test]
fn embedded_pretty_form_is_write_stable() {
    let dir = tempdir().unwrap();
    let first_path = dir.path().join("first.gltf");
    let second_path = dir.path().join("second.gltf");
    let options = StoreOptions {
        embed_buffers: true,
        pretty: true,
        ..Default::default()
    };

    let doc = triangle_document();
    io::store(&doc, &first_path, options).unwrap();

    let (loaded, warnings) = io::load(&first_path).unwrap();
    assert!(warnings.is_empty(), "{warnings:?}");
    io::store(&loaded, &second_path, options).unwrap();

    let first = std::fs::read(&first_path).unwrap();
    let second = std::fs::read(&second_path).unwrap();
    assert_eq!(first, second, "write -> load -> write changed bytes");
}

#[test]
fn glb_roundtrip_preserves_structure_and_extensions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("triangle.glb");

    let doc = triangle_document();
    io::store(&doc, &path, StoreOptions::default()).unwrap();

    let (loaded, _) = io::load(&path).unwrap();
    assert_eq!(loaded.meshes.len(), 1);
    assert_eq!(loaded.nodes.len(), 1);
    assert_eq!(loaded.scenes.len(), 1);
    assert_eq!(loaded.default_scene, Some(0));
    assert_eq!(loaded.meshes[0].name.as_deref(), Some("Triangle"));
    assert!(loaded.meshes[0].primitives[0]
        .extensions
        .contains_key("VENDOR_marker"));

    // Binary form holds one URI-less buffer with every byte inline.
    assert_eq!(loaded.buffers.len(), 1);
    assert!(loaded.buffers[0].uri.is_none());

    let indices =
        accessor::read_index_accessor(&loaded, loaded.meshes[0].primitives[0].indices.unwrap())
            .unwrap();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn external_bin_and_glb_forms_agree() {
    let dir = tempdir().unwrap();
    let gltf_path = dir.path().join("model.gltf");
    let glb_path = dir.path().join("model.glb");

    let doc = triangle_document();
    io::store(
        &doc,
        &gltf_path,
        StoreOptions {
            pretty: true,
            ..Default::default()
        },
    )
    .unwrap();
    io::store(&doc, &glb_path, StoreOptions::default()).unwrap();

    let (from_gltf, _) = io::load(&gltf_path).unwrap();
    let (from_glb, _) = io::load(&glb_path).unwrap();

    let gltf_view = accessor::resolve(&from_gltf, 0).unwrap();
    let glb_view = accessor::resolve(&from_glb, 0).unwrap();
    assert_eq!(gltf_view.count, glb_view.count);
    for i in 0..gltf_view.count {
        assert_eq!(
            gltf_view.element(&from_gltf, i),
            glb_view.element(&from_glb, i)
        );
    }
}
