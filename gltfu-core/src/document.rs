//! In-memory glTF 2.0 document.
//!
//! The document is a set of parallel tables in which every cross-reference is
//! an index into the target table. Optional references are `Option<usize>`;
//! index lists (`scene.nodes`, `node.children`, `skin.joints`) are plain
//! `Vec<usize>`. Buffer bytes live inline on [`Buffer::data`] and are never
//! serialized directly; the I/O layer moves them in and out of data URIs,
//! sibling `.bin` files, or the GLB binary chunk.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Extension object map, keyed by extension name.
pub type ExtensionMap = Map<String, Value>;

// Component types (glTF enumeration values).
pub const COMPONENT_BYTE: u32 = 5120;
pub const COMPONENT_UNSIGNED_BYTE: u32 = 5121;
pub const COMPONENT_SHORT: u32 = 5122;
pub const COMPONENT_UNSIGNED_SHORT: u32 = 5123;
pub const COMPONENT_UNSIGNED_INT: u32 = 5125;
pub const COMPONENT_FLOAT: u32 = 5126;

// Primitive modes.
pub const MODE_POINTS: u32 = 0;
pub const MODE_LINES: u32 = 1;
pub const MODE_LINE_LOOP: u32 = 2;
pub const MODE_LINE_STRIP: u32 = 3;
pub const MODE_TRIANGLES: u32 = 4;
pub const MODE_TRIANGLE_STRIP: u32 = 5;
pub const MODE_TRIANGLE_FAN: u32 = 6;

// Buffer view targets.
pub const TARGET_ARRAY_BUFFER: u32 = 34962;
pub const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;

// Element types.
pub const TYPE_SCALAR: &str = "SCALAR";
pub const TYPE_VEC2: &str = "VEC2";
pub const TYPE_VEC3: &str = "VEC3";
pub const TYPE_VEC4: &str = "VEC4";
pub const TYPE_MAT2: &str = "MAT2";
pub const TYPE_MAT3: &str = "MAT3";
pub const TYPE_MAT4: &str = "MAT4";

/// The name of the Draco compression extension.
pub const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// The name of the unlit material extension.
pub const UNLIT_EXTENSION: &str = "KHR_materials_unlit";

/// Byte width of one component.
pub fn component_size(component_type: u32) -> usize {
    match component_type {
        COMPONENT_BYTE | COMPONENT_UNSIGNED_BYTE => 1,
        COMPONENT_SHORT | COMPONENT_UNSIGNED_SHORT => 2,
        COMPONENT_UNSIGNED_INT | COMPONENT_FLOAT => 4,
        _ => 4,
    }
}

/// Number of components in one element of the given type.
pub fn component_count(element_type: &str) -> usize {
    match element_type {
        TYPE_SCALAR => 1,
        TYPE_VEC2 => 2,
        TYPE_VEC3 => 3,
        TYPE_VEC4 | TYPE_MAT2 => 4,
        TYPE_MAT3 => 9,
        TYPE_MAT4 => 16,
        _ => 1,
    }
}

/// Root glTF document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub asset: Asset,
    #[serde(rename = "scene", skip_serializing_if = "Option::is_none")]
    pub default_scene: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<Scene>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<Mesh>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<Texture>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samplers: Vec<Sampler>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skins: Vec<Skin>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub animations: Vec<Animation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cameras: Vec<Camera>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessors: Vec<Accessor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffer_views: Vec<BufferView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<Buffer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions_required: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: ExtensionMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            asset: Asset::default(),
            ..Default::default()
        }
    }

    /// Register an extension name in `extensionsUsed`, once.
    pub fn add_extension_used(&mut self, name: &str) {
        if !self.extensions_used.iter().any(|e| e == name) {
            self.extensions_used.push(name.to_string());
        }
    }

    /// Register an extension name in `extensionsRequired`, once.
    pub fn add_extension_required(&mut self, name: &str) {
        if !self.extensions_required.iter().any(|e| e == name) {
            self.extensions_required.push(name.to_string());
        }
    }
}

/// Asset metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            version: "2.0".to_string(),
            min_version: None,
            generator: Some("gltfu".to_string()),
            copyright: None,
        }
    }
}

/// A scene: an ordered list of root node indices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<usize>,
}

/// A node in the scene forest.
///
/// The local transform is either `matrix` or the TRS triple; passes that
/// rewrite a transform must keep exactly one form populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skin: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[f64; 16]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f64; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: ExtensionMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl Node {
    /// True when the node carries no payload and no children.
    pub fn is_empty_leaf(&self) -> bool {
        self.mesh.is_none()
            && self.skin.is_none()
            && self.camera.is_none()
            && self.children.is_empty()
    }

    /// Replace the local transform with a flat matrix, clearing the TRS form.
    pub fn set_matrix(&mut self, matrix: [f64; 16]) {
        self.matrix = Some(matrix);
        self.translation = None;
        self.rotation = None;
        self.scale = None;
    }
}

/// A mesh: an ordered list of primitives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primitives: Vec<Primitive>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: ExtensionMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

/// Attribute map: semantic name → accessor index. Sorted iteration keeps
/// dedupe and join keys deterministic.
pub type AttributeMap = BTreeMap<String, usize>;

/// One draw call's worth of geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Primitive {
    #[serde(default)]
    pub attributes: AttributeMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indices: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<usize>,
    #[serde(default = "default_primitive_mode")]
    pub mode: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<AttributeMap>>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: ExtensionMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

fn default_primitive_mode() -> u32 {
    MODE_TRIANGLES
}

impl Default for Primitive {
    fn default() -> Self {
        Self {
            attributes: AttributeMap::new(),
            indices: None,
            material: None,
            mode: MODE_TRIANGLES,
            targets: None,
            extensions: ExtensionMap::new(),
            extras: None,
        }
    }
}

impl Primitive {
    /// Morph target maps, empty slice when absent.
    pub fn morph_targets(&self) -> &[AttributeMap] {
        self.targets.as_deref().unwrap_or(&[])
    }

    /// The `bufferView` index inside this primitive's Draco extension object.
    pub fn draco_buffer_view(&self) -> Option<usize> {
        self.extensions
            .get(DRACO_EXTENSION)?
            .get("bufferView")?
            .as_u64()
            .map(|v| v as usize)
    }

    /// Rewrite the `bufferView` index inside the Draco extension object.
    pub fn set_draco_buffer_view(&mut self, view: usize) {
        if let Some(Value::Object(obj)) = self.extensions.get_mut(DRACO_EXTENSION) {
            obj.insert("bufferView".to_string(), Value::from(view));
        }
    }
}

/// Typed view into a slice of buffer bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(default)]
    pub byte_offset: usize,
    pub component_type: u32,
    pub count: usize,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub normalized: bool,
    #[serde(rename = "min", skip_serializing_if = "Option::is_none")]
    pub min_values: Option<Vec<f64>>,
    #[serde(rename = "max", skip_serializing_if = "Option::is_none")]
    pub max_values: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparse: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Accessor {
    /// Tightly packed byte width of one element.
    pub fn element_size(&self) -> usize {
        component_count(&self.element_type) * component_size(self.component_type)
    }
}

/// Byte range inside a buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// An owned byte sequence.
///
/// `data` is the canonical content; `uri` survives only until the bytes are
/// resolved at load time or re-externalized at store time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    #[serde(default)]
    pub byte_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl Buffer {
    pub fn from_data(data: Vec<u8>) -> Self {
        Self {
            byte_length: data.len(),
            uri: None,
            name: None,
            data,
        }
    }
}

/// Standard PBR material.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<NormalTextureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occlusion_texture: Option<OcclusionTextureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emissive_texture: Option<TextureInfo>,
    #[serde(default = "default_emissive_factor")]
    pub emissive_factor: [f64; 3],
    #[serde(default = "default_alpha_mode")]
    pub alpha_mode: String,
    #[serde(default = "default_alpha_cutoff")]
    pub alpha_cutoff: f64,
    #[serde(default)]
    pub double_sided: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extensions: ExtensionMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl Material {
    /// True for materials carrying the unlit extension.
    pub fn is_unlit(&self) -> bool {
        self.extensions.contains_key(UNLIT_EXTENSION)
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: None,
            pbr_metallic_roughness: None,
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
            emissive_factor: default_emissive_factor(),
            alpha_mode: default_alpha_mode(),
            alpha_cutoff: default_alpha_cutoff(),
            double_sided: false,
            extensions: ExtensionMap::new(),
            extras: None,
        }
    }
}

fn default_emissive_factor() -> [f64; 3] {
    [0.0, 0.0, 0.0]
}

fn default_alpha_mode() -> String {
    "OPAQUE".to_string()
}

fn default_alpha_cutoff() -> f64 {
    0.5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    #[serde(default = "default_base_color_factor")]
    pub base_color_factor: [f64; 4],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<TextureInfo>,
    #[serde(default = "default_metallic_factor")]
    pub metallic_factor: f64,
    #[serde(default = "default_metallic_factor")]
    pub roughness_factor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metallic_roughness_texture: Option<TextureInfo>,
}

impl Default for PbrMetallicRoughness {
    fn default() -> Self {
        Self {
            base_color_factor: default_base_color_factor(),
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
        }
    }
}

fn default_base_color_factor() -> [f64; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

fn default_metallic_factor() -> f64 {
    1.0
}

/// Plain texture slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureInfo {
    pub index: usize,
    #[serde(default)]
    pub tex_coord: u32,
}

/// Normal-map texture slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalTextureInfo {
    pub index: usize,
    #[serde(default)]
    pub tex_coord: u32,
    #[serde(default = "default_unit_factor")]
    pub scale: f64,
}

/// Occlusion texture slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcclusionTextureInfo {
    pub index: usize,
    #[serde(default)]
    pub tex_coord: u32,
    #[serde(default = "default_unit_factor")]
    pub strength: f64,
}

fn default_unit_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Texture {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// An image, referenced by URI or embedded through a buffer view.
///
/// Decoded pixel metadata (`width`, `height`, `component`, `bits`) is filled
/// by loaders that decode pixels; the passes only compare it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip, default)]
    pub width: u32,
    #[serde(skip, default)]
    pub height: u32,
    #[serde(skip, default)]
    pub component: u32,
    #[serde(skip, default)]
    pub bits: u32,
    #[serde(skip, default)]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sampler {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag_filter: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_filter: Option<u32>,
    #[serde(default = "default_wrap_mode")]
    pub wrap_s: u32,
    #[serde(default = "default_wrap_mode")]
    pub wrap_t: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

fn default_wrap_mode() -> u32 {
    10497 // REPEAT
}

impl Default for Sampler {
    fn default() -> Self {
        Self {
            mag_filter: None,
            min_filter: None,
            wrap_s: default_wrap_mode(),
            wrap_t: default_wrap_mode(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inverse_bind_matrices: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<usize>,
    #[serde(default)]
    pub joints: Vec<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Animation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub channels: Vec<AnimationChannel>,
    #[serde(default)]
    pub samplers: Vec<AnimationSampler>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationChannel {
    pub sampler: usize,
    pub target: AnimationTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationTarget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<usize>,
    /// "translation", "rotation", "scale", or "weights".
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationSampler {
    pub input: usize,
    pub output: usize,
    #[serde(default = "default_interpolation")]
    pub interpolation: String,
}

fn default_interpolation() -> String {
    "LINEAR".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub camera_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perspective: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orthographic: Option<Value>,
}
