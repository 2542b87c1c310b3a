//! Reading and writing documents in ASCII (`.gltf`) and binary (`.glb`) form.
//!
//! Loading resolves every buffer to inline bytes (data URI, external file, or
//! the GLB binary chunk) so the passes can address byte ranges without
//! touching the filesystem again. Storing reverses the process according to
//! [`StoreOptions`].

use crate::document::{Buffer, Document};
use crate::error::{GltfError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fs;
use std::path::Path;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

/// Options controlling how a document is written out.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreOptions {
    /// Embed loaded image bytes as data URIs.
    pub embed_images: bool,
    /// Embed buffer bytes as data URIs (ASCII form only).
    pub embed_buffers: bool,
    /// Pretty-print the JSON chunk.
    pub pretty: bool,
    /// Write the binary (.glb) container.
    pub binary: bool,
}

/// True when the path ends in `.glb`, case-insensitively.
pub fn is_glb_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("glb"))
        .unwrap_or(false)
}

/// Load a document from disk, resolving all buffer and image bytes.
///
/// Returns the document plus any non-fatal warnings.
pub fn load(path: &Path) -> Result<(Document, Vec<String>)> {
    let bytes = fs::read(path).map_err(|e| GltfError::io(path, e))?;
    let mut warnings = Vec::new();

    let (mut document, bin_chunk) = if is_glb_path(path) || bytes.starts_with(GLB_MAGIC) {
        parse_glb(&bytes, &mut warnings)?
    } else {
        (serde_json::from_slice(&bytes)?, None)
    };

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    resolve_buffers(&mut document, bin_chunk.as_deref(), base_dir, &mut warnings)?;
    resolve_images(&mut document, base_dir, &mut warnings);

    Ok((document, warnings))
}

/// Write a document to disk.
pub fn store(document: &Document, path: &Path, options: StoreOptions) -> Result<()> {
    let binary = options.binary || is_glb_path(path);
    if binary {
        store_glb(document, path, options)
    } else {
        store_gltf(document, path, options)
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let chunk = bytes.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

fn parse_glb(bytes: &[u8], warnings: &mut Vec<String>) -> Result<(Document, Option<Vec<u8>>)> {
    if bytes.len() < 12 || &bytes[0..4] != GLB_MAGIC {
        return Err(GltfError::InvalidGlb("missing glTF magic".to_string()));
    }

    let version = read_u32(bytes, 4).unwrap_or(0);
    if version != GLB_VERSION {
        return Err(GltfError::InvalidGlb(format!(
            "unsupported container version {version}"
        )));
    }

    let declared = read_u32(bytes, 8).unwrap_or(0) as usize;
    if declared != bytes.len() {
        warnings.push(format!(
            "GLB length field says {declared} bytes, file has {}",
            bytes.len()
        ));
    }

    let mut json_chunk: Option<&[u8]> = None;
    let mut bin_chunk: Option<Vec<u8>> = None;
    let mut offset = 12;

    while offset + 8 <= bytes.len() {
        let length = read_u32(bytes, offset).unwrap_or(0) as usize;
        let kind = read_u32(bytes, offset + 4).unwrap_or(0);
        let start = offset + 8;
        let end = start
            .checked_add(length)
            .filter(|&e| e <= bytes.len())
            .ok_or_else(|| GltfError::InvalidGlb("chunk overruns file".to_string()))?;

        match kind {
            CHUNK_JSON => json_chunk = Some(&bytes[start..end]),
            CHUNK_BIN => bin_chunk = Some(bytes[start..end].to_vec()),
            other => warnings.push(format!("skipping unknown GLB chunk 0x{other:08X}")),
        }

        // Chunks are 4-byte aligned.
        offset = end + (4 - end % 4) % 4;
    }

    let json_chunk =
        json_chunk.ok_or_else(|| GltfError::InvalidGlb("missing JSON chunk".to_string()))?;
    let document = serde_json::from_slice(json_chunk)?;
    Ok((document, bin_chunk))
}

/// Decode `data:*;base64,...` URIs. Returns `None` for other URI shapes.
fn decode_data_uri(uri: &str) -> Option<std::result::Result<Vec<u8>, base64::DecodeError>> {
    let rest = uri.strip_prefix("data:")?;
    let comma = rest.find(";base64,")?;
    Some(BASE64.decode(&rest[comma + 8..]))
}

fn resolve_buffers(
    document: &mut Document,
    bin_chunk: Option<&[u8]>,
    base_dir: &Path,
    warnings: &mut Vec<String>,
) -> Result<()> {
    for (index, buffer) in document.buffers.iter_mut().enumerate() {
        match &buffer.uri {
            Some(uri) => {
                if let Some(decoded) = decode_data_uri(uri) {
                    buffer.data = decoded.map_err(|e| GltfError::InvalidDataUri {
                        index,
                        reason: e.to_string(),
                    })?;
                } else {
                    let file = base_dir.join(uri);
                    buffer.data = fs::read(&file).map_err(|e| GltfError::io(&file, e))?;
                }
            }
            None => match bin_chunk {
                // Only the first URI-less buffer maps to the binary chunk.
                Some(chunk) if index == 0 => {
                    buffer.data = chunk.to_vec();
                    if buffer.byte_length > buffer.data.len() {
                        warnings.push(format!(
                            "buffer 0 declares {} bytes, binary chunk has {}",
                            buffer.byte_length,
                            buffer.data.len()
                        ));
                    }
                    // Spec allows the chunk to be padded past byteLength.
                    buffer.data.truncate(buffer.byte_length.min(chunk.len()));
                }
                _ => warnings.push(format!("buffer {index} has no URI and no binary chunk")),
            },
        }
        buffer.byte_length = buffer.data.len();
    }
    Ok(())
}

fn resolve_images(document: &mut Document, base_dir: &Path, warnings: &mut Vec<String>) {
    for (index, image) in document.images.iter_mut().enumerate() {
        // Buffer-view images stay in the buffer; only URI images carry their
        // own bytes.
        let Some(uri) = &image.uri else { continue };

        if let Some(decoded) = decode_data_uri(uri) {
            match decoded {
                Ok(data) => image.data = data,
                Err(e) => warnings.push(format!("image {index}: bad data URI: {e}")),
            }
        } else {
            match fs::read(base_dir.join(uri)) {
                Ok(data) => image.data = data,
                Err(e) => warnings.push(format!("image {index}: cannot read '{uri}': {e}")),
            }
        }
    }
}

fn serialize_json(document: &Document, pretty: bool) -> Result<Vec<u8>> {
    Ok(if pretty {
        serde_json::to_vec_pretty(document)?
    } else {
        serde_json::to_vec(document)?
    })
}

fn embed_images_as_uris(document: &mut Document) {
    for image in &mut document.images {
        if image.data.is_empty() || image.buffer_view.is_some() {
            continue;
        }
        let mime = image.mime_type.as_deref().unwrap_or("image/png");
        image.uri = Some(format!("data:{mime};base64,{}", BASE64.encode(&image.data)));
    }
}

fn store_gltf(document: &Document, path: &Path, options: StoreOptions) -> Result<()> {
    let mut out = document.clone();
    if options.embed_images {
        embed_images_as_uris(&mut out);
    }

    if options.embed_buffers {
        for buffer in &mut out.buffers {
            buffer.byte_length = buffer.data.len();
            buffer.uri = Some(format!(
                "data:application/octet-stream;base64,{}",
                BASE64.encode(&buffer.data)
            ));
        }
    } else {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("buffer");
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        for (index, buffer) in out.buffers.iter_mut().enumerate() {
            buffer.byte_length = buffer.data.len();
            let uri = match &buffer.uri {
                Some(uri) if !uri.starts_with("data:") => uri.clone(),
                _ if index == 0 => format!("{stem}.bin"),
                _ => format!("{stem}_{index}.bin"),
            };

            let bin_path = base_dir.join(&uri);
            fs::write(&bin_path, &buffer.data).map_err(|e| GltfError::io(&bin_path, e))?;
            buffer.uri = Some(uri);
        }
    }

    let json = serialize_json(&out, options.pretty)?;
    fs::write(path, json).map_err(|e| GltfError::io(path, e))
}

fn store_glb(document: &Document, path: &Path, options: StoreOptions) -> Result<()> {
    let mut out = document.clone();
    if options.embed_images {
        embed_images_as_uris(&mut out);
    }

    // Collapse every buffer into the single binary chunk, relocating views. A
    // buffer must never carry both inline bytes and a URI in the container.
    let mut bin = Vec::new();
    let mut offsets = Vec::with_capacity(out.buffers.len());
    for buffer in &out.buffers {
        offsets.push(bin.len());
        bin.extend_from_slice(&buffer.data);
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
    }

    for view in &mut out.buffer_views {
        if let Some(base) = offsets.get(view.buffer) {
            view.byte_offset += base;
        }
        view.buffer = 0;
    }

    out.buffers = vec![Buffer {
        byte_length: bin.len(),
        uri: None,
        name: None,
        data: Vec::new(),
    }];

    let json = serialize_json(&out, options.pretty)?;
    let glb = assemble_glb(&json, &bin);
    fs::write(path, glb).map_err(|e| GltfError::io(path, e))
}

/// Assemble the GLB container: header, JSON chunk (space-padded), binary
/// chunk (zero-padded).
fn assemble_glb(json: &[u8], bin: &[u8]) -> Vec<u8> {
    let json_padding = (4 - json.len() % 4) % 4;
    let json_chunk_len = json.len() + json_padding;
    let bin_padding = (4 - bin.len() % 4) % 4;
    let bin_chunk_len = bin.len() + bin_padding;

    let mut total = 12 + 8 + json_chunk_len;
    if !bin.is_empty() {
        total += 8 + bin_chunk_len;
    }

    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(GLB_MAGIC);
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());

    glb.extend_from_slice(&(json_chunk_len as u32).to_le_bytes());
    glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    glb.extend_from_slice(json);
    glb.resize(glb.len() + json_padding, 0x20);

    if !bin.is_empty() {
        glb.extend_from_slice(&(bin_chunk_len as u32).to_le_bytes());
        glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
        glb.extend_from_slice(bin);
        glb.resize(glb.len() + bin_padding, 0);
    }

    glb
}
