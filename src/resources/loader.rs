//! glTF loading.
//!
//! Reads `.glb` and `.gltf` files (with external buffers and images) from the
//! asset root, natively from disk and over HTTP on the web, and turns their
//! default scene into CPU side scene nodes.

use std::sync::Arc;

use futures::FutureExt;
use gltf::Gltf;

use crate::{
    data_structures::{
        instance::Instance,
        model::{Geometry, Material, MeshNode, ModelVertex, StandardMaterial},
        scene_graph::{ContainerNode, ModelNode, SceneNode},
    },
    resources::{AssetLoadFailure, AssetLoader, LoadCause, LoadFuture, LoadResult, LoadedAsset},
};

/// Loads `.glb` and `.gltf` files (with external buffers and images) from
/// the asset root: a directory natively, a path on the page's origin on the web.
#[derive(Debug, Clone)]
pub struct GltfLoader {
    root: String,
}

impl GltfLoader {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for GltfLoader {
    fn default() -> Self {
        Self::new("assets")
    }
}

impl AssetLoader for GltfLoader {
    fn load(&self, path: &str) -> LoadFuture<LoadResult> {
        let root = self.root.clone();
        let path = path.to_string();
        let fut = async move {
            log::debug!("loading {path}");
            load_gltf(&root, &path)
                .await
                .map(LoadedAsset::new)
                .map_err(|cause| AssetLoadFailure::new(path, cause))
        };
        #[cfg(not(target_arch = "wasm32"))]
        let fut = fut.boxed();
        #[cfg(target_arch = "wasm32")]
        let fut = fut.boxed_local();
        fut
    }
}

async fn load_gltf(root: &str, path: &str) -> Result<Vec<Box<dyn SceneNode>>, LoadCause> {
    let bytes = load_binary(root, path).await?;
    let gltf = Gltf::from_slice(&bytes)?;

    let mut buffers = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .ok_or_else(|| LoadCause::MissingData("binary chunk".to_string()))?;
                buffers.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) => {
                buffers.push(load_binary(root, &sibling(path, uri)?).await?);
            }
        }
    }

    let mut images = Vec::new();
    for image in gltf.images() {
        let encoded = match image.source() {
            gltf::image::Source::View { view, .. } => {
                buffer_view(&buffers, &view)?.to_vec()
            }
            gltf::image::Source::Uri { uri, .. } => load_binary(root, &sibling(path, uri)?).await?,
        };
        images.push(Arc::new(image::load_from_memory(&encoded)?.to_rgba8()));
    }

    Ok(scene_from_document(&gltf, &buffers, &images))
}

/// Builds one node tree per root node of the default scene.
pub fn scene_from_document(
    gltf: &Gltf,
    buffers: &[Vec<u8>],
    images: &[Arc<image::RgbaImage>],
) -> Vec<Box<dyn SceneNode>> {
    let materials: Vec<StandardMaterial> = gltf
        .materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            let diffuse = pbr
                .base_color_texture()
                .and_then(|info| images.get(info.texture().source().index()).cloned());
            StandardMaterial::new(
                material.name().unwrap_or("material"),
                pbr.base_color_factor(),
                diffuse,
            )
        })
        .collect();

    let scene = gltf.default_scene().or_else(|| gltf.scenes().next());
    match scene {
        Some(scene) => scene
            .nodes()
            .map(|node| to_scene_node(node, buffers, &materials))
            .collect(),
        None => Vec::new(),
    }
}

fn to_scene_node(
    node: gltf::scene::Node,
    buffers: &[Vec<u8>],
    materials: &[StandardMaterial],
) -> Box<dyn SceneNode> {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node {}", node.index()));

    let mut meshes: Vec<MeshNode> = node
        .mesh()
        .map(|mesh| {
            mesh.primitives()
                .filter_map(|primitive| to_mesh(&name, &primitive, buffers, materials))
                .collect()
        })
        .unwrap_or_default();

    let mut scene_node: Box<dyn SceneNode> = match meshes.len() {
        0 => Box::new(ContainerNode::new(name.clone())),
        1 => Box::new(ModelNode::new(name.clone(), meshes.remove(0))),
        _ => {
            // one child per primitive, each with its own material
            let mut container = ContainerNode::new(name.clone());
            for (idx, mesh) in meshes.into_iter().enumerate() {
                container.add_child(Box::new(ModelNode::new(format!("{name} #{idx}"), mesh)));
            }
            Box::new(container)
        }
    };

    let (translation, rotation, scale) = node.transform().decomposed();
    scene_node.set_local_transform(Instance {
        position: translation.into(),
        rotation: cgmath::Quaternion::new(rotation[3], rotation[0], rotation[1], rotation[2]),
        scale: scale.into(),
    });

    for child in node.children() {
        scene_node.add_child(to_scene_node(child, buffers, materials));
    }
    scene_node
}

fn to_mesh(
    name: &str,
    primitive: &gltf::Primitive,
    buffers: &[Vec<u8>],
    materials: &[StandardMaterial],
) -> Option<MeshNode> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!("{name}: skipping {:?} primitive", primitive.mode());
        return None;
    }
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

    let mut vertices: Vec<ModelVertex> = reader
        .read_positions()?
        .map(|position| ModelVertex {
            position,
            tex_coords: Default::default(),
            normal: Default::default(),
        })
        .collect();

    let has_normals = match reader.read_normals() {
        Some(normals) => {
            vertices
                .iter_mut()
                .zip(normals)
                .for_each(|(vertex, normal)| vertex.normal = normal);
            true
        }
        None => false,
    };
    if let Some(tex_coords) = reader.read_tex_coords(0) {
        vertices
            .iter_mut()
            .zip(tex_coords.into_f32())
            .for_each(|(vertex, uv)| vertex.tex_coords = uv);
    }

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..vertices.len() as u32).collect(),
    };

    let mut geometry = Geometry::new(name, vertices, indices);
    if !has_normals {
        geometry.compute_normals();
    }

    let material = match primitive.material().index().and_then(|idx| materials.get(idx)) {
        Some(template) => StandardMaterial::new(
            template.name.clone(),
            template.base_color,
            template.diffuse.clone(),
        ),
        None => StandardMaterial::new("default", [1.0, 1.0, 1.0, 1.0], None),
    };

    Some(MeshNode::new(Arc::new(geometry), Material::Standard(material)))
}

fn buffer_view<'a>(buffers: &'a [Vec<u8>], view: &gltf::buffer::View) -> Result<&'a [u8], LoadCause> {
    let buffer = buffers
        .get(view.buffer().index())
        .ok_or_else(|| LoadCause::MissingData(format!("buffer {}", view.buffer().index())))?;
    buffer
        .get(view.offset()..view.offset() + view.length())
        .ok_or_else(|| LoadCause::MissingData(format!("buffer view {}", view.index())))
}

/// Resolves `uri` relative to the file that references it.
fn sibling(path: &str, uri: &str) -> Result<String, LoadCause> {
    if uri.starts_with("data:") {
        return Err(LoadCause::MissingData(
            "embedded data URIs are not supported, use .glb".to_string(),
        ));
    }
    Ok(match path.rfind('/') {
        Some(idx) => format!("{}/{}", &path[..idx], uri),
        None => uri.to_string(),
    })
}

#[cfg(target_arch = "wasm32")]
fn format_url(root: &str, file_name: &str) -> Result<reqwest::Url, LoadCause> {
    let origin = web_sys::window()
        .ok_or_else(|| LoadCause::Http("no window".to_string()))?
        .location()
        .origin()
        .map_err(|_| LoadCause::Http("no origin".to_string()))?;
    let base = reqwest::Url::parse(&format!("{}/{}/", origin, root.trim_matches('/')))
        .map_err(|e| LoadCause::Http(e.to_string()))?;
    base.join(file_name)
        .map_err(|e| LoadCause::Http(e.to_string()))
}

pub async fn load_binary(root: &str, file_name: &str) -> Result<Vec<u8>, LoadCause> {
    #[cfg(target_arch = "wasm32")]
    let data = {
        let url = format_url(root, file_name)?;
        let response = reqwest::get(url)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| LoadCause::Http(e.to_string()))?;
        response
            .bytes()
            .await
            .map_err(|e| LoadCause::Http(e.to_string()))?
            .to_vec()
    };
    #[cfg(not(target_arch = "wasm32"))]
    let data = {
        let path = std::path::Path::new(root).join(file_name);
        tokio::fs::read(path).await?
    };

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A single-triangle .glb without normals or indices.
    fn triangle_glb() -> Vec<u8> {
        let json = r#"{
            "asset": {"version": "2.0"},
            "scene": 0,
            "scenes": [{"nodes": [0]}],
            "nodes": [{"name": "tri", "mesh": 0, "translation": [1.0, 2.0, 3.0]}],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}],
            "accessors": [{
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
            }],
            "bufferViews": [{"buffer": 0, "byteLength": 36}],
            "buffers": [{"byteLength": 36}]
        }"#;
        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let bin: &[u8] = bytemuck::cast_slice(&positions);

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut glb = Vec::with_capacity(total);
        glb.extend_from_slice(&0x4654_6C67u32.to_le_bytes());
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
        glb.extend_from_slice(&0x4E4F_534Au32.to_le_bytes());
        glb.extend_from_slice(&json);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(&0x004E_4942u32.to_le_bytes());
        glb.extend_from_slice(bin);
        glb
    }

    #[test]
    fn glb_becomes_a_model_node_with_its_transform() {
        let gltf = Gltf::from_slice(&triangle_glb()).unwrap();
        let buffers = vec![gltf.blob.clone().unwrap()];
        let nodes = scene_from_document(&gltf, &buffers, &[]);
        assert_eq!(nodes.len(), 1);

        let node = &nodes[0];
        assert_eq!(node.name(), "tri");
        assert_eq!(
            node.get_local_transform().position,
            cgmath::Vector3::new(1.0, 2.0, 3.0)
        );
        let mesh = node.mesh().unwrap();
        assert_eq!(mesh.geometry.indices, vec![0, 1, 2]);
        // normals were missing and get rebuilt from the face
        assert!(mesh.geometry.vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
        assert!(!mesh.cast_shadow && !mesh.receive_shadow);
    }

    #[test]
    fn uris_resolve_next_to_the_referencing_file() {
        assert_eq!(sibling("models/desk.gltf", "desk.bin").unwrap(), "models/desk.bin");
        assert_eq!(sibling("desk.gltf", "desk.bin").unwrap(), "desk.bin");
        assert!(matches!(
            sibling("desk.gltf", "data:application/octet-stream;base64,AAAA"),
            Err(LoadCause::MissingData(_))
        ));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_failure() {
        let loader = GltfLoader::new("does-not-exist");
        let failure = loader.load("models/desk04.glb").await.unwrap_err();
        assert_eq!(failure.path, "models/desk04.glb");
        assert!(matches!(failure.cause, LoadCause::Io(_)));
    }
}
