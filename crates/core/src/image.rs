//! Image extractor: unpacks a saved Docker/OCI image tarball into its
//! manifest, layer tars, and per-layer extracted file trees.
//!
//! An image is an outer tar containing `manifest.json`, a config blob, and
//! one `.tar`/`.tar.gz` per layer. `manifest.json` is expected to contain
//! exactly one entry; anything else is treated as a fatal extraction error,
//! since a multi-entry manifest means the caller pointed us at an image
//! reference (repo:tag list) rather than a single saved image.

use crate::error::ScanError;
use crate::prefilter::prepare_extracted_file_permissions;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    #[serde(rename = "Config")]
    config: String,
    #[serde(rename = "Layers")]
    layers: Vec<String>,
}

/// The result of extracting one saved image tarball.
pub struct ExtractedImage {
    /// Root directory under which `layers[i].extracted_dir` live.
    pub root: PathBuf,
    pub image_id: String,
    pub layers: Vec<ExtractedLayer>,
}

pub struct ExtractedLayer {
    pub layer_id: String,
    pub extracted_dir: PathBuf,
}

/// Strip a path to something safe to join under an extraction root: no
/// absolute prefix, no `..` components. Mirrors the defensive re-rooting
/// tar extractors need against maliciously crafted archives.
fn sanitize_tar_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

fn is_gzip(name: &str) -> bool {
    name.ends_with(".gz") || name.ends_with(".gzip")
}

/// Confirm the unpacked file on disk is exactly as long as the tar header
/// claimed, so a reader that hit EOF early produces a failure instead of a
/// silently truncated file.
fn verify_unpacked_size(dest: &Path, expected: u64) -> Result<(), ScanError> {
    let actual = std::fs::metadata(dest).map_err(ScanError::Io)?.len();
    if actual != expected {
        return Err(ScanError::Extraction(format!(
            "{}: expected {expected} bytes, got {actual} (truncated tar entry)",
            dest.display()
        )));
    }
    Ok(())
}

fn open_layer_reader(path: &Path) -> Result<Box<dyn Read>, ScanError> {
    let file = File::open(path).map_err(ScanError::Io)?;
    if is_gzip(&path.to_string_lossy()) {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Extract the outer image tarball into `work_dir`, returning every regular
/// file path it contained (sanitized, relative to `work_dir`).
fn unpack_outer_tar(tar_path: &Path, work_dir: &Path) -> Result<(), ScanError> {
    let reader = open_layer_reader(tar_path)?;
    let mut archive = Archive::new(reader);
    let entries = archive.entries().map_err(|e| ScanError::Extraction(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| ScanError::Extraction(e.to_string()))?;
        let raw_path = entry.path().map_err(|e| ScanError::Extraction(e.to_string()))?.into_owned();
        let safe_path = sanitize_tar_path(&raw_path);
        if safe_path.as_os_str().is_empty() {
            continue;
        }
        let dest = work_dir.join(&safe_path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(ScanError::Io)?;
        }
        let is_file = entry.header().entry_type().is_file();
        let expected_size = entry.header().size().map_err(|e| ScanError::Extraction(e.to_string()))?;
        entry.unpack(&dest).map_err(|e| ScanError::Extraction(e.to_string()))?;
        if is_file {
            verify_unpacked_size(&dest, expected_size)?;
        }
    }
    Ok(())
}

fn load_manifest(work_dir: &Path) -> Result<ManifestEntry, ScanError> {
    let manifest_path = work_dir.join("manifest.json");
    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| ScanError::Manifest(format!("reading manifest.json: {e}")))?;
    let entries: Vec<ManifestEntry> = serde_json::from_str(&content)
        .map_err(|e| ScanError::Manifest(format!("parsing manifest.json: {e}")))?;

    if entries.len() != 1 {
        return Err(ScanError::Manifest(format!(
            "expected exactly one manifest entry, found {}",
            entries.len()
        )));
    }
    Ok(entries.into_iter().next().unwrap())
}

fn layer_id_from_path(layer_path: &str) -> String {
    layer_path
        .trim_end_matches("/layer.tar")
        .trim_end_matches(".tar")
        .trim_end_matches(".gz")
        .to_string()
}

fn image_id_from_config(config_path: &str) -> String {
    Path::new(config_path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| config_path.to_string())
}

/// Unpack one layer tar into `ExtractedFiles/<layer_id>/` under `root`,
/// loosening permissions on every regular file so later reads never fail on
/// a mode the layer baked in. A single layer's extraction failure is logged
/// and skipped; it never aborts the whole image scan.
fn extract_layer(root: &Path, work_dir: &Path, layer_rel_path: &str) -> Option<ExtractedLayer> {
    let layer_id = layer_id_from_path(layer_rel_path);
    let layer_tar = work_dir.join(layer_rel_path);
    let extracted_dir = root.join("ExtractedFiles").join(&layer_id);

    if let Err(e) = std::fs::create_dir_all(&extracted_dir) {
        warn!(layer_id, error = %e, "failed to create layer extraction dir, skipping layer");
        return None;
    }

    let reader = match open_layer_reader(&layer_tar) {
        Ok(r) => r,
        Err(e) => {
            warn!(layer_id, error = %e, "failed to open layer tar, skipping layer");
            return None;
        }
    };
    let mut archive = Archive::new(reader);
    let entries = match archive.entries() {
        Ok(e) => e,
        Err(e) => {
            warn!(layer_id, error = %e, "failed to read layer tar entries, skipping layer");
            return None;
        }
    };

    for entry in entries {
        let mut entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(layer_id, error = %e, "corrupt entry in layer tar, skipping entry");
                continue;
            }
        };
        let raw_path = match entry.path() {
            Ok(p) => p.into_owned(),
            Err(_) => continue,
        };
        let safe_path = sanitize_tar_path(&raw_path);
        if safe_path.as_os_str().is_empty() {
            continue;
        }
        let dest = extracted_dir.join(&safe_path);
        if let Some(parent) = dest.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                continue;
            }
        }
        let is_file = entry.header().entry_type().is_file();
        let expected_size = match entry.header().size() {
            Ok(s) => s,
            Err(_) => continue,
        };
        if entry.unpack(&dest).is_err() {
            continue;
        }
        if is_file {
            if let Err(e) = verify_unpacked_size(&dest, expected_size) {
                warn!(layer_id, path = %dest.display(), error = %e, "truncated entry, skipping file");
                continue;
            }
            let _ = prepare_extracted_file_permissions(&dest);
        }
    }

    debug!(layer_id, dir = %extracted_dir.display(), "layer extracted");
    Some(ExtractedLayer { layer_id, extracted_dir })
}

/// Extract a flat container-export tarball (`docker export`-style: a single
/// filesystem tree, no `manifest.json`, no per-layer tars) as if it were a
/// one-layer image, so the traversal driver can treat it identically.
pub fn extract_container_export(
    container_id: &str,
    tar_path: &Path,
    root: &Path,
) -> Result<ExtractedImage, ScanError> {
    let extracted_dir = root.join("ExtractedFiles").join(container_id);
    std::fs::create_dir_all(&extracted_dir).map_err(ScanError::Io)?;

    let reader = open_layer_reader(tar_path)?;
    let mut archive = Archive::new(reader);
    let entries = archive.entries().map_err(|e| ScanError::Extraction(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| ScanError::Extraction(e.to_string()))?;
        let raw_path = entry.path().map_err(|e| ScanError::Extraction(e.to_string()))?.into_owned();
        let safe_path = sanitize_tar_path(&raw_path);
        if safe_path.as_os_str().is_empty() {
            continue;
        }
        let dest = extracted_dir.join(&safe_path);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(ScanError::Io)?;
        }
        let is_file = entry.header().entry_type().is_file();
        let expected_size = entry.header().size().map_err(|e| ScanError::Extraction(e.to_string()))?;
        entry.unpack(&dest).map_err(|e| ScanError::Extraction(e.to_string()))?;
        if is_file {
            verify_unpacked_size(&dest, expected_size)?;
            let _ = prepare_extracted_file_permissions(&dest);
        }
    }

    Ok(ExtractedImage {
        root: root.to_path_buf(),
        image_id: container_id.to_string(),
        layers: vec![ExtractedLayer { layer_id: container_id.to_string(), extracted_dir }],
    })
}

/// Extract a saved image tarball at `tar_path` into a fresh subdirectory of
/// `root`. `name` is recorded only for logging — identification comes from
/// the manifest.
pub fn extract_image(name: &str, tar_path: &Path, root: &Path) -> Result<ExtractedImage, ScanError> {
    let work_dir = root.join("outer");
    std::fs::create_dir_all(&work_dir).map_err(ScanError::Io)?;

    debug!(name, tar_path = %tar_path.display(), "unpacking outer image tar");
    unpack_outer_tar(tar_path, &work_dir)?;

    let manifest = load_manifest(&work_dir)?;
    let image_id = image_id_from_config(&manifest.config);

    let mut layers = Vec::with_capacity(manifest.layers.len());
    for layer_rel_path in &manifest.layers {
        if let Some(layer) = extract_layer(root, &work_dir, layer_rel_path) {
            layers.push(layer);
        }
    }

    Ok(ExtractedImage { root: root.to_path_buf(), image_id, layers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_layer_tar(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *content).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn build_image_tar(manifest_json: &str, layer_tars: &[(&str, Vec<u8>)], config_name: &str) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());

        let mut header = tar::Header::new_gnu();
        header.set_size(manifest_json.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, "manifest.json", manifest_json.as_bytes()).unwrap();

        let mut cfg_header = tar::Header::new_gnu();
        cfg_header.set_size(2);
        cfg_header.set_mode(0o644);
        cfg_header.set_cksum();
        builder.append_data(&mut cfg_header, config_name, &b"{}"[..]).unwrap();

        for (name, tar_bytes) in layer_tars {
            let mut lh = tar::Header::new_gnu();
            lh.set_size(tar_bytes.len() as u64);
            lh.set_mode(0o644);
            lh.set_cksum();
            builder.append_data(&mut lh, name, tar_bytes.as_slice()).unwrap();
        }

        builder.into_inner().unwrap()
    }

    #[test]
    fn extracts_single_layer_image() {
        let dir = tempfile::tempdir().unwrap();
        let layer_tar = build_layer_tar(&[("secret.txt", b"hello")]);
        let manifest = r#"[{"Config":"abc123.json","RepoTags":["x:latest"],"Layers":["layer1/layer.tar"]}]"#;
        let image_tar_bytes = build_image_tar(manifest, &[("layer1/layer.tar", layer_tar)], "abc123.json");

        let tar_path = dir.path().join("image.tar");
        std::fs::File::create(&tar_path).unwrap().write_all(&image_tar_bytes).unwrap();

        let root = dir.path().join("root");
        std::fs::create_dir_all(&root).unwrap();
        let extracted = extract_image("test-image", &tar_path, &root).unwrap();

        assert_eq!(extracted.image_id, "abc123");
        assert_eq!(extracted.layers.len(), 1);
        assert_eq!(extracted.layers[0].layer_id, "layer1");
        let secret_path = extracted.layers[0].extracted_dir.join("secret.txt");
        assert!(secret_path.exists());
        assert_eq!(std::fs::read(&secret_path).unwrap(), b"hello");
    }

    #[test]
    fn multi_entry_manifest_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let layer_tar = build_layer_tar(&[("f.txt", b"x")]);
        let manifest =
            r#"[{"Config":"a.json","RepoTags":[],"Layers":["l1/layer.tar"]},{"Config":"b.json","RepoTags":[],"Layers":["l2/layer.tar"]}]"#;
        let image_tar_bytes = build_image_tar(manifest, &[("l1/layer.tar", layer_tar)], "a.json");

        let tar_path = dir.path().join("image.tar");
        std::fs::File::create(&tar_path).unwrap().write_all(&image_tar_bytes).unwrap();

        let root = dir.path().join("root");
        std::fs::create_dir_all(&root).unwrap();
        let err = extract_image("bad-image", &tar_path, &root).unwrap_err();
        assert!(matches!(err, ScanError::Manifest(_)));
    }

    #[test]
    fn layer_id_strips_layer_tar_suffix() {
        assert_eq!(layer_id_from_path("abc123/layer.tar"), "abc123");
        assert_eq!(layer_id_from_path("def456.tar.gz"), "def456");
    }

    #[test]
    fn image_id_strips_json_suffix() {
        assert_eq!(image_id_from_config("sha256deadbeef.json"), "sha256deadbeef");
    }

    #[test]
    fn extracts_flat_container_export() {
        let dir = tempfile::tempdir().unwrap();
        let export_bytes = build_layer_tar(&[("etc/shadow", b"root:x:0:0")]);
        let tar_path = dir.path().join("export.tar");
        std::fs::File::create(&tar_path).unwrap().write_all(&export_bytes).unwrap();

        let root = dir.path().join("root");
        std::fs::create_dir_all(&root).unwrap();
        let extracted = extract_container_export("abc123", &tar_path, &root).unwrap();

        assert_eq!(extracted.layers.len(), 1);
        assert_eq!(extracted.layers[0].layer_id, "abc123");
        assert!(extracted.layers[0].extracted_dir.join("etc/shadow").exists());
    }

    #[test]
    fn sanitize_rejects_traversal_and_absolute() {
        assert_eq!(sanitize_tar_path(Path::new("../../etc/passwd")), PathBuf::from("etc/passwd"));
        assert_eq!(sanitize_tar_path(Path::new("/etc/passwd")), PathBuf::from("etc/passwd"));
    }
}
