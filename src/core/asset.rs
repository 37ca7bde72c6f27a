//! Local file assets.
//!
//! Staging hashes the file once and derives where it will live in the
//! bootstrap staging bucket. Nothing is uploaded here; the asset manifest
//! written at synth time tells the deploy tool what to publish.

use super::error::SynthError;
use super::hasher;
use super::types::{AssetConfig, PropValue};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A local file staged for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAsset {
    /// Construct id of the asset ("NginxComponentAsset")
    pub construct_id: String,

    /// Absolute or config-relative path that was read
    pub source_path: PathBuf,

    /// Bare hex BLAKE3 digest of the file contents
    pub hash: String,

    /// File extension including the dot, or empty
    pub extension: String,

    /// Staging bucket name (may contain `${AWS::...}` pseudo parameters)
    pub bucket: String,
}

impl StagedAsset {
    /// Object key in the staging bucket.
    pub fn object_key(&self) -> String {
        format!("{}{}", self.hash, self.extension)
    }

    /// `s3://bucket/key` URL as a template value.
    ///
    /// A bucket containing pseudo parameters renders as `Fn::Sub`.
    pub fn object_url(&self) -> PropValue {
        let url = format!("s3://{}/{}", self.bucket, self.object_key());
        if url.contains("${") {
            PropValue::Sub(url)
        } else {
            PropValue::Str(url)
        }
    }

    /// File name of the asset copy inside the cloud assembly.
    pub fn assembly_file_name(&self) -> String {
        format!("asset.{}{}", self.hash, self.extension)
    }
}

/// Resolve the staging bucket for a stack's assets.
pub fn staging_bucket(assets: &AssetConfig) -> String {
    match assets.bucket {
        Some(ref bucket) => bucket.clone(),
        None => format!(
            "cdk-{}-assets-${{AWS::AccountId}}-${{AWS::Region}}",
            assets.qualifier
        ),
    }
}

/// Stage a local file: it must exist and be readable.
pub fn stage_asset(
    construct_id: &str,
    path: &Path,
    assets: &AssetConfig,
) -> Result<StagedAsset, SynthError> {
    if !path.is_file() {
        return Err(SynthError::AssetNotFound {
            path: path.to_path_buf(),
        });
    }
    let hash = hasher::hash_file(path).map_err(|source| SynthError::AssetRead {
        path: path.to_path_buf(),
        source,
    })?;
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    log::info!("staged asset {} from {} ({})", construct_id, path.display(), hash);

    Ok(StagedAsset {
        construct_id: construct_id.to_string(),
        source_path: path.to_path_buf(),
        hash: hasher::digest_hex(&hash).to_string(),
        extension,
        bucket: staging_bucket(assets),
    })
}

// ============================================================================
// Asset manifest
// ============================================================================

/// `<stack>.assets.json`, listing files the deploy tool must publish.
#[derive(Debug, Clone, Serialize)]
pub struct AssetManifest {
    pub version: String,
    pub files: indexmap::IndexMap<String, FileAssetEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileAssetEntry {
    /// Construct id of the staged asset
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub source: FileAssetSource,
    pub destinations: indexmap::IndexMap<String, FileAssetDestination>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileAssetSource {
    pub path: String,
    pub packaging: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAssetDestination {
    pub bucket_name: String,
    pub object_key: String,
}

/// Build the manifest entry for a set of staged assets.
pub fn asset_manifest<'a>(assets: impl IntoIterator<Item = &'a StagedAsset>) -> AssetManifest {
    let files = assets
        .into_iter()
        .map(|a| {
            let destination = FileAssetDestination {
                bucket_name: a.bucket.clone(),
                object_key: a.object_key(),
            };
            (
                a.hash.clone(),
                FileAssetEntry {
                    display_name: a.construct_id.clone(),
                    source: FileAssetSource {
                        path: a.assembly_file_name(),
                        packaging: "file".to_string(),
                    },
                    destinations: indexmap::IndexMap::from([(
                        "current_account-current_region".to_string(),
                        destination,
                    )]),
                },
            )
        })
        .collect();
    AssetManifest {
        version: "36.0.0".to_string(),
        files,
    }
}
