//! Template rendering and cloud assembly output.
//!
//! A cloud assembly directory holds:
//! - `<stack>.template.json`: the CloudFormation template
//! - `<stack>.assets.json`: files the deploy tool must publish
//! - `asset.<hash>.<ext>`: a copy of each staged asset

use super::assembler::Stack;
use super::asset;
use super::error::SynthError;
use super::hasher;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Paths written by `write_cloud_assembly`.
#[derive(Debug, Clone)]
pub struct AssemblyFiles {
    pub template: PathBuf,
    pub asset_manifest: PathBuf,
    pub assets: Vec<PathBuf>,
}

/// Template file name for a stack.
pub fn template_file_name(stack_name: &str) -> String {
    format!("{}.template.json", stack_name)
}

/// Render the stack as a CloudFormation template.
pub fn render_template(stack: &Stack) -> Value {
    let mut resources = Map::new();
    for r in stack.graph().resources() {
        let mut entry = Map::new();
        entry.insert("Type".to_string(), json!(r.kind.cfn_type()));
        if !r.properties.is_empty() {
            let properties: Map<String, Value> = r
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            entry.insert("Properties".to_string(), Value::Object(properties));
        }
        if !r.depends_on.is_empty() {
            entry.insert(
                "DependsOn".to_string(),
                json!(r.depends_on.iter().map(|d| d.as_str()).collect::<Vec<_>>()),
            );
        }
        if r.retain {
            entry.insert("UpdateReplacePolicy".to_string(), json!("Retain"));
            entry.insert("DeletionPolicy".to_string(), json!("Retain"));
        }
        entry.insert(
            "Metadata".to_string(),
            json!({ "aws:cdk:path": format!("{}/{}/Resource", stack.name(), r.construct_id) }),
        );
        resources.insert(r.logical_id.to_string(), Value::Object(entry));
    }

    let ids = stack.ids();
    let outputs = json!({
        "ImagePipelineArn": { "Value": { "Fn::GetAtt": [ids.pipeline.as_str(), "Arn"] } },
        "ImageRecipeArn": { "Value": { "Fn::GetAtt": [ids.recipe.as_str(), "Arn"] } },
        "ComponentArn": { "Value": { "Fn::GetAtt": [ids.component.as_str(), "Arn"] } },
        "ArtifactsBucketName": { "Value": { "Ref": ids.bucket.as_str() } }
    });

    let mut template = Map::new();
    template.insert(
        "AWSTemplateFormatVersion".to_string(),
        json!(TEMPLATE_FORMAT_VERSION),
    );
    if let Some(description) = stack.description() {
        template.insert("Description".to_string(), json!(description));
    }
    template.insert("Resources".to_string(), Value::Object(resources));
    template.insert("Outputs".to_string(), outputs);
    Value::Object(template)
}

/// Fingerprint of a rendered template.
pub fn template_fingerprint(template: &Value) -> String {
    hasher::hash_json(template)
}

/// Write the cloud assembly for a stack into `out_dir`.
///
/// All three files are staged as temp files first and renamed into place
/// only once the asset copy has been verified, so a failed run leaves any
/// previous assembly untouched.
pub fn write_cloud_assembly(stack: &Stack, out_dir: &Path) -> Result<AssemblyFiles, SynthError> {
    std::fs::create_dir_all(out_dir).map_err(|e| SynthError::io(out_dir, e))?;

    let staged_asset = stack.asset();
    let asset_path = out_dir.join(staged_asset.assembly_file_name());
    let manifest_path = out_dir.join(format!("{}.assets.json", stack.name()));
    let template_path = out_dir.join(template_file_name(stack.name()));

    let manifest = asset::asset_manifest([staged_asset]);
    let manifest_json = serde_json::to_string_pretty(&manifest)?;
    let template_json = serde_json::to_string_pretty(&render_template(stack))?;

    let asset_tmp = tmp_path(&asset_path);
    copy_asset(&staged_asset.source_path, &asset_tmp, &staged_asset.hash)?;
    let staged = [
        (asset_tmp, &asset_path),
        (write_tmp(&manifest_path, &manifest_json)?, &manifest_path),
        (write_tmp(&template_path, &template_json)?, &template_path),
    ];
    for (tmp, path) in &staged {
        std::fs::rename(tmp, path).map_err(|e| SynthError::io(*path, e))?;
    }

    log::info!(
        "synthesized {} ({} resources) into {}",
        stack.name(),
        stack.graph().len(),
        out_dir.display()
    );

    Ok(AssemblyFiles {
        template: template_path,
        asset_manifest: manifest_path,
        assets: vec![asset_path],
    })
}

/// Read a previously written template, if present.
pub fn load_template(path: &Path) -> Result<Option<Value>, SynthError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| SynthError::io(path, e))?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Sibling temp path: `<file>.tmp`.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// First half of an atomic write: content goes to a temp file to be renamed.
fn write_tmp(path: &Path, content: &str) -> Result<PathBuf, SynthError> {
    let tmp = tmp_path(path);
    std::fs::write(&tmp, content).map_err(|e| SynthError::io(&tmp, e))?;
    Ok(tmp)
}

/// Copy an asset and check the copy still matches its staged hash.
fn copy_asset(source: &Path, dest: &Path, expected_hash: &str) -> Result<(), SynthError> {
    std::fs::copy(source, dest).map_err(|e| SynthError::AssetRead {
        path: source.to_path_buf(),
        source: e,
    })?;
    let actual = hasher::hash_file(dest).map_err(|e| SynthError::io(dest, e))?;
    if hasher::digest_hex(&actual) != expected_hash {
        let _ = std::fs::remove_file(dest);
        return Err(SynthError::AssetChanged {
            path: source.to_path_buf(),
        });
    }
    Ok(())
}
