//! Stack configuration schema and resource descriptor types.
//!
//! `StackConfig` is the YAML document (`stack.yaml`) that replaces the
//! literals an image pipeline stack would otherwise hardcode. Resource
//! descriptors (`ResourceDecl`) are inert values; their properties form a
//! tree of `PropValue`s whose typed references are the dependency edges.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Top-level stack.yaml
// ============================================================================

/// Root configuration for one image pipeline stack.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StackConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Stack name, also the scope of every logical id
    pub stack: String,

    /// Optional template description
    #[serde(default)]
    pub description: Option<String>,

    /// Global parameters (templatable as `{{params.key}}`)
    #[serde(default)]
    #[schemars(with = "IndexMap<String, serde_json::Value>")]
    pub params: IndexMap<String, serde_yaml_ng::Value>,

    /// Target account and region
    #[serde(default)]
    pub env: StackEnv,

    /// GitHub source for the build project
    pub source: SourceConfig,

    /// Build project settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Image Builder component backed by a local asset
    #[serde(default)]
    pub component: ComponentConfig,

    /// Network context for image builds
    pub infrastructure: InfraConfig,

    /// Image recipe
    pub recipe: RecipeConfig,

    /// Scheduled image pipeline
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Asset staging location
    #[serde(default)]
    pub assets: AssetConfig,
}

/// Deployment environment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StackEnv {
    #[serde(default = "default_region")]
    pub region: String,

    /// Twelve-digit account id; unset means "resolved at deploy time"
    #[serde(default)]
    pub account: Option<String>,
}

impl Default for StackEnv {
    fn default() -> Self {
        Self {
            region: default_region(),
            account: None,
        }
    }
}

fn default_region() -> String {
    "us-west-2".to_string()
}

// ============================================================================
// Sections
// ============================================================================

/// GitHub repository the build project pulls from.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SourceConfig {
    pub owner: String,
    pub repo: String,

    /// Trigger a build on new commits
    #[serde(default = "default_true")]
    pub webhook: bool,
}

/// CodeBuild project settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BuildConfig {
    #[serde(default = "default_build_image")]
    pub image: String,

    #[serde(default = "default_compute_type")]
    pub compute_type: String,

    /// AWS managed policy names attached to the build role
    #[serde(default = "default_managed_policies")]
    pub managed_policies: Vec<String>,

    #[serde(default = "default_service_principal")]
    pub service_principal: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            image: default_build_image(),
            compute_type: default_compute_type(),
            managed_policies: default_managed_policies(),
            service_principal: default_service_principal(),
        }
    }
}

fn default_build_image() -> String {
    "aws/codebuild/standard:5.0".to_string()
}

fn default_compute_type() -> String {
    "BUILD_GENERAL1_SMALL".to_string()
}

fn default_managed_policies() -> Vec<String> {
    vec![
        "AmazonS3FullAccess".to_string(),
        "EC2InstanceProfileForImageBuilder".to_string(),
    ]
}

fn default_service_principal() -> String {
    "codebuild.amazonaws.com".to_string()
}

/// Image Builder component whose document is a local file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ComponentConfig {
    #[serde(default = "default_component_name")]
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "default_platform")]
    pub platform: String,

    /// Component document, relative to the config file's directory
    #[serde(default = "default_component_path")]
    pub path: String,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            name: default_component_name(),
            version: default_version(),
            platform: default_platform(),
            path: default_component_path(),
        }
    }
}

fn default_component_name() -> String {
    "InstallNginx".to_string()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_platform() -> String {
    "Linux".to_string()
}

fn default_component_path() -> String {
    "imagebuilder_components/install_nginx.yml".to_string()
}

/// Infrastructure configuration (instance profile, subnet, security groups).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InfraConfig {
    #[serde(default = "default_infra_name")]
    pub name: String,

    #[serde(default = "default_instance_profile")]
    pub instance_profile: String,

    pub subnet_id: String,

    pub security_group_ids: Vec<String>,
}

fn default_infra_name() -> String {
    "MyInfrastructureConfiguration".to_string()
}

fn default_instance_profile() -> String {
    "EC2InstanceProfileForImageBuilder".to_string()
}

/// Image recipe: parent image plus components applied in order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecipeConfig {
    #[serde(default = "default_recipe_name")]
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    /// Parent image ARN or AMI id
    pub parent_image: String,

    /// Component ARNs applied before the asset-backed component
    #[serde(default)]
    pub base_components: Vec<String>,
}

fn default_recipe_name() -> String {
    "MySOEImageRecipe".to_string()
}

/// Image pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PipelineConfig {
    #[serde(default = "default_pipeline_name")]
    pub name: String,

    /// Schedule expression, passed through unmodified
    #[serde(default = "default_schedule")]
    pub schedule: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: default_pipeline_name(),
            schedule: default_schedule(),
        }
    }
}

fn default_pipeline_name() -> String {
    "MyImagePipeline".to_string()
}

fn default_schedule() -> String {
    "cron(0 0 * * ? *)".to_string()
}

/// Where staged assets land.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AssetConfig {
    /// Bootstrap qualifier used in the default staging bucket name
    #[serde(default = "default_qualifier")]
    pub qualifier: String,

    /// Explicit staging bucket, overriding the bootstrap bucket
    #[serde(default)]
    pub bucket: Option<String>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            qualifier: default_qualifier(),
            bucket: None,
        }
    }
}

fn default_qualifier() -> String {
    "hnb659fds".to_string()
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Resources
// ============================================================================

/// Kind of a declared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Bucket,
    Role,
    Project,
    Component,
    InfrastructureConfiguration,
    ImageRecipe,
    ImagePipeline,
}

impl ResourceKind {
    /// CloudFormation resource type.
    pub fn cfn_type(&self) -> &'static str {
        match self {
            Self::Bucket => "AWS::S3::Bucket",
            Self::Role => "AWS::IAM::Role",
            Self::Project => "AWS::CodeBuild::Project",
            Self::Component => "AWS::ImageBuilder::Component",
            Self::InfrastructureConfiguration => "AWS::ImageBuilder::InfrastructureConfiguration",
            Self::ImageRecipe => "AWS::ImageBuilder::ImageRecipe",
            Self::ImagePipeline => "AWS::ImageBuilder::ImagePipeline",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cfn_type())
    }
}

/// Stack-unique identifier used for template cross-references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalId(String);

impl LogicalId {
    /// Derive a logical id from the stack name and construct id.
    ///
    /// The readable part keeps only ASCII alphanumerics of the construct id;
    /// the suffix is the first 8 hex digits of the BLAKE3 hash of
    /// `"<stack>/<construct>"`, upper-cased.
    pub fn derive(stack: &str, construct_id: &str) -> Self {
        let readable: String = construct_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let suffix = crate::core::hasher::short_hash(&format!("{}/{}", stack, construct_id));
        Self(format!("{}{}", readable, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A property value in a resource descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Str(String),
    Bool(bool),
    List(Vec<PropValue>),
    Map(IndexMap<String, PropValue>),
    /// `Ref` to another resource (its primary identifier)
    Ref(LogicalId),
    /// `Fn::GetAtt` of another resource's attribute
    GetAtt(LogicalId, String),
    /// `Fn::Sub` over pseudo parameters only (`${AWS::Region}`, ...)
    Sub(String),
}

impl PropValue {
    /// Build a map value from key/value pairs, preserving order.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, PropValue)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Collect every resource this value refers to, in traversal order.
    pub fn collect_references(&self, out: &mut Vec<LogicalId>) {
        match self {
            Self::Ref(id) | Self::GetAtt(id, _) => out.push(id.clone()),
            Self::List(items) => items.iter().for_each(|v| v.collect_references(out)),
            Self::Map(entries) => entries.values().for_each(|v| v.collect_references(out)),
            Self::Str(_) | Self::Bool(_) | Self::Sub(_) => {}
        }
    }

    /// Render as a CloudFormation JSON fragment.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{json, Value};
        match self {
            Self::Str(s) => Value::String(s.clone()),
            Self::Bool(b) => Value::Bool(*b),
            Self::List(items) => Value::Array(items.iter().map(PropValue::to_json).collect()),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Ref(id) => json!({ "Ref": id.as_str() }),
            Self::GetAtt(id, attr) => json!({ "Fn::GetAtt": [id.as_str(), attr] }),
            Self::Sub(s) => json!({ "Fn::Sub": s }),
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A declared resource: inert, never mutated once added to a graph.
#[derive(Debug, Clone)]
pub struct ResourceDecl {
    pub logical_id: LogicalId,

    /// Construct id the logical id was derived from
    pub construct_id: String,

    pub kind: ResourceKind,

    /// Properties (order-preserving)
    pub properties: IndexMap<String, PropValue>,

    /// Explicit ordering edges beyond property references
    pub depends_on: Vec<LogicalId>,

    /// Emit `DeletionPolicy`/`UpdateReplacePolicy: Retain`
    pub retain: bool,
}

impl ResourceDecl {
    pub fn new(stack: &str, construct_id: &str, kind: ResourceKind) -> Self {
        Self {
            logical_id: LogicalId::derive(stack, construct_id),
            construct_id: construct_id.to_string(),
            kind,
            properties: IndexMap::new(),
            depends_on: Vec::new(),
            retain: false,
        }
    }

    /// Set a property (builder style).
    pub fn prop(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn retained(mut self) -> Self {
        self.retain = true;
        self
    }

    /// `Ref` to this resource.
    pub fn reference(&self) -> PropValue {
        PropValue::Ref(self.logical_id.clone())
    }

    /// `Fn::GetAtt [id, "Arn"]` of this resource.
    pub fn arn(&self) -> PropValue {
        PropValue::GetAtt(self.logical_id.clone(), "Arn".to_string())
    }

    /// Direct dependencies: property references then explicit edges, deduplicated.
    pub fn references(&self) -> Vec<LogicalId> {
        let mut refs = Vec::new();
        for value in self.properties.values() {
            value.collect_references(&mut refs);
        }
        refs.extend(self.depends_on.iter().cloned());
        let mut seen = std::collections::HashSet::new();
        refs.retain(|id| seen.insert(id.clone()));
        refs
    }
}

/// Convert a serde_yaml_ng::Value to a string for template resolution.
pub fn yaml_value_to_string(val: &serde_yaml_ng::Value) -> String {
    match val {
        serde_yaml_ng::Value::String(s) => s.clone(),
        serde_yaml_ng::Value::Number(n) => n.to_string(),
        serde_yaml_ng::Value::Bool(b) => b.to_string(),
        serde_yaml_ng::Value::Null => String::new(),
        other => format!("{:?}", other),
    }
}
