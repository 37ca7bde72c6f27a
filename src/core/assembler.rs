//! The stack assembler: one pass, top to bottom, no partial results.
//!
//! The component asset is staged before any resource is declared, so a
//! missing file fails the run before the graph holds anything. Each later
//! resource receives the outputs of earlier ones as typed references.

use super::asset::{self, StagedAsset};
use super::error::SynthError;
use super::graph::StackGraph;
use super::parser;
use super::types::*;
use std::path::Path;

pub const BUCKET_ID: &str = "BuildArtifactsBucket";
pub const ROLE_ID: &str = "CodeBuildRole";
pub const PROJECT_ID: &str = "SOEImageBuilderProject";
pub const ASSET_ID: &str = "NginxComponentAsset";
pub const COMPONENT_ID: &str = "NginxComponent";
pub const INFRA_ID: &str = "InfrastructureConfiguration";
pub const RECIPE_ID: &str = "ImageRecipe";
pub const PIPELINE_ID: &str = "ImagePipeline";

/// Logical ids of the resources an assembled stack is made of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackIds {
    pub bucket: LogicalId,
    pub role: LogicalId,
    pub project: LogicalId,
    pub component: LogicalId,
    pub infrastructure: LogicalId,
    pub recipe: LogicalId,
    pub pipeline: LogicalId,
}

/// A fully linked, inert stack. Only `assemble` builds one.
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    description: Option<String>,
    graph: StackGraph,
    asset: StagedAsset,
    ids: StackIds,
}

impl Stack {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn graph(&self) -> &StackGraph {
        &self.graph
    }

    pub fn asset(&self) -> &StagedAsset {
        &self.asset
    }

    pub fn ids(&self) -> &StackIds {
        &self.ids
    }

    pub fn resource(&self, id: &LogicalId) -> Option<&ResourceDecl> {
        self.graph.get(id)
    }
}

/// Assemble the image pipeline stack.
///
/// `base_dir` anchors relative asset paths (normally the directory holding
/// `stack.yaml`). Templates must already be resolved; the config is
/// validated here and an invalid one fails with `SynthError::Invalid`.
pub fn assemble(config: &StackConfig, base_dir: &Path) -> Result<Stack, SynthError> {
    let stack = config.stack.as_str();
    parser::ensure_valid(config)?;
    for warning in parser::lint_config(config) {
        log::warn!("{}", warning);
    }

    let asset_path = base_dir.join(&config.component.path);
    let asset = asset::stage_asset(ASSET_ID, &asset_path, &config.assets)?;

    let mut graph = StackGraph::new();

    // Bucket for build artifacts
    let bucket = ResourceDecl::new(stack, BUCKET_ID, ResourceKind::Bucket).retained();

    // Role assumed by the build service
    let managed_policy_arns = config
        .build
        .managed_policies
        .iter()
        .map(|name| PropValue::Sub(format!("arn:${{AWS::Partition}}:iam::aws:policy/{}", name)))
        .collect();
    let role = ResourceDecl::new(stack, ROLE_ID, ResourceKind::Role)
        .prop(
            "AssumeRolePolicyDocument",
            PropValue::map([
                (
                    "Statement",
                    PropValue::List(vec![PropValue::map([
                        ("Action", PropValue::from("sts:AssumeRole")),
                        ("Effect", PropValue::from("Allow")),
                        (
                            "Principal",
                            PropValue::map([(
                                "Service",
                                PropValue::from(config.build.service_principal.as_str()),
                            )]),
                        ),
                    ])]),
                ),
                ("Version", PropValue::from("2012-10-17")),
            ]),
        )
        .prop("ManagedPolicyArns", PropValue::List(managed_policy_arns));

    // Build project: GitHub source, artifacts to the bucket
    let mut project = ResourceDecl::new(stack, PROJECT_ID, ResourceKind::Project)
        .prop(
            "Artifacts",
            PropValue::map([
                ("Location", bucket.reference()),
                ("NamespaceType", PropValue::from("BUILD_ID")),
                ("Packaging", PropValue::from("ZIP")),
                ("Type", PropValue::from("S3")),
            ]),
        )
        .prop(
            "Environment",
            PropValue::map([
                ("ComputeType", PropValue::from(config.build.compute_type.as_str())),
                ("Image", PropValue::from(config.build.image.as_str())),
                ("ImagePullCredentialsType", PropValue::from("CODEBUILD")),
                ("PrivilegedMode", PropValue::from(false)),
                ("Type", PropValue::from("LINUX_CONTAINER")),
            ]),
        )
        .prop("ServiceRole", role.arn())
        .prop(
            "Source",
            PropValue::map([
                (
                    "Location",
                    PropValue::from(format!(
                        "https://github.com/{}/{}.git",
                        config.source.owner, config.source.repo
                    )),
                ),
                ("ReportBuildStatus", PropValue::from(true)),
                ("Type", PropValue::from("GITHUB")),
            ]),
        )
        .prop("EncryptionKey", PropValue::from("alias/aws/s3"));
    if config.source.webhook {
        project = project.prop(
            "Triggers",
            PropValue::map([("Webhook", PropValue::from(true))]),
        );
    }

    // Component whose document is the staged asset
    let component = ResourceDecl::new(stack, COMPONENT_ID, ResourceKind::Component)
        .prop("Name", config.component.name.as_str())
        .prop("Platform", config.component.platform.as_str())
        .prop("Version", config.component.version.as_str())
        .prop("Uri", asset.object_url());

    // Network context for builds; placeholder values pass through
    let infrastructure = ResourceDecl::new(stack, INFRA_ID, ResourceKind::InfrastructureConfiguration)
        .prop("InstanceProfileName", config.infrastructure.instance_profile.as_str())
        .prop("Name", config.infrastructure.name.as_str())
        .prop(
            "SecurityGroupIds",
            PropValue::List(
                config
                    .infrastructure
                    .security_group_ids
                    .iter()
                    .map(|sg| PropValue::from(sg.as_str()))
                    .collect(),
            ),
        )
        .prop("SubnetId", config.infrastructure.subnet_id.as_str());

    // Recipe: base components first, then ours; order is build order
    let components = config
        .recipe
        .base_components
        .iter()
        .map(|arn| PropValue::from(arn.as_str()))
        .chain(std::iter::once(component.arn()))
        .map(|arn| PropValue::map([("ComponentArn", arn)]))
        .collect();
    let recipe = ResourceDecl::new(stack, RECIPE_ID, ResourceKind::ImageRecipe)
        .prop("Components", PropValue::List(components))
        .prop("Name", config.recipe.name.as_str())
        .prop("ParentImage", config.recipe.parent_image.as_str())
        .prop("Version", config.recipe.version.as_str());

    let pipeline = ResourceDecl::new(stack, PIPELINE_ID, ResourceKind::ImagePipeline)
        .prop("ImageRecipeArn", recipe.arn())
        .prop("InfrastructureConfigurationArn", infrastructure.arn())
        .prop("Name", config.pipeline.name.as_str())
        .prop(
            "Schedule",
            PropValue::map([(
                "ScheduleExpression",
                PropValue::from(config.pipeline.schedule.as_str()),
            )]),
        );

    let ids = StackIds {
        bucket: declare(&mut graph, bucket)?,
        role: declare(&mut graph, role)?,
        project: declare(&mut graph, project)?,
        component: declare(&mut graph, component)?,
        infrastructure: declare(&mut graph, infrastructure)?,
        recipe: declare(&mut graph, recipe)?,
        pipeline: declare(&mut graph, pipeline)?,
    };

    Ok(Stack {
        name: config.stack.clone(),
        description: config.description.clone(),
        graph,
        asset,
        ids,
    })
}

fn declare(graph: &mut StackGraph, resource: ResourceDecl) -> Result<LogicalId, SynthError> {
    log::debug!(
        "declare {} {} ({} reference(s))",
        resource.kind,
        resource.logical_id,
        resource.references().len()
    );
    graph.add(resource)
}
