//! YAML parsing, template resolution and validation of `stack.yaml`.
//!
//! Validation collects every problem instead of stopping at the first:
//! - Version must be "1.0"
//! - Required strings must be non-empty
//! - Component and recipe versions must be `major.minor.patch`
//! - Parent image and base components must be well-formed ARNs whose
//!   region matches the stack region
//!
//! Placeholder values (`subnet-xxxxxxxx`) pass; only the deployment engine
//! can tell whether they exist.

use super::arn::Arn;
use super::error::SynthError;
use super::types::*;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static STACK_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$").expect("stack name pattern"));
static SEMVER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+$").expect("version pattern"));
static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-[0-9]+$").expect("region pattern"));
static ACCOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{12}$").expect("account pattern"));
static AMI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ami-[0-9a-f]{8,17}$").expect("AMI pattern"));
static QUALIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]{1,10}$").expect("qualifier pattern"));

const PLATFORMS: [&str; 3] = ["Linux", "Windows", "macOS"];

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse a stack.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<StackConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse a stack.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<StackConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Parse, resolve templates and validate in one step.
pub fn load_stack_config(path: &Path) -> Result<StackConfig, SynthError> {
    let config = parse_config_file(path).map_err(SynthError::Config)?;
    let config = resolve_config_templates(&config).map_err(SynthError::Config)?;
    ensure_valid(&config)?;
    Ok(config)
}

/// Run `validate_config` and turn any findings into `SynthError::Invalid`.
pub fn ensure_valid(config: &StackConfig) -> Result<(), SynthError> {
    let errors = validate_config(config);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(SynthError::Invalid(
            errors.into_iter().map(|e| e.message).collect(),
        ))
    }
}

// ============================================================================
// Templates
// ============================================================================

/// Resolve `{{params.key}}`, `{{env.region}}` and `{{env.account}}` in a string.
pub fn resolve_template(template: &str, config: &StackConfig) -> Result<String, String> {
    let mut result = template.to_string();
    let mut start = 0;

    while let Some(open) = result[start..].find("{{") {
        let open = start + open;
        let close = result[open..]
            .find("}}")
            .ok_or_else(|| format!("unclosed template at position {}", open))?;
        let close = open + close + 2;
        let key = result[open + 2..close - 2].trim();

        let value = if let Some(param_key) = key.strip_prefix("params.") {
            config
                .params
                .get(param_key)
                .map(yaml_value_to_string)
                .ok_or_else(|| format!("unknown param: {}", param_key))?
        } else {
            match key {
                "env.region" => config.env.region.clone(),
                "env.account" => config
                    .env
                    .account
                    .clone()
                    .ok_or_else(|| "env.account is referenced but not set".to_string())?,
                "stack" => config.stack.clone(),
                _ => return Err(format!("unknown template variable: {}", key)),
            }
        };

        result.replace_range(open..close, &value);
        start = open + value.len();
    }

    Ok(result)
}

/// Resolve templates in every string field that feeds a resource.
pub fn resolve_config_templates(config: &StackConfig) -> Result<StackConfig, String> {
    // The environment resolves first so other fields see its final values.
    let mut resolved = config.clone();
    resolved.env.region = resolve_template(&config.env.region, config)?;
    if let Some(ref account) = config.env.account {
        resolved.env.account = Some(resolve_template(account, config)?);
    }
    let base = resolved.clone();
    let r = |s: &str| resolve_template(s, &base);
    let r_all = |v: &[String]| v.iter().map(|s| r(s)).collect::<Result<Vec<_>, _>>();

    resolved.source.owner = r(&config.source.owner)?;
    resolved.source.repo = r(&config.source.repo)?;
    resolved.build.image = r(&config.build.image)?;
    resolved.build.compute_type = r(&config.build.compute_type)?;
    resolved.build.managed_policies = r_all(&config.build.managed_policies)?;
    resolved.build.service_principal = r(&config.build.service_principal)?;
    resolved.component.name = r(&config.component.name)?;
    resolved.component.version = r(&config.component.version)?;
    resolved.component.platform = r(&config.component.platform)?;
    resolved.component.path = r(&config.component.path)?;
    resolved.infrastructure.name = r(&config.infrastructure.name)?;
    resolved.infrastructure.instance_profile = r(&config.infrastructure.instance_profile)?;
    resolved.infrastructure.subnet_id = r(&config.infrastructure.subnet_id)?;
    resolved.infrastructure.security_group_ids = r_all(&config.infrastructure.security_group_ids)?;
    resolved.recipe.name = r(&config.recipe.name)?;
    resolved.recipe.version = r(&config.recipe.version)?;
    resolved.recipe.parent_image = r(&config.recipe.parent_image)?;
    resolved.recipe.base_components = r_all(&config.recipe.base_components)?;
    resolved.pipeline.name = r(&config.pipeline.name)?;
    resolved.pipeline.schedule = r(&config.pipeline.schedule)?;
    if let Some(ref description) = config.description {
        resolved.description = Some(r(description)?);
    }
    resolved.assets.qualifier = r(&config.assets.qualifier)?;
    if let Some(ref bucket) = config.assets.bucket {
        resolved.assets.bucket = Some(r(bucket)?);
    }

    Ok(resolved)
}

// ============================================================================
// Validation
// ============================================================================

/// Validate a resolved config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &StackConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut err = |message: String| errors.push(ValidationError { message });

    if config.version != "1.0" {
        err(format!("version must be \"1.0\", got \"{}\"", config.version));
    }
    if !STACK_NAME_RE.is_match(&config.stack) {
        err(format!(
            "stack name '{}' must start with a letter and contain only letters, digits and hyphens",
            config.stack
        ));
    }

    // Environment
    if !REGION_RE.is_match(&config.env.region) {
        err(format!("env.region '{}' is not a region name", config.env.region));
    }
    if let Some(ref account) = config.env.account {
        if !ACCOUNT_RE.is_match(account) {
            err(format!("env.account '{}' must be 12 digits", account));
        }
    }

    // Non-empty strings
    let required = [
        ("source.owner", &config.source.owner),
        ("source.repo", &config.source.repo),
        ("build.image", &config.build.image),
        ("build.compute_type", &config.build.compute_type),
        ("build.service_principal", &config.build.service_principal),
        ("component.name", &config.component.name),
        ("component.path", &config.component.path),
        ("infrastructure.name", &config.infrastructure.name),
        ("infrastructure.instance_profile", &config.infrastructure.instance_profile),
        ("infrastructure.subnet_id", &config.infrastructure.subnet_id),
        ("recipe.name", &config.recipe.name),
        ("pipeline.name", &config.pipeline.name),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            err(format!("{} must not be empty", field));
        }
    }

    for (field, value) in string_fields(config) {
        if value.contains("{{") {
            err(format!("{} has an unresolved template: '{}'", field, value));
        }
    }

    for (i, policy) in config.build.managed_policies.iter().enumerate() {
        if policy.trim().is_empty() {
            err(format!("build.managed_policies[{}] must not be empty", i));
        }
    }

    if config.infrastructure.security_group_ids.is_empty() {
        err("infrastructure.security_group_ids must list at least one group".to_string());
    }
    for (i, sg) in config.infrastructure.security_group_ids.iter().enumerate() {
        if sg.trim().is_empty() {
            err(format!("infrastructure.security_group_ids[{}] must not be empty", i));
        }
    }

    // Versions and platform
    for (field, version) in [
        ("component.version", &config.component.version),
        ("recipe.version", &config.recipe.version),
    ] {
        if !SEMVER_RE.is_match(version) {
            err(format!("{} '{}' must be major.minor.patch", field, version));
        }
    }
    if !PLATFORMS.contains(&config.component.platform.as_str()) {
        err(format!(
            "component.platform '{}' must be one of: {}",
            config.component.platform,
            PLATFORMS.join(", ")
        ));
    }

    // ARNs
    if !AMI_RE.is_match(&config.recipe.parent_image) {
        if let Err(message) =
            check_imagebuilder_arn("recipe.parent_image", &config.recipe.parent_image, "image", config)
        {
            err(message);
        }
    }
    for (i, component) in config.recipe.base_components.iter().enumerate() {
        let field = format!("recipe.base_components[{}]", i);
        if let Err(message) = check_imagebuilder_arn(&field, component, "component", config) {
            err(message);
        }
    }

    // Asset staging
    if !QUALIFIER_RE.is_match(&config.assets.qualifier) {
        err(format!(
            "assets.qualifier '{}' must be 1-10 lowercase letters or digits",
            config.assets.qualifier
        ));
    }
    if let Some(ref bucket) = config.assets.bucket {
        if bucket.trim().is_empty() {
            err("assets.bucket must not be empty when set".to_string());
        }
    }

    errors
}

/// Every string that ends up in a rendered resource, with its field path.
fn string_fields(config: &StackConfig) -> Vec<(String, &str)> {
    let mut fields: Vec<(String, &str)> = [
        ("env.region", &config.env.region),
        ("source.owner", &config.source.owner),
        ("source.repo", &config.source.repo),
        ("build.image", &config.build.image),
        ("build.compute_type", &config.build.compute_type),
        ("build.service_principal", &config.build.service_principal),
        ("component.name", &config.component.name),
        ("component.version", &config.component.version),
        ("component.platform", &config.component.platform),
        ("component.path", &config.component.path),
        ("infrastructure.name", &config.infrastructure.name),
        ("infrastructure.instance_profile", &config.infrastructure.instance_profile),
        ("infrastructure.subnet_id", &config.infrastructure.subnet_id),
        ("recipe.name", &config.recipe.name),
        ("recipe.version", &config.recipe.version),
        ("recipe.parent_image", &config.recipe.parent_image),
        ("pipeline.name", &config.pipeline.name),
        ("pipeline.schedule", &config.pipeline.schedule),
        ("assets.qualifier", &config.assets.qualifier),
    ]
    .into_iter()
    .map(|(field, value)| (field.to_string(), value.as_str()))
    .collect();

    let lists = [
        ("build.managed_policies", &config.build.managed_policies),
        ("infrastructure.security_group_ids", &config.infrastructure.security_group_ids),
        ("recipe.base_components", &config.recipe.base_components),
    ];
    for (field, values) in lists {
        for (i, value) in values.iter().enumerate() {
            fields.push((format!("{}[{}]", field, i), value.as_str()));
        }
    }
    let optional = [
        ("env.account", &config.env.account),
        ("description", &config.description),
        ("assets.bucket", &config.assets.bucket),
    ];
    for (field, value) in optional {
        if let Some(value) = value {
            fields.push((field.to_string(), value.as_str()));
        }
    }
    fields
}

fn check_imagebuilder_arn(
    field: &str,
    value: &str,
    resource_type: &str,
    config: &StackConfig,
) -> Result<(), String> {
    let arn: Arn = value.parse().map_err(|e| format!("{}: {}", field, e))?;
    if arn.service != "imagebuilder" {
        return Err(format!(
            "{}: expected an imagebuilder ARN, got service '{}'",
            field, arn.service
        ));
    }
    if arn.resource_type() != resource_type {
        return Err(format!(
            "{}: expected a {} ARN, got '{}'",
            field,
            resource_type,
            arn.resource_type()
        ));
    }
    if arn.region != config.env.region {
        return Err(format!(
            "{}: region '{}' does not match stack region '{}'",
            field, arn.region, config.env.region
        ));
    }
    Ok(())
}

/// Non-fatal findings about a valid config.
///
/// Broad managed policies on the build role are reported here rather than
/// rejected; whether the breadth is wanted is the stack owner's call.
pub fn lint_config(config: &StackConfig) -> Vec<String> {
    config
        .build
        .managed_policies
        .iter()
        .filter(|p| p.ends_with("FullAccess"))
        .map(|p| {
            format!(
                "build role gets broad managed policy '{}'; consider a scoped policy",
                p
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
version: "1.0"
stack: ImagePipelineStack
params:
  owner: acme
env:
  region: us-west-2
source:
  owner: "{{params.owner}}"
  repo: golden-images
infrastructure:
  subnet_id: subnet-xxxxxxxx
  security_group_ids: [sg-xxxxxxxx]
recipe:
  parent_image: "arn:aws:imagebuilder:{{env.region}}:aws:image/amazon-linux-2-x86/x.x.x"
  base_components:
    - arn:aws:imagebuilder:us-west-2:aws:component/amazon-linux-2-base-amazon-linux-2/
"#;

    fn resolved(yaml: &str) -> StackConfig {
        resolve_config_templates(&parse_config(yaml).unwrap()).unwrap()
    }

    fn messages(config: &StackConfig) -> Vec<String> {
        validate_config(config).into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn test_parse_valid() {
        let config = resolved(VALID);
        assert_eq!(config.source.owner, "acme");
        assert_eq!(
            config.recipe.parent_image,
            "arn:aws:imagebuilder:us-west-2:aws:image/amazon-linux-2-x86/x.x.x"
        );
        let errors = messages(&config);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_placeholders_pass_through() {
        let config = resolved(VALID);
        assert_eq!(config.infrastructure.subnet_id, "subnet-xxxxxxxx");
        assert_eq!(config.infrastructure.security_group_ids, vec!["sg-xxxxxxxx"]);
    }

    #[test]
    fn test_bad_version() {
        let mut config = resolved(VALID);
        config.version = "2.0".to_string();
        assert!(messages(&config).iter().any(|m| m.contains("version")));
    }

    #[test]
    fn test_bad_stack_name() {
        let mut config = resolved(VALID);
        config.stack = "1-stack_name".to_string();
        assert!(messages(&config).iter().any(|m| m.contains("stack name")));
    }

    #[test]
    fn test_empty_required_fields() {
        let mut config = resolved(VALID);
        config.source.owner = String::new();
        config.infrastructure.subnet_id = "  ".to_string();
        let errors = messages(&config);
        assert!(errors.iter().any(|m| m == "source.owner must not be empty"));
        assert!(errors
            .iter()
            .any(|m| m == "infrastructure.subnet_id must not be empty"));
    }

    #[test]
    fn test_empty_security_groups() {
        let mut config = resolved(VALID);
        config.infrastructure.security_group_ids.clear();
        assert!(messages(&config)
            .iter()
            .any(|m| m.contains("at least one group")));
    }

    #[test]
    fn test_bad_semver() {
        let mut config = resolved(VALID);
        config.recipe.version = "1.0".to_string();
        assert!(messages(&config)
            .iter()
            .any(|m| m.contains("recipe.version '1.0'")));
    }

    #[test]
    fn test_bad_platform() {
        let mut config = resolved(VALID);
        config.component.platform = "linux".to_string();
        assert!(messages(&config).iter().any(|m| m.contains("platform")));
    }

    #[test]
    fn test_malformed_parent_image() {
        let mut config = resolved(VALID);
        config.recipe.parent_image = "not-an-arn".to_string();
        assert!(messages(&config)
            .iter()
            .any(|m| m.contains("recipe.parent_image") && m.contains("malformed")));
    }

    #[test]
    fn test_parent_image_accepts_ami() {
        let mut config = resolved(VALID);
        config.recipe.parent_image = "ami-0123456789abcdef0".to_string();
        assert!(messages(&config).is_empty());
    }

    #[test]
    fn test_region_mismatch() {
        let mut config = resolved(VALID);
        config.env.region = "eu-west-1".to_string();
        let errors = messages(&config);
        assert!(errors.iter().any(|m| m.contains("does not match stack region")));
    }

    #[test]
    fn test_base_component_must_be_component() {
        let mut config = resolved(VALID);
        config.recipe.base_components =
            vec!["arn:aws:imagebuilder:us-west-2:aws:image/amazon-linux-2-x86/x.x.x".to_string()];
        assert!(messages(&config)
            .iter()
            .any(|m| m.contains("expected a component ARN")));
    }

    #[test]
    fn test_schedule_not_validated() {
        let mut config = resolved(VALID);
        config.pipeline.schedule = "whenever".to_string();
        assert!(messages(&config).is_empty());
    }

    #[test]
    fn test_bad_account() {
        let mut config = resolved(VALID);
        config.env.account = Some("1234".to_string());
        assert!(messages(&config).iter().any(|m| m.contains("12 digits")));
    }

    #[test]
    fn test_resolve_unknown_param() {
        let config = parse_config(VALID).unwrap();
        let result = resolve_template("{{params.missing}}", &config);
        assert!(result.unwrap_err().contains("unknown param"));
    }

    #[test]
    fn test_resolve_unset_account() {
        let config = parse_config(VALID).unwrap();
        let result = resolve_template("{{env.account}}", &config);
        assert!(result.unwrap_err().contains("not set"));
    }

    #[test]
    fn test_resolve_multiple() {
        let config = parse_config(VALID).unwrap();
        let result = resolve_template("{{stack}}-{{params.owner}}-{{ env.region }}", &config);
        assert_eq!(result.unwrap(), "ImagePipelineStack-acme-us-west-2");
    }

    #[test]
    fn test_resolve_unclosed() {
        let config = parse_config(VALID).unwrap();
        assert!(resolve_template("{{params.owner", &config).is_err());
    }

    #[test]
    fn test_resolve_build_and_platform_fields() {
        let yaml = VALID.replace(
            "params:\n  owner: acme\n",
            "params:\n  owner: acme\n  ct: BUILD_GENERAL1_MEDIUM\n  os: Linux\n",
        ) + "build:\n  compute_type: \"{{params.ct}}\"\ncomponent:\n  platform: \"{{params.os}}\"\n";
        let config = resolved(&yaml);
        assert_eq!(config.build.compute_type, "BUILD_GENERAL1_MEDIUM");
        assert_eq!(config.component.platform, "Linux");
        assert!(messages(&config).is_empty());
    }

    #[test]
    fn test_unknown_param_in_service_principal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.yaml");
        let yaml = format!("{}build:\n  service_principal: \"{{{{params.nope}}}}\"\n", VALID);
        std::fs::write(&path, yaml).unwrap();
        match load_stack_config(&path) {
            Err(SynthError::Config(message)) => assert!(message.contains("unknown param: nope")),
            other => panic!("expected template error, got {:?}", other),
        }
    }

    #[test]
    fn test_region_from_param() {
        let yaml = VALID.replace("region: us-west-2", "region: \"{{params.region}}\"").replace(
            "params:\n  owner: acme\n",
            "params:\n  owner: acme\n  region: us-west-2\n",
        );
        let config = resolved(&yaml);
        assert_eq!(config.env.region, "us-west-2");
        assert_eq!(
            config.recipe.parent_image,
            "arn:aws:imagebuilder:us-west-2:aws:image/amazon-linux-2-x86/x.x.x"
        );
    }

    #[test]
    fn test_unresolved_template_rejected() {
        let mut config = resolved(VALID);
        config.build.service_principal = "{{params.nope}}".to_string();
        assert!(messages(&config)
            .iter()
            .any(|m| m.contains("build.service_principal has an unresolved template")));
        assert!(ensure_valid(&config).is_err());
    }

    #[test]
    fn test_lint_broad_policy() {
        let config = resolved(VALID);
        let warnings = lint_config(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("AmazonS3FullAccess"));
    }

    #[test]
    fn test_load_stack_config_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stack.yaml");
        std::fs::write(&path, VALID.replace("1.0\"", "9.9\"")).unwrap();
        match load_stack_config(&path) {
            Err(SynthError::Invalid(errors)) => {
                assert!(errors.iter().any(|m| m.contains("version")))
            }
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_invalid_yaml() {
        assert!(parse_config("not: [valid: yaml: {{").is_err());
    }
}
