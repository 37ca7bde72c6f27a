//! CLI subcommands: init, validate, synth, graph, diff, schema.

use crate::core::{assembler, diff, parser, synth, types};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new stack project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate stack.yaml without touching the asset or the output
    Validate {
        /// Path to stack.yaml
        #[arg(short, long, default_value = "stack.yaml")]
        file: PathBuf,
    },

    /// Assemble the stack and write the cloud assembly
    Synth {
        /// Path to stack.yaml
        #[arg(short, long, default_value = "stack.yaml")]
        file: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "cdk.out")]
        out: PathBuf,
    },

    /// Show the resource dependency graph
    Graph {
        /// Path to stack.yaml
        #[arg(short, long, default_value = "stack.yaml")]
        file: PathBuf,
    },

    /// Compare the stack against the last synthesized template
    Diff {
        /// Path to stack.yaml
        #[arg(short, long, default_value = "stack.yaml")]
        file: PathBuf,

        /// Directory holding the previous cloud assembly
        #[arg(short, long, default_value = "cdk.out")]
        out: PathBuf,

        /// Exit non-zero when there are changes (for CI)
        #[arg(long)]
        fail: bool,
    },

    /// Print the JSON schema of stack.yaml
    Schema,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Synth { file, out } => cmd_synth(&file, &out),
        Commands::Graph { file } => cmd_graph(&file),
        Commands::Diff { file, out, fail } => cmd_diff(&file, &out, fail),
        Commands::Schema => cmd_schema(),
    }
}

const STACK_TEMPLATE: &str = r#"version: "1.0"
stack: CdkEc2ImageBuilderStack
description: "EC2 Image Builder pipeline"

params: {}

env:
  region: us-west-2

source:
  owner: your-github-username
  repo: your-github-repo
  webhook: true

build:
  image: aws/codebuild/standard:5.0
  managed_policies:
    - AmazonS3FullAccess
    - EC2InstanceProfileForImageBuilder

component:
  name: InstallNginx
  version: 1.0.0
  platform: Linux
  path: imagebuilder_components/install_nginx.yml

infrastructure:
  name: MyInfrastructureConfiguration
  instance_profile: EC2InstanceProfileForImageBuilder
  subnet_id: subnet-xxxxxxxx
  security_group_ids: [sg-xxxxxxxx]

recipe:
  name: MySOEImageRecipe
  version: 1.0.0
  parent_image: "arn:aws:imagebuilder:{{env.region}}:aws:image/amazon-linux-2-x86/x.x.x"
  base_components:
    - "arn:aws:imagebuilder:{{env.region}}:aws:component/amazon-linux-2-base-amazon-linux-2/"

pipeline:
  name: MyImagePipeline
  schedule: cron(0 0 * * ? *)
"#;

const COMPONENT_TEMPLATE: &str = r#"name: InstallNginx
description: Install and enable nginx
schemaVersion: 1.0

phases:
  - name: build
    steps:
      - name: InstallNginx
        action: ExecuteBash
        inputs:
          commands:
            - sudo amazon-linux-extras install -y nginx1
            - sudo systemctl enable nginx
  - name: validate
    steps:
      - name: CheckNginx
        action: ExecuteBash
        inputs:
          commands:
            - nginx -v
"#;

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join("stack.yaml");
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }

    let components_dir = path.join("imagebuilder_components");
    std::fs::create_dir_all(&components_dir)
        .map_err(|e| format!("cannot create {}: {}", components_dir.display(), e))?;
    let component_path = components_dir.join("install_nginx.yml");

    std::fs::write(&config_path, STACK_TEMPLATE)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;
    if !component_path.exists() {
        std::fs::write(&component_path, COMPONENT_TEMPLATE)
            .map_err(|e| format!("cannot write {}: {}", component_path.display(), e))?;
    }

    println!("Initialized stack project at {}", path.display());
    println!("  Created: {}", config_path.display());
    println!("  Created: {}", component_path.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let config = parser::parse_config_file(file)?;
    let config = parser::resolve_config_templates(&config)?;
    let errors = parser::validate_config(&config);

    if errors.is_empty() {
        for warning in parser::lint_config(&config) {
            eprintln!("  WARNING: {}", warning);
        }
        println!(
            "OK: {} ({} region, {} base component(s))",
            config.stack,
            config.env.region,
            config.recipe.base_components.len()
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

/// Load, validate and assemble the stack described by `file`.
fn load_and_assemble(file: &Path) -> Result<assembler::Stack, String> {
    let config = parser::load_stack_config(file).map_err(|e| e.to_string())?;
    let base_dir = file.parent().unwrap_or_else(|| Path::new("."));
    assembler::assemble(&config, base_dir).map_err(|e| e.to_string())
}

fn cmd_synth(file: &Path, out: &Path) -> Result<(), String> {
    let stack = load_and_assemble(file)?;
    let files = synth::write_cloud_assembly(&stack, out).map_err(|e| e.to_string())?;
    let fingerprint = synth::template_fingerprint(&synth::render_template(&stack));

    println!("Synthesized: {} ({} resources)", stack.name(), stack.graph().len());
    println!("  Template: {}", files.template.display());
    println!("  Assets:   {}", files.asset_manifest.display());
    for asset in &files.assets {
        println!("            {}", asset.display());
    }
    println!("  Hash:     {}", fingerprint);
    Ok(())
}

fn cmd_graph(file: &Path) -> Result<(), String> {
    let stack = load_and_assemble(file)?;
    print_graph(&stack);
    Ok(())
}

/// Display execution order with each resource's direct dependencies.
fn print_graph(stack: &assembler::Stack) {
    println!("Stack: {} ({} resources)", stack.name(), stack.graph().len());
    println!();
    for (i, id) in stack.graph().execution_order().iter().enumerate() {
        let kind = stack
            .resource(id)
            .map(|r| r.kind.cfn_type())
            .unwrap_or("?");
        println!("{:>2}. {} [{}]", i + 1, id, kind);
        for dep in stack.graph().dependencies_of(id) {
            println!("      <- {}", dep);
        }
    }
    println!();
    println!(
        "Asset: {} -> {}",
        stack.asset().source_path.display(),
        stack.asset().object_key()
    );
}

fn cmd_diff(file: &Path, out: &Path, fail_on_changes: bool) -> Result<(), String> {
    let stack = load_and_assemble(file)?;
    let current = synth::render_template(&stack);
    let previous_path = out.join(synth::template_file_name(stack.name()));
    let previous = synth::load_template(&previous_path).map_err(|e| e.to_string())?;
    if previous.is_none() {
        println!("No previous template at {}", previous_path.display());
    }

    let result = diff::diff_templates(previous.as_ref(), &current);
    print_diff(stack.name(), &result);

    if fail_on_changes && result.has_changes() {
        return Err(format!(
            "{} resource change(s)",
            result.to_add + result.to_modify + result.to_remove
        ));
    }
    Ok(())
}

/// Display a diff to stdout.
fn print_diff(stack_name: &str, result: &diff::TemplateDiff) {
    println!("Stack {}", stack_name);
    for change in &result.changes {
        let symbol = match change.action {
            diff::ChangeAction::Add => "+",
            diff::ChangeAction::Modify => "~",
            diff::ChangeAction::Remove => "-",
            diff::ChangeAction::NoChange => " ",
        };
        println!("  {} {} {}", symbol, change.resource_type, change.logical_id);
    }
    println!();
    println!(
        "Diff: {} to add, {} to modify, {} to remove, {} unchanged.",
        result.to_add, result.to_modify, result.to_remove, result.unchanged
    );
}

fn cmd_schema() -> Result<(), String> {
    let schema = schemars::schema_for!(types::StackConfig);
    let json = serde_json::to_string_pretty(&schema).map_err(|e| format!("schema error: {}", e))?;
    println!("{}", json);
    Ok(())
}
