use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use log::{debug, info};

use mdbform_core::diagnostics::Diagnostics;
use mdbform_core::differ::create_plan;
use mdbform_core::effect::Effect;
use mdbform_core::plan::Plan;
use mdbform_core::provider::{Provider, ProviderError, ProviderResult};
use mdbform_core::resource::{Resource, ResourceId, State};
use mdbform_core::schema::ResourceSchema;
use mdbform_provider_greenplum::config::{
    DEFAULT_ENDPOINT, DEFAULT_OPERATION_ENDPOINT, DEFAULT_OPERATION_TIMEOUT, DEFAULT_POLL_INTERVAL,
};
use mdbform_provider_greenplum::resources::resource_types;
use mdbform_provider_greenplum::{GreenplumProvider, ProviderConfig};
use mdbform_state::{LocalBackend, ResourceState, StateBackend, StateFile};

mod config_file;
mod display;

use display::{format_effect, print_diagnostics, print_plan, print_schema};

#[derive(Parser)]
#[command(name = "mdbform")]
#[command(about = "Declarative management of Managed Greenplum clusters", long_about = None)]
struct Cli {
    /// Path to the state file
    #[arg(long, global = true, default_value = LocalBackend::DEFAULT_STATE_FILE)]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate {
        /// Path to the JSON configuration file
        #[arg(default_value = "main.json")]
        file: PathBuf,
    },
    /// Show the attribute schema of a resource type
    Schema {
        /// Resource type; every type when omitted
        resource_type: Option<String>,
    },
    /// Show execution plan without applying changes
    Plan {
        #[arg(default_value = "main.json")]
        file: PathBuf,

        /// Plan against the recorded state without reading the cloud
        #[arg(long)]
        no_refresh: bool,

        #[command(flatten)]
        provider: ProviderArgs,
    },
    /// Apply changes to reach the desired state
    Apply {
        #[arg(default_value = "main.json")]
        file: PathBuf,

        #[command(flatten)]
        provider: ProviderArgs,
    },
    /// Destroy all resources defined in the configuration file
    Destroy {
        #[arg(default_value = "main.json")]
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,

        #[command(flatten)]
        provider: ProviderArgs,
    },
    /// Inspect and maintain the state file
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List resources recorded in the state
    List,
    /// Show the recorded attributes of one resource
    Show {
        /// Resource address, e.g. greenplum_cluster.analytics
        address: String,
    },
    /// Remove a stale state lock
    ForceUnlock {
        lock_id: String,
    },
}

/// Connection settings for the cloud API
#[derive(Args)]
struct ProviderArgs {
    /// IAM token
    #[arg(long, env = "YC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Folder for clusters that do not set folder_id
    #[arg(long, env = "YC_FOLDER_ID")]
    folder_id: Option<String>,

    #[arg(long, env = "YC_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    #[arg(long, env = "YC_OPERATION_ENDPOINT", default_value = DEFAULT_OPERATION_ENDPOINT)]
    operation_endpoint: String,

    /// Seconds between operation status checks
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    poll_interval: u64,

    /// Seconds to wait for an operation before giving up
    #[arg(long, default_value_t = DEFAULT_OPERATION_TIMEOUT.as_secs())]
    operation_timeout: u64,
}

impl ProviderArgs {
    fn provider_config(&self) -> ProviderConfig {
        let config = ProviderConfig::new(self.token.clone().unwrap_or_default())
            .with_endpoint(self.endpoint.clone())
            .with_operation_endpoint(self.operation_endpoint.clone())
            .with_polling(
                Duration::from_secs(self.poll_interval),
                Duration::from_secs(self.operation_timeout),
            );
        match &self.folder_id {
            Some(folder_id) => config.with_folder_id(folder_id.clone()),
            None => config,
        }
    }

    fn build_provider(&self) -> Result<Box<dyn Provider>, String> {
        let config = self.provider_config();
        debug!("provider configuration: {:?}", config);
        let provider = GreenplumProvider::from_config(config).map_err(|e| e.to_string())?;
        Ok(Box::new(provider))
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let backend = LocalBackend::with_path(cli.state);

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file),
        Commands::Schema { resource_type } => run_schema(resource_type.as_deref()),
        Commands::Plan {
            file,
            no_refresh,
            provider,
        } => run_plan(&backend, &file, &provider, no_refresh).await,
        Commands::Apply { file, provider } => run_apply(&backend, &file, &provider).await,
        Commands::Destroy {
            file,
            auto_approve,
            provider,
        } => run_destroy(&backend, &file, &provider, auto_approve).await,
        Commands::State { command } => run_state_command(&backend, command).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn get_schemas() -> HashMap<String, ResourceSchema> {
    resource_types()
        .into_iter()
        .map(|t| (t.name().to_string(), t.schema()))
        .collect()
}

fn load_resources(file: &Path, schemas: &HashMap<String, ResourceSchema>) -> Result<Vec<Resource>, String> {
    let content = fs::read_to_string(file)
        .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    config_file::parse_config(&content, schemas).map_err(|diags| diags.to_string())
}

fn validate_resources(
    resources: &[Resource],
    schemas: &HashMap<String, ResourceSchema>,
) -> Result<(), String> {
    let mut all = Diagnostics::new();
    for resource in resources {
        if let Some(schema) = schemas.get(&resource.id.resource_type) {
            all.extend(schema.validate(&resource.attributes).prefixed(&resource.id.to_string()));
        }
    }
    print_diagnostics(&all);
    all.into_result().map_err(|diags| diags.to_string())
}

fn run_validate(file: &Path) -> Result<(), String> {
    let schemas = get_schemas();
    let resources = load_resources(file, &schemas)?;
    validate_resources(&resources, &schemas)?;
    println!(
        "{}",
        format!("Configuration is valid ({} resources).", resources.len()).green()
    );
    Ok(())
}

fn run_schema(resource_type: Option<&str>) -> Result<(), String> {
    let schemas = get_schemas();
    let mut names: Vec<&String> = match resource_type {
        Some(name) if schemas.contains_key(name) => schemas.keys().filter(|k| *k == name).collect(),
        Some(name) => return Err(format!("Unknown resource type '{}'", name)),
        None => schemas.keys().collect(),
    };
    names.sort();
    for name in names {
        print_schema(&schemas[name]);
        println!();
    }
    Ok(())
}

// =============================================================================
// State handling
// =============================================================================

async fn read_state_file(backend: &LocalBackend) -> Result<StateFile, String> {
    Ok(backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default())
}

/// Decode every recorded resource
fn recorded_states(
    state_file: &StateFile,
    schemas: &HashMap<String, ResourceSchema>,
) -> Result<HashMap<ResourceId, State>, String> {
    let mut states = HashMap::new();
    for recorded in &state_file.resources {
        let id = recorded.resource_id();
        let schema = schemas
            .get(&recorded.resource_type)
            .ok_or_else(|| format!("State holds unsupported resource type '{}'", id))?;
        let state = recorded.to_state(schema).map_err(|diags| diags.to_string())?;
        states.insert(id, state);
    }
    Ok(states)
}

/// Read every recorded resource from the cloud
///
/// Resources that no longer exist are left out of the result.
async fn refresh(
    provider: &dyn Provider,
    recorded: &HashMap<ResourceId, State>,
) -> Result<HashMap<ResourceId, State>, String> {
    let mut ids: Vec<&ResourceId> = recorded.keys().collect();
    ids.sort_by_key(|id| id.to_string());

    let mut current = HashMap::new();
    for id in ids {
        let prior = &recorded[id];
        let state = provider
            .read(id, prior.identifier.as_deref(), Some(prior))
            .await
            .map_err(|e| format!("Failed to read state: {}", e))?;
        if state.exists {
            current.insert(id.clone(), state);
        } else {
            info!("{} no longer exists", id);
        }
    }
    Ok(current)
}

fn record(state_file: &mut StateFile, state: &State, provider: &str) -> Result<(), String> {
    let recorded = ResourceState::from_state(state, provider)
        .map_err(|e| format!("Failed to record {}: {}", state.id, e))?;
    state_file.upsert_resource(recorded);
    Ok(())
}

async fn save(backend: &LocalBackend, state_file: &mut StateFile) -> Result<(), String> {
    state_file.increment_serial();
    backend
        .write_state(state_file)
        .await
        .map_err(|e| format!("Failed to write state: {}", e))
}

/// Bring the state file in line with refreshed states
async fn save_refreshed(
    backend: &LocalBackend,
    state_file: &mut StateFile,
    current: &HashMap<ResourceId, State>,
    provider: &str,
) -> Result<(), String> {
    let before = state_file.resources.clone();
    for recorded in before.iter() {
        let id = recorded.resource_id();
        match current.get(&id) {
            Some(state) => record(state_file, state, provider)?,
            None => {
                state_file.remove_resource(&id);
            }
        }
    }
    if state_file.resources != before {
        save(backend, state_file).await?;
    }
    Ok(())
}

/// Run a command while holding the state lock
async fn with_lock<T, F>(backend: &LocalBackend, operation: &str, run: F) -> Result<T, String>
where
    F: std::future::Future<Output = Result<T, String>>,
{
    let lock = backend
        .acquire_lock(operation)
        .await
        .map_err(|e| e.to_string())?;
    let result = run.await;
    let released = backend
        .release_lock(&lock)
        .await
        .map_err(|e| format!("Failed to release state lock: {}", e));
    let value = result?;
    released?;
    Ok(value)
}

// =============================================================================
// Commands
// =============================================================================

async fn run_plan(
    backend: &LocalBackend,
    file: &Path,
    args: &ProviderArgs,
    no_refresh: bool,
) -> Result<(), String> {
    let schemas = get_schemas();
    let resources = load_resources(file, &schemas)?;
    validate_resources(&resources, &schemas)?;

    let state_file = read_state_file(backend).await?;
    let recorded = recorded_states(&state_file, &schemas)?;
    let current = if no_refresh {
        recorded
    } else {
        let provider = args.build_provider()?;
        refresh(provider.as_ref(), &recorded).await?
    };

    let plan = create_plan(&schemas, &resources, &current).map_err(|diags| diags.to_string())?;
    print_plan(&plan, &schemas);
    Ok(())
}

async fn run_apply(backend: &LocalBackend, file: &Path, args: &ProviderArgs) -> Result<(), String> {
    let schemas = get_schemas();
    let resources = load_resources(file, &schemas)?;
    validate_resources(&resources, &schemas)?;
    let provider = args.build_provider()?;

    with_lock(backend, "apply", async {
        let mut state_file = read_state_file(backend).await?;
        let recorded = recorded_states(&state_file, &schemas)?;
        let current = refresh(provider.as_ref(), &recorded).await?;
        save_refreshed(backend, &mut state_file, &current, provider.name()).await?;

        let plan = create_plan(&schemas, &resources, &current).map_err(|diags| diags.to_string())?;
        if plan.is_empty() {
            println!("{}", "No changes needed.".green());
            return Ok(());
        }
        print_plan(&plan, &schemas);
        println!();
        println!("{}", "Applying changes...".cyan().bold());
        println!();

        apply_plan(backend, provider.as_ref(), &mut state_file, &plan).await
    })
    .await
}

fn identifier_of(state: &State) -> ProviderResult<&str> {
    state.identifier.as_deref().ok_or_else(|| {
        ProviderError::new("no cloud identifier recorded in state").for_resource(state.id.clone())
    })
}

/// Execute each effect, recording progress in the state after every change
async fn apply_plan(
    backend: &LocalBackend,
    provider: &dyn Provider,
    state_file: &mut StateFile,
    plan: &Plan,
) -> Result<(), String> {
    let mut success_count = 0;
    let mut failure_count = 0;

    for effect in plan.effects() {
        let outcome: ProviderResult<()> = match effect {
            Effect::Create(resource) => match provider.create(resource).await {
                Ok(state) => {
                    record(state_file, &state, provider.name())?;
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Effect::Update { id, from, to, .. } => {
                let updated = match identifier_of(from) {
                    Ok(identifier) => provider.update(id, identifier, from, to).await,
                    Err(e) => Err(e),
                };
                match updated {
                    Ok(state) => {
                        record(state_file, &state, provider.name())?;
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            Effect::Replace { id, from, to, .. } => {
                let deleted = match identifier_of(from) {
                    Ok(identifier) => provider.delete(id, identifier).await,
                    Err(e) => Err(e),
                };
                match deleted {
                    Ok(()) => {
                        state_file.remove_resource(id);
                        save(backend, state_file).await?;
                        match provider.create(to).await {
                            Ok(state) => {
                                record(state_file, &state, provider.name())?;
                                Ok(())
                            }
                            Err(e) => Err(e),
                        }
                    }
                    Err(e) => Err(e),
                }
            }
            Effect::Delete(state) => {
                let deleted = match identifier_of(state) {
                    Ok(identifier) => provider.delete(&state.id, identifier).await,
                    Err(e) => Err(e),
                };
                if deleted.is_ok() {
                    state_file.remove_resource(&state.id);
                }
                deleted
            }
        };

        match outcome {
            Ok(()) => {
                save(backend, state_file).await?;
                println!("  {} {}", "✓".green(), format_effect(effect));
                success_count += 1;
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), format_effect(effect), e);
                failure_count += 1;
            }
        }
    }

    println!();
    if failure_count == 0 {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Apply failed. {} succeeded, {} failed.",
            success_count, failure_count
        ))
    }
}

async fn run_destroy(
    backend: &LocalBackend,
    file: &Path,
    args: &ProviderArgs,
    auto_approve: bool,
) -> Result<(), String> {
    let schemas = get_schemas();
    let resources = load_resources(file, &schemas)?;
    if resources.is_empty() {
        println!("{}", "No resources defined in configuration.".yellow());
        return Ok(());
    }
    let provider = args.build_provider()?;

    with_lock(backend, "destroy", async {
        let mut state_file = read_state_file(backend).await?;
        let recorded = recorded_states(&state_file, &schemas)?;
        let current = refresh(provider.as_ref(), &recorded).await?;
        save_refreshed(backend, &mut state_file, &current, provider.name()).await?;

        let targets: Vec<&State> = resources
            .iter()
            .rev()
            .filter_map(|r| current.get(&r.id))
            .collect();
        if targets.is_empty() {
            println!("{}", "No resources to destroy.".green());
            return Ok(());
        }

        println!("{}", "Resources to be destroyed:".red().bold());
        println!();
        for state in &targets {
            println!("  {} {}", "-".red().bold(), state.id);
        }
        println!();
        println!("Plan: {} to destroy.", targets.len().to_string().red());
        println!();

        if !auto_approve && !confirm_destroy()? {
            println!();
            println!("{}", "Destroy cancelled.".yellow());
            return Ok(());
        }

        println!("{}", "Destroying resources...".red().bold());
        println!();

        let mut plan = Plan::new();
        for state in targets {
            plan.add(Effect::Delete(state.clone()));
        }
        apply_plan(backend, provider.as_ref(), &mut state_file, &plan).await
    })
    .await
}

fn confirm_destroy() -> Result<bool, String> {
    println!(
        "{}",
        "Do you really want to destroy all resources?"
            .yellow()
            .bold()
    );
    println!(
        "  {}",
        "This action cannot be undone. Type 'yes' to confirm.".yellow()
    );
    print!("\n  Enter a value: ");
    std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    Ok(input.trim() == "yes")
}

async fn run_state_command(backend: &LocalBackend, command: StateCommands) -> Result<(), String> {
    match command {
        StateCommands::List => {
            let state_file = read_state_file(backend).await?;
            if state_file.resources.is_empty() {
                println!("{}", "No resources in state.".yellow());
            }
            for recorded in &state_file.resources {
                match &recorded.identifier {
                    Some(identifier) => println!("{} ({})", recorded.resource_id(), identifier),
                    None => println!("{}", recorded.resource_id()),
                }
            }
            Ok(())
        }
        StateCommands::Show { address } => {
            let (resource_type, name) = address
                .split_once('.')
                .ok_or_else(|| format!("Invalid address '{}': expected TYPE.NAME", address))?;
            let id = ResourceId::new(resource_type, name);
            let state_file = read_state_file(backend).await?;
            let recorded = state_file
                .find_resource(&id)
                .ok_or_else(|| format!("{} is not in the state", id))?;
            let schema = get_schemas()
                .remove(resource_type)
                .ok_or_else(|| format!("Unknown resource type '{}'", resource_type))?;

            println!("{}", id.to_string().cyan().bold());
            if let Some(identifier) = &recorded.identifier {
                println!("  id = \"{}\"", identifier);
            }
            for (name, value) in &recorded.attributes {
                let sensitive = schema.attributes.get(name).is_some_and(|a| a.sensitive);
                let shown = if sensitive {
                    "(sensitive)".to_string()
                } else {
                    value.to_string()
                };
                println!("  {} = {}", name, shown);
            }
            Ok(())
        }
        StateCommands::ForceUnlock { lock_id } => {
            backend
                .force_unlock(&lock_id)
                .await
                .map_err(|e| e.to_string())?;
            println!("{}", format!("Lock {} removed.", lock_id).green());
            Ok(())
        }
    }
}
