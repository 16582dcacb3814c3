//! Slotlink CLI - run and inspect guests of the slot call surface
//!
//! Commands:
//!   slotlink schema         - List every host operation and the surface fingerprint
//!   slotlink check <wasm>   - Validate a guest's imports and exports
//!   slotlink run <wasm>     - Run a guest against a scene

use clap::{Parser, Subcommand};
use slotlink::abi::{surface_fingerprint, Namespace, SCHEMA, SCRIPT_MODULE_NAME};
use slotlink::{Runtime, RuntimeConfig, World};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use wasmtime::Val;

#[derive(Parser)]
#[command(name = "slotlink")]
#[command(about = "Run WASM guests against a slot world", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the host call surface
    Schema {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a guest module against the host call surface
    Check {
        /// Path to the WASM file
        wasm_file: PathBuf,
    },

    /// Run a guest module
    Run {
        /// Path to the WASM file
        wasm_file: PathBuf,

        /// JSON scene to load; an empty world otherwise
        #[arg(long, short)]
        scene: Option<PathBuf>,

        /// Export to call
        #[arg(long, short, default_value = "run")]
        entry: String,

        /// Call the function described by this args slot instead of --entry
        #[arg(long, conflicts_with = "entry")]
        args_slot: Option<String>,

        /// Fuel limit for the guest
        #[arg(long)]
        fuel: Option<u64>,

        /// Print the world after the call
        #[arg(long)]
        outline: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Schema { json } => schema_command(json),
        Commands::Check { wasm_file } => check_command(&wasm_file),
        Commands::Run {
            wasm_file,
            scene,
            entry,
            args_slot,
            fuel,
            outline,
        } => run_command(&wasm_file, scene.as_deref(), &entry, args_slot.as_deref(), fuel, outline),
    }
}

fn schema_command(json: bool) -> anyhow::Result<()> {
    let fingerprint = surface_fingerprint();

    if json {
        let output = serde_json::json!({
            "module": SCRIPT_MODULE_NAME,
            "fingerprint": fingerprint.to_hex(),
            "operations": SCHEMA,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("module {} ({} operations)", SCRIPT_MODULE_NAME, SCHEMA.len());
    println!("fingerprint {}", fingerprint);
    for namespace in [Namespace::Slot, Namespace::Component, Namespace::Value] {
        println!("{}:", namespace.as_str());
        for op in SCHEMA.iter().filter(|op| op.namespace == namespace) {
            println!("  {}", op);
        }
    }
    Ok(())
}

fn read_wasm(wasm_file: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(wasm_file)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", wasm_file.display(), e))
}

fn check_command(wasm_file: &Path) -> anyhow::Result<()> {
    let wasm_bytes = read_wasm(wasm_file)?;
    let runtime = Runtime::new();
    let module = runtime.load_module(&wasm_bytes)?;
    let ops = module.validate()?;

    println!("{}: ok", wasm_file.display());
    println!("imports {} of {} operations:", ops.len(), SCHEMA.len());
    for op in ops {
        println!("  {}", op.schema());
    }
    Ok(())
}

fn run_command(
    wasm_file: &Path,
    scene: Option<&Path>,
    entry: &str,
    args_slot: Option<&str>,
    fuel: Option<u64>,
    outline: bool,
) -> anyhow::Result<()> {
    let wasm_bytes = read_wasm(wasm_file)?;
    let world = match scene {
        Some(path) => World::from_scene_file(path)?,
        None => World::default(),
    };
    tracing::info!(
        slots = world.slot_count(),
        components = world.component_count(),
        "world ready"
    );

    let config = RuntimeConfig {
        fuel,
        ..RuntimeConfig::default()
    };
    let runtime = Runtime::with_config(config)?;
    let module = runtime.load_module(&wasm_bytes)?;
    let mut instance = module.instantiate(world)?;

    let results = match args_slot {
        Some(path) => {
            let slot = instance
                .handler()
                .slot_by_path(path)
                .ok_or_else(|| anyhow::anyhow!("No slot at path {:?}", path))?;
            instance.call_from_slot(slot)?
        }
        None => instance.call(entry, &[])?,
    };

    if !results.is_empty() {
        let rendered: Vec<String> = results.iter().map(render_val).collect();
        println!("{}", rendered.join(" "));
    }
    if let Some(left) = instance.fuel_remaining() {
        tracing::info!(fuel_remaining = left, "guest finished");
    }
    if outline {
        print!("{}", instance.handler().outline());
    }
    Ok(())
}

fn render_val(val: &Val) -> String {
    match val {
        Val::I32(v) => v.to_string(),
        Val::I64(v) => v.to_string(),
        Val::F32(bits) => f32::from_bits(*bits).to_string(),
        Val::F64(bits) => f64::from_bits(*bits).to_string(),
        other => format!("{:?}", other),
    }
}
