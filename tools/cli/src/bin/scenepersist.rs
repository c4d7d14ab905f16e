use std::io::{self, Write};
use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scene_persistence::{
    selection_json_schema, snapshot_json_schema, EncodedPayloadMap, Pacing, PersistConfig,
    PersistenceService, PrefabLibrary, StateCodec,
};
use tracing::Level;

#[derive(Parser)]
#[command(author, version, about = "Inspect and manage scene save slots")]
struct Cli {
    /// Save root; overrides the config file and the platform data directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage save slots.
    Slots {
        #[command(subcommand)]
        action: SlotAction,
    },
    /// Print the records stored in a slot.
    Inspect { slot: String },
    /// Manage selection snapshots.
    Selections {
        #[command(subcommand)]
        action: SelectionAction,
    },
    /// Show how a progressive load of a slot would be paced.
    Plan { slot: String },
    /// Print the JSON schema of the document format.
    Schema {
        /// Schema of selection documents instead of slot documents.
        #[arg(long, default_value_t = false)]
        selection: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SlotAction {
    List,
    Create { name: String },
    Delete { name: String },
}

#[derive(Subcommand)]
enum SelectionAction {
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    run(cli, &mut out)
}

fn load_config(cli: &Cli) -> Result<PersistConfig> {
    let mut config = match &cli.config {
        Some(path) => PersistConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => PersistConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.storage.root = Some(root.clone());
    }
    Ok(config)
}

fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    let config = load_config(&cli)?;
    let mut service = PersistenceService::new(config, StateCodec::new(), PrefabLibrary::new())
        .context("open save root")?;

    match cli.command {
        Command::Slots { action } => match action {
            SlotAction::List => list_slots(&mut service, out)?,
            SlotAction::Create { name } => {
                let file = service.create_empty_slot(&name)?;
                writeln!(out, "created {file}")?;
            }
            SlotAction::Delete { name } => {
                if service.delete_slot(&name) {
                    writeln!(out, "deleted {name}")?;
                } else {
                    writeln!(out, "no slot named {name}")?;
                }
            }
        },
        Command::Inspect { slot } => inspect_slot(&service, &slot, out)?,
        Command::Selections { action } => match action {
            SelectionAction::List => list_selections(&service, out)?,
        },
        Command::Plan { slot } => plan_slot(&service, &slot, out)?,
        Command::Schema { selection, output } => {
            let schema = if selection {
                selection_json_schema()
            } else {
                snapshot_json_schema()
            };
            let json = serde_json::to_string_pretty(&schema)?;
            match output {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("write {}", path.display()))?,
                None => writeln!(out, "{json}")?,
            }
        }
    }
    service.shutdown();
    Ok(())
}

fn list_slots(
    service: &mut PersistenceService<PrefabLibrary>,
    out: &mut impl Write,
) -> Result<()> {
    let slots = service.list_slots();
    if slots.is_empty() {
        writeln!(out, "no slots")?;
        return Ok(());
    }
    writeln!(out, "{:<24} {:<20} {:>8} {:>10}", "SLOT", "SAVED", "OBJECTS", "BYTES")?;
    for slot in slots {
        let marker = if slot.header_ok { "" } else { " (header unreadable)" };
        writeln!(
            out,
            "{:<24} {:<20} {:>8} {:>10}{marker}",
            slot.name, slot.saved_at, slot.object_count, slot.size_bytes
        )?;
    }
    Ok(())
}

fn inspect_slot(
    service: &PersistenceService<PrefabLibrary>,
    slot: &str,
    out: &mut impl Write,
) -> Result<()> {
    let document = service.read_slot(slot)?;
    writeln!(
        out,
        "{slot}: saved {} with {} object(s)",
        document.save_time, document.object_count
    )?;
    for (index, record) in document.objects.iter().enumerate() {
        let keys = if record.custom_data.is_empty() {
            String::new()
        } else {
            serde_json::from_str::<EncodedPayloadMap>(&record.custom_data)
                .map(|map| map.keys.join(", "))
                .unwrap_or_else(|_| "<unreadable payload>".to_string())
        };
        let p = record.position;
        writeln!(
            out,
            "  [{index}] {} \"{}\" at ({}, {}, {}) [{keys}]",
            record.prefab_id, record.object_name, p.x, p.y, p.z
        )?;
    }
    Ok(())
}

fn list_selections(
    service: &PersistenceService<PrefabLibrary>,
    out: &mut impl Write,
) -> Result<()> {
    let selections = service.list_selections();
    if selections.is_empty() {
        writeln!(out, "no selections")?;
        return Ok(());
    }
    for selection in selections {
        let age = SystemTime::now()
            .duration_since(selection.modified)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        writeln!(
            out,
            "{}  \"{}\"  {} object(s), saved {} ({age}s ago)",
            selection.file_name, selection.label, selection.object_count, selection.saved_at
        )?;
    }
    Ok(())
}

fn plan_slot(
    service: &PersistenceService<PrefabLibrary>,
    slot: &str,
    out: &mut impl Write,
) -> Result<()> {
    let document = service.read_slot(slot)?;
    let settings = service.config().loading;
    let records = document.objects.len();
    let cycles = settings.estimated_cycles();
    match Pacing::choose(records, &settings) {
        Pacing::TimeBased {
            target_duration_secs,
        } => writeln!(
            out,
            "{slot}: {records} record(s) within {cycles} estimated cycle(s); time-based over {target_duration_secs}s"
        )?,
        Pacing::FrameBased { per_cycle } => writeln!(
            out,
            "{slot}: {records} record(s) over {cycles} estimated cycle(s); frame-based, {per_cycle} per cycle, {} cycle(s)",
            records.div_ceil(per_cycle)
        )?,
    }
    if !settings.progressive {
        writeln!(out, "progressive loading is disabled; the load would run in one call")?;
    }
    Ok(())
}
