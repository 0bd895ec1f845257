use anyhow::{anyhow, Context, Result};
use scene_material_manager::backup::RestoreOutcome;
use scene_material_manager::cleaner::TickOutcome;
use scene_material_manager::cli::{CliOptions, Command};
use scene_material_manager::config::ManagerConfig;
use scene_material_manager::scene::Scene;
use scene_material_manager::{AssetDatabase, AssetRepository, EcsScene, MaterialId, MaterialManager};
use std::path::PathBuf;
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let options = match CliOptions::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            process::exit(2);
        }
    };
    if let Err(err) = run(options) {
        eprintln!("error: {err:?}");
        process::exit(1);
    }
}

fn run(options: CliOptions) -> Result<()> {
    if options.command == Command::Help {
        print_usage();
        return Ok(());
    }

    let mut config = match options.config.as_ref() {
        Some(path) => ManagerConfig::load_or_default(path),
        None => ManagerConfig::default(),
    };
    let overrides = options.config_overrides();
    if !overrides.is_empty() {
        log::info!("[config] CLI overrides: {}", overrides.applied_fields().join(", "));
        config.apply_overrides(&overrides);
    }

    let project = options.project.clone().unwrap_or_else(|| PathBuf::from("."));
    let db = AssetDatabase::open(&project)
        .with_context(|| format!("Opening project {}", project.display()))?;
    let scene_path = options.scene.clone().ok_or_else(|| anyhow!("--scene <file> is required"))?;
    let scene = Scene::load_from_path(&scene_path)?;
    let mut ecs = EcsScene::new();
    ecs.load_scene(&scene)?;

    let mut manager = MaterialManager::new(db, ecs, config);
    manager.refresh();

    match options.command {
        Command::List => cmd_list(&manager),
        Command::Clean => cmd_clean(&mut manager, options.material.as_deref()),
        Command::Restore => {
            let id = required_material(&options)?;
            match manager.restore_backup(&id)? {
                RestoreOutcome::Restored => println!("Restored backup for {id}"),
                RestoreOutcome::NotFound => println!("No backup found for {id}"),
            }
            Ok(())
        }
        Command::RestoreAll => {
            match manager.restore_all_backups()? {
                0 => println!("No backup files found to restore."),
                count => println!("Restored {count} material backups"),
            }
            Ok(())
        }
        Command::Duplicate => {
            let id = required_material(&options)?;
            let new_id = manager.duplicate(&id)?;
            println!("Duplicated {id} as {new_id}");
            Ok(())
        }
        Command::Help => Ok(()),
    }
}

type Manager = MaterialManager<AssetDatabase, EcsScene>;

fn required_material(options: &CliOptions) -> Result<MaterialId> {
    options
        .material
        .as_deref()
        .map(MaterialId::from)
        .ok_or_else(|| anyhow!("this command requires --material <asset path>"))
}

fn cmd_list(manager: &Manager) -> Result<()> {
    if manager.index().is_empty() {
        println!("No materials found in the scene.");
        return Ok(());
    }
    println!("{}", manager.summary());
    let search = &manager.config().search;
    if !search.query.is_empty() {
        println!("{}: {}", search.mode.label(), search.query);
    }
    for group in manager.visible_groups() {
        println!("{} ({})", group.shader_name(), group.len());
        for material in group.materials() {
            let users = manager.index().users(&material.id).len();
            let backup = manager
                .repository()
                .asset_path(&material.id)
                .map(|path| manager.backups().has_backup(manager.repository(), &path))
                .unwrap_or(false);
            println!(
                "  {:<32} {:<48} used by {users} object(s){}",
                material.name,
                material.id,
                if backup { "  [backup]" } else { "" }
            );
            let textures = manager.used_textures(&material.id);
            if !textures.is_empty() {
                println!("    textures: {}", textures.join(", "));
            }
            for entity in manager.matching_entities(&material.id) {
                println!("    - {entity}");
            }
        }
    }
    Ok(())
}

fn cmd_clean(manager: &mut Manager, material: Option<&str>) -> Result<()> {
    let queued = match material {
        Some(path) => {
            let id = MaterialId::new(path);
            if manager.repository().material(&id).is_none() {
                return Err(anyhow!("Material '{id}' not found in project"));
            }
            manager.request_cleanup(id);
            1
        }
        None => manager.request_clean_all(),
    };
    if queued == 0 {
        println!("Nothing to clean.");
        return Ok(());
    }
    let settings = manager.cleaner().settings();
    println!(
        "Cleaning {queued} material(s). Mode: {}. Backups: {}.",
        if settings.preview { "Preview (no changes)" } else { "Apply Changes" },
        if settings.create_backups { "Enabled" } else { "Disabled" }
    );
    loop {
        match manager.tick() {
            TickOutcome::Idle => break,
            TickOutcome::Processed(report) => println!("{}", report.message),
            TickOutcome::BatchComplete { report, summary } => {
                if let Some(report) = report {
                    println!("{}", report.message);
                }
                println!(
                    "Done: {} cleaned, {} previewed, {} skipped, {} saved",
                    summary.cleaned, summary.previewed, summary.skipped, summary.saved
                );
                if let Some(err) = summary.save_error {
                    println!("Save failed: {err}");
                }
                break;
            }
        }
    }
    println!("{}", manager.summary());
    Ok(())
}

fn print_usage() {
    eprintln!(
        "Material Tool

Usage:
  material_tool [command] --scene <scene.json> [--project <dir>] [options]

Commands:
  list          List materials grouped by shader (default)
  clean         Clean all scene materials, or one with --material
  restore       Restore the backup of --material
  restore-all   Restore every scene material that has a backup
  duplicate     Copy --material to the next free <name>_<n>.mat
  help          Show this message

Options:
  --config <file>             JSON config file
  --material <asset path>     Material asset, e.g. materials/Brick.mat
  --include-inactive on|off   Include inactive entities in the scan
  --preview on|off            Report only, change nothing (default on)
  --backups on|off            Write .backup files before cleaning (default on)
  --search <text>             Filter groups by name
  --search-mode material|entity
"
    );
}
