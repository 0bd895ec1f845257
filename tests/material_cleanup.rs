use glam::{Vec2, Vec4};
use scene_material_manager::assets::AssetRepository;
use scene_material_manager::backup::{BackupManager, BackupStatus};
use scene_material_manager::cleaner::{
    CleanupOutcome, CleanupSettings, CleanupStage, MaterialCleaner, SkipReason, TickOutcome,
};
use scene_material_manager::shader::{Shader, ShaderProperty};
use scene_material_manager::snapshot;
use scene_material_manager::{AssetDatabase, Material, MaterialId};
use std::fs;
use std::path::Path;

fn lit() -> Shader {
    Shader::new("Lit")
        .with_property(ShaderProperty::color("_Color"))
        .with_property(ShaderProperty::float("_Glossiness"))
        .with_property(ShaderProperty::range("_Metallic", 0.0, 1.0))
        .with_property(ShaderProperty::texture("_MainTex"))
        .with_property(ShaderProperty::texture("_MaskTex").without_scale_offset())
}

fn database(root: &Path) -> AssetDatabase {
    let mut db = AssetDatabase::new(root);
    db.register_shader(lit());
    db.register_shader(Shader::new("Standard").with_property(ShaderProperty::color("_Color")));
    db
}

/// A Lit material carrying leftovers from a previous shader.
fn cluttered(db: &mut AssetDatabase, path: &str, name: &str) -> MaterialId {
    let shader = db.shaders().get("Lit").expect("Lit shader");
    let mut material = Material::new(name, &shader);
    material.set_color("_Color", Vec4::new(0.8, 0.2, 0.1, 1.0));
    material.set_float("_Glossiness", 0.35);
    material.set_texture("_MainTex", Some("textures/albedo.png".to_string()));
    material.set_texture_scale("_MainTex", Vec2::new(2.0, 3.0));
    material.set_texture_offset("_MainTex", Vec2::new(0.5, 0.25));
    material.set_float("_BumpScale", 1.5);
    material.set_texture("_DetailAlbedoMap", Some("textures/detail.png".to_string()));
    material.set_color("_EmissionColor", Vec4::ONE);
    db.create_material(path, material).expect("create material")
}

fn cleaner(preview: bool, create_backups: bool) -> MaterialCleaner {
    MaterialCleaner::new(CleanupSettings { preview, create_backups }, BackupManager::default(), "Standard")
}

fn drain(cleaner: &mut MaterialCleaner, db: &mut AssetDatabase) -> Vec<TickOutcome> {
    let mut outcomes = Vec::new();
    loop {
        let outcome = cleaner.tick(&mut *db);
        let done = matches!(outcome, TickOutcome::BatchComplete { .. } | TickOutcome::Idle);
        outcomes.push(outcome);
        if done {
            return outcomes;
        }
    }
}

#[test]
fn cleanup_with_backup_keeps_declared_values() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let id = cluttered(&mut db, "materials/Brick.mat", "Brick");
    let live_path = temp_dir.path().join("materials/Brick.mat");
    let original_bytes = fs::read(&live_path).expect("read material");

    let shader = db.shader("Lit").expect("Lit shader");
    let before = snapshot::capture(db.material(&id).expect("material"), &shader);
    assert_eq!(db.material(&id).expect("material").stale_properties().len(), 3);

    let mut cleaner = cleaner(false, true);
    cleaner.enqueue([id.clone()]);
    let TickOutcome::BatchComplete { report: Some(report), summary } = cleaner.tick(&mut db) else {
        panic!("single item batch should complete in one tick");
    };
    assert_eq!(
        report.outcome,
        CleanupOutcome::Cleaned { backup: Some(BackupStatus::Created), removed_stale: 3, restored: 6, dropped: 0 }
    );
    assert_eq!(report.stage, CleanupStage::Restoring);
    assert_eq!(summary.cleaned, 1);
    assert_eq!(summary.saved, 1);
    assert_eq!(summary.save_error, None);

    let backups: Vec<_> = fs::read_dir(temp_dir.path().join("materials"))
        .expect("list materials")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".backup"))
        .collect();
    assert_eq!(backups.len(), 1);
    let backup_bytes = fs::read(temp_dir.path().join("materials/Brick.mat.backup")).expect("read backup");
    assert_eq!(backup_bytes, original_bytes);

    let cleaned = db.material(&id).expect("material");
    assert!(cleaned.stale_properties().is_empty());
    assert_eq!(snapshot::capture(cleaned, &shader), before);

    let reloaded = Material::load_from_path(&live_path).expect("reload");
    for stale in ["_BumpScale", "_DetailAlbedoMap", "_EmissionColor"] {
        assert!(!reloaded.saved().contains(stale), "{stale} should be gone from disk");
    }
    assert_eq!(reloaded.texture("_MainTex"), Some("textures/albedo.png"));
    assert_eq!(reloaded.texture_scale("_MainTex"), Vec2::new(2.0, 3.0));
    assert!(!db.is_dirty(&id));
}

#[test]
fn existing_backup_is_left_alone() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let id = cluttered(&mut db, "materials/Brick.mat", "Brick");
    let backup_path = temp_dir.path().join("materials/Brick.mat.backup");
    fs::write(&backup_path, b"older backup").expect("seed backup");

    let mut cleaner = cleaner(false, true);
    cleaner.enqueue([id]);
    let outcomes = drain(&mut cleaner, &mut db);
    let TickOutcome::BatchComplete { report: Some(report), .. } = &outcomes[0] else {
        panic!("expected a completed batch");
    };
    assert!(matches!(report.outcome, CleanupOutcome::Cleaned { backup: Some(BackupStatus::AlreadyExists), .. }));
    assert_eq!(fs::read(&backup_path).expect("read backup"), b"older backup");
}

#[test]
fn preview_changes_nothing_and_reports_each_item() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let ids: Vec<MaterialId> = ["Brick", "Stone", "Wood"]
        .iter()
        .map(|name| cluttered(&mut db, &format!("materials/{name}.mat"), name))
        .collect();
    let before: Vec<Vec<u8>> = ids
        .iter()
        .map(|id| fs::read(db.disk_path(&db.asset_path(id).expect("persisted"))).expect("read"))
        .collect();

    let mut cleaner = cleaner(true, true);
    cleaner.enqueue(ids.clone());
    let outcomes = drain(&mut cleaner, &mut db);
    assert_eq!(outcomes.len(), 3);

    let mut messages = Vec::new();
    for outcome in &outcomes {
        match outcome {
            TickOutcome::Processed(report) | TickOutcome::BatchComplete { report: Some(report), .. } => {
                assert_eq!(report.outcome, CleanupOutcome::Previewed { stale: 3 });
                assert_eq!(report.stage, CleanupStage::PreviewOnly);
                messages.push(report.message.clone());
            }
            other => panic!("unexpected tick outcome {other:?}"),
        }
    }
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0], "Preview Mode: Would clean Brick (3 unused entries)");

    for (id, bytes) in ids.iter().zip(before) {
        let path = db.asset_path(id).expect("persisted");
        assert_eq!(fs::read(db.disk_path(&path)).expect("read"), bytes);
        assert!(!BackupManager::default().has_backup(&db, &path));
        assert!(!db.is_dirty(id));
        assert_eq!(db.material(id).expect("material").stale_properties().len(), 3);
    }
    assert!(cleaner.take_reindex_request());
}

#[test]
fn one_item_per_tick_and_one_save_per_batch() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let a = cluttered(&mut db, "materials/A.mat", "A");
    let b = cluttered(&mut db, "materials/B.mat", "B");

    let mut cleaner = cleaner(false, false);
    cleaner.enqueue([a.clone(), b.clone()]);
    assert_eq!(cleaner.pending(), 2);

    let first = cleaner.tick(&mut db);
    assert!(matches!(first, TickOutcome::Processed(ref report) if report.id == a));
    assert_eq!(cleaner.pending(), 1);
    assert!(db.is_dirty(&a), "nothing is saved until the batch drains");
    assert!(!cleaner.take_reindex_request());

    let second = cleaner.tick(&mut db);
    let TickOutcome::BatchComplete { report: Some(report), summary } = second else {
        panic!("second tick should finish the batch");
    };
    assert_eq!(report.id, b);
    assert_eq!(summary.cleaned, 2);
    assert_eq!(summary.saved, 2);
    assert!(!db.is_dirty(&a) && !db.is_dirty(&b));
    assert!(cleaner.take_reindex_request());
    assert!(!cleaner.take_reindex_request(), "reindex request is taken once");
    assert_eq!(cleaner.tick(&mut db), TickOutcome::Idle);
    assert!(!BackupManager::default().has_backup(&db, Path::new("materials/A.mat")));
}

#[test]
fn unpersisted_and_destroyed_materials_are_skipped() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let shader = db.shaders().get("Lit").expect("Lit shader");
    let transient = db.insert_transient(Material::new("Runtime Copy", &shader));
    let doomed = cluttered(&mut db, "materials/Doomed.mat", "Doomed");
    let kept = cluttered(&mut db, "materials/Kept.mat", "Kept");

    let mut cleaner = cleaner(false, true);
    cleaner.enqueue([transient.clone(), doomed.clone(), kept.clone()]);
    db.unload(&doomed);

    let outcomes = drain(&mut cleaner, &mut db);
    assert_eq!(outcomes.len(), 3);
    let TickOutcome::Processed(first) = &outcomes[0] else { panic!("expected processed") };
    assert_eq!(first.outcome, CleanupOutcome::Skipped(SkipReason::NotPersisted));
    assert_eq!(first.message, "Cannot clean material Runtime Copy - it's not saved as an asset");
    assert_eq!(first.stage, CleanupStage::Idle);
    let TickOutcome::Processed(second) = &outcomes[1] else { panic!("expected processed") };
    assert_eq!(second.outcome, CleanupOutcome::Skipped(SkipReason::Missing));
    let TickOutcome::BatchComplete { report: Some(third), summary } = &outcomes[2] else {
        panic!("expected batch completion");
    };
    assert!(matches!(third.outcome, CleanupOutcome::Cleaned { .. }));
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.cleaned, 1);
}

#[test]
fn missing_neutral_shader_skips_before_touching_storage() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = AssetDatabase::new(temp_dir.path());
    db.register_shader(lit());
    let id = cluttered(&mut db, "materials/Brick.mat", "Brick");

    let mut cleaner = cleaner(false, true);
    cleaner.enqueue([id.clone()]);
    let TickOutcome::BatchComplete { report: Some(report), .. } = cleaner.tick(&mut db) else {
        panic!("expected batch completion");
    };
    assert_eq!(report.outcome, CleanupOutcome::Skipped(SkipReason::MissingShader("Standard".to_string())));
    assert_eq!(report.stage, CleanupStage::Idle);
    assert_eq!(db.material(&id).expect("material").stale_properties().len(), 3);
    assert!(!temp_dir.path().join("materials/Brick.mat.backup").exists());
}

#[test]
fn cancel_drops_pending_but_saves_finished_work() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let ids: Vec<MaterialId> =
        ["A", "B", "C"].iter().map(|name| cluttered(&mut db, &format!("materials/{name}.mat"), name)).collect();

    let mut cleaner = cleaner(false, false);
    cleaner.enqueue(ids.clone());
    assert!(matches!(cleaner.tick(&mut db), TickOutcome::Processed(_)));
    assert_eq!(cleaner.cancel(), 2);
    assert!(!cleaner.is_idle(), "the open batch still needs its save");
    assert_eq!(cleaner.stage(), CleanupStage::Saving);

    let TickOutcome::BatchComplete { report: None, summary } = cleaner.tick(&mut db) else {
        panic!("cancelled batch should close on the next tick");
    };
    assert_eq!(summary.cleaned, 1);
    assert_eq!(summary.saved, 1);
    assert!(cleaner.is_idle());
    assert_eq!(cleaner.stage(), CleanupStage::Idle);
    assert_eq!(db.material(&ids[1]).expect("material").stale_properties().len(), 3);
}

#[test]
fn failed_backup_stops_at_the_backup_step() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let id = cluttered(&mut db, "materials/Brick.mat", "Brick");
    // Still loaded, but nothing left on disk to copy.
    fs::remove_file(temp_dir.path().join("materials/Brick.mat")).expect("remove material file");

    let mut cleaner = cleaner(false, true);
    cleaner.enqueue([id.clone()]);
    let TickOutcome::BatchComplete { report: Some(report), summary } = cleaner.tick(&mut db) else {
        panic!("expected batch completion");
    };
    assert!(matches!(report.outcome, CleanupOutcome::Skipped(SkipReason::BackupFailed(_))));
    assert_eq!(report.stage, CleanupStage::BackingUp);
    assert_eq!(summary.skipped, 1);
    assert_eq!(db.material(&id).expect("material").stale_properties().len(), 3);
    assert!(!db.is_dirty(&id));
}

#[test]
fn unwritable_material_stays_dirty_while_the_rest_of_the_batch_saves() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let a = cluttered(&mut db, "a/A.mat", "A");
    let b = cluttered(&mut db, "b/B.mat", "B");
    let a_file = temp_dir.path().join("a/A.mat");
    fs::remove_file(&a_file).expect("remove A");
    fs::create_dir(&a_file).expect("directory in place of A");

    let mut cleaner = cleaner(false, false);
    cleaner.enqueue([a.clone(), b.clone()]);
    let outcomes = drain(&mut cleaner, &mut db);
    let Some(TickOutcome::BatchComplete { summary, .. }) = outcomes.last() else {
        panic!("expected batch completion");
    };
    assert_eq!(summary.cleaned, 2);
    assert_eq!(summary.saved, 1);
    let error = summary.save_error.as_deref().expect("save error reported");
    assert!(error.contains("a/A.mat"), "error names the failed asset: {error}");
    assert!(db.is_dirty(&a), "A keeps its unsaved changes");
    assert!(!db.is_dirty(&b));
    let saved_b = Material::load_from_path(temp_dir.path().join("b/B.mat")).expect("reload B");
    assert!(!saved_b.saved().contains("_BumpScale"));
}
