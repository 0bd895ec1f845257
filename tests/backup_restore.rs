use glam::Vec4;
use scene_material_manager::assets::AssetRepository;
use scene_material_manager::backup::{BackupManager, BackupStatus, RestoreOutcome};
use scene_material_manager::shader::{Shader, ShaderProperty};
use scene_material_manager::{AssetDatabase, Material, MaterialId};
use std::fs;
use std::path::{Path, PathBuf};

fn database(root: &Path) -> AssetDatabase {
    let mut db = AssetDatabase::new(root);
    db.register_shader(Shader::new("Lit").with_property(ShaderProperty::color("_Color")));
    db
}

fn create(db: &mut AssetDatabase, name: &str, red: f32) -> MaterialId {
    let shader = db.shader("Lit").expect("Lit shader");
    let mut material = Material::new(name, &shader);
    material.set_color("_Color", Vec4::new(red, 0.0, 0.0, 1.0));
    db.create_material(format!("materials/{name}.mat"), material).expect("create material")
}

fn recolor(db: &mut AssetDatabase, id: &MaterialId, red: f32) {
    db.material_mut(id).expect("material").set_color("_Color", Vec4::new(red, 0.0, 0.0, 1.0));
    db.mark_dirty(id);
    db.save_assets().into_result().expect("save assets");
}

#[test]
fn create_is_idempotent() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let id = create(&mut db, "Brick", 0.5);
    let asset_path = db.asset_path(&id).expect("persisted");
    let backups = BackupManager::default();

    assert_eq!(backups.backup_path(&asset_path), PathBuf::from("materials/Brick.mat.backup"));
    assert_eq!(backups.create(&mut db, &asset_path).expect("first backup"), BackupStatus::Created);
    let first = fs::read(temp_dir.path().join("materials/Brick.mat.backup")).expect("read backup");

    recolor(&mut db, &id, 0.9);
    assert_eq!(backups.create(&mut db, &asset_path).expect("second backup"), BackupStatus::AlreadyExists);
    let second = fs::read(temp_dir.path().join("materials/Brick.mat.backup")).expect("read backup");
    assert_eq!(first, second);
}

#[test]
fn custom_suffix_is_appended_to_the_full_name() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let id = create(&mut db, "Brick", 0.5);
    let asset_path = db.asset_path(&id).expect("persisted");
    let backups = BackupManager::new(".orig");

    backups.create(&mut db, &asset_path).expect("backup");
    assert!(temp_dir.path().join("materials/Brick.mat.orig").is_file());
    assert!(backups.has_backup(&db, &asset_path));
    assert!(!BackupManager::default().has_backup(&db, &asset_path));
}

#[test]
fn restore_without_backup_reports_not_found() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let id = create(&mut db, "Brick", 0.5);
    let asset_path = db.asset_path(&id).expect("persisted");
    let before = fs::read(db.disk_path(&asset_path)).expect("read material");

    let outcome = BackupManager::default().restore(&mut db, &asset_path).expect("restore");
    assert_eq!(outcome, RestoreOutcome::NotFound);
    assert_eq!(fs::read(db.disk_path(&asset_path)).expect("read material"), before);
}

#[test]
fn restore_overwrites_live_asset_and_reloads() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let id = create(&mut db, "Brick", 0.5);
    let asset_path = db.asset_path(&id).expect("persisted");
    let backups = BackupManager::default();
    backups.create(&mut db, &asset_path).expect("backup");
    let backup_bytes = fs::read(temp_dir.path().join("materials/Brick.mat.backup")).expect("read backup");

    recolor(&mut db, &id, 0.9);
    assert_eq!(db.material(&id).expect("material").color("_Color").x, 0.9);

    assert_eq!(backups.restore(&mut db, &asset_path).expect("restore"), RestoreOutcome::Restored);
    assert_eq!(fs::read(db.disk_path(&asset_path)).expect("read material"), backup_bytes);
    assert_eq!(db.material(&id).expect("material").color("_Color").x, 0.5);
    assert!(backups.has_backup(&db, &asset_path), "restoring keeps the backup");
}

#[test]
fn restore_all_touches_only_backed_up_assets() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let ids: Vec<MaterialId> =
        ["A", "B", "C", "D", "E"].iter().enumerate().map(|(i, name)| create(&mut db, name, i as f32 * 0.1)).collect();
    let paths: Vec<PathBuf> = ids.iter().map(|id| db.asset_path(id).expect("persisted")).collect();
    let backups = BackupManager::default();
    backups.create(&mut db, &paths[1]).expect("backup B");
    backups.create(&mut db, &paths[3]).expect("backup D");
    for id in &ids {
        recolor(&mut db, id, 1.0);
    }
    let before: Vec<Vec<u8>> = paths.iter().map(|p| fs::read(db.disk_path(p)).expect("read")).collect();

    let restored = backups.restore_all(&mut db, paths.clone()).expect("restore all");
    assert_eq!(restored, 2);

    for (i, path) in paths.iter().enumerate() {
        let after = fs::read(db.disk_path(path)).expect("read");
        let changed = after != before[i];
        assert_eq!(changed, i == 1 || i == 3, "unexpected change state for {}", path.display());
    }
    assert_eq!(db.material(&ids[1]).expect("material").color("_Color").x, 0.1);
    assert_eq!(db.material(&ids[0]).expect("material").color("_Color").x, 1.0);
}

#[test]
fn restore_all_without_backups_returns_zero() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let ids = [create(&mut db, "A", 0.2), create(&mut db, "B", 0.4)];
    let paths: Vec<PathBuf> = ids.iter().filter_map(|id| db.asset_path(id)).collect();
    let restored = BackupManager::default().restore_all(&mut db, paths).expect("restore all");
    assert_eq!(restored, 0);
}

#[test]
fn copy_asset_never_overwrites() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    create(&mut db, "A", 0.2);
    create(&mut db, "B", 0.4);
    let err = db.copy_asset(Path::new("materials/A.mat"), Path::new("materials/B.mat")).unwrap_err();
    assert!(err.to_string().contains("destination already exists"));
    let err = db.copy_asset(Path::new("materials/Missing.mat"), Path::new("materials/C.mat")).unwrap_err();
    assert!(err.to_string().contains("does not exist"));
}

#[test]
fn restore_keeps_unsaved_edits_of_other_materials() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let a = create(&mut db, "A", 0.2);
    let b = create(&mut db, "B", 0.4);
    let b_path = db.asset_path(&b).expect("persisted");
    let backups = BackupManager::default();
    backups.create(&mut db, &b_path).expect("backup B");
    recolor(&mut db, &b, 0.8);

    db.material_mut(&a).expect("material").set_color("_Color", Vec4::new(0.7, 0.0, 0.0, 1.0));
    db.mark_dirty(&a);

    assert_eq!(backups.restore(&mut db, &b_path).expect("restore"), RestoreOutcome::Restored);
    assert_eq!(db.material(&b).expect("material").color("_Color").x, 0.4);
    assert_eq!(db.material(&a).expect("material").color("_Color").x, 0.7, "A keeps its in-memory edit");
    assert!(db.is_dirty(&a));
}

#[test]
fn restore_counts_once_the_bytes_are_back_even_if_reload_fails() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let id = create(&mut db, "Brick", 0.5);
    let asset_path = db.asset_path(&id).expect("persisted");
    fs::write(temp_dir.path().join("materials/Brick.mat.backup"), b"not a material").expect("seed backup");

    let outcome = BackupManager::default().restore(&mut db, &asset_path).expect("restore");
    assert_eq!(outcome, RestoreOutcome::Restored);
    assert_eq!(fs::read(db.disk_path(&asset_path)).expect("read material"), b"not a material");
    assert_eq!(db.material(&id).expect("material").color("_Color").x, 0.5, "previous import stays loaded");
}

#[test]
fn corrupt_shader_does_not_block_open_or_restore() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut seed = database(temp_dir.path());
    let id = create(&mut seed, "Brick", 0.5);
    Shader::new("Lit")
        .with_property(ShaderProperty::color("_Color"))
        .save_to_path(temp_dir.path().join("shaders/Lit.shader"))
        .expect("save shader");
    fs::write(temp_dir.path().join("shaders/Broken.shader"), [0xde, 0xad, 0xbe, 0xef]).expect("write shader");

    let mut db = AssetDatabase::open(temp_dir.path()).expect("open project");
    assert!(db.shader("Lit").is_some());
    assert!(db.shader("Broken").is_none());
    let asset_path = db.asset_path(&id).expect("persisted");
    let backups = BackupManager::default();
    backups.create(&mut db, &asset_path).expect("backup");
    recolor(&mut db, &id, 0.9);

    assert_eq!(backups.restore(&mut db, &asset_path).expect("restore"), RestoreOutcome::Restored);
    assert_eq!(db.material(&id).expect("material").color("_Color").x, 0.5);
    db.refresh().expect("refresh skips the broken shader");
}

#[test]
fn failed_write_keeps_only_that_material_dirty() {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let mut db = database(temp_dir.path());
    let shader = db.shader("Lit").expect("Lit shader");
    let a = db.create_material("a/A.mat", Material::new("A", &shader)).expect("create A");
    let b = db.create_material("b/B.mat", Material::new("B", &shader)).expect("create B");
    for id in [&a, &b] {
        db.material_mut(id).expect("material").set_color("_Color", Vec4::new(0.3, 0.0, 0.0, 1.0));
        db.mark_dirty(id);
    }
    let a_file = temp_dir.path().join("a/A.mat");
    fs::remove_file(&a_file).expect("remove A");
    fs::create_dir(&a_file).expect("directory in place of A");

    let report = db.save_assets();
    assert_eq!(report.written, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].starts_with("a/A.mat"));
    assert!(db.is_dirty(&a));
    assert!(!db.is_dirty(&b));
    let saved_b = Material::load_from_path(temp_dir.path().join("b/B.mat")).expect("reload B");
    assert_eq!(saved_b.color("_Color").x, 0.3);

    let err = db.save_assets().into_result().unwrap_err();
    assert!(err.to_string().contains("1 material(s) failed to save"));
}
