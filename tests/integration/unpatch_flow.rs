//! Reverse flow, status scan and discovery of explicit roots.

use super::*;
use cursor_gui_patch::backup::has_backup;
use cursor_gui_patch::cache::cache_path;
use cursor_gui_patch::{discover_all, engine, DiscoveryConfig, PatchKind, PatchOptions};

#[test]
fn test_unpatch_without_prior_patch() {
    let (dir, inst) = server_install();
    let resigner = CountingResigner::default();

    let report = engine::unpatch(&[inst], false, &resigner);
    assert!(report.ok());
    assert!(report.restored.is_empty());
    assert_eq!(
        report.no_backup,
        vec![dir.path().join(AGENT_EXEC), dir.path().join(COMMITS)]
    );
    assert_eq!(resigner.calls.get(), 0);
}

#[test]
fn test_unpatch_restores_everything() {
    let (dir, inst) = gui_install();
    let root = dir.path();
    let original_manifest = read(&root.join("product.json"));
    write_file(
        root,
        LOADER,
        format!("const H=\"{}\";", cursor_gui_patch::fsutil::sha256_hex(WORKBENCH_SRC.as_bytes())),
    );
    let original_loader = read(&root.join(LOADER));
    let resigner = CountingResigner::default();

    let report = engine::patch(std::slice::from_ref(&inst), &PatchOptions::default(), &resigner);
    assert!(report.ok(), "{report}");
    assert!(cache_path(root).exists());

    let report = engine::unpatch(&[inst], false, &resigner);
    assert!(report.ok(), "{report}");
    assert_eq!(report.restored.len(), 4);
    assert_eq!(read(&root.join(AGENT_EXEC)), AUTORUN_SRC);
    assert_eq!(read(&root.join(WORKBENCH)), WORKBENCH_SRC);
    assert_eq!(read(&root.join(LOADER)), original_loader);
    assert_eq!(read(&root.join("product.json")), original_manifest);
    for rel in [AGENT_EXEC, WORKBENCH, LOADER, "product.json"] {
        assert!(!has_backup(&root.join(rel)), "{rel} backup left behind");
    }
    assert!(!cache_path(root).exists());
    // One re-sign after patching, one after restoring.
    assert_eq!(resigner.calls.get(), 2);
}

#[test]
fn test_unpatch_dry_run_lists_auxiliary_files() {
    let (dir, inst) = gui_install();
    let root = dir.path();
    write_file(
        root,
        LOADER,
        format!("const H=\"{}\";", cursor_gui_patch::fsutil::sha256_hex(WORKBENCH_SRC.as_bytes())),
    );
    engine::patch(
        std::slice::from_ref(&inst),
        &PatchOptions::default(),
        &CountingResigner::default(),
    );
    let patched_workbench = read(&root.join(WORKBENCH));

    let resigner = CountingResigner::default();
    let report = engine::unpatch(&[inst], true, &resigner);
    assert!(report.ok());
    assert!(report.restored.contains(&root.join(LOADER)));
    assert!(report.restored.contains(&root.join("product.json")));
    assert_eq!(read(&root.join(WORKBENCH)), patched_workbench);
    assert!(has_backup(&root.join(WORKBENCH)));
    assert_eq!(resigner.calls.get(), 0);
}

#[test]
fn test_status_reports_markers_and_backups() {
    let (dir, inst) = server_install();
    let before = engine::status(std::slice::from_ref(&inst));
    assert_eq!(before.files.len(), 2);
    assert!(before.files.iter().all(|f| !f.has_backup));
    assert!(before
        .files
        .iter()
        .all(|f| f.patched.values().all(|patched| !patched)));

    engine::patch(
        std::slice::from_ref(&inst),
        &PatchOptions::default(),
        &CountingResigner::default(),
    );

    let after = engine::status(&[inst]);
    let agent = after
        .files
        .iter()
        .find(|f| f.path == dir.path().join(AGENT_EXEC))
        .unwrap();
    assert_eq!(agent.label, "cursor-agent-exec");
    assert_eq!(agent.patched.get(&PatchKind::Autorun), Some(&true));
    assert!(agent.has_backup);

    let json = serde_json::to_value(&after).unwrap();
    assert_eq!(json["installations"][0]["kind"], "server");
    assert_eq!(json["files"][0]["patched"]["autorun"], true);
}

#[test]
fn test_explicit_roots_bypass_discovery() {
    let (dir, _inst) = server_install();
    let not_cursor = TempDir::new().unwrap();
    let config = DiscoveryConfig {
        server_dir: Some(dir.path().to_path_buf()),
        gui_dir: Some(not_cursor.path().to_path_buf()),
    };

    let found = discover_all(&config);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, InstallKind::Server);
    assert_eq!(found[0].root, dir.path());
}
