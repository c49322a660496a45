//! Forward flow: per-file outcomes, cache behaviour, dry runs and filters.

use super::*;
use cursor_gui_patch::backup::has_backup;
use cursor_gui_patch::cache::{cache_path, load_cache, CacheStatus};
use cursor_gui_patch::patches::{AUTORUN_MARKER, MODELS_MARKER};
use cursor_gui_patch::{engine, PatchKind, PatchOptions};
use filetime::FileTime;

fn forced() -> PatchOptions {
    PatchOptions {
        force: true,
        ..Default::default()
    }
}

#[test]
fn test_early_return_injected_then_already_patched() {
    let (dir, inst) = server_install();
    let agent = dir.path().join(AGENT_EXEC);
    let resigner = CountingResigner::default();

    let report = engine::patch(std::slice::from_ref(&inst), &PatchOptions::default(), &resigner);
    assert!(report.ok(), "{report}");
    assert!(report.patched.contains(&agent));
    let patched = read(&agent);
    assert_eq!(patched.matches(AUTORUN_MARKER).count(), 1);
    assert!(patched.contains(&format!(
        "async getAutoRunControls(){{return void 0/* {AUTORUN_MARKER} */;return this.ctl}}"
    )));
    assert!(has_backup(&agent));

    let report = engine::patch(std::slice::from_ref(&inst), &forced(), &resigner);
    assert!(report.ok());
    assert!(report.patched.is_empty());
    assert_eq!(report.already_patched, 2);
    assert_eq!(report.cached, 0);
    assert_eq!(read(&agent), patched);
}

#[test]
fn test_descriptor_prefix_resolution() {
    let (dir, inst) = server_install();
    let commits = dir.path().join(COMMITS);

    let report = engine::patch(&[inst], &PatchOptions::default(), &CountingResigner::default());
    assert!(report.ok(), "{report}");

    let content = read(&commits);
    assert_eq!(content.matches(MODELS_MARKER).count(), 2);
    assert!(!content.contains("GetUsableModelsRequest"));
    // Same prefix when it has its own AvailableModels types.
    assert!(content.contains(&format!(
        r#"getUsableModels:{{name:"AvailableModels",I:r.AvailableModelsRequest,O:r.AvailableModelsResponse,kind:k.MethodKind.Unary}}/* {MODELS_MARKER} */"#
    )));
    // Otherwise the nearest descriptor's prefix.
    assert!(content.contains(&format!(
        r#"getUsableModels:{{name:"AvailableModels",I:q.AvailableModelsRequest,O:q.AvailableModelsResponse,kind:k.MethodKind.Unary}}/* {MODELS_MARKER} */"#
    )));
    assert!(!content.contains("I:f."));
}

#[test]
fn test_unresolvable_descriptor_is_not_applicable() {
    let (dir, inst) = server_install();
    let lonely = r#"x={getUsableModels:{name:"GetUsableModels",I:z.GetUsableModelsRequest,O:z.GetUsableModelsResponse,kind:k.MethodKind.Unary}}"#;
    let retrieval = write_file(dir.path(), RETRIEVAL, lonely);

    let report = engine::patch(&[inst], &PatchOptions::default(), &CountingResigner::default());
    assert!(report.ok());
    assert!(!report.patched.contains(&retrieval));
    assert_eq!(report.not_applicable, 1);
    assert_eq!(read(&retrieval), lonely);
    assert!(!has_backup(&retrieval));
}

#[test]
fn test_second_run_served_from_cache() {
    let (dir, inst) = server_install();
    let resigner = CountingResigner::default();

    let first = engine::patch(std::slice::from_ref(&inst), &PatchOptions::default(), &resigner);
    assert_eq!(first.patched.len(), 2);

    let cache = load_cache(dir.path()).unwrap();
    assert_eq!(cache.len(), 2);
    assert!(cache.values().all(|e| e.status == CacheStatus::AlreadyPatched));

    let second = engine::patch(std::slice::from_ref(&inst), &PatchOptions::default(), &resigner);
    assert!(second.ok());
    assert_eq!(second.cached, 2);
    assert_eq!(second.already_patched, 2);
    assert_eq!(second.scanned, 0);
    assert!(second.patched.is_empty());
}

#[test]
fn test_cache_hit_skips_reading() {
    let dir = TempDir::new().unwrap();
    let inst = Installation::new(InstallKind::Server, dir.path(), "abc");
    let agent = write_file(dir.path(), AGENT_EXEC, "async getAutoRunControlz(){return 1}");

    let first = engine::patch(
        std::slice::from_ref(&inst),
        &PatchOptions::default(),
        &CountingResigner::default(),
    );
    assert_eq!(first.not_applicable, 1);

    // Same size and mtime, now patchable: a cache hit must not notice.
    let mtime = FileTime::from_last_modification_time(&fs::metadata(&agent).unwrap());
    fs::write(&agent, "async getAutoRunControls(){return 1}").unwrap();
    filetime::set_file_mtime(&agent, mtime).unwrap();

    let second = engine::patch(
        std::slice::from_ref(&inst),
        &PatchOptions::default(),
        &CountingResigner::default(),
    );
    assert_eq!(second.cached, 1);
    assert_eq!(second.not_applicable, 1);
    assert_eq!(second.scanned, 0);
    assert_eq!(read(&agent), "async getAutoRunControls(){return 1}");

    let third = engine::patch(std::slice::from_ref(&inst), &forced(), &CountingResigner::default());
    assert_eq!(third.patched, vec![agent]);
}

#[test]
fn test_modified_file_rescanned() {
    let (dir, inst) = server_install();
    let agent = dir.path().join(AGENT_EXEC);
    engine::patch(
        std::slice::from_ref(&inst),
        &PatchOptions::default(),
        &CountingResigner::default(),
    );

    // A Cursor update replaces the bundle.
    fs::write(&agent, format!("{AUTORUN_SRC}//v2")).unwrap();

    let report = engine::patch(
        std::slice::from_ref(&inst),
        &PatchOptions::default(),
        &CountingResigner::default(),
    );
    assert_eq!(report.patched, vec![agent.clone()]);
    assert_eq!(report.cached, 1);
    assert!(read(&agent).contains(AUTORUN_MARKER));
}

#[test]
fn test_dry_run_touches_nothing() {
    let (dir, inst) = gui_install();
    let before: Vec<String> = [AGENT_EXEC, WORKBENCH, LOADER, "product.json"]
        .iter()
        .map(|rel| read(&dir.path().join(rel)))
        .collect();
    let resigner = CountingResigner::default();
    let options = PatchOptions {
        dry_run: true,
        ..Default::default()
    };

    let report = engine::patch(&[inst], &options, &resigner);
    assert!(report.ok());
    assert_eq!(report.patched.len(), 2);

    let after: Vec<String> = [AGENT_EXEC, WORKBENCH, LOADER, "product.json"]
        .iter()
        .map(|rel| read(&dir.path().join(rel)))
        .collect();
    assert_eq!(before, after);
    assert!(!has_backup(&dir.path().join(AGENT_EXEC)));
    assert!(!cache_path(dir.path()).exists());
    assert_eq!(resigner.calls.get(), 0);
}

#[test]
fn test_only_restricts_patches_and_bypasses_cache() {
    let (dir, inst) = server_install();
    let options = PatchOptions {
        only: Some([PatchKind::Models].into_iter().collect()),
        ..Default::default()
    };

    let report = engine::patch(&[inst], &options, &CountingResigner::default());
    assert!(report.ok());
    assert_eq!(report.scanned, 1);
    assert_eq!(report.patched, vec![dir.path().join(COMMITS)]);
    assert_eq!(read(&dir.path().join(AGENT_EXEC)), AUTORUN_SRC);
    assert!(!cache_path(dir.path()).exists());
}

#[test]
fn test_gui_patch_requests_resign() {
    let (dir, inst) = gui_install();
    let resigner = CountingResigner::default();

    let report = engine::patch(std::slice::from_ref(&inst), &PatchOptions::default(), &resigner);
    assert!(report.ok(), "{report}");
    assert_eq!(resigner.calls.get(), 1);
    assert_eq!(report.codesign.len(), 1);
    assert!(report.codesign[0].success);
    let workbench = read(&dir.path().join(WORKBENCH));
    assert!(workbench.contains("const e=!1/* CGP_PATCH_AUTORUN_WORKBENCH */;"));

    // Nothing new to write: no second re-sign.
    let report = engine::patch(&[inst], &PatchOptions::default(), &resigner);
    assert!(report.codesign.is_empty());
    assert_eq!(resigner.calls.get(), 1);
}

#[cfg(unix)]
#[test]
fn test_permissions_preserved() {
    use std::os::unix::fs::PermissionsExt;

    let (dir, inst) = server_install();
    let agent = dir.path().join(AGENT_EXEC);
    fs::set_permissions(&agent, fs::Permissions::from_mode(0o644)).unwrap();

    engine::patch(&[inst], &PatchOptions::default(), &CountingResigner::default());
    let mode = fs::metadata(&agent).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o644);
}
