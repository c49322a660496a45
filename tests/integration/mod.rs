//! Integration tests for the patch engine
//!
//! Builds throwaway Cursor installations on disk and drives the forward,
//! reverse and status flows through the public API.

mod patch_flow;
mod unpatch_flow;

use cursor_gui_patch::{CodesignOutcome, InstallKind, Installation, Resigner};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const AGENT_EXEC: &str = "extensions/cursor-agent-exec/dist/main.js";
pub const COMMITS: &str = "extensions/cursor-commits/dist/main.js";
pub const RETRIEVAL: &str = "extensions/cursor-retrieval/dist/main.js";
pub const WORKBENCH: &str = "out/vs/workbench/workbench.desktop.main.js";
pub const LOADER: &str = "out/vs/workbench/api/node/extensionHostProcess.js";

pub const AUTORUN_SRC: &str =
    "var s=class{constructor(){this.ctl=null}async getAutoRunControls(){return this.ctl}};";

pub const WORKBENCH_SRC: &str = "function g(r){const e=r?.autoRunControls?.enabled??!1;return e}";

/// `r` has its own AvailableModels descriptor; `f` does not, and the `q`
/// descriptor sits closer to it than the `r` one.
pub fn models_src() -> String {
    let usable = |p: &str| {
        format!(
            r#"getUsableModels:{{name:"GetUsableModels",I:{p}.GetUsableModelsRequest,O:{p}.GetUsableModelsResponse,kind:k.MethodKind.Unary}}"#
        )
    };
    let available = |p: &str| {
        format!(
            r#"availableModels:{{name:"AvailableModels",I:{p}.AvailableModelsRequest,O:{p}.AvailableModelsResponse,kind:k.MethodKind.Unary}}"#
        )
    };
    format!(
        "const A={{{},{}}};{}const B={{{},{}}};",
        usable("r"),
        available("r"),
        "/*padding*/".repeat(40),
        available("q"),
        usable("f"),
    )
}

pub fn write_file(root: &Path, rel: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

pub fn product_json(checksums: &str) -> String {
    format!(r#"{{"nameShort":"Cursor","applicationName":"cursor","checksums":{checksums}}}"#)
}

/// A server installation with the autorun and commits bundles.
pub fn server_install() -> (TempDir, Installation) {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "product.json", product_json("{}"));
    write_file(dir.path(), AGENT_EXEC, AUTORUN_SRC);
    write_file(dir.path(), COMMITS, models_src());
    let inst = Installation::new(InstallKind::Server, dir.path(), "0123abcd");
    (dir, inst)
}

/// A desktop installation whose loader and manifest track the workbench.
pub fn gui_install() -> (TempDir, Installation) {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), AGENT_EXEC, AUTORUN_SRC);
    write_file(dir.path(), WORKBENCH, WORKBENCH_SRC);
    write_file(dir.path(), LOADER, "module.exports={};");
    write_file(
        dir.path(),
        "product.json",
        product_json(
            r#"{"vs/workbench/workbench.desktop.main.js":"stale","vs/workbench/api/node/extensionHostProcess.js":"stale","vs/base/worker.js":"untouched"}"#,
        ),
    );
    let inst = Installation::new(InstallKind::Gui, dir.path(), "app");
    (dir, inst)
}

/// Records re-sign requests instead of running `codesign`.
#[derive(Default)]
pub struct CountingResigner {
    pub calls: Cell<usize>,
}

impl Resigner for CountingResigner {
    fn needs_resign(&self, inst: &Installation) -> bool {
        inst.kind == InstallKind::Gui
    }

    fn resign(&self, inst: &Installation) -> CodesignOutcome {
        self.calls.set(self.calls.get() + 1);
        CodesignOutcome {
            app_path: inst.root.clone(),
            success: true,
            error: None,
        }
    }
}
