//! Every workspace crate inherits the workspace version.

use std::path::{Path, PathBuf};

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(Path::parent)
        .unwrap()
        .to_path_buf()
}

fn manifest(path: &Path) -> toml::Value {
    let content = std::fs::read_to_string(path.join("Cargo.toml")).unwrap();
    content.parse().unwrap()
}

#[test]
fn all_members_use_workspace_version() {
    let root = workspace_root();
    let workspace = manifest(&root);
    let members = workspace["workspace"]["members"].as_array().unwrap();
    assert!(!members.is_empty());

    for member in members {
        let member = member.as_str().unwrap();
        let doc = manifest(&root.join(member));
        let inherits = doc["package"]["version"]
            .get("workspace")
            .and_then(|v| v.as_bool())
            == Some(true);
        assert!(inherits, "{member} should use version.workspace = true");
    }
}

#[test]
fn internal_dependency_versions_match_workspace() {
    let workspace = manifest(&workspace_root());
    let version = workspace["workspace"]["package"]["version"].as_str().unwrap();
    assert_eq!(version, env!("CARGO_PKG_VERSION"));

    let deps = workspace["workspace"]["dependencies"].as_table().unwrap();
    for name in ["estimator-core", "cost-reference", "genai-provider"] {
        let declared = deps[name]["version"].as_str().unwrap();
        assert_eq!(declared, version, "{name} pinned to {declared}, workspace is {version}");
    }
}
