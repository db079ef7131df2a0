use crate::walk::walk;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Reset `workspace` to a copy of `template`.
pub fn prepare_workspace(workspace: &Path, template: &Path) -> Result<usize> {
    fs::create_dir_all(workspace).with_context(|| format!("create {}", workspace.display()))?;
    clear_workspace(workspace)?;
    let template = std::path::absolute(template)
        .with_context(|| format!("resolve {}", template.display()))?;
    let template = template.as_path();
    let entries = walk(template)
        .with_context(|| format!("runtime template {}", template.display()))?
        .entries();
    let mut copied = 0;
    for entry in entries {
        let entry = entry.with_context(|| format!("walk {}", template.display()))?;
        let rel = entry
            .path
            .strip_prefix(template)
            .with_context(|| format!("relativize {}", entry.path.display()))?;
        let dest = workspace.join(rel);
        if entry.is_dir {
            fs::create_dir_all(&dest).with_context(|| format!("create {}", dest.display()))?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::copy(&entry.path, &dest).with_context(|| format!("copy {}", dest.display()))?;
        copied += 1;
    }
    tracing::debug!(
        template = %template.display(),
        workspace = %workspace.display(),
        files = copied,
        "workspace prepared"
    );
    Ok(copied)
}

/// Remove every child of `workspace`, keeping the directory itself.
pub fn clear_workspace(workspace: &Path) -> Result<()> {
    let listing = match fs::read_dir(workspace) {
        Ok(listing) => listing,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(err).with_context(|| format!("list {}", workspace.display()));
        }
    };
    for child in listing {
        let child = child.with_context(|| format!("list {}", workspace.display()))?;
        let path = child.path();
        let file_type = child
            .file_type()
            .with_context(|| format!("stat {}", path.display()))?;
        let removed = if file_type.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.with_context(|| format!("remove {}", path.display()))?;
    }
    Ok(())
}
