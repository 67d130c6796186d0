//! Filesystem discovery for compiled shader programs.
//!
//! Roots are walked in order. A program is announced by either its GLSL
//! fragment source (`<name>.frag`) or its compiled fragment blob
//! (`<name>.frag.spv`), and only kept when both compiled stages sit in the
//! same root. Earlier roots shadow later ones.
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{ShaderProgram, FRAGMENT_SUFFIX};

/// Scans every root and returns the merged, de-duplicated program list.
pub(crate) fn scan_roots(roots: &[PathBuf]) -> Vec<ShaderProgram> {
    let mut seen = HashSet::new();
    let mut programs = Vec::new();
    for root in roots {
        for name in candidate_names(root) {
            if seen.contains(&name) {
                debug!(root = %root.display(), shader = %name, "shadowed by earlier root");
                continue;
            }
            if let Some(program) = program_in_root(root, &name) {
                seen.insert(name);
                programs.push(program);
            }
        }
    }
    programs
}

/// Returns the program named `name` when both of its stages exist under `root`.
fn program_in_root(root: &Path, name: &str) -> Option<ShaderProgram> {
    let program = ShaderProgram::new(name, root);
    if program.vertex_path.is_file() && program.fragment_path.is_file() {
        Some(program)
    } else {
        debug!(
            root = %root.display(),
            shader = name,
            "skipping shader without both compiled stages"
        );
        None
    }
}

fn candidate_names(root: &Path) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(root = %root.display(), error = %err, "shader root unreadable");
            return names;
        }
    };

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let name = file_name
            .strip_suffix(FRAGMENT_SUFFIX)
            .or_else(|| file_name.strip_suffix(".frag"));
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            names.insert(name.to_string());
        }
    }
    names
}
