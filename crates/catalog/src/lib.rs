//! Ordered catalog of precompiled shader programs.
//!
//! A program is a named pair of SPIR-V blobs (`<name>.vert.spv`,
//! `<name>.frag.spv`) living side by side in one of the search roots. The
//! catalog is built once at start-up by [`ShaderCatalog::scan`] and is
//! read-only afterwards; the viewer only ever indexes into it.

mod repository;

use std::fmt;
use std::path::{Path, PathBuf};

use repository::scan_roots;

/// File suffix of compiled vertex-stage bytecode.
pub const VERTEX_SUFFIX: &str = ".vert.spv";
/// File suffix of compiled fragment-stage bytecode.
pub const FRAGMENT_SUFFIX: &str = ".frag.spv";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("no compiled shaders found (searched: {})", display_paths(.searched))]
    Empty { searched: Vec<PathBuf> },
    #[error("shader '{requested}' not found (available: {})", .available.join(", "))]
    UnknownShader {
        requested: String,
        available: Vec<String>,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// One selectable program: a name plus its two bytecode paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderProgram {
    pub name: String,
    pub vertex_path: PathBuf,
    pub fragment_path: PathBuf,
}

impl ShaderProgram {
    pub fn new(name: impl Into<String>, root: &Path) -> Self {
        let name = name.into();
        let vertex_path = root.join(format!("{name}{VERTEX_SUFFIX}"));
        let fragment_path = root.join(format!("{name}{FRAGMENT_SUFFIX}"));
        Self {
            name,
            vertex_path,
            fragment_path,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShaderCatalog {
    programs: Vec<ShaderProgram>,
    searched: Vec<PathBuf>,
}

impl ShaderCatalog {
    /// Scans `roots` in order and keeps every complete vertex/fragment pair.
    pub fn scan(roots: &[PathBuf]) -> Self {
        Self {
            programs: scan_roots(roots),
            searched: roots.to_vec(),
        }
    }

    pub fn from_programs(programs: Vec<ShaderProgram>) -> Self {
        Self {
            programs,
            searched: Vec::new(),
        }
    }

    /// Fails with [`CatalogError::Empty`] when nothing was discovered.
    pub fn require_programs(self) -> Result<Self, CatalogError> {
        if self.programs.is_empty() {
            Err(CatalogError::Empty {
                searched: self.searched,
            })
        } else {
            Ok(self)
        }
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ShaderProgram> {
        self.programs.get(index)
    }

    pub fn names(&self) -> Vec<String> {
        self.programs.iter().map(|p| p.name.clone()).collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.programs.iter().position(|p| p.name == name)
    }

    /// Resolves the program a session should start with.
    ///
    /// An explicitly requested name must exist. Without one, `fallback` is
    /// tried and index 0 is used when it is absent too.
    pub fn initial_index(
        &self,
        requested: Option<&str>,
        fallback: &str,
    ) -> Result<usize, CatalogError> {
        match requested {
            Some(name) => self
                .find_by_name(name)
                .ok_or_else(|| CatalogError::UnknownShader {
                    requested: name.to_string(),
                    available: self.names(),
                }),
            None => Ok(self.find_by_name(fallback).unwrap_or(0)),
        }
    }
}

impl fmt::Display for ShaderCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Found {} compiled shader(s)", self.programs.len())?;
        for (index, program) in self.programs.iter().enumerate() {
            writeln!(f, "  [{index}] {}", program.name)?;
        }
        Ok(())
    }
}

/// Reduces a user-supplied shader reference to its catalog base name.
///
/// `shaders/plasma.frag`, `plasma.frag.spv` and `plasma` all become `plasma`.
pub fn base_name(input: &str) -> String {
    let file_name = Path::new(input)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(input);
    let stripped = [FRAGMENT_SUFFIX, VERTEX_SUFFIX, ".frag", ".vert", ".spv"]
        .iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
        .unwrap_or(file_name);
    stripped.to_string()
}
