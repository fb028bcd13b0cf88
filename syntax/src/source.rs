use crate::tokens::{ColumnNumber, LineNumber};
use rustc_hash::FxHashMap;
use std::{
  fmt, fs, io,
  path::{Path, PathBuf},
  rc::Rc,
};

/// A position in a loaded source file, usable after the file itself has been
/// dropped from scope (the name is reference counted).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
  pub file: Rc<str>,
  pub line: LineNumber,
  pub column: ColumnNumber,
}
impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.file, self.line, self.column)
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
  /// A script or an include resolved next to the including script
  Basic,
  /// An include resolved through the search path
  System,
}

pub struct SourceFile {
  /// Absolute path, the identity used for include deduplication.
  /// Virtual files get a pseudo path of the form `<name>`.
  pub path: PathBuf,
  /// Short name used in diagnostics
  pub name: Rc<str>,
  pub kind: SourceKind,
  pub contents: String,
}
impl SourceFile {
  pub fn location(&self, line: LineNumber, column: ColumnNumber) -> Location {
    Location {
      file: Rc::clone(&self.name),
      line,
      column,
    }
  }

  pub fn directory(&self) -> Option<&Path> {
    self.path.parent()
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IncludeKind {
  /// `#include "file"`, resolved next to the including file first
  Quoted,
  /// `#include <file>`, resolved through the search path first
  Angled,
}

/// Owns every piece of source text for the lifetime of a run.
///
/// Files are cached by canonical path, so loading the same path twice returns
/// the same `SourceFile` and `#include-once` can compare identities. Virtual
/// files (REPL lines, test snippets) are never cached.
#[derive(Default)]
pub struct SourceManager {
  files: Vec<Rc<SourceFile>>,
  by_path: FxHashMap<PathBuf, usize>,
  search_path: Vec<PathBuf>,
}

impl SourceManager {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_search_path(&mut self, directory: impl Into<PathBuf>) {
    self.search_path.push(directory.into());
  }

  pub fn files(&self) -> &[Rc<SourceFile>] {
    &self.files
  }

  pub fn load_file(&mut self, path: &Path) -> io::Result<Rc<SourceFile>> {
    self.load_at(path, SourceKind::Basic)
  }

  pub fn load_virtual(&mut self, name: &str, contents: &str) -> Rc<SourceFile> {
    let file = Rc::new(SourceFile {
      path: PathBuf::from(format!("<{name}>")),
      name: Rc::from(name),
      kind: SourceKind::Basic,
      contents: contents.to_owned(),
    });
    self.files.push(Rc::clone(&file));
    file
  }

  /// Resolves an include target against the candidate directories implied by
  /// its kind. Quoted includes prefer the including file's directory, angled
  /// includes prefer the search path; only the lookup order differs.
  pub fn resolve_include(
    &mut self,
    target: &str,
    kind: IncludeKind,
    from: &SourceFile,
  ) -> io::Result<Rc<SourceFile>> {
    let local = from.directory().map(Path::to_path_buf);

    let mut candidates: Vec<(PathBuf, SourceKind)> = Vec::new();
    match kind {
      IncludeKind::Quoted => {
        if let Some(directory) = &local {
          candidates.push((directory.join(target), SourceKind::Basic));
        }
        for directory in &self.search_path {
          candidates.push((directory.join(target), SourceKind::System));
        }
      }
      IncludeKind::Angled => {
        for directory in &self.search_path {
          candidates.push((directory.join(target), SourceKind::System));
        }
        if let Some(directory) = &local {
          candidates.push((directory.join(target), SourceKind::Basic));
        }
      }
    }

    for (candidate, source_kind) in candidates {
      if candidate.is_file() {
        return self.load_at(&candidate, source_kind);
      }
    }

    Err(io::Error::new(
      io::ErrorKind::NotFound,
      format!("could not resolve include '{target}'"),
    ))
  }

  fn load_at(&mut self, path: &Path, kind: SourceKind) -> io::Result<Rc<SourceFile>> {
    let canonical = path.canonicalize()?;

    if let Some(index) = self.by_path.get(&canonical) {
      return Ok(Rc::clone(&self.files[*index]));
    }

    let contents = fs::read_to_string(&canonical)?;
    let name = path.to_string_lossy();

    let file = Rc::new(SourceFile {
      name: Rc::from(name.as_ref()),
      path: canonical.clone(),
      kind,
      contents,
    });
    self.by_path.insert(canonical, self.files.len());
    self.files.push(Rc::clone(&file));

    Ok(file)
  }
}
