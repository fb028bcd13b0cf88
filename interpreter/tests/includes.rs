use aut_interpreter::{Interpreter, Variant};
use aut_syntax::{
  ast::Document, diagnostics::DiagnosticEngine, parser::Parser, source::SourceManager,
};
use std::{
  cell::RefCell,
  fs,
  path::{Path, PathBuf},
  rc::Rc,
};

fn scratch_dir(test: &str) -> PathBuf {
  let directory = std::env::temp_dir().join(format!("aut-includes-{}-{test}", std::process::id()));
  fs::create_dir_all(&directory).unwrap();
  directory
}

struct FileRun {
  interpreter: Interpreter,
  output: String,
  errors: usize,
}

impl FileRun {
  fn global(&self, name: &str) -> Variant {
    self
      .interpreter
      .vm()
      .get_global(name)
      .unwrap_or_else(|| panic!("global ${name} was never defined"))
  }
}

fn run_file(path: &Path, search_path: Option<&Path>) -> FileRun {
  let mut sources = SourceManager::new();
  if let Some(directory) = search_path {
    sources.add_search_path(directory);
  }
  let mut diagnostics = DiagnosticEngine::silent();
  let mut document = Document::new();
  Parser::new(&mut sources, &mut diagnostics)
    .parse_file(&mut document, path)
    .expect("main script should open");

  let output = Rc::new(RefCell::new(String::new()));
  let mut interpreter = Interpreter::new();
  {
    let sink = Rc::clone(&output);
    interpreter
      .vm_mut()
      .set_console_write(move |text| sink.borrow_mut().push_str(text));
  }
  interpreter.set_document(Rc::new(document));
  interpreter.run(&mut diagnostics);

  let output = output.borrow().clone();
  FileRun {
    interpreter,
    output,
    errors: diagnostics.error_count(),
  }
}

#[test]
fn includes_splice_statements_and_functions() {
  let directory = scratch_dir("splice");
  fs::write(
    directory.join("lib.au3"),
    "$fromlib = 'present'\nFunc shared()\n  ConsoleWrite('shared ran')\nEndFunc\n",
  )
  .unwrap();
  fs::write(
    directory.join("main.au3"),
    "$before = 1\n#include \"lib.au3\"\nshared()\n",
  )
  .unwrap();

  let run = run_file(&directory.join("main.au3"), None);
  assert_eq!(run.errors, 0);
  assert_eq!(run.global("fromlib"), Variant::from("present"));
  assert_eq!(run.output, "shared ran");

  fs::remove_dir_all(directory).ok();
}

#[test]
fn include_once_bodies_execute_exactly_once() {
  let directory = scratch_dir("once");
  fs::write(directory.join("counter.au3"), "$count += 1\n").unwrap();
  fs::write(
    directory.join("main.au3"),
    "$count = 0\n#include-once \"counter.au3\"\n#include-once \"counter.au3\"\n",
  )
  .unwrap();

  let run = run_file(&directory.join("main.au3"), None);
  assert_eq!(run.errors, 0);
  assert_eq!(run.global("count"), Variant::from(1));

  fs::remove_dir_all(directory).ok();
}

#[test]
fn plain_includes_are_not_deduplicated() {
  let directory = scratch_dir("plain");
  fs::write(directory.join("counter.au3"), "$count += 1\n").unwrap();
  fs::write(
    directory.join("main.au3"),
    "$count = 0\n#include \"counter.au3\"\n#include \"counter.au3\"\n",
  )
  .unwrap();

  let run = run_file(&directory.join("main.au3"), None);
  assert_eq!(run.errors, 0);
  assert_eq!(run.global("count"), Variant::from(2));

  fs::remove_dir_all(directory).ok();
}

#[test]
fn angled_includes_resolve_through_the_search_path() {
  let directory = scratch_dir("angled");
  let library = directory.join("library");
  fs::create_dir_all(&library).unwrap();
  fs::write(library.join("shared.au3"), "$found = 'via search path'\n").unwrap();
  fs::write(directory.join("main.au3"), "#include <shared.au3>\n").unwrap();

  let run = run_file(&directory.join("main.au3"), Some(&library));
  assert_eq!(run.errors, 0);
  assert_eq!(run.global("found"), Variant::from("via search path"));

  fs::remove_dir_all(directory).ok();
}

#[test]
fn include_cycles_are_reported_fatally() {
  let directory = scratch_dir("cycle");
  fs::write(directory.join("a.au3"), "$a = 1\n#include \"b.au3\"\n").unwrap();
  fs::write(directory.join("b.au3"), "$b = 1\n#include \"a.au3\"\n").unwrap();

  let run = run_file(&directory.join("a.au3"), None);
  assert!(run.errors >= 1);
  assert_eq!(run.global("a"), Variant::from(1));
  assert_eq!(run.global("b"), Variant::from(1));

  fs::remove_dir_all(directory).ok();
}

#[test]
fn missing_includes_do_not_stop_the_rest_of_the_file() {
  let directory = scratch_dir("missing");
  fs::write(
    directory.join("main.au3"),
    "#include \"nowhere.au3\"\n$after = 1\n",
  )
  .unwrap();

  let run = run_file(&directory.join("main.au3"), None);
  assert_eq!(run.errors, 1);
  assert_eq!(run.global("after"), Variant::from(1));

  fs::remove_dir_all(directory).ok();
}
