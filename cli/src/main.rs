use aut_interpreter::Interpreter;
use aut_syntax::{
  ast::Document, diagnostics::DiagnosticEngine, lexer::Lexer, parser::Parser,
  source::SourceManager,
};
use clap::{Arg, ArgAction, Command};
use rustyline::error::ReadlineError;
use rustyline::Editor;
use std::{cell::Cell, path::Path, process, rc::Rc};

fn command() -> Command {
  Command::new("aut")
    .version(env!("CARGO_PKG_VERSION"))
    .about("An interpreter for the aut scripting language")
    .arg(Arg::new("file").help("The script to run; omit it to open a REPL"))
    .arg(
      Arg::new("tokens")
        .long("tokens")
        .action(ArgAction::SetTrue)
        .help("Dump the token stream instead of running"),
    )
    .arg(
      Arg::new("ast")
        .long("ast")
        .action(ArgAction::SetTrue)
        .help("Dump the parsed document instead of running"),
    )
    .arg(
      Arg::new("no-warnings")
        .short('W')
        .long("no-warnings")
        .action(ArgAction::SetTrue)
        .help("Suppress all warnings"),
    )
    .arg(
      Arg::new("warnings-as-errors")
        .long("warnings-as-errors")
        .action(ArgAction::SetTrue)
        .help("Promote warnings to errors"),
    )
    .arg(
      Arg::new("error-limit")
        .long("error-limit")
        .value_parser(clap::value_parser!(usize))
        .help("Stop after this many errors"),
    )
    .arg(
      Arg::new("include")
        .short('I')
        .long("include")
        .action(ArgAction::Append)
        .help("Add a directory to the include search path"),
    )
    .arg(
      Arg::new("statement-limit")
        .long("statement-limit")
        .value_parser(clap::value_parser!(u64))
        .help("Halt after this many statements"),
    )
}

fn main() {
  let matches = command().get_matches();

  let mut diagnostics = DiagnosticEngine::new();
  diagnostics.set_ignore_all_warnings(matches.get_flag("no-warnings"));
  diagnostics.set_warnings_as_errors(matches.get_flag("warnings-as-errors"));
  diagnostics.set_error_limit(matches.get_one::<usize>("error-limit").copied());

  let mut sources = SourceManager::new();
  if let Some(directories) = matches.get_many::<String>("include") {
    for directory in directories {
      sources.add_search_path(directory);
    }
  }

  match matches.get_one::<String>("file") {
    Some(file) => {
      let code = if matches.get_flag("tokens") {
        dump_tokens(&mut sources, &mut diagnostics, file)
      } else if matches.get_flag("ast") {
        dump_ast(&mut sources, &mut diagnostics, file)
      } else {
        run_file(
          &mut sources,
          &mut diagnostics,
          file,
          matches.get_one::<u64>("statement-limit").copied(),
        )
      };
      process::exit(code);
    }
    None => repl(sources, diagnostics),
  }
}

fn dump_tokens(sources: &mut SourceManager, diagnostics: &mut DiagnosticEngine, file: &str) -> i32 {
  let file = match sources.load_file(Path::new(file)) {
    Ok(file) => file,
    Err(error) => {
      eprintln!("aut: cannot open '{file}': {error}");
      return 2;
    }
  };

  let stream = Lexer::new(&file).process(diagnostics);
  for token in stream.tokens() {
    println!(
      "{:>4}:{:<4} {:?} {:?}",
      token.line,
      token.column,
      token.kind,
      token.get_value(&file.contents)
    );
  }

  i32::from(diagnostics.has_error_occurred())
}

fn dump_ast(sources: &mut SourceManager, diagnostics: &mut DiagnosticEngine, file: &str) -> i32 {
  let mut document = Document::new();
  if let Err(error) = Parser::new(sources, diagnostics).parse_file(&mut document, Path::new(file))
  {
    eprintln!("aut: cannot open '{file}': {error}");
    return 2;
  }

  println!("{document:#?}");
  i32::from(diagnostics.has_error_occurred())
}

fn run_file(
  sources: &mut SourceManager,
  diagnostics: &mut DiagnosticEngine,
  file: &str,
  statement_limit: Option<u64>,
) -> i32 {
  let path = Path::new(file);
  let mut document = Document::new();
  if let Err(error) = Parser::new(sources, diagnostics).parse_file(&mut document, path) {
    eprintln!("aut: cannot open '{file}': {error}");
    return 2;
  }
  if diagnostics.has_error_occurred() {
    return 1;
  }

  let mut interpreter = Interpreter::new();
  interpreter
    .vm_mut()
    .set_script_path(path.canonicalize().ok());
  if let Some(limit) = statement_limit {
    let remaining = Cell::new(limit);
    interpreter.vm_mut().set_pre_statement_callback(move || {
      if remaining.get() == 0 {
        false
      } else {
        remaining.set(remaining.get() - 1);
        true
      }
    });
  }

  interpreter.set_document(Rc::new(document));
  interpreter.run(diagnostics);

  if diagnostics.has_error_occurred() {
    return 1;
  }
  i32::try_from(interpreter.vm().exit_code()).unwrap_or(1)
}

fn repl(mut sources: SourceManager, mut diagnostics: DiagnosticEngine) {
  println!("aut {} - interactive mode", env!("CARGO_PKG_VERSION"));

  let mut editor = match Editor::<()>::new() {
    Ok(editor) => editor,
    Err(error) => {
      eprintln!("aut: cannot start the line editor: {error}");
      return;
    }
  };

  let mut interpreter = Interpreter::new();
  let mut line_number = 0usize;

  loop {
    match editor.readline("> ") {
      Ok(line) => {
        editor.add_history_entry(&line);
        line_number += 1;

        let mut document = Document::new();
        let errors_before = diagnostics.error_count();
        Parser::new(&mut sources, &mut diagnostics).parse_string(
          &mut document,
          &format!("repl:{line_number}"),
          &line,
        );
        if diagnostics.error_count() > errors_before {
          continue;
        }

        interpreter.set_document(Rc::new(document));
        interpreter.run(&mut diagnostics);

        if interpreter.vm().is_halted() {
          process::exit(i32::try_from(interpreter.vm().exit_code()).unwrap_or(1));
        }
      }
      Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
      Err(error) => {
        eprintln!("aut: {error:?}");
        break;
      }
    }
  }
}
