pub mod ast;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod source;
pub mod tokens;

pub use ast::Document;
pub use diagnostics::{Diagnostic, DiagnosticConsumer, DiagnosticEngine};
pub use lexer::Lexer;
pub use parser::Parser;
pub use source::{Location, SourceFile, SourceManager};
pub use tokens::{LineNumber, Token, TokenKind, TokenStream};
