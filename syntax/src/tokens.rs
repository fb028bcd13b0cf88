pub type LineNumber = u32;
pub type ColumnNumber = u32;
pub type CharacterPosition = u32;

/// Every lexical unit of the language.
///
/// Declaration order matters: keywords, preprocessor directives, macros and
/// built-in function names each occupy one contiguous run of discriminants,
/// so the `is_*` membership tests below are two integer comparisons rather
/// than giant matches.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
  // Control
  EndOfFile,
  NewLine,
  Comment,
  Garbage,

  // Literals
  IntegerLiteral,
  FloatLiteral,
  StringLiteral,

  // Identifiers
  Variable,
  Identifier,

  // Punctuation
  LeftParen,
  RightParen,
  LeftSquare,
  RightSquare,
  Comma,
  Dot,
  Question,
  Colon,

  // Operators
  Equal,
  PlusEqual,
  MinusEqual,
  StarEqual,
  SlashEqual,
  AmpersandEqual,
  Plus,
  Minus,
  Star,
  Slash,
  Caret,
  Ampersand,
  Less,
  LessEqual,
  Greater,
  GreaterEqual,
  EqualEqual,
  NotEqual,

  // Keywords
  And,
  ByRef,
  Case,
  Const,
  ContinueCase,
  ContinueLoop,
  Default,
  Dim,
  Do,
  Else,
  ElseIf,
  EndFunc,
  EndIf,
  EndSelect,
  EndSwitch,
  EndWith,
  Enum,
  Exit,
  ExitLoop,
  False,
  For,
  Func,
  Global,
  If,
  In,
  Local,
  Next,
  Not,
  Null,
  Or,
  ReDim,
  Return,
  Select,
  Static,
  Step,
  Switch,
  Then,
  To,
  True,
  Until,
  Volatile,
  WEnd,
  While,
  With,

  // Preprocessor directives
  CommentsEnd,
  CommentsStart,
  Include,
  IncludeOnce,
  NoTrayIcon,
  OnAutoItStartRegister,
  Pragma,
  RequireAdmin,

  // Macros
  MacroAutoItPid,
  MacroAutoItVersion,
  MacroAutoItX64,
  MacroCompiled,
  MacroComputerName,
  MacroCr,
  MacroCrLf,
  MacroDesktopDir,
  MacroError,
  MacroExtended,
  MacroHomeDrive,
  MacroHomePath,
  MacroHour,
  MacroLf,
  MacroMDay,
  MacroMin,
  MacroMon,
  MacroMyDocumentsDir,
  MacroNumParams,
  MacroOsArch,
  MacroOsType,
  MacroOsVersion,
  MacroProgramFilesDir,
  MacroScriptDir,
  MacroScriptFullPath,
  MacroScriptLineNumber,
  MacroScriptName,
  MacroSec,
  MacroSystemDir,
  MacroTab,
  MacroTempDir,
  MacroUserName,
  MacroWindowsDir,
  MacroWorkingDir,
  MacroYear,

  // Built-in functions
  BuiltinAbs,
  BuiltinACos,
  BuiltinASin,
  BuiltinATan,
  BuiltinBinary,
  BuiltinBinaryLen,
  BuiltinCeiling,
  BuiltinConsoleRead,
  BuiltinConsoleWrite,
  BuiltinConsoleWriteError,
  BuiltinCos,
  BuiltinExp,
  BuiltinFloor,
  BuiltinFuncName,
  BuiltinHex,
  BuiltinInt,
  BuiltinIsArray,
  BuiltinIsBinary,
  BuiltinIsBool,
  BuiltinIsFloat,
  BuiltinIsFunc,
  BuiltinIsInt,
  BuiltinIsKeyword,
  BuiltinIsNumber,
  BuiltinIsPtr,
  BuiltinIsString,
  BuiltinLog,
  BuiltinMod,
  BuiltinMsgBox,
  BuiltinNumber,
  BuiltinPtr,
  BuiltinRandom,
  BuiltinRound,
  BuiltinSin,
  BuiltinSleep,
  BuiltinSqrt,
  BuiltinString,
  BuiltinStringLeft,
  BuiltinStringLen,
  BuiltinStringLower,
  BuiltinStringRight,
  BuiltinStringUpper,
  BuiltinTan,
  BuiltinTcpShutdown,
  BuiltinTcpStartup,
  BuiltinTimerDiff,
  BuiltinTimerInit,
  BuiltinTrayTip,
  BuiltinUBound,
  BuiltinUdpShutdown,
  BuiltinUdpStartup,
  BuiltinVarGetType,
}

impl TokenKind {
  pub fn is_keyword(self) -> bool {
    (self as u16) >= (Self::And as u16) && (self as u16) <= (Self::With as u16)
  }

  pub fn is_directive(self) -> bool {
    (self as u16) >= (Self::CommentsEnd as u16) && (self as u16) <= (Self::RequireAdmin as u16)
  }

  pub fn is_macro(self) -> bool {
    (self as u16) >= (Self::MacroAutoItPid as u16) && (self as u16) <= (Self::MacroYear as u16)
  }

  pub fn is_builtin_function(self) -> bool {
    (self as u16) >= (Self::BuiltinAbs as u16) && (self as u16) <= (Self::BuiltinVarGetType as u16)
  }

  pub fn is_assignment_operator(self) -> bool {
    matches!(
      self,
      Self::Equal
        | Self::PlusEqual
        | Self::MinusEqual
        | Self::StarEqual
        | Self::SlashEqual
        | Self::AmpersandEqual
    )
  }

  /// Tokens which can terminate the statement before them instead of a
  /// newline, e.g. `If $a Then Run() EndIf` on a single line.
  pub fn is_block_end(self) -> bool {
    matches!(
      self,
      Self::ElseIf | Self::Else | Self::EndIf | Self::WEnd | Self::EndFunc
    )
  }
}

/// Keywords, sorted by their lowercase spelling.
static KEYWORDS: &[(&str, TokenKind)] = &[
  ("and", TokenKind::And),
  ("byref", TokenKind::ByRef),
  ("case", TokenKind::Case),
  ("const", TokenKind::Const),
  ("continuecase", TokenKind::ContinueCase),
  ("continueloop", TokenKind::ContinueLoop),
  ("default", TokenKind::Default),
  ("dim", TokenKind::Dim),
  ("do", TokenKind::Do),
  ("else", TokenKind::Else),
  ("elseif", TokenKind::ElseIf),
  ("endfunc", TokenKind::EndFunc),
  ("endif", TokenKind::EndIf),
  ("endselect", TokenKind::EndSelect),
  ("endswitch", TokenKind::EndSwitch),
  ("endwith", TokenKind::EndWith),
  ("enum", TokenKind::Enum),
  ("exit", TokenKind::Exit),
  ("exitloop", TokenKind::ExitLoop),
  ("false", TokenKind::False),
  ("for", TokenKind::For),
  ("func", TokenKind::Func),
  ("global", TokenKind::Global),
  ("if", TokenKind::If),
  ("in", TokenKind::In),
  ("local", TokenKind::Local),
  ("next", TokenKind::Next),
  ("not", TokenKind::Not),
  ("null", TokenKind::Null),
  ("or", TokenKind::Or),
  ("redim", TokenKind::ReDim),
  ("return", TokenKind::Return),
  ("select", TokenKind::Select),
  ("static", TokenKind::Static),
  ("step", TokenKind::Step),
  ("switch", TokenKind::Switch),
  ("then", TokenKind::Then),
  ("to", TokenKind::To),
  ("true", TokenKind::True),
  ("until", TokenKind::Until),
  ("volatile", TokenKind::Volatile),
  ("wend", TokenKind::WEnd),
  ("while", TokenKind::While),
  ("with", TokenKind::With),
];

/// Preprocessor directives, sorted, keyed without the leading `#`.
static DIRECTIVES: &[(&str, TokenKind)] = &[
  ("ce", TokenKind::CommentsEnd),
  ("comments-end", TokenKind::CommentsEnd),
  ("comments-start", TokenKind::CommentsStart),
  ("cs", TokenKind::CommentsStart),
  ("include", TokenKind::Include),
  ("include-once", TokenKind::IncludeOnce),
  ("notrayicon", TokenKind::NoTrayIcon),
  ("onautoitstartregister", TokenKind::OnAutoItStartRegister),
  ("pragma", TokenKind::Pragma),
  ("requireadmin", TokenKind::RequireAdmin),
];

/// Macros, sorted, keyed without the leading `@`.
static MACROS: &[(&str, TokenKind)] = &[
  ("autoitpid", TokenKind::MacroAutoItPid),
  ("autoitversion", TokenKind::MacroAutoItVersion),
  ("autoitx64", TokenKind::MacroAutoItX64),
  ("compiled", TokenKind::MacroCompiled),
  ("computername", TokenKind::MacroComputerName),
  ("cr", TokenKind::MacroCr),
  ("crlf", TokenKind::MacroCrLf),
  ("desktopdir", TokenKind::MacroDesktopDir),
  ("error", TokenKind::MacroError),
  ("extended", TokenKind::MacroExtended),
  ("homedrive", TokenKind::MacroHomeDrive),
  ("homepath", TokenKind::MacroHomePath),
  ("hour", TokenKind::MacroHour),
  ("lf", TokenKind::MacroLf),
  ("mday", TokenKind::MacroMDay),
  ("min", TokenKind::MacroMin),
  ("mon", TokenKind::MacroMon),
  ("mydocumentsdir", TokenKind::MacroMyDocumentsDir),
  ("numparams", TokenKind::MacroNumParams),
  ("osarch", TokenKind::MacroOsArch),
  ("ostype", TokenKind::MacroOsType),
  ("osversion", TokenKind::MacroOsVersion),
  ("programfilesdir", TokenKind::MacroProgramFilesDir),
  ("scriptdir", TokenKind::MacroScriptDir),
  ("scriptfullpath", TokenKind::MacroScriptFullPath),
  ("scriptlinenumber", TokenKind::MacroScriptLineNumber),
  ("scriptname", TokenKind::MacroScriptName),
  ("sec", TokenKind::MacroSec),
  ("systemdir", TokenKind::MacroSystemDir),
  ("tab", TokenKind::MacroTab),
  ("tempdir", TokenKind::MacroTempDir),
  ("username", TokenKind::MacroUserName),
  ("windowsdir", TokenKind::MacroWindowsDir),
  ("workingdir", TokenKind::MacroWorkingDir),
  ("year", TokenKind::MacroYear),
];

/// Built-in function names, sorted. Each name maps to its own kind; the
/// Timer/TCP/Tray/UDP entries are deliberately pinned by a unit test below.
static BUILTINS: &[(&str, TokenKind)] = &[
  ("abs", TokenKind::BuiltinAbs),
  ("acos", TokenKind::BuiltinACos),
  ("asin", TokenKind::BuiltinASin),
  ("atan", TokenKind::BuiltinATan),
  ("binary", TokenKind::BuiltinBinary),
  ("binarylen", TokenKind::BuiltinBinaryLen),
  ("ceiling", TokenKind::BuiltinCeiling),
  ("consoleread", TokenKind::BuiltinConsoleRead),
  ("consolewrite", TokenKind::BuiltinConsoleWrite),
  ("consolewriteerror", TokenKind::BuiltinConsoleWriteError),
  ("cos", TokenKind::BuiltinCos),
  ("exp", TokenKind::BuiltinExp),
  ("floor", TokenKind::BuiltinFloor),
  ("funcname", TokenKind::BuiltinFuncName),
  ("hex", TokenKind::BuiltinHex),
  ("int", TokenKind::BuiltinInt),
  ("isarray", TokenKind::BuiltinIsArray),
  ("isbinary", TokenKind::BuiltinIsBinary),
  ("isbool", TokenKind::BuiltinIsBool),
  ("isfloat", TokenKind::BuiltinIsFloat),
  ("isfunc", TokenKind::BuiltinIsFunc),
  ("isint", TokenKind::BuiltinIsInt),
  ("iskeyword", TokenKind::BuiltinIsKeyword),
  ("isnumber", TokenKind::BuiltinIsNumber),
  ("isptr", TokenKind::BuiltinIsPtr),
  ("isstring", TokenKind::BuiltinIsString),
  ("log", TokenKind::BuiltinLog),
  ("mod", TokenKind::BuiltinMod),
  ("msgbox", TokenKind::BuiltinMsgBox),
  ("number", TokenKind::BuiltinNumber),
  ("ptr", TokenKind::BuiltinPtr),
  ("random", TokenKind::BuiltinRandom),
  ("round", TokenKind::BuiltinRound),
  ("sin", TokenKind::BuiltinSin),
  ("sleep", TokenKind::BuiltinSleep),
  ("sqrt", TokenKind::BuiltinSqrt),
  ("string", TokenKind::BuiltinString),
  ("stringleft", TokenKind::BuiltinStringLeft),
  ("stringlen", TokenKind::BuiltinStringLen),
  ("stringlower", TokenKind::BuiltinStringLower),
  ("stringright", TokenKind::BuiltinStringRight),
  ("stringupper", TokenKind::BuiltinStringUpper),
  ("tan", TokenKind::BuiltinTan),
  ("tcpshutdown", TokenKind::BuiltinTcpShutdown),
  ("tcpstartup", TokenKind::BuiltinTcpStartup),
  ("timerdiff", TokenKind::BuiltinTimerDiff),
  ("timerinit", TokenKind::BuiltinTimerInit),
  ("traytip", TokenKind::BuiltinTrayTip),
  ("ubound", TokenKind::BuiltinUBound),
  ("udpshutdown", TokenKind::BuiltinUdpShutdown),
  ("udpstartup", TokenKind::BuiltinUdpStartup),
  ("vargettype", TokenKind::BuiltinVarGetType),
];

fn table_lookup(table: &[(&str, TokenKind)], lowercase: &str) -> Option<TokenKind> {
  table
    .binary_search_by_key(&lowercase, |(name, _)| *name)
    .ok()
    .map(|index| table[index].1)
}

pub fn keyword_kind(lowercase: &str) -> Option<TokenKind> {
  table_lookup(KEYWORDS, lowercase)
}

pub fn builtin_kind(lowercase: &str) -> Option<TokenKind> {
  table_lookup(BUILTINS, lowercase)
}

/// `@name` lookup, `Garbage` for unknown names
pub fn macro_kind(lowercase: &str) -> TokenKind {
  table_lookup(MACROS, lowercase).unwrap_or(TokenKind::Garbage)
}

/// `#name` lookup, `Garbage` for unknown names
pub fn directive_kind(lowercase: &str) -> TokenKind {
  table_lookup(DIRECTIVES, lowercase).unwrap_or(TokenKind::Garbage)
}

/// The layered identifier resolution: keyword table, then built-in table,
/// then a plain (user function) identifier.
pub fn identifier_kind(lowercase: &str) -> TokenKind {
  keyword_kind(lowercase)
    .or_else(|| builtin_kind(lowercase))
    .unwrap_or(TokenKind::Identifier)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub start: CharacterPosition,
  pub end: CharacterPosition,
  pub line: LineNumber,
  pub column: ColumnNumber,
}
impl Token {
  pub fn get_value<'s>(&self, source: &'s str) -> &'s str {
    &source[self.start as usize..self.end as usize]
  }

  pub fn len(&self) -> CharacterPosition {
    self.end - self.start
  }

  pub fn is_empty(&self) -> bool {
    self.start == self.end
  }
}
impl Default for Token {
  fn default() -> Self {
    Self {
      kind: TokenKind::EndOfFile,
      start: 0,
      end: 0,
      line: 0,
      column: 0,
    }
  }
}

/// A finalized, cursor-addressable sequence of tokens.
///
/// The lexer appends tokens and then finalizes the stream; every read
/// operation afterwards goes through the cursor. Reading before
/// finalization, or appending after it, is a programmer error and only
/// checked in debug builds - malformed script input can never trigger it.
#[derive(Debug, Default)]
pub struct TokenStream {
  tokens: Vec<Token>,
  cursor: usize,
  finalized: bool,
}

impl TokenStream {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, token: Token) {
    debug_assert!(!self.finalized, "appending to a finalized token stream");
    self.tokens.push(token);
  }

  pub fn finalize(&mut self) {
    self.finalized = true;
  }

  pub fn is_finalized(&self) -> bool {
    self.finalized
  }

  pub fn len(&self) -> usize {
    self.tokens.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tokens.is_empty()
  }

  pub fn tokens(&self) -> &[Token] {
    &self.tokens
  }

  pub fn reached_end(&self) -> bool {
    self.cursor >= self.tokens.len()
  }

  /// The token under the cursor, or an `EndOfFile` token once exhausted
  pub fn current(&self) -> Token {
    self.lookahead(0)
  }

  pub fn lookahead(&self, offset: usize) -> Token {
    debug_assert!(self.finalized, "reading from an unfinalized token stream");
    self
      .tokens
      .get(self.cursor + offset)
      .copied()
      .unwrap_or_default()
  }

  /// Returns the token under the cursor and advances past it
  pub fn bump(&mut self) -> Token {
    debug_assert!(self.finalized, "reading from an unfinalized token stream");
    let token = self.current();
    if self.cursor < self.tokens.len() {
      self.cursor += 1;
    }
    token
  }

  pub fn reset(&mut self) {
    self.cursor = 0;
  }
}
