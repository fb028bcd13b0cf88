use crate::{
  variant::{Numeric, Variant},
  vm::VirtualMachine,
};
use aut_syntax::tokens::TokenKind;
use std::time::{SystemTime, UNIX_EPOCH};

fn arg(args: &[Variant], index: usize) -> Variant {
  args.get(index).cloned().unwrap_or_default()
}

fn double_function(args: &[Variant], function: fn(f64) -> f64) -> Variant {
  Variant::Double(function(arg(args, 0).cast_double()))
}

fn nanoseconds_since_epoch() -> i64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|elapsed| i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX))
    .unwrap_or(0)
}

/// Dispatches one call of the built-in function table. `None` means the
/// built-in exists as a token but has no implementation here; the caller is
/// responsible for the diagnostic.
pub fn call(vm: &mut VirtualMachine, kind: TokenKind, args: &[Variant]) -> Option<Variant> {
  // every call starts with clear registers, like the reference runtime
  vm.set_error(0);
  vm.set_extended(0);

  let value = match kind {
    // console I/O
    TokenKind::BuiltinConsoleWrite => {
      let text = arg(args, 0).cast_string();
      vm.console_write(&text);
      Variant::from(text.chars().count())
    }
    TokenKind::BuiltinConsoleWriteError => {
      let text = arg(args, 0).cast_string();
      vm.console_write_error(&text);
      Variant::from(text.chars().count())
    }

    // type queries
    TokenKind::BuiltinIsArray => Variant::from(matches!(arg(args, 0), Variant::Array(_))),
    TokenKind::BuiltinIsBinary => Variant::from(matches!(arg(args, 0), Variant::Binary(_))),
    TokenKind::BuiltinIsBool => Variant::from(matches!(arg(args, 0), Variant::Boolean(_))),
    TokenKind::BuiltinIsFloat => Variant::from(matches!(arg(args, 0), Variant::Double(_))),
    TokenKind::BuiltinIsFunc => Variant::from(matches!(arg(args, 0), Variant::Function(_))),
    TokenKind::BuiltinIsInt => Variant::from(matches!(arg(args, 0), Variant::Int64(_))),
    TokenKind::BuiltinIsKeyword => Variant::from(matches!(arg(args, 0), Variant::Keyword(_))),
    TokenKind::BuiltinIsNumber => Variant::from(matches!(
      arg(args, 0),
      Variant::Int64(_) | Variant::Double(_)
    )),
    TokenKind::BuiltinIsPtr => Variant::from(matches!(arg(args, 0), Variant::Pointer(_))),
    TokenKind::BuiltinIsString => Variant::from(matches!(arg(args, 0), Variant::String(_))),
    TokenKind::BuiltinVarGetType => Variant::from(arg(args, 0).type_name()),
    TokenKind::BuiltinUBound => match arg(args, 0) {
      Variant::Array(items) => Variant::from(items.len()),
      _ => {
        vm.set_error(1);
        Variant::from(0)
      }
    },
    TokenKind::BuiltinFuncName => match arg(args, 0) {
      Variant::Function(name) => Variant::from(name),
      _ => {
        vm.set_error(1);
        Variant::default()
      }
    },

    // conversions
    TokenKind::BuiltinInt => Variant::Int64(arg(args, 0).cast_int()),
    TokenKind::BuiltinNumber => match arg(args, 0).to_numeric() {
      Numeric::Int(value) => Variant::Int64(value),
      Numeric::Float(value) => Variant::Double(value),
    },
    TokenKind::BuiltinString => Variant::String(arg(args, 0).cast_string()),
    TokenKind::BuiltinBinary => match arg(args, 0) {
      binary @ Variant::Binary(_) => binary,
      Variant::String(text) => Variant::Binary(text.as_bytes().to_vec()),
      other => Variant::Binary(other.cast_int().to_le_bytes().to_vec()),
    },
    TokenKind::BuiltinBinaryLen => match arg(args, 0) {
      Variant::Binary(bytes) => Variant::from(bytes.len()),
      _ => {
        vm.set_error(1);
        Variant::from(0)
      }
    },
    #[allow(clippy::cast_sign_loss)]
    TokenKind::BuiltinPtr => Variant::Pointer(arg(args, 0).cast_int() as u64),
    TokenKind::BuiltinHex => {
      #[allow(clippy::cast_sign_loss)]
      let value = arg(args, 0).cast_int() as u64;
      let width = if args.len() > 1 {
        arg(args, 1).cast_int().clamp(1, 16) as usize
      } else if value > u64::from(u32::MAX) {
        16
      } else {
        8
      };
      let mask = if width == 16 { u64::MAX } else { (1 << (width * 4)) - 1 };
      Variant::from(format!("{:0width$X}", value & mask))
    }

    // maths
    TokenKind::BuiltinAbs => match arg(args, 0).to_numeric() {
      Numeric::Int(value) => Variant::Int64(value.wrapping_abs()),
      Numeric::Float(value) => Variant::Double(value.abs()),
    },
    TokenKind::BuiltinACos => double_function(args, f64::acos),
    TokenKind::BuiltinASin => double_function(args, f64::asin),
    TokenKind::BuiltinATan => double_function(args, f64::atan),
    TokenKind::BuiltinCos => double_function(args, f64::cos),
    TokenKind::BuiltinSin => double_function(args, f64::sin),
    TokenKind::BuiltinTan => double_function(args, f64::tan),
    TokenKind::BuiltinExp => double_function(args, f64::exp),
    TokenKind::BuiltinLog => double_function(args, f64::ln),
    TokenKind::BuiltinSqrt => double_function(args, f64::sqrt),
    #[allow(clippy::cast_possible_truncation)]
    TokenKind::BuiltinCeiling => Variant::Int64(arg(args, 0).cast_double().ceil() as i64),
    #[allow(clippy::cast_possible_truncation)]
    TokenKind::BuiltinFloor => Variant::Int64(arg(args, 0).cast_double().floor() as i64),
    TokenKind::BuiltinRound => {
      let value = arg(args, 0).cast_double();
      let digits = if args.len() > 1 { arg(args, 1).cast_int() } else { 0 };
      let scale = 10f64.powi(digits.clamp(-15, 15) as i32);
      Variant::Double((value * scale).round() / scale)
    }
    TokenKind::BuiltinMod => {
      match (arg(args, 0).to_numeric(), arg(args, 1).to_numeric()) {
        (Numeric::Int(left), Numeric::Int(right)) if right != 0 => {
          Variant::Int64(left.wrapping_rem(right))
        }
        (left, right) => Variant::Double(left.as_double() % right.as_double()),
      }
    }
    TokenKind::BuiltinRandom => {
      let sample = vm.next_random();
      match args.len() {
        0 => Variant::Double(sample),
        _ => {
          let low = arg(args, 0).cast_double();
          let high = arg(args, 1).cast_double();
          let integer = args.len() > 2 && arg(args, 2).cast_boolean();
          if integer {
            #[allow(clippy::cast_possible_truncation)]
            let value = (low + sample * (high - low + 1.0)).floor() as i64;
            Variant::Int64(value)
          } else {
            Variant::Double(low + sample * (high - low))
          }
        }
      }
    }

    // strings
    TokenKind::BuiltinStringLen => Variant::from(arg(args, 0).cast_string().chars().count()),
    TokenKind::BuiltinStringLeft => {
      let text = arg(args, 0).cast_string();
      let count = arg(args, 1).cast_int().max(0) as usize;
      Variant::from(text.chars().take(count).collect::<String>())
    }
    TokenKind::BuiltinStringRight => {
      let text = arg(args, 0).cast_string();
      let count = arg(args, 1).cast_int().max(0) as usize;
      let total = text.chars().count();
      Variant::from(text.chars().skip(total.saturating_sub(count)).collect::<String>())
    }
    TokenKind::BuiltinStringUpper => Variant::from(arg(args, 0).cast_string().to_uppercase()),
    TokenKind::BuiltinStringLower => Variant::from(arg(args, 0).cast_string().to_lowercase()),

    // timers and the network/tray stubs
    TokenKind::BuiltinTimerInit => Variant::Int64(nanoseconds_since_epoch()),
    TokenKind::BuiltinTimerDiff => {
      let elapsed = nanoseconds_since_epoch() - arg(args, 0).cast_int();
      #[allow(clippy::cast_precision_loss)]
      let milliseconds = elapsed as f64 / 1_000_000.0;
      Variant::Double(milliseconds)
    }
    TokenKind::BuiltinTcpStartup
    | TokenKind::BuiltinTcpShutdown
    | TokenKind::BuiltinUdpStartup
    | TokenKind::BuiltinUdpShutdown
    | TokenKind::BuiltinTrayTip => Variant::from(1),

    TokenKind::BuiltinSleep => {
      let milliseconds = arg(args, 0).cast_int().max(0);
      #[allow(clippy::cast_sign_loss)]
      std::thread::sleep(std::time::Duration::from_millis(milliseconds as u64));
      Variant::default()
    }

    // recognized but not part of the demonstrative subset
    TokenKind::BuiltinConsoleRead | TokenKind::BuiltinMsgBox => return None,

    _ => return None,
  };

  Some(value)
}

/// The value of a macro expression. Macros with no meaningful host value
/// here evaluate to the empty string.
pub fn macro_value(vm: &VirtualMachine, kind: TokenKind) -> Variant {
  match kind {
    TokenKind::MacroCr => Variant::from("\r"),
    TokenKind::MacroCrLf => Variant::from("\r\n"),
    TokenKind::MacroLf => Variant::from("\n"),
    TokenKind::MacroTab => Variant::from("\t"),

    TokenKind::MacroAutoItVersion => Variant::from(env!("CARGO_PKG_VERSION")),
    TokenKind::MacroAutoItPid => Variant::from(i64::from(std::process::id())),
    TokenKind::MacroAutoItX64 => Variant::from(cfg!(target_pointer_width = "64")),
    TokenKind::MacroCompiled => Variant::from(false),

    TokenKind::MacroError => Variant::Int64(vm.error()),
    TokenKind::MacroExtended => Variant::Int64(vm.extended()),
    TokenKind::MacroNumParams => Variant::from(0),

    TokenKind::MacroOsArch => Variant::from(std::env::consts::ARCH),
    TokenKind::MacroOsType => Variant::from(std::env::consts::OS),

    TokenKind::MacroComputerName => {
      Variant::from(std::env::var("HOSTNAME").or_else(|_| std::env::var("COMPUTERNAME")).unwrap_or_default())
    }
    TokenKind::MacroUserName => {
      Variant::from(std::env::var("USER").or_else(|_| std::env::var("USERNAME")).unwrap_or_default())
    }
    TokenKind::MacroWorkingDir => Variant::from(
      std::env::current_dir()
        .map(|directory| directory.to_string_lossy().into_owned())
        .unwrap_or_default(),
    ),
    TokenKind::MacroTempDir => {
      Variant::from(std::env::temp_dir().to_string_lossy().into_owned())
    }

    TokenKind::MacroScriptFullPath => Variant::from(
      vm.script_path()
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_default(),
    ),
    TokenKind::MacroScriptDir => Variant::from(
      vm.script_path()
        .and_then(std::path::Path::parent)
        .map(|directory| directory.to_string_lossy().into_owned())
        .unwrap_or_default(),
    ),
    TokenKind::MacroScriptName => Variant::from(
      vm.script_path()
        .and_then(std::path::Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default(),
    ),

    _ => Variant::default(),
  }
}
