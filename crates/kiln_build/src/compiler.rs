//! The compiler boundary.
//!
//! Kiln does not compile anything itself. A [`Compiler`] receives the
//! source files, classpath and output directory of one unit and reports
//! diagnostics; [`JavacCompiler`] drives an external `javac` process.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::BuildError;

/// Severity of a compiler diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational note.
    Note,
    /// Warning; does not fail the unit.
    Warning,
    /// Error; fails the unit.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// One message reported by the compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerDiagnostic {
    /// Source file the message refers to, if any.
    pub file: Option<PathBuf>,
    /// 1-based line number, if any.
    pub line: Option<u32>,
    /// Severity.
    pub severity: Severity,
    /// Message text.
    pub message: String,
}

impl CompilerDiagnostic {
    /// Returns `true` for error-severity diagnostics.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for CompilerDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{line}: ", file.display())?,
            (Some(file), None) => write!(f, "{}: ", file.display())?,
            _ => {}
        }
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Inputs of one compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// Source files, sorted.
    pub sources: Vec<PathBuf>,
    /// Classpath entries in order.
    pub classpath: Vec<PathBuf>,
    /// Directory receiving compiled classes.
    pub output_dir: PathBuf,
}

/// An external compiler.
pub trait Compiler: Send + Sync {
    /// Compiles `request.sources` into `request.output_dir`.
    ///
    /// Returns every diagnostic, errors included; callers decide what is
    /// fatal. `Err` is reserved for failing to run the compiler at all.
    fn compile(&self, request: &CompileRequest) -> Result<Vec<CompilerDiagnostic>, BuildError>;
}

/// Runs `javac` as a child process.
#[derive(Debug, Clone)]
pub struct JavacCompiler {
    program: PathBuf,
    args: Vec<String>,
}

impl Default for JavacCompiler {
    fn default() -> Self {
        Self::new("javac")
    }
}

impl JavacCompiler {
    /// Creates a compiler running `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Adds arguments passed before the generated ones.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Writes the argument file handed to javac as `@file`, one quoted
    /// argument per line.
    fn write_argfile(&self, request: &CompileRequest) -> Result<tempfile::NamedTempFile, BuildError> {
        let mut file = tempfile::Builder::new()
            .prefix("kiln-javac-")
            .suffix(".args")
            .tempfile()
            .map_err(|e| BuildError::io(std::env::temp_dir(), e))?;

        let mut lines = Vec::new();
        lines.push("-d".to_string());
        lines.push(quote(&request.output_dir));
        if !request.classpath.is_empty() {
            let joined = std::env::join_paths(&request.classpath).map_err(|e| {
                BuildError::io(
                    &request.output_dir,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
                )
            })?;
            lines.push("-classpath".to_string());
            lines.push(quote(Path::new(&joined)));
        }
        lines.extend(request.sources.iter().map(|s| quote(s)));

        let path = file.path().to_path_buf();
        writeln!(file, "{}", lines.join("\n")).map_err(|e| BuildError::io(&path, e))?;
        file.flush().map_err(|e| BuildError::io(&path, e))?;
        Ok(file)
    }
}

impl Compiler for JavacCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<Vec<CompilerDiagnostic>, BuildError> {
        if request.sources.is_empty() {
            return Ok(Vec::new());
        }
        std::fs::create_dir_all(&request.output_dir)
            .map_err(|e| BuildError::io(&request.output_dir, e))?;

        let argfile = self.write_argfile(request)?;
        let mut at = std::ffi::OsString::from("@");
        at.push(argfile.path());

        tracing::debug!(
            program = %self.program.display(),
            sources = request.sources.len(),
            output = %request.output_dir.display(),
            "running compiler"
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(at)
            .output()
            .map_err(|e| BuildError::io(&self.program, e))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut diagnostics = parse_javac_output(&stderr);
        if !output.status.success() && !diagnostics.iter().any(CompilerDiagnostic::is_error) {
            diagnostics.push(CompilerDiagnostic {
                file: None,
                line: None,
                severity: Severity::Error,
                message: format!("{} exited with {}", self.program.display(), output.status),
            });
        }
        Ok(diagnostics)
    }
}

/// Quotes an argfile argument; javac argfiles accept double-quoted strings
/// with backslash escapes.
fn quote(path: &Path) -> String {
    let text = path.to_string_lossy();
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Parses javac's `file:line: severity: message` output.
///
/// Lines without a recognizable header (source excerpts, caret markers,
/// `symbol:` details, the final error count) are ignored.
pub fn parse_javac_output(output: &str) -> Vec<CompilerDiagnostic> {
    output.lines().filter_map(parse_javac_line).collect()
}

fn parse_javac_line(line: &str) -> Option<CompilerDiagnostic> {
    const FILELESS: &[(&str, Severity)] = &[("error: ", Severity::Error), ("warning: ", Severity::Warning)];
    const MARKERS: &[(&str, Severity)] = &[
        (": error: ", Severity::Error),
        (": warning: ", Severity::Warning),
        (": note: ", Severity::Note),
    ];

    for (prefix, severity) in FILELESS {
        if let Some(message) = line.strip_prefix(*prefix) {
            return Some(CompilerDiagnostic {
                file: None,
                line: None,
                severity: *severity,
                message: message.trim().to_string(),
            });
        }
    }
    for (marker, severity) in MARKERS {
        let Some(pos) = line.find(*marker) else {
            continue;
        };
        let location = &line[..pos];
        let (file, line_no) = match location.rsplit_once(':') {
            Some((file, n)) if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => (file, n.parse().ok()),
            _ => (location, None),
        };
        return Some(CompilerDiagnostic {
            file: Some(PathBuf::from(file)),
            line: line_no,
            severity: *severity,
            message: line[pos + marker.len()..].trim().to_string(),
        });
    }
    None
}
