//! Source code representation and error management.

use console::style;
use std::{fmt, fs, path::Path};
use thiserror::Error;

/// Represents source code.
#[derive(Debug, Clone)]
pub struct Source {
    /// Name used in diagnostics. Usually the path of the file the content was read from.
    pub name: String,
    /// Original source code.
    pub content: String,
}

impl Source {
    /// Create a new `Source` with the specified `name` and `content`.
    pub fn new(name: impl ToString, content: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            content: content.to_string(),
        }
    }

    /// Reads the whole file at `path`.
    /// An unreadable file is a [`CompileError::SourceUnreadable`].
    pub fn from_file(path: impl AsRef<Path>) -> CompileResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|err| CompileError::SourceUnreadable {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Ok(Self::new(path.display(), content))
    }

    /// Returns the text of the 1-based `line`, without its line terminator.
    pub fn line_text(&self, line: usize) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.content
            .split('\n')
            .nth(line - 1)
            .map(|text| text.trim_end_matches('\r'))
    }

    /// Pairs `error` with this source so that it can be rendered with the offending line.
    pub fn diagnostic<'a>(&'a self, error: &'a CompileError) -> Diagnostic<'a> {
        Diagnostic {
            source: self,
            error,
        }
    }
}

impl From<&str> for Source {
    fn from(content: &str) -> Self {
        Source::new("<input>", content)
    }
}

/// A position in a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    /// 1-based line number.
    pub line: usize,
}

impl Location {
    pub fn new(file: impl ToString, line: usize) -> Self {
        Self {
            file: file.to_string(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

/// Every way a compilation run can fail. All of them are fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("cannot read source file {path}: {message}")]
    SourceUnreadable { path: String, message: String },
    #[error("{message}")]
    Lexical { location: Location, message: String },
    #[error("want '{expected}', but have '{found}'")]
    Parse {
        location: Location,
        expected: String,
        found: String,
    },
    /// `line` is the line of the innermost statement being lowered, once known.
    #[error("{error}")]
    Semantic {
        line: Option<usize>,
        error: SemanticError,
    },
    /// The IR backend rejected an instruction.
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<SemanticError> for CompileError {
    fn from(error: SemanticError) -> Self {
        CompileError::Semantic { line: None, error }
    }
}

impl CompileError {
    /// Where the error happened, when it is known.
    pub fn location(&self) -> Option<&Location> {
        match self {
            CompileError::Lexical { location, .. } | CompileError::Parse { location, .. } => {
                Some(location)
            }
            _ => None,
        }
    }

    /// The 1-based line the error refers to, when it is known.
    pub fn line(&self) -> Option<usize> {
        match self {
            CompileError::Semantic { line, .. } => *line,
            _ => self.location().map(|location| location.line),
        }
    }

    /// Attributes a semantic error without a line to `line`. Other errors are returned unchanged.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            CompileError::Semantic { line: None, error } => CompileError::Semantic {
                line: Some(line),
                error,
            },
            other => other,
        }
    }
}

/// Errors found while lowering a well-formed tree.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemanticError {
    #[error("function `{0}` has been declared before in this scope")]
    DuplicateFunction(String),
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    #[error("cannot find function `{0}`")]
    UndefinedFunction(String),
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("operator `{op}` expects `{expected}` operands, found `{found}`")]
    OperandMismatch {
        op: String,
        expected: String,
        found: String,
    },
    #[error("mismatched types in {context}: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        context: String,
        expected: String,
        found: String,
    },
    #[error("`{name}` takes {expected} argument(s) but {found} were supplied")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("cannot infer type of the variable `{0}`")]
    CannotInferType(String),
    #[error("variable `{0}` cannot have type `void`")]
    VoidVariable(String),
    #[error("condition of type `{0}` cannot be tested for truth")]
    InvalidCondition(String),
    #[error("function `{0}` can reach its end without returning a value")]
    MissingReturn(String),
    #[error("{0} is not supported by code generation yet")]
    Unsupported(String),
}

/// A [`CompileError`] ready to be printed with the source it refers to.
pub struct Diagnostic<'a> {
    source: &'a Source,
    error: &'a CompileError,
}

impl<'a> fmt::Display for Diagnostic<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.error {
            CompileError::SourceUnreadable { .. } | CompileError::Lexical { .. } => {
                "lexical error"
            }
            CompileError::Parse { .. } => "parse error",
            CompileError::Semantic { .. } => "semantic error",
            CompileError::Backend(_) => "backend error",
        };
        writeln!(f, "{}: {}", style(label).red().bold(), self.error)?;

        let line = self.error.line();
        let place = match (self.error.location(), line) {
            (Some(location), _) => location.clone(),
            (None, Some(line)) => Location::new(&self.source.name, line),
            (None, None) => {
                return writeln!(f, "  {} {}", style("-->").blue(), self.source.name);
            }
        };
        writeln!(f, "  {} {}", style("-->").blue(), place)?;
        if let Some(text) = self.source.line_text(place.line) {
            writeln!(f, "   {} {}", style("|").blue(), text)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_text_is_one_based() {
        let source = Source::new("test.bga", "var a = 1;\r\nvar b = 2;\n");
        assert_eq!(source.line_text(1), Some("var a = 1;"));
        assert_eq!(source.line_text(2), Some("var b = 2;"));
        assert_eq!(source.line_text(0), None);
        assert_eq!(source.line_text(10), None);
    }

    #[test]
    fn diagnostic_quotes_offending_line() {
        console::set_colors_enabled(false);
        let source = Source::new("test.bga", "var a = 1;\nvar = 2;\n");
        let error = CompileError::Parse {
            location: Location::new("test.bga", 2),
            expected: "identifier".to_string(),
            found: "=".to_string(),
        };
        let rendered = source.diagnostic(&error).to_string();
        assert!(rendered.contains("parse error: want 'identifier', but have '='"));
        assert!(rendered.contains("--> test.bga:2"));
        assert!(rendered.contains("| var = 2;"));
    }

    #[test]
    fn semantic_errors_convert() {
        let error: CompileError = SemanticError::UndefinedVariable("x".to_string()).into();
        assert_eq!(error.to_string(), "undefined variable `x`");
        assert_eq!(error.location(), None);
        assert_eq!(error.line(), None);
    }

    #[test]
    fn innermost_line_is_kept() {
        let error = CompileError::from(SemanticError::UndefinedVariable("x".to_string()))
            .at_line(4)
            .at_line(1);
        assert_eq!(error.line(), Some(4));

        let parse = CompileError::Parse {
            location: Location::new("test.bga", 2),
            expected: ";".to_string(),
            found: "}".to_string(),
        };
        assert_eq!(parse.clone().at_line(7), parse);
    }

    #[test]
    fn diagnostic_quotes_semantic_error_line() {
        console::set_colors_enabled(false);
        let source = Source::new("test.bga", "var a = 1;\nb = 2;\n");
        let error = CompileError::from(SemanticError::UndefinedVariable("b".to_string())).at_line(2);
        let rendered = source.diagnostic(&error).to_string();
        assert!(rendered.starts_with("semantic error: undefined variable `b`"));
        assert!(rendered.contains("--> test.bga:2"));
        assert!(rendered.contains("| b = 2;"));
    }

    #[test]
    fn unreadable_file() {
        let err = Source::from_file("/definitely/not/here.bga").unwrap_err();
        assert!(matches!(err, CompileError::SourceUnreadable { .. }));
    }
}
