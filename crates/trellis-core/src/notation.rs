//! Coercion of declared dependency notations into [`Dependency`] values.
//!
//! A [`NotationRegistry`] holds parsers in priority order. Each parser
//! declares the notation shape it accepts and a description used when
//! nothing matches; the first parser that accepts a notation parses it.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::attributes::AttributeSet;
use crate::dependency::{Dependency, FileSet, ModuleId, VersionConstraint};

/// A dependency notation as written in a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Notation {
    /// `"group:name:version"`.
    Coordinate(String),
    /// `{ files = ["libs/a.jar"] }`.
    Files(FilesNotation),
    /// `{ project = ":lib", configuration = "apiElements" }`.
    Project(ProjectNotation),
    /// `{ module = "group:name", version = "1.0", reject = ["1.1"] }`.
    Module(ModuleNotation),
    /// Anything else; never accepted by a built-in parser.
    Other(toml::Value),
}

impl Notation {
    /// Short rendering used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Notation::Coordinate(s) => format!("'{s}'"),
            Notation::Files(f) => format!("files {:?}", f.files),
            Notation::Project(p) => format!("project '{}'", p.project),
            Notation::Module(m) => format!("module '{}'", m.module),
            Notation::Other(value) => format!("{} {value}", value.type_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilesNotation {
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectNotation {
    pub project: String,
    #[serde(default)]
    pub configuration: Option<String>,
    #[serde(default)]
    pub attributes: AttributeSet,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleNotation {
    pub module: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub strictly: Option<String>,
    #[serde(default)]
    pub prefer: Option<String>,
    #[serde(default)]
    pub reject: Vec<String>,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub attributes: AttributeSet,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Errors raised while coercing a notation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum NotationError {
    /// No registered parser accepts this notation.
    #[error("Cannot convert {notation} to a dependency")]
    #[diagnostic(help("Use a coordinate string, module map, file set or project reference"))]
    UnsupportedNotation {
        notation: String,
        accepted: Vec<String>,
    },

    /// A parser accepted the shape but its content is inconsistent.
    #[error("Invalid dependency {notation}: {message}")]
    InvalidNotation { notation: String, message: String },
}

/// A built-in notation parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotationParser {
    CoordinateString,
    ModuleMap,
    FileSet,
    ProjectReference,
}

impl NotationParser {
    /// Whether this parser handles the shape of `notation`.
    pub fn accepts(self, notation: &Notation) -> bool {
        match (self, notation) {
            (NotationParser::CoordinateString, Notation::Coordinate(s)) => {
                parse_coordinate(s).is_some()
            }
            (NotationParser::ModuleMap, Notation::Module(_)) => true,
            (NotationParser::FileSet, Notation::Files(_)) => true,
            (NotationParser::ProjectReference, Notation::Project(_)) => true,
            _ => false,
        }
    }

    /// Description of the accepted shape, shown when nothing matches.
    pub fn describe(self) -> &'static str {
        match self {
            NotationParser::CoordinateString => {
                "Strings in the format 'group:name' or 'group:name:version', e.g. 'org.example:lib:1.0' or 'org.example:lib:1.5!!'."
            }
            NotationParser::ModuleMap => {
                "Module maps, e.g. { module = 'org.example:lib', version = '1.0', reject = ['1.1'] }."
            }
            NotationParser::FileSet => "File sets, e.g. { files = ['libs/a.jar', 'libs/b.jar'] }.",
            NotationParser::ProjectReference => {
                "Project references, e.g. { project = ':lib', configuration = 'apiElements' }."
            }
        }
    }

    fn parse(self, notation: &Notation) -> Result<Dependency, NotationError> {
        match notation {
            Notation::Coordinate(s) => {
                let (module, constraint) =
                    parse_coordinate(s).ok_or_else(|| NotationError::InvalidNotation {
                        notation: notation.describe(),
                        message: "expected 'group:name[:version]'".to_string(),
                    })?;
                Ok(Dependency::module(module, constraint))
            }
            Notation::Module(m) => parse_module_map(m, notation),
            Notation::Files(f) => {
                let dep = Dependency::files(FileSet::new(f.files.iter().cloned()));
                Ok(with_reason(dep, &f.reason))
            }
            Notation::Project(p) => {
                if !p.project.starts_with(':') {
                    return Err(NotationError::InvalidNotation {
                        notation: notation.describe(),
                        message: "project paths start with ':'".to_string(),
                    });
                }
                let dep = match p.configuration {
                    Some(ref conf) => Dependency::project_configuration(&p.project, conf),
                    None => Dependency::project(&p.project),
                };
                Ok(with_reason(dep.with_attributes(p.attributes.clone()), &p.reason))
            }
            Notation::Other(_) => Err(NotationError::InvalidNotation {
                notation: notation.describe(),
                message: "unrecognized shape".to_string(),
            }),
        }
    }
}

fn with_reason(dep: Dependency, reason: &Option<String>) -> Dependency {
    match reason {
        Some(r) => dep.because(r),
        None => dep,
    }
}

fn parse_module_map(m: &ModuleNotation, notation: &Notation) -> Result<Dependency, NotationError> {
    let module = ModuleId::parse(&m.module).ok_or_else(|| NotationError::InvalidNotation {
        notation: notation.describe(),
        message: "module must be 'group:name'".to_string(),
    })?;
    let constraint = VersionConstraint {
        require: m.version.clone(),
        strictly: m.strictly.clone(),
        prefer: m.prefer.clone(),
        reject: m.reject.clone(),
        force: m.force,
    };
    if constraint.force && constraint.forced_version().is_none() {
        return Err(NotationError::InvalidNotation {
            notation: notation.describe(),
            message: "force requires a version or strictly".to_string(),
        });
    }
    let dep = Dependency::module(module, constraint).with_attributes(m.attributes.clone());
    Ok(with_reason(dep, &m.reason))
}

/// Split `group:name[:version]`. The version part may itself contain
/// range syntax such as `[1.0,2.0)`.
fn parse_coordinate(s: &str) -> Option<(ModuleId, VersionConstraint)> {
    let mut parts = s.trim().splitn(3, ':');
    let group = parts.next()?;
    let name = parts.next()?;
    if group.is_empty() || name.is_empty() {
        return None;
    }
    let constraint = parts.next().map(VersionConstraint::parse).unwrap_or_default();
    Some((ModuleId::new(group, name), constraint))
}

/// Parsers tried in priority order.
#[derive(Debug, Clone)]
pub struct NotationRegistry {
    parsers: Vec<NotationParser>,
}

impl NotationRegistry {
    pub fn new(parsers: Vec<NotationParser>) -> Self {
        Self { parsers }
    }

    pub fn parsers(&self) -> &[NotationParser] {
        &self.parsers
    }

    /// Descriptions of every accepted notation, in priority order.
    pub fn accepted(&self) -> Vec<String> {
        self.parsers.iter().map(|p| p.describe().to_string()).collect()
    }

    /// Convert `notation` with the first parser that accepts it.
    pub fn coerce(&self, notation: &Notation) -> Result<Dependency, NotationError> {
        match self.parsers.iter().find(|p| p.accepts(notation)) {
            Some(parser) => parser.parse(notation),
            None => Err(NotationError::UnsupportedNotation {
                notation: notation.describe(),
                accepted: self.accepted(),
            }),
        }
    }
}

impl Default for NotationRegistry {
    fn default() -> Self {
        Self::new(vec![
            NotationParser::FileSet,
            NotationParser::ProjectReference,
            NotationParser::ModuleMap,
            NotationParser::CoordinateString,
        ])
    }
}
