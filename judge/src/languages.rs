//! This module implements language related facilities used in the judge.
//!
//! The set of supported languages is closed: every language is a variant of `Language`, and each
//! variant maps to a statically allocated `LanguageProfile` that knows how to wrap candidate code
//! into a harness program and how to compile and run that program.
//!

pub mod literal;

mod cpp;
mod csharp;
mod go;
mod java;
mod javascript;
mod python;
mod rust;
mod typescript;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::{Error, ErrorKind, Result};

/// Supported programming languages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python 3, run by `python3`.
    Python,

    /// JavaScript, run by `node`.
    JavaScript,

    /// TypeScript, run by `ts-node` without type checking.
    TypeScript,

    /// Go, compiled by `go build`.
    Go,

    /// Rust, compiled by `rustc`.
    Rust,

    /// C++17, compiled by `g++`.
    Cpp,

    /// Java, compiled by `javac` and run by `java`.
    Java,

    /// C#, compiled by `mcs` and run by `mono`.
    CSharp,
}

impl Language {
    /// All supported languages.
    pub const ALL: [Language; 8] = [
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Go,
        Language::Rust,
        Language::Cpp,
        Language::Java,
        Language::CSharp,
    ];

    /// Get the canonical name of the language.
    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::CSharp => "csharp",
        }
    }

    /// Get the profile of the language.
    pub fn profile(&self) -> &'static dyn LanguageProfile {
        match self {
            Language::Python => &python::Python,
            Language::JavaScript => &javascript::JavaScript,
            Language::TypeScript => &typescript::TypeScript,
            Language::Go => &go::Go,
            Language::Rust => &rust::Rust,
            Language::Cpp => &cpp::Cpp,
            Language::Java => &java::Java,
            Language::CSharp => &csharp::CSharp,
        }
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let language = match s.trim().to_ascii_lowercase().as_str() {
            "python" | "python3" | "py" => Language::Python,
            "javascript" | "js" | "node" => Language::JavaScript,
            "typescript" | "ts" => Language::TypeScript,
            "go" | "golang" => Language::Go,
            "rust" | "rs" => Language::Rust,
            "cpp" | "c++" | "cxx" => Language::Cpp,
            "java" => Language::Java,
            "csharp" | "cs" | "c#" => Language::CSharp,
            _ => bail!(ErrorKind::UnsupportedLanguage(s.to_owned())),
        };
        Ok(language)
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Find the profile of the language with the given name or alias. Returns an error whose kind is
/// `ErrorKind::UnsupportedLanguage` if the language is not supported.
pub fn profile_for(language: &str) -> Result<&'static dyn LanguageProfile> {
    Ok(language.parse::<Language>()?.profile())
}

/// This trait defines the metadata and the pure functions that describe how programs in some
/// language are materialized, compiled and executed. Implementors hold no state and are shared
/// freely between threads.
///
/// All paths handled by a profile are relative to the per-execution directory, which is the
/// working directory of every process the judge starts.
pub trait LanguageProfile: Sync {
    /// Get the language described by this profile.
    fn language(&self) -> Language;

    /// Get the file extension of source files, without the leading dot.
    fn extension(&self) -> &'static str;

    /// Get the name of the file holding the materialized harness program.
    fn source_file(&self) -> &'static str;

    /// Get the name of the compiler output. For languages without a compile step this is the
    /// source file itself.
    fn output_file(&self) -> &'static str {
        self.source_file()
    }

    /// Get the command line that compiles `source` into `output`, or `None` if programs in this
    /// language are run directly from source.
    fn compile(&self, _source: &str, _output: &str) -> Option<Vec<String>> {
        None
    }

    /// Get the command line that runs the given executable, which is the compiler output for
    /// compiled languages and the source file otherwise.
    fn run(&self, executable: &str) -> Vec<String>;

    /// Wrap the candidate code into a complete harness program that decodes
    /// `serialized_input`, calls the candidate's entry point and prints the result line.
    fn harness(&self, code: &str, serialized_input: &str) -> String;

    /// Does this language have a compile step?
    fn is_compiled(&self) -> bool {
        self.compile(self.source_file(), self.output_file()).is_some()
    }
}

/// Build an owned command line from string slices.
fn command_line(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_owned()).collect()
}

/// Substitute `{{NAME}}` placeholders of a harness template in a single pass. Substituted text is
/// never scanned again, so candidate code containing a placeholder is embedded unchanged.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let capacity = template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>();
    let mut out = String::with_capacity(capacity);
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(key, _)| tail.starts_with(key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            },
            None => {
                out.push_str("{{");
                rest = &tail[2..];
            }
        }
    }

    out.push_str(rest);
    out
}
