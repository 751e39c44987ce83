//! Deterministic classification of failed command output.
//!
//! Signatures are matched case-insensitively against stderr in a fixed order;
//! the first match wins. Compiler-specific text is therefore checked before the
//! generic build-tool text it overlaps with.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::FailureCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    MissingCommand,
    MissingCompiler,
    MissingLibrary,
    PortInUse,
    PermissionDenied,
    MissingBuildTools,
    PackageManagerNotFound,
    ArchitectureMismatch,
}

/// One row of the signature table.
///
/// Matches when any of `any` occurs and, if `and_any` is non-empty, any of
/// `and_any` occurs as well.
struct Signature {
    kind: Kind,
    any: &'static [&'static str],
    and_any: &'static [&'static str],
}

const SIGNATURES: &[Signature] = &[
    Signature {
        kind: Kind::MissingCommand,
        any: &["command not found", "executable file not found"],
        and_any: &[],
    },
    Signature {
        kind: Kind::MissingCompiler,
        any: &["gcc", "cc", "compiler"],
        and_any: &["not found", "no such file"],
    },
    Signature {
        kind: Kind::MissingLibrary,
        any: &["cannot find -l", "shared library"],
        and_any: &[],
    },
    Signature {
        kind: Kind::PortInUse,
        any: &["address already in use", "port is already in use"],
        and_any: &[],
    },
    Signature {
        kind: Kind::PermissionDenied,
        any: &["permission denied"],
        and_any: &[],
    },
    Signature {
        kind: Kind::MissingBuildTools,
        any: &["c compiler", "make"],
        and_any: &[],
    },
    Signature {
        kind: Kind::PackageManagerNotFound,
        any: &["package manager"],
        and_any: &["not found"],
    },
    Signature {
        kind: Kind::ArchitectureMismatch,
        any: &[
            "exec format error",
            "wrong elf class",
            "bad cpu type",
            "incompatible architecture",
        ],
        and_any: &[],
    },
];

impl Signature {
    fn matches(&self, lowered: &str) -> bool {
        self.any.iter().any(|needle| lowered.contains(needle))
            && (self.and_any.is_empty() || self.and_any.iter().any(|n| lowered.contains(n)))
    }
}

/// Map stderr text and exit code to a failure category.
///
/// Best effort: unmatched output is `Unknown` with no extracted fields. The exit
/// code never produces a category on its own.
pub fn classify(stderr: &str, _exit_code: i32) -> FailureCategory {
    let lowered = stderr.to_lowercase();
    let Some(signature) = SIGNATURES.iter().find(|sig| sig.matches(&lowered)) else {
        return FailureCategory::Unknown;
    };

    match signature.kind {
        Kind::MissingCommand => FailureCategory::MissingCommand {
            command: extract_command(stderr),
        },
        Kind::MissingCompiler => FailureCategory::MissingCompiler,
        Kind::MissingLibrary => FailureCategory::MissingLibrary {
            library: extract_library(stderr),
        },
        Kind::PortInUse => FailureCategory::PortInUse {
            port: extract_port(stderr),
        },
        Kind::PermissionDenied => FailureCategory::PermissionDenied,
        Kind::MissingBuildTools => FailureCategory::MissingBuildTools,
        Kind::PackageManagerNotFound => FailureCategory::PackageManagerNotFound,
        Kind::ArchitectureMismatch => FailureCategory::ArchitectureMismatch,
    }
}

const NOT_FOUND_MARKER: &str = "command not found";

/// Name of the missing command on the first "command not found" line.
///
/// Handles both `bash: foo: command not found` and `zsh: command not found: foo`.
fn extract_command(stderr: &str) -> Option<String> {
    stderr.lines().find_map(|line| {
        let lowered = line.to_lowercase();
        let idx = lowered.find(NOT_FOUND_MARKER)?;
        let after = line
            .get(idx + NOT_FOUND_MARKER.len()..)
            .unwrap_or_default()
            .trim_start_matches(|c: char| c == ':' || c.is_whitespace());
        let token = match after.split_whitespace().next() {
            Some(token) => token,
            None => line.get(..idx)?.split_whitespace().last()?,
        };
        let name = clean_token(token);
        (!name.is_empty()).then(|| name.to_string())
    })
}

fn clean_token(token: &str) -> &str {
    token
        .trim_end_matches(':')
        .trim_matches(|c| c == '\'' || c == '"' || c == '`')
}

static LINKER_LIBRARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)cannot find -l([^\s):]+)").expect("linker pattern should be valid")
});
static LIBRARY_FLAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s(])-l([^\s):]+)").expect("library flag pattern should be valid")
});

/// Library name from the linker's `cannot find -l<name>`, else from the first
/// standalone `-l<name>` flag. A trailing `:` is not part of the name.
fn extract_library(stderr: &str) -> Option<String> {
    [&LINKER_LIBRARY_RE, &LIBRARY_FLAG_RE]
        .into_iter()
        .find_map(|re| re.captures(stderr)?.get(1))
        .map(|m| m.as_str().to_string())
}

/// First whitespace token of the form `<1-5 digits>:`.
fn extract_port(stderr: &str) -> Option<String> {
    stderr.split_whitespace().find_map(|token| {
        let digits = token.strip_suffix(':')?;
        let valid = (1..=5).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit());
        valid.then(|| digits.to_string())
    })
}
