//! Reference hashers
//!
//! The verifier asks one of these for the digest of a scratch file. The
//! command hasher shells out (`sha1sum` by default) so a bug in the
//! in-process SHA-1 path cannot hide itself.

use crate::core::error::OracleError;
use crate::core::manifest::parse_digest;
use crate::util::hash::sha1_file;
use std::path::Path;
use std::process::Command;

/// File path in, lowercase hex digest out
pub trait ReferenceHasher {
    fn reference_digest(&self, path: &Path) -> Result<String, OracleError>;
}

/// Runs an external digest command, `<program> [args..] <path>`
#[derive(Debug, Clone)]
pub struct CommandHasher {
    program: String,
    args: Vec<String>,
}

impl CommandHasher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn sha1sum() -> Self {
        Self::new("sha1sum", Vec::new())
    }
}

impl ReferenceHasher for CommandHasher {
    fn reference_digest(&self, path: &Path) -> Result<String, OracleError> {
        tracing::debug!("{} {}", self.program, path.display());

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|source| OracleError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(OracleError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_oracle_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// In-process SHA-1, for hosts without `sha1sum` and for tests
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinHasher;

impl ReferenceHasher for BuiltinHasher {
    fn reference_digest(&self, path: &Path) -> Result<String, OracleError> {
        Ok(sha1_file(path)?)
    }
}

/// Take the digest from a `<hexdigest>  <path>` line
///
/// GNU coreutils prefixes the line with `\` when the path needed escaping.
pub fn parse_oracle_output(stdout: &str) -> Result<String, OracleError> {
    let token = stdout
        .split_whitespace()
        .next()
        .ok_or_else(|| OracleError::BadOutput(stdout.to_string()))?;
    let token = token.strip_prefix('\\').unwrap_or(token);

    parse_digest(token)
        .map(|record| record.as_str().to_string())
        .ok_or_else(|| OracleError::BadOutput(stdout.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HELLO: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    #[test]
    fn test_parse_sha1sum_line() {
        let line = format!("{HELLO}  /tmp/text-of-hashes-1.txt\n");
        assert_eq!(parse_oracle_output(&line).unwrap(), HELLO);
    }

    #[test]
    fn test_parse_escaped_line() {
        let line = format!("\\{HELLO}  /tmp/odd\\nname\n");
        assert_eq!(parse_oracle_output(&line).unwrap(), HELLO);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_oracle_output("sha1sum: no such file\n"),
            Err(OracleError::BadOutput(_))
        ));
        assert!(parse_oracle_output("").is_err());
    }

    #[test]
    fn test_builtin_hasher() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();
        assert_eq!(BuiltinHasher.reference_digest(file.path()).unwrap(), HELLO);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_hasher_parses_program_output() {
        let file = tempfile::NamedTempFile::new().unwrap();
        // sh passes the appended path as $0
        let script = format!("echo \"{}  $0\"", HELLO.to_uppercase());
        let hasher = CommandHasher::new("sh", vec!["-c".to_string(), script]);
        assert_eq!(hasher.reference_digest(file.path()).unwrap(), HELLO);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_hasher_nonzero_exit_is_failed() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let script = "echo 'cannot read' >&2; exit 3".to_string();
        let hasher = CommandHasher::new("sh", vec!["-c".to_string(), script]);
        match hasher.reference_digest(file.path()) {
            Err(OracleError::Failed { program, status, stderr }) => {
                assert_eq!(program, "sh");
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "cannot read");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_sha1sum_matches_builtin() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();
        file.flush().unwrap();
        assert_eq!(CommandHasher::sha1sum().reference_digest(file.path()).unwrap(), HELLO);
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let hasher = CommandHasher::new("sha1bench-no-such-program", Vec::new());
        let result = hasher.reference_digest(Path::new("/dev/null"));
        assert!(matches!(result, Err(OracleError::Spawn { .. })));
    }
}
