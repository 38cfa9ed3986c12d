use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, TtsPrepError};

// Structure to represent an external tool
#[derive(Debug, Clone)]
pub struct ExternalTool {
    pub name: String,
    pub path: PathBuf,
    pub version: Option<String>,
}

static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.\d+(?:\.\d+)?)").unwrap());

/// Locate an external tool and probe its version
///
/// `program` may be a bare name looked up in PATH or an explicit path.
pub fn locate_tool(program: &str) -> Result<ExternalTool> {
    let path = find_executable(program)?;
    let version = check_version(&path);

    match &version {
        Some(v) => debug!("Found {} {} at {}", program, v, path.display()),
        None => debug!("Found {} at {} (version unknown)", program, path.display()),
    }

    Ok(ExternalTool {
        name: program.to_string(),
        path,
        version,
    })
}

/// Check if a command is available in PATH
pub fn find_executable(program: &str) -> Result<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return if candidate.is_file() {
            Ok(candidate.to_path_buf())
        } else {
            Err(TtsPrepError::FileNotFound(format!(
                "Executable {} does not exist",
                candidate.display()
            )))
        };
    }

    which::which(program)
        .map_err(|_| TtsPrepError::FileNotFound(format!("Command {} not found in PATH", program)))
}

/// Run `<tool> --version` and extract the first version number
fn check_version(path: &Path) -> Option<String> {
    let output = Command::new(path)
        .arg("--version")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let text = String::from_utf8_lossy(&output.stdout);
    parse_version(&text)
}

fn parse_version(text: &str) -> Option<String> {
    VERSION_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(
            parse_version("eSpeak NG text-to-speech: 1.51  Data at: /usr/share/espeak-ng-data"),
            Some("1.51".to_string())
        );
        assert_eq!(
            parse_version("aws-cli/2.15.30 Python/3.11.8 Linux/6.5.0"),
            Some("2.15.30".to_string())
        );
        assert_eq!(parse_version("no digits here"), None);
    }

    #[test]
    fn test_missing_explicit_path() {
        let result = find_executable("/definitely/not/here/espeak-ng");
        assert!(matches!(result, Err(TtsPrepError::FileNotFound(_))));
    }

    #[test]
    fn test_missing_command() {
        let result = find_executable("tts-prep-command-that-does-not-exist");
        assert!(matches!(result, Err(TtsPrepError::FileNotFound(_))));
    }
}
