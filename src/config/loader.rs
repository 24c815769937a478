// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::model::ScriptDescriptor;
use crate::errors::{Result, SshScriptError};

/// UTF-8 byte-order mark. Editors on Windows like to prepend it.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Strip exactly one leading UTF-8 BOM, if present.
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

/// Deserialize a descriptor from raw file content.
///
/// This only performs JSON deserialization; the host string and key path are
/// interpreted later, when connecting.
pub fn parse_descriptor(bytes: &[u8]) -> serde_json::Result<ScriptDescriptor> {
    serde_json::from_slice(strip_bom(bytes))
}

/// Load a script descriptor from disk.
///
/// This is the entry point for the rest of the application:
///
/// - Logs the resolved path.
/// - Reads the raw bytes (a BOM is tolerated).
/// - Deserializes JSON, defaulting missing fields.
/// - Logs the resulting descriptor.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ScriptDescriptor> {
    let path = path.as_ref();
    info!(path = %resolve_for_display(path).display(), "JSON cfgfile");

    let raw = fs::read(path).map_err(|source| SshScriptError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let descriptor = parse_descriptor(&raw).map_err(|source| SshScriptError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        script = %descriptor.name,
        host = %descriptor.host,
        user = %descriptor.user_id,
        key = %descriptor.private_key_path.display(),
        commands = descriptor.command_count(),
        verify_host_identity = descriptor.verify_host_identity,
        "loaded script descriptor"
    );

    Ok(descriptor)
}

/// Default script path when `--scriptfile` is not given.
pub fn default_script_path() -> PathBuf {
    PathBuf::from("configTest01.json")
}

fn resolve_for_display(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_bom_removes_only_the_prefix() {
        assert_eq!(strip_bom(b"\xEF\xBB\xBF{}"), b"{}");
        assert_eq!(strip_bom(b"{}"), b"{}");
        // Only one BOM is stripped.
        assert_eq!(strip_bom(b"\xEF\xBB\xBF\xEF\xBB\xBF{}"), b"\xEF\xBB\xBF{}");
        // A partial BOM is left alone.
        assert_eq!(strip_bom(b"\xEF\xBB{}"), b"\xEF\xBB{}");
        assert_eq!(strip_bom(b""), b"");
    }

    #[test]
    fn parses_all_fields() {
        let json = br#"{
            "scriptName": "t1",
            "hostname": "h:22",
            "userid": "u",
            "privatekeyfile": "k",
            "sshscriptcontent": ["echo a", "false", "echo b"]
        }"#;

        let d = parse_descriptor(json).unwrap();
        assert_eq!(d.name, "t1");
        assert_eq!(d.host, "h:22");
        assert_eq!(d.user_id, "u");
        assert_eq!(d.private_key_path, PathBuf::from("k"));
        assert_eq!(d.commands, vec!["echo a", "false", "echo b"]);
        assert!(!d.verify_host_identity);
    }

    #[test]
    fn missing_fields_default_and_unknown_fields_are_ignored() {
        let d = parse_descriptor(br#"{"hostname": "h:2222", "comment": 42}"#).unwrap();
        assert_eq!(d.host, "h:2222");
        assert!(d.name.is_empty());
        assert!(d.commands.is_empty());
        assert_eq!(d.private_key_path, PathBuf::new());
    }

    #[test]
    fn verify_host_identity_accepts_camel_case_alias() {
        let d = parse_descriptor(br#"{"verifyHostIdentity": true}"#).unwrap();
        assert!(d.verify_host_identity);
        let d = parse_descriptor(br#"{"verifyhostidentity": true}"#).unwrap();
        assert!(d.verify_host_identity);
    }

    #[test]
    fn wrong_shape_is_a_parse_error() {
        let err = parse_descriptor(br#"{"sshscriptcontent": "echo a"}"#).unwrap_err();
        assert!(err.is_data());

        let err = parse_descriptor(b"{ not json").unwrap_err();
        assert!(err.is_syntax() || err.is_eof());
    }

    #[test]
    fn bom_then_json_parses() {
        let d = parse_descriptor(b"\xEF\xBB\xBF{\"scriptName\":\"bom\"}").unwrap();
        assert_eq!(d.name, "bom");
    }
}
