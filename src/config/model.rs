// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

/// A remote script as read from a JSON file.
///
/// ```json
/// {
///   "scriptName": "t1",
///   "hostname": "build-01:22",
///   "userid": "deploy",
///   "privatekeyfile": "keys/id_ed25519",
///   "sshscriptcontent": ["uname -a", "df -h"]
/// }
/// ```
///
/// Every field is optional; missing ones take their empty value. Unknown
/// fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScriptDescriptor {
    /// Label used in log banners.
    #[serde(rename = "scriptName")]
    pub name: String,

    /// Remote endpoint as `host:port`.
    #[serde(rename = "hostname")]
    pub host: String,

    #[serde(rename = "userid")]
    pub user_id: String,

    /// Unencrypted private key used for public-key authentication.
    #[serde(rename = "privatekeyfile")]
    pub private_key_path: PathBuf,

    /// Commands to run, one session each, in this order.
    #[serde(rename = "sshscriptcontent")]
    pub commands: Vec<String>,

    /// Check the host key against `~/.ssh/known_hosts`.
    ///
    /// Off by default: any presented host key is accepted.
    #[serde(rename = "verifyhostidentity", alias = "verifyHostIdentity")]
    pub verify_host_identity: bool,
}

impl ScriptDescriptor {
    pub fn command_count(&self) -> usize {
        self.commands.len()
    }
}
