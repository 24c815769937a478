#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::json;
use sshscript::config::ScriptDescriptor;

/// Builder for script files, producing either the JSON text or a parsed
/// `ScriptDescriptor`.
pub struct ScriptBuilder {
    name: String,
    host: String,
    user: String,
    key: String,
    commands: Vec<String>,
    verify_host_identity: Option<bool>,
}

impl ScriptBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            host: "h:22".to_string(),
            user: "u".to_string(),
            key: "k".to_string(),
            commands: vec![],
            verify_host_identity: None,
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn user(mut self, user: &str) -> Self {
        self.user = user.to_string();
        self
    }

    pub fn key(mut self, path: impl AsRef<Path>) -> Self {
        self.key = path.as_ref().display().to_string();
        self
    }

    pub fn command(mut self, cmd: &str) -> Self {
        self.commands.push(cmd.to_string());
        self
    }

    pub fn commands<'a>(mut self, cmds: impl IntoIterator<Item = &'a str>) -> Self {
        self.commands.extend(cmds.into_iter().map(str::to_string));
        self
    }

    pub fn verify_host_identity(mut self, val: bool) -> Self {
        self.verify_host_identity = Some(val);
        self
    }

    pub fn to_json(&self) -> String {
        let mut value = json!({
            "scriptName": self.name,
            "hostname": self.host,
            "userid": self.user,
            "privatekeyfile": self.key,
            "sshscriptcontent": self.commands,
        });
        if let Some(verify) = self.verify_host_identity {
            value["verifyhostidentity"] = json!(verify);
        }
        value.to_string()
    }

    pub fn build(&self) -> ScriptDescriptor {
        sshscript::config::parse_descriptor(self.to_json().as_bytes())
            .expect("builder always produces a valid script")
    }

    /// Write the script as `script.json` under `dir`.
    pub fn write_to(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        write_script(dir, self.to_json().as_bytes())
    }
}

/// Write raw script bytes as `script.json` under `dir`.
pub fn write_script(dir: &Path, contents: &[u8]) -> anyhow::Result<PathBuf> {
    let path = dir.join("script.json");
    std::fs::write(&path, contents)?;
    Ok(path)
}
