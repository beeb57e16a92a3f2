use std::collections::HashMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub const FORCE_DELETE_ARG: &str = "forceDelete";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CommandName {
    Update,
    Restart,
    Inject,
    Remove,
    Encrypt,
    Decrypt,
    Other(String),
}

impl CommandName {
    pub fn as_str(&self) -> &str {
        match self {
            CommandName::Update => "update",
            CommandName::Restart => "restart",
            CommandName::Inject => "inject",
            CommandName::Remove => "remove",
            CommandName::Encrypt => "encryptSecret",
            CommandName::Decrypt => "decryptSecret",
            CommandName::Other(name) => name,
        }
    }
}

impl From<&str> for CommandName {
    fn from(name: &str) -> Self {
        match name {
            "update" => CommandName::Update,
            "restart" => CommandName::Restart,
            "inject" => CommandName::Inject,
            "remove" => CommandName::Remove,
            "encryptSecret" => CommandName::Encrypt,
            "decryptSecret" => CommandName::Decrypt,
            other => CommandName::Other(other.to_owned()),
        }
    }
}

impl From<String> for CommandName {
    fn from(name: String) -> Self {
        CommandName::from(name.as_str())
    }
}

impl From<CommandName> for String {
    fn from(name: CommandName) -> Self {
        name.as_str().to_owned()
    }
}

impl Display for CommandName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded command: its name and free-form arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub command_name: CommandName,
    #[serde(default)]
    pub args: HashMap<String, serde_json::Value>,
}

impl Command {
    pub fn new(name: impl Into<CommandName>) -> Self {
        Self {
            command_name: name.into(),
            args: HashMap::new(),
        }
    }

    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    pub fn is_force_delete(&self) -> bool {
        self.args
            .get(FORCE_DELETE_ARG)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for name in ["update", "restart", "inject", "remove", "encryptSecret", "decryptSecret"] {
            assert_eq!(CommandName::from(name).as_str(), name);
        }
        assert_eq!(
            CommandName::from("scan"),
            CommandName::Other("scan".into())
        );
    }

    #[test]
    fn force_delete_needs_a_boolean() {
        assert!(!Command::new(CommandName::Update).is_force_delete());
        assert!(Command::new(CommandName::Update)
            .with_arg(FORCE_DELETE_ARG, true)
            .is_force_delete());
        assert!(!Command::new(CommandName::Update)
            .with_arg(FORCE_DELETE_ARG, "true")
            .is_force_delete());
    }

    #[test]
    fn decodes_command_json() {
        let command: Command = serde_json::from_str(
            r#"{"commandName":"restart","args":{"forceDelete":true}}"#,
        )
        .unwrap();
        assert_eq!(command.command_name, CommandName::Restart);
        assert!(command.is_force_delete());
    }
}
