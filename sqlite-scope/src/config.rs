///
/// # Connection Options
///
/// `OpenOptions` gathers everything needed to open a `Database`: the target
/// path, the open mode and the optional flags, the busy timeout and the VFS
/// module. It can be built in code or read from a TOML file, which lets an
/// application keep its database settings next to the rest of its
/// configuration.
///
/// ## Example
///
/// ```toml
/// path = "file:app.db?cache=shared"
/// mode = "read-write"
/// uri = true
/// busy_timeout_ms = 5000
/// ```
///
/// Missing keys take their defaults: an in-memory database opened in
/// `create` mode, no URI interpretation and no busy timeout.
///

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Database;
use crate::consts::{OPEN_CREATE, OPEN_MEMORY, OPEN_READONLY, OPEN_READWRITE, OPEN_URI};
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
    #[default]
    Create,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenOptions {
    pub path: String,
    pub mode: OpenMode,
    pub uri: bool,
    pub memory: bool,
    pub busy_timeout_ms: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vfs: Option<String>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            mode: OpenMode::default(),
            uri: false,
            memory: false,
            busy_timeout_ms: 0,
            vfs: None,
        }
    }
}

impl OpenOptions {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    /// Interpret `path` as a `file:` URI.
    pub fn uri(mut self, uri: bool) -> Self {
        self.uri = uri;
        self
    }

    /// Keep the database in memory even though it has a name.
    pub fn memory(mut self, memory: bool) -> Self {
        self.memory = memory;
        self
    }

    pub fn busy_timeout_ms(mut self, timeout_ms: i32) -> Self {
        self.busy_timeout_ms = timeout_ms;
        self
    }

    pub fn vfs(mut self, vfs: impl Into<String>) -> Self {
        self.vfs = Some(vfs.into());
        self
    }

    pub fn target(&self) -> &str {
        &self.path
    }

    /// Native `sqlite3_open_v2` flags for these options.
    pub fn flags(&self) -> i32 {
        let mut flags = match self.mode {
            OpenMode::ReadOnly => OPEN_READONLY,
            OpenMode::ReadWrite => OPEN_READWRITE,
            OpenMode::Create => OPEN_READWRITE | OPEN_CREATE,
        };
        if self.uri {
            flags |= OPEN_URI;
        }
        if self.memory {
            flags |= OPEN_MEMORY;
        }
        flags
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn open(&self) -> Result<Database> {
        Database::from_options(self)
    }
}
