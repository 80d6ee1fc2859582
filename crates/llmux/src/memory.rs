use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use serde_json::{json, Value};

use crate::errors::{LlmError, LlmResult};
use crate::tool::Tool;

/// How an agent uses its memory. Each switch is independent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentConfig {
    pub include_context: bool,
    pub expose_tools: bool,
    pub persist_to_disk: bool,
    pub path: Option<PathBuf>,
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the stored facts to the system prompt on every model call
    pub fn include_context(mut self, enabled: bool) -> Self {
        self.include_context = enabled;
        self
    }

    /// Register the remember/retrieve/forget tools with the agent
    pub fn expose_tools(mut self, enabled: bool) -> Self {
        self.expose_tools = enabled;
        self
    }

    /// Load from and save to `path` as a single JSON object
    pub fn persist_to<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.persist_to_disk = true;
        self.path = Some(path.into());
        self
    }

    pub fn validate(&self) -> LlmResult<()> {
        if self.persist_to_disk && self.path.is_none() {
            return Err(LlmError::validation(
                "memory.path",
                "a path is required to persist memory to disk",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, String>,
    path: Option<PathBuf>,
}

/// Flat key/value facts shared between an agent and its memory tools
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a JSON file. A missing file starts empty.
    pub fn open<P: AsRef<Path>>(path: P) -> LlmResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "opened memory store");

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                entries,
                path: Some(path),
            })),
        })
    }

    pub fn from_config(config: &AgentConfig) -> LlmResult<Self> {
        config.validate()?;
        match (&config.path, config.persist_to_disk) {
            (Some(path), true) => Self::open(path),
            _ => Ok(Self::new()),
        }
    }

    fn lock(&self) -> LlmResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| LlmError::Decode("memory store lock poisoned".to_string()))
    }

    /// Store a fact, replacing any earlier value under the same key
    pub fn remember<K: Into<String>, V: Into<String>>(&self, key: K, value: V) -> LlmResult<()> {
        let mut inner = self.lock()?;
        inner.entries.insert(key.into(), value.into());
        save(&inner)
    }

    pub fn retrieve(&self, key: &str) -> LlmResult<Option<String>> {
        Ok(self.lock()?.entries.get(key).cloned())
    }

    /// Remove a fact, returning whether it existed
    pub fn forget(&self, key: &str) -> LlmResult<bool> {
        let mut inner = self.lock()?;
        let existed = inner.entries.remove(key).is_some();
        if existed {
            save(&inner)?;
        }
        Ok(existed)
    }

    pub fn entries(&self) -> LlmResult<BTreeMap<String, String>> {
        Ok(self.lock()?.entries.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.lock().map(|inner| inner.entries.is_empty()).unwrap_or(true)
    }

    /// Render the stored facts as a block to append to a system prompt
    pub fn context(&self) -> LlmResult<Option<String>> {
        let inner = self.lock()?;
        if inner.entries.is_empty() {
            return Ok(None);
        }
        let mut block = String::from("Known facts from memory:");
        for (key, value) in &inner.entries {
            block.push_str(&format!("\n- {}: {}", key, value));
        }
        Ok(Some(block))
    }
}

// The whole map is rewritten on each change; concurrent writers race and the last one wins
fn save(inner: &Inner) -> LlmResult<()> {
    let Some(path) = &inner.path else {
        return Ok(());
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&inner.entries)?)?;
    Ok(())
}

fn string_arg<'a>(arguments: &'a Value, name: &str) -> anyhow::Result<&'a str> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing string argument '{}'", name))
}

/// Tools that let the model manage the store
pub fn memory_tools(store: &MemoryStore) -> Vec<Tool> {
    let remember = store.clone();
    let retrieve = store.clone();
    let forget = store.clone();

    vec![
        Tool::new(
            "remember_memory",
            "Stores a fact under a key, replacing any previous value for that key",
            json!({
                "type": "object",
                "properties": {
                    "key": {"type": "string"},
                    "value": {"type": "string"}
                },
                "required": ["key", "value"]
            }),
            move |args| {
                let key = string_arg(args, "key")?;
                remember.remember(key, string_arg(args, "value")?)?;
                Ok(format!("Stored memory: {}", key))
            },
        ),
        Tool::new(
            "retrieve_memory",
            "Retrieves the fact stored under a key, or every fact when no key is given",
            json!({
                "type": "object",
                "properties": {
                    "key": {"type": "string"}
                }
            }),
            move |args| match args.get("key").and_then(Value::as_str) {
                Some(key) => Ok(retrieve
                    .retrieve(key)?
                    .unwrap_or_else(|| format!("No memory stored for: {}", key))),
                None => Ok(serde_json::to_string(&retrieve.entries()?)?),
            },
        ),
        Tool::new(
            "forget_memory",
            "Removes the fact stored under a key",
            json!({
                "type": "object",
                "properties": {
                    "key": {"type": "string"}
                },
                "required": ["key"]
            }),
            move |args| {
                let key = string_arg(args, "key")?;
                if forget.forget(key)? {
                    Ok(format!("Removed memory: {}", key))
                } else {
                    Err(anyhow!("no memory stored for: {}", key))
                }
            },
        ),
    ]
}
