//! User-facing message catalog.
//!
//! Messages live in `messages.yml` next to the configuration. Nested keys
//! are addressed with dots (`load.success`). Templates may contain
//! `%name%` placeholders and `&` colour codes; every rendered line is
//! prefixed with the `prefix` message.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde_yml::Value;

use crate::config::ConfigError;
use crate::sink::PasteNotice;

/// File name of the catalog under the installation root.
pub const MESSAGES_FILE_NAME: &str = "messages.yml";

/// Contents written when no catalog file exists yet.
pub const DEFAULT_MESSAGES_YAML: &str = "\
prefix: '&8[&6AutoSchematic&8] &r'

commands:
  no-permission: '&cYou do not have permission to do that.'
  reload-success: '&aConfiguration and messages reloaded.'
  unknown: '&cUnknown command. Type help for a list of commands.'
  help:
    - '&6AutoSchematic commands:'
    - '&e load <file> [x,y,z|here] &7- paste a schematic'
    - '&e list &7- list available schematics'
    - '&e reload &7- reload configuration and messages'
    - '&e help &7- show this list'
  list:
    header: '&aAvailable schematics (&e%count%&a):'
    entry: '&7- &f%schematic%'
    empty: '&cNo schematics found.'

load:
  usage: '&cUsage: load <file> [x,y,z|here]'
  player-only: '&cOnly players can paste at their own position.'
  invalid-location: '&cInvalid location. Use x,y,z or here.'
  started: '&7Loading &f%file%&7...'
  success: '&aSchematic pasted at %x%, %y%, %z%.'
  file-not-found: '&cSchematic not found: %file%'

errors:
  general: '&cError: %error%'
  timeout: '&cPaste timed out after %seconds% seconds.'
";

/// Character that introduces a colour code in templates.
pub const ALTERNATE_COLOR_CHAR: char = '&';

/// Character that introduces a colour code in rendered text.
pub const COLOR_CHAR: char = '\u{a7}';

const COLOR_CODES: &str = "0123456789abcdefklmnorx";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Line(String),
    Lines(Vec<String>),
}

/// Parsed `messages.yml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageCatalog {
    entries: HashMap<String, Entry>,
}

impl MessageCatalog {
    /// Parse a catalog from YAML text. Empty text yields an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the text is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut entries = HashMap::new();
        if !yaml.trim().is_empty() {
            let root: Value = serde_yml::from_str(yaml)?;
            flatten("", &root, &mut entries);
        }
        Ok(Self { entries })
    }

    /// Read and parse a catalog file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load `messages.yml` from `root`, writing the default file first if
    /// it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be written, read, or
    /// parsed.
    pub fn load_or_create(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(MESSAGES_FILE_NAME);
        if !path.exists() {
            std::fs::create_dir_all(root)?;
            std::fs::write(&path, DEFAULT_MESSAGES_YAML)?;
            tracing::info!(path = %path.display(), "Wrote default messages");
        }
        Self::from_file(&path)
    }

    /// The built-in catalog.
    pub fn builtin() -> Self {
        Self::parse(DEFAULT_MESSAGES_YAML).unwrap_or_default()
    }

    /// Colour-translated template for `key`, without the prefix.
    ///
    /// Unknown keys render as `Missing message: <key>`.
    pub fn get(&self, key: &str) -> String {
        match self.entries.get(key) {
            Some(Entry::Line(line)) => translate_color_codes(line),
            _ => translate_color_codes(&format!("&cMissing message: {key}")),
        }
    }

    /// Colour-translated lines of a list message. Unknown or scalar keys
    /// yield no lines.
    pub fn lines(&self, key: &str) -> Vec<String> {
        match self.entries.get(key) {
            Some(Entry::Lines(lines)) => lines.iter().map(|l| translate_color_codes(l)).collect(),
            _ => Vec::new(),
        }
    }

    /// Prefixed message for `key` with `%name%` placeholders filled in.
    pub fn render(&self, key: &str, replacements: &[(&str, &str)]) -> String {
        let mut message = self.get(key);
        for (name, value) in replacements {
            message = message.replace(&format!("%{name}%"), value);
        }
        format!("{}{message}", self.get("prefix"))
    }

    /// Message shown to whoever asked for a paste.
    pub fn render_notice(&self, notice: &PasteNotice) -> String {
        match notice {
            PasteNotice::Pasted { origin } => self.render(
                "load.success",
                &[
                    ("x", origin.x.to_string().as_str()),
                    ("y", origin.y.to_string().as_str()),
                    ("z", origin.z.to_string().as_str()),
                ],
            ),
            PasteNotice::FileNotFound { name } => self.render("load.file-not-found", &[("file", name.as_str())]),
            PasteNotice::TimedOut { seconds } => {
                self.render("errors.timeout", &[("seconds", seconds.to_string().as_str())])
            }
            PasteNotice::Failed { reason } => self.render("errors.general", &[("error", reason.as_str())]),
        }
    }

    /// Number of keys in the catalog.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Holds the live catalog; [`reload`](Self::reload) swaps it.
#[derive(Debug)]
pub struct MessageStore {
    root: PathBuf,
    current: RwLock<Arc<MessageCatalog>>,
}

impl MessageStore {
    /// Load `messages.yml` from `root`, writing the default first if absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be written, read, or
    /// parsed.
    pub fn load_or_create(root: &Path) -> Result<Self, ConfigError> {
        let catalog = MessageCatalog::load_or_create(root)?;
        Ok(Self::from_catalog(root, catalog))
    }

    /// Wrap an already-built catalog.
    pub fn from_catalog(root: &Path, catalog: MessageCatalog) -> Self {
        Self {
            root: root.to_path_buf(),
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// The current catalog.
    pub fn snapshot(&self) -> Arc<MessageCatalog> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Re-read `messages.yml`. On error the previous catalog stays.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn reload(&self) -> Result<Arc<MessageCatalog>, ConfigError> {
        let catalog = Arc::new(MessageCatalog::load_or_create(&self.root)?);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::clone(&catalog);
        Ok(catalog)
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut HashMap<String, Entry>) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let Some(key) = scalar(key) else {
                    continue;
                };
                let path = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&path, child, out);
            }
        }
        Value::Sequence(items) => {
            let lines = items.iter().filter_map(scalar).collect();
            out.insert(prefix.to_owned(), Entry::Lines(lines));
        }
        Value::Tagged(tagged) => flatten(prefix, &tagged.value, out),
        other => {
            if let Some(line) = scalar(other) {
                out.insert(prefix.to_owned(), Entry::Line(line));
            }
        }
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn color_code(c: char) -> Option<char> {
    let lower = c.to_ascii_lowercase();
    COLOR_CODES.contains(lower).then_some(lower)
}

/// Replace `&` colour codes with the section-sign form. An `&` not
/// followed by a colour code is left alone.
pub fn translate_color_codes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ALTERNATE_COLOR_CHAR {
            let code = chars.peek().and_then(|code| color_code(*code));
            if let Some(code) = code {
                out.push(COLOR_CHAR);
                out.push(code);
                chars.next();
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Remove section-sign colour codes, for plain-text output.
pub fn strip_color_codes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == COLOR_CHAR && chars.peek().and_then(|code| color_code(*code)).is_some() {
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}
