//! Typed nbformat v4 document model.
//!
//! The notebook JSON grammar is handled entirely by `serde_json`; this module
//! only declares the shape of the parts the converter reads. Unknown keys are
//! ignored on input, so notebooks written by newer Jupyter versions still load.
//!
//! nbformat stores every multi-line text field either as one string or as a
//! list of line fragments (each keeping its trailing `\n`). [`MultilineString`]
//! accepts both and always exposes the joined text.

use crate::error::NotebookError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Mime type → payload, as found in `display_data` / `execute_result` outputs.
pub type MimeBundle = BTreeMap<String, Value>;

/// Attachment file name → mime type → base64 payload.
pub type Attachments = BTreeMap<String, BTreeMap<String, MultilineString>>;

/// A whole notebook document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: NotebookMetadata,
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,
    #[serde(default)]
    pub nbformat_minor: u32,
}

fn default_nbformat() -> u32 {
    4
}

impl Notebook {
    /// Parse a notebook from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, NotebookError> {
        serde_json::from_str(text).map_err(|e| NotebookError::ParseFailed {
            detail: e.to_string(),
        })
    }

    /// Read and parse a notebook file.
    pub fn from_path(path: &Path) -> Result<Self, NotebookError> {
        let text = std::fs::read_to_string(path).map_err(|e| NotebookError::ReadFailed {
            detail: e.to_string(),
        })?;
        Self::from_json(&text)
    }

    /// Language used for code-cell fences.
    ///
    /// `language_info.name` wins over `kernelspec.language`; falls back to
    /// `python`, the language of nearly every notebook in the wild.
    pub fn language(&self) -> &str {
        self.metadata
            .language_info
            .as_ref()
            .and_then(|l| l.name.as_deref())
            .or_else(|| {
                self.metadata
                    .kernelspec
                    .as_ref()
                    .and_then(|k| k.language.as_deref())
            })
            .filter(|s| !s.is_empty())
            .unwrap_or("python")
    }
}

/// Notebook-level metadata. Only the language hints are typed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotebookMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernelspec: Option<KernelSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_info: Option<LanguageInfo>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Cell kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Raw,
    Markdown,
    Code,
    /// Anything else (nbformat reserves the field for future kinds).
    #[serde(other)]
    Unknown,
}

impl CellType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Raw => "raw",
            CellType::Markdown => "markdown",
            CellType::Code => "code",
            CellType::Unknown => "unknown",
        }
    }
}

/// One notebook cell. Code-only fields are empty on other cell kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: CellType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub source: MultilineString,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Attachments>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<Output>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_count: Option<u64>,
}

impl Cell {
    /// A cell of the given kind holding `source`.
    pub fn new(cell_type: CellType, source: impl Into<String>) -> Self {
        Self {
            cell_type,
            id: None,
            source: MultilineString(source.into()),
            metadata: Map::new(),
            attachments: None,
            outputs: Vec::new(),
            execution_count: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source.0
    }

    pub fn set_source(&mut self, source: String) {
        self.source = MultilineString(source);
    }

    /// Target format of a raw cell (`raw_mimetype`, or the older `format` key).
    pub fn raw_mimetype(&self) -> Option<&str> {
        self.metadata
            .get("raw_mimetype")
            .or_else(|| self.metadata.get("format"))
            .and_then(Value::as_str)
    }
}

/// One captured output of a code cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        #[serde(default)]
        name: String,
        #[serde(default)]
        text: MultilineString,
    },
    DisplayData {
        #[serde(default)]
        data: MimeBundle,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    ExecuteResult {
        #[serde(default)]
        data: MimeBundle,
        #[serde(default)]
        metadata: Map<String, Value>,
        #[serde(default)]
        execution_count: Option<u64>,
    },
    Error {
        #[serde(default)]
        ename: String,
        #[serde(default)]
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

/// Text of a mime-bundle entry, joining list-of-lines payloads.
pub fn bundle_text(bundle: &MimeBundle, mime: &str) -> Option<String> {
    match bundle.get(mime)? {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .concat(),
        ),
        _ => None,
    }
}

/// Text field stored as one string or as a list of line fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MultilineRepr", into = "String")]
pub struct MultilineString(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum MultilineRepr {
    One(String),
    Many(Vec<String>),
}

impl From<MultilineRepr> for MultilineString {
    fn from(repr: MultilineRepr) -> Self {
        match repr {
            MultilineRepr::One(s) => MultilineString(s),
            MultilineRepr::Many(parts) => MultilineString(parts.concat()),
        }
    }
}

impl From<MultilineString> for String {
    fn from(m: MultilineString) -> Self {
        m.0
    }
}

impl AsRef<str> for MultilineString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
