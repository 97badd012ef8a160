//! GY-003: The dish, a typed, mutable container for the value flowing through a recipe.
//!
//! A dish holds exactly one [`DishValue`]. Asking for a different representation
//! converts the value in place through the `ArrayBuffer` hub (see [`codec`]).
//!
//! [`codec`]: super::codec

use super::codec;
use super::error::DishError;
use super::types::{format_number, TypeTag};
use crate::magic::filetype;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Bytes inspected when building a preview title.
const TITLE_SLICE: usize = 256;

// ============================================================================
// Values
// ============================================================================

/// A value in one of the closed set of representations.
#[derive(Debug, Clone, PartialEq)]
pub enum DishValue {
    ByteArray(Vec<u8>),
    String(String),
    Number(f64),
    Html(String),
    ArrayBuffer(Vec<u8>),
    BigNumber(BigDecimal),
    Json(serde_json::Value),
    File(FileHandle),
    ListFile(Vec<FileHandle>),
}

impl DishValue {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Self::ByteArray(_) => TypeTag::ByteArray,
            Self::String(_) => TypeTag::String,
            Self::Number(_) => TypeTag::Number,
            Self::Html(_) => TypeTag::Html,
            Self::ArrayBuffer(_) => TypeTag::ArrayBuffer,
            Self::BigNumber(_) => TypeTag::BigNumber,
            Self::Json(_) => TypeTag::Json,
            Self::File(_) => TypeTag::File,
            Self::ListFile(_) => TypeTag::ListFile,
        }
    }

    /// Validity predicate: the value's representation satisfies `tag`.
    pub fn is_valid_for(&self, tag: TypeTag) -> bool {
        self.type_tag() == tag
    }

    /// Borrow the text of a String or Html value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Html(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the bytes of a ByteArray or ArrayBuffer value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::ByteArray(b) | Self::ArrayBuffer(b) => Some(b),
            _ => None,
        }
    }

    /// Take the text out of a String or Html value.
    pub fn into_text(self) -> Result<String, DishError> {
        match self {
            Self::String(s) | Self::Html(s) => Ok(s),
            other => Err(DishError::invalid(TypeTag::String, &other)),
        }
    }

    /// Take the bytes out of a ByteArray or ArrayBuffer value.
    pub fn into_bytes(self) -> Result<Vec<u8>, DishError> {
        match self {
            Self::ByteArray(b) | Self::ArrayBuffer(b) => Ok(b),
            other => Err(DishError::invalid(TypeTag::ArrayBuffer, &other)),
        }
    }

    pub fn into_json(self) -> Result<serde_json::Value, DishError> {
        match self {
            Self::Json(v) => Ok(v),
            other => Err(DishError::invalid(TypeTag::Json, &other)),
        }
    }

    pub fn into_files(self) -> Result<Vec<FileHandle>, DishError> {
        match self {
            Self::ListFile(files) => Ok(files),
            Self::File(file) => Ok(vec![file]),
            other => Err(DishError::invalid(TypeTag::ListFile, &other)),
        }
    }
}

impl From<String> for DishValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for DishValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<Vec<u8>> for DishValue {
    fn from(b: Vec<u8>) -> Self {
        Self::ArrayBuffer(b)
    }
}

// ============================================================================
// Arbitrary precision decimals
// ============================================================================

/// A decimal number kept in its exact textual form.
///
/// Values that do not parse become `NaN`, mirroring how numeric parsing of
/// arbitrary text behaves elsewhere in the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigDecimal(String);

impl BigDecimal {
    pub fn nan() -> Self {
        Self("NaN".to_string())
    }

    pub fn is_nan(&self) -> bool {
        self.0 == "NaN"
    }

    /// Parse and normalise a decimal string (`-0012.500` → `-12.5`).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        match s {
            "NaN" => return Some(Self::nan()),
            "Infinity" | "+Infinity" => return Some(Self("Infinity".into())),
            "-Infinity" => return Some(Self("-Infinity".into())),
            _ => {}
        }
        let (negative, body) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let int_part = int_part.trim_start_matches('0');
        let frac_part = frac_part.trim_end_matches('0');
        let int_part = if int_part.is_empty() { "0" } else { int_part };
        let mut out = String::new();
        if negative && (int_part != "0" || !frac_part.is_empty()) {
            out.push('-');
        }
        out.push_str(int_part);
        if !frac_part.is_empty() {
            out.push('.');
            out.push_str(frac_part);
        }
        Some(Self(out))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BigDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// File handles
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum FileContents {
    Memory(Vec<u8>),
    /// Read lazily when the dish converts the handle.
    Disk(PathBuf),
}

/// A named file, either held in memory or backed by a path on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct FileHandle {
    pub name: String,
    pub mime_type: String,
    pub last_modified: Option<u64>,
    contents: FileContents,
}

impl FileHandle {
    pub fn new(name: &str, data: Vec<u8>) -> Self {
        let mime_type = filetype::detect(&data)
            .map(|ft| ft.mime.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Self {
            name: name.to_string(),
            mime_type,
            last_modified: None,
            contents: FileContents::Memory(data),
        }
    }

    /// A handle whose bytes are only read when first needed.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let last_modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs());
        Self {
            name,
            mime_type: "application/octet-stream".to_string(),
            last_modified,
            contents: FileContents::Disk(path.to_path_buf()),
        }
    }

    /// Read the file's bytes. In-memory handles never fail.
    pub fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        match &self.contents {
            FileContents::Memory(data) => Ok(data.clone()),
            FileContents::Disk(path) => std::fs::read(path),
        }
    }

    /// Byte size; disk-backed handles report 0 if the path cannot be stat'ed.
    pub fn size(&self) -> u64 {
        match &self.contents {
            FileContents::Memory(data) => data.len() as u64,
            FileContents::Disk(path) => std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.contents, FileContents::Memory(_))
    }
}

// ============================================================================
// Dish
// ============================================================================

/// The typed container threaded through a bake.
#[derive(Debug, Clone, PartialEq)]
pub struct Dish {
    value: DishValue,
}

impl Default for Dish {
    fn default() -> Self {
        Self {
            value: DishValue::ArrayBuffer(Vec::new()),
        }
    }
}

impl Dish {
    pub fn new(value: DishValue) -> Self {
        Self { value }
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self::new(DishValue::String(s.into()))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(DishValue::ArrayBuffer(bytes))
    }

    pub fn type_tag(&self) -> TypeTag {
        self.value.type_tag()
    }

    pub fn value(&self) -> &DishValue {
        &self.value
    }

    pub fn into_value(self) -> DishValue {
        self.value
    }

    /// Validate then store `value` as `tag`.
    pub fn set(&mut self, value: DishValue, tag: TypeTag) -> Result<(), DishError> {
        if !value.is_valid_for(tag) {
            return Err(DishError::invalid(tag, &value));
        }
        self.value = value;
        Ok(())
    }

    /// Convert the dish to `tag` in place and return a copy of the value.
    ///
    /// `get` of the current type performs no conversion.
    pub fn get(&mut self, tag: TypeTag) -> Result<DishValue, DishError> {
        self.translate(tag)?;
        Ok(self.value.clone())
    }

    pub fn get_string(&mut self) -> Result<String, DishError> {
        self.get(TypeTag::String)?.into_text()
    }

    pub fn get_bytes(&mut self) -> Result<Vec<u8>, DishError> {
        self.get(TypeTag::ArrayBuffer)?.into_bytes()
    }

    fn translate(&mut self, to: TypeTag) -> Result<(), DishError> {
        let from = self.type_tag();
        if from == to {
            return Ok(());
        }
        trace!("translating dish from {} to {}", from, to);
        let buffer = codec::to_buffer(&self.value)?;
        self.value = codec::from_buffer(buffer, to)?;
        Ok(())
    }

    /// Byte-length estimate appropriate to the current type.
    pub fn size(&self) -> u64 {
        match &self.value {
            DishValue::ByteArray(b) | DishValue::ArrayBuffer(b) => b.len() as u64,
            DishValue::String(s) | DishValue::Html(s) => s.chars().count() as u64,
            DishValue::Number(n) => format_number(*n).len() as u64,
            DishValue::BigNumber(d) => d.as_str().len() as u64,
            DishValue::Json(v) => v.to_string().len() as u64,
            DishValue::File(f) => f.size(),
            DishValue::ListFile(files) => files.iter().map(FileHandle::size).sum(),
        }
    }

    /// A short human preview of the contents, at most `max_len` characters.
    ///
    /// Never fails: anything that cannot be previewed yields an empty title.
    pub fn title(&self, max_len: usize) -> String {
        let title = match &self.value {
            DishValue::File(f) => f.name.clone(),
            DishValue::ListFile(files) => format!("{} file(s)", files.len()),
            DishValue::Json(_) => "application/json".to_string(),
            DishValue::ByteArray(b) | DishValue::ArrayBuffer(b) => match filetype::detect(b) {
                Some(ft) => ft.mime.to_string(),
                None => preview_bytes(b, self.type_tag()),
            },
            DishValue::String(s) | DishValue::Html(s) => s.chars().take(TITLE_SLICE).collect(),
            DishValue::Number(n) => format_number(*n),
            DishValue::BigNumber(d) => d.to_string(),
        };
        title.chars().take(max_len).collect()
    }
}

fn preview_bytes(bytes: &[u8], tag: TypeTag) -> String {
    let slice = &bytes[..bytes.len().min(TITLE_SLICE)];
    match std::str::from_utf8(slice) {
        Ok(s) => s.to_string(),
        // A multi-byte character cut by the slice: keep the valid prefix.
        Err(e) if e.valid_up_to() > 0 && e.error_len().is_none() => {
            String::from_utf8_lossy(&slice[..e.valid_up_to()]).into_owned()
        }
        Err(e) => {
            warn!("{} cannot be sliced into a title: {}", tag, e);
            String::new()
        }
    }
}
