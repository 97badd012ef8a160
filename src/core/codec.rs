//! GY-004: Per-type codecs to and from the `ArrayBuffer` hub.
//!
//! `convert(A → B) = from_buffer(to_buffer(A), B)`. Both directions are an
//! exhaustive match over the closed type set.

use super::dish::{BigDecimal, DishValue, FileHandle};
use super::error::DishError;
use super::types::{format_number, TypeTag};

/// Encode any value as bytes.
pub fn to_buffer(value: &DishValue) -> Result<Vec<u8>, DishError> {
    let bytes = match value {
        DishValue::ByteArray(b) | DishValue::ArrayBuffer(b) => b.clone(),
        DishValue::String(s) | DishValue::Html(s) => s.as_bytes().to_vec(),
        DishValue::Number(n) => number_to_string(*n).into_bytes(),
        DishValue::BigNumber(d) => d.as_str().as_bytes().to_vec(),
        DishValue::Json(v) => serde_json::to_vec(v).map_err(|e| DishError::Conversion {
            from: TypeTag::Json,
            to: TypeTag::ArrayBuffer,
            reason: e.to_string(),
        })?,
        DishValue::File(f) => read_file(f)?,
        DishValue::ListFile(files) => {
            let mut out = Vec::new();
            for f in files {
                out.extend(read_file(f)?);
            }
            out
        }
    };
    Ok(bytes)
}

/// Decode bytes into the representation named by `tag`.
pub fn from_buffer(buffer: Vec<u8>, tag: TypeTag) -> Result<DishValue, DishError> {
    let value = match tag {
        TypeTag::ByteArray => DishValue::ByteArray(buffer),
        TypeTag::ArrayBuffer => DishValue::ArrayBuffer(buffer),
        TypeTag::String => DishValue::String(bytes_to_string(buffer)),
        TypeTag::Html => DishValue::Html(bytes_to_string(buffer)),
        TypeTag::Number => {
            let s = bytes_to_string(buffer);
            DishValue::Number(s.trim().parse::<f64>().unwrap_or(f64::NAN))
        }
        TypeTag::BigNumber => {
            let s = bytes_to_string(buffer);
            DishValue::BigNumber(BigDecimal::parse(&s).unwrap_or_else(BigDecimal::nan))
        }
        TypeTag::Json => {
            let v = serde_json::from_slice(&buffer).map_err(|e| DishError::Conversion {
                from: TypeTag::ArrayBuffer,
                to: TypeTag::Json,
                reason: e.to_string(),
            })?;
            DishValue::Json(v)
        }
        TypeTag::File => DishValue::File(FileHandle::new("unknown", buffer)),
        TypeTag::ListFile => DishValue::ListFile(vec![FileHandle::new("unknown", buffer)]),
    };
    Ok(value)
}

/// Decode UTF-8, replacing invalid sequences. Valid input is moved, not copied.
pub fn bytes_to_string(buffer: Vec<u8>) -> String {
    String::from_utf8(buffer)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        format_number(n)
    }
}

fn read_file(f: &FileHandle) -> Result<Vec<u8>, DishError> {
    f.read_bytes().map_err(|e| DishError::Conversion {
        from: TypeTag::File,
        to: TypeTag::ArrayBuffer,
        reason: format!("cannot read {}: {}", f.name, e),
    })
}
