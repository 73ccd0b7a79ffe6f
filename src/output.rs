use std::fs;
use std::io::Write;

use camino::Utf8Path;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::SegwayError;

pub fn to_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, SegwayError> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buffer, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|err| SegwayError::Filesystem(err.to_string()))?;
    Ok(buffer)
}

pub fn write_input_json<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), SegwayError> {
    let content = to_json_bytes(value)?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| SegwayError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix("segway-inputs")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| SegwayError::Filesystem(err.to_string()))?;
    temp.write_all(&content)
        .map_err(|err| SegwayError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| SegwayError::Filesystem(format!("write {path}: {}", err.error)))?;
    Ok(())
}
