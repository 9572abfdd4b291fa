//! Shader reference inside a pipeline schematic.
//!
//! A shader is located either by a filesystem path or by a byte range into a
//! binary pack, never both. The work-group size is only meaningful for
//! compute-like stages and stays optional.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::schematic::SchematicError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawShaderInfo")]
pub struct ShaderInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_length: Option<u64>,
    pub entry_point: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_group_size: Option<[u32; 3]>,
}

impl ShaderInfo {
    pub fn from_path(path: impl Into<PathBuf>, entry_point: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            byte_offset: None,
            byte_length: None,
            entry_point: entry_point.into(),
            work_group_size: None,
        }
    }

    pub fn from_byte_range(offset: u64, length: u64, entry_point: impl Into<String>) -> Self {
        Self {
            path: None,
            byte_offset: Some(offset),
            byte_length: Some(length),
            entry_point: entry_point.into(),
            work_group_size: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawShaderInfo {
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    byte_offset: Option<u64>,
    #[serde(default)]
    byte_length: Option<u64>,
    entry_point: String,
    #[serde(default)]
    work_group_size: Option<[u32; 3]>,
}

impl TryFrom<RawShaderInfo> for ShaderInfo {
    type Error = SchematicError;

    fn try_from(raw: RawShaderInfo) -> Result<Self, Self::Error> {
        let has_range = raw.byte_offset.is_some() && raw.byte_length.is_some();
        let has_partial_range = raw.byte_offset.is_some() || raw.byte_length.is_some();

        if raw.path.is_some() == has_partial_range || (has_partial_range && !has_range) {
            return Err(SchematicError::AmbiguousShaderSource);
        }

        Ok(Self {
            path: raw.path,
            byte_offset: raw.byte_offset,
            byte_length: raw.byte_length,
            entry_point: raw.entry_point,
            work_group_size: raw.work_group_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_shader_round_trips() {
        let mut shader = ShaderInfo::from_path("foo", "main");
        shader.work_group_size = Some([32, 32, 1]);

        let json = serde_json::to_value(&shader).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "entryPoint": "main",
                "path": "foo",
                "workGroupSize": [32, 32, 1],
            })
        );

        let back: ShaderInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back, shader);
    }

    #[test]
    fn byte_range_shader_round_trips() {
        let mut shader = ShaderInfo::from_byte_range(0, 120, "main");
        shader.work_group_size = Some([32, 32, 1]);

        let json = serde_json::to_value(&shader).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "entryPoint": "main",
                "byteOffset": 0,
                "byteLength": 120,
                "workGroupSize": [32, 32, 1],
            })
        );

        let back: ShaderInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back, shader);
    }

    #[test]
    fn path_and_byte_range_together_are_rejected() {
        let json = serde_json::json!({
            "entryPoint": "main",
            "path": "foo",
            "byteOffset": 0,
            "byteLength": 120,
        });
        assert!(serde_json::from_value::<ShaderInfo>(json).is_err());
    }

    #[test]
    fn neither_source_is_rejected() {
        let json = serde_json::json!({ "entryPoint": "main" });
        assert!(serde_json::from_value::<ShaderInfo>(json).is_err());
    }

    #[test]
    fn partial_byte_range_is_rejected() {
        let json = serde_json::json!({ "entryPoint": "main", "byteOffset": 16 });
        assert!(serde_json::from_value::<ShaderInfo>(json).is_err());
    }

    #[test]
    fn missing_entry_point_is_rejected() {
        let json = serde_json::json!({ "path": "foo" });
        assert!(serde_json::from_value::<ShaderInfo>(json).is_err());
    }
}
