// Configuration loading — NetConfig from JSON
//
// The layout of the document is defined by `kestrel_nn::NetConfig`; this
// module only reads text and maps parse failures into kestrel errors.
// Missing keys and wrongly typed values are reported by serde with the
// offending path and line.

use std::fs;
use std::path::Path;

use kestrel_core::error::{Error, Result};
use kestrel_nn::NetConfig;

/// Parse a network configuration from a JSON string.
pub fn from_json_str(json: &str) -> Result<NetConfig> {
    serde_json::from_str(json)
        .map_err(|e| Error::msg(format!("invalid network configuration: {e}")))
}

/// Read and parse a network configuration file.
pub fn load_json(path: impl AsRef<Path>) -> Result<NetConfig> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let config =
        from_json_str(&text).map_err(|e| Error::msg(format!("{}: {e}", path.display())))?;
    tracing::debug!(
        path = %path.display(),
        layers = config.layer.kind.len(),
        "configuration loaded"
    );
    Ok(config)
}

/// Serialize a configuration back to pretty-printed JSON.
pub fn to_json_string(config: &NetConfig) -> Result<String> {
    serde_json::to_string_pretty(config).map_err(|e| Error::msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_an_error() {
        let err = from_json_str(r#"{ "model": {} }"#).unwrap_err();
        assert!(err.to_string().contains("invalid network configuration"));
    }

    #[test]
    fn test_malformed_json() {
        assert!(from_json_str("{ not json").is_err());
    }
}
