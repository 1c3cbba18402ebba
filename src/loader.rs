//! Integration definitions from JSON.
//!
//! ```json
//! [
//!   {
//!     "name": "SampleMath",
//!     "method_replacements": [
//!       {
//!         "caller": {},
//!         "target": { "type": "Sample.Math", "method": "Add" },
//!         "wrapper": {
//!           "assembly": "Wrap, Version=1.0.0.0, Culture=neutral, PublicKeyToken=null",
//!           "type": "Wrapper.Math",
//!           "method": "Add",
//!           "signature": [0, 2, 8, 8, 8]
//!         }
//!       }
//!     ]
//!   }
//! ]
//! ```

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::ConfigError;
use crate::integration::Integration;

pub fn load_integrations_from_str(json: &str) -> Result<Vec<Integration>, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_integrations_from_file(path: &Path) -> Result<Vec<Integration>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let integrations: Vec<Integration> = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), count = integrations.len(), "loaded integrations");
    Ok(integrations)
}

/// Concatenates the integrations of every file, in path order.
pub fn load_integrations<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Integration>, ConfigError> {
    let mut all = Vec::new();
    for path in paths {
        all.extend(load_integrations_from_file(path.as_ref())?);
    }
    Ok(all)
}
