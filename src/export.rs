//! Step outputs in the `GITHUB_OUTPUT` file format.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use tracing::debug;

use crate::error::SimverError;

/// Append one `key=value` line per pair to `path`, creating it if needed.
///
/// # Errors
/// Returns [`SimverError::Io`] if the file cannot be opened or written, or
/// [`SimverError::InvalidOutput`] when a key contains `=` or a value
/// contains a newline. Nothing is written in that case.
pub fn write_outputs(path: &Path, pairs: &[(&str, &str)]) -> Result<(), SimverError> {
    let mut buf = String::new();
    for (key, value) in pairs {
        let reason = if key.is_empty() || key.contains('=') || key.contains('\n') {
            Some("name must be non-empty without `=` or newlines")
        } else if value.contains('\n') {
            Some("value must fit on one line")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(SimverError::InvalidOutput {
                key: (*key).to_owned(),
                reason,
            });
        }
        buf.push_str(key);
        buf.push('=');
        buf.push_str(value);
        buf.push('\n');
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(buf.as_bytes())?;
    debug!(path = %path.display(), count = pairs.len(), "wrote step outputs");
    Ok(())
}
