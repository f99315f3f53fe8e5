use crate::error::SerializationError;
use serde::Serialize;
use std::path::Path;

/// Writes `value` as pretty-printed JSON, creating parent directories as
/// needed.
pub async fn save_json<T>(value: &T, path: &Path) -> Result<(), SerializationError>
where
    T: Serialize + ?Sized,
{
    let io_err = |source| SerializationError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');
    tokio::fs::write(path, body).await.map_err(io_err)?;
    Ok(())
}
