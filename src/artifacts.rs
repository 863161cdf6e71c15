//! Artifact store
//!
//! Fitted models and preprocessors are written as a bincode envelope that
//! carries a magic tag, a format version, the stored type and an FNV-1a
//! checksum of the payload. Any mismatch on load is a hard failure.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MlError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEnvelope {
    magic: [u8; 4],
    format_version: u32,
    type_name: String,
    created_at: String,
    payload: Vec<u8>,
    checksum: u64,
}

impl ArtifactEnvelope {
    const MAGIC: [u8; 4] = [b'M', b'L', b'P', b'A'];
    const VERSION: u32 = 1;

    fn wrap<T: Serialize>(obj: &T) -> Result<Self> {
        let payload = bincode::serialize(obj)
            .map_err(|e| MlError::SerializationError(format!("Failed to serialize: {}", e)))?;
        Ok(Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            type_name: std::any::type_name::<T>().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            checksum: fnv1a(&payload),
            payload,
        })
    }

    fn unwrap_into<T: DeserializeOwned>(self) -> Result<T> {
        if self.magic != Self::MAGIC {
            return Err(MlError::SerializationError(
                "Invalid artifact file: bad magic bytes".to_string(),
            ));
        }
        if self.format_version != Self::VERSION {
            return Err(MlError::SerializationError(format!(
                "Unsupported artifact format version {} (expected {})",
                self.format_version,
                Self::VERSION
            )));
        }
        let expected = std::any::type_name::<T>();
        if self.type_name != expected {
            return Err(MlError::SerializationError(format!(
                "Artifact holds {}, expected {}",
                self.type_name, expected
            )));
        }
        if fnv1a(&self.payload) != self.checksum {
            return Err(MlError::SerializationError(
                "Artifact checksum mismatch: file may be corrupted".to_string(),
            ));
        }
        bincode::deserialize(&self.payload)
            .map_err(|e| MlError::SerializationError(format!("Failed to deserialize: {}", e)))
    }
}

fn fnv1a(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    data.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ *byte as u64).wrapping_mul(FNV_PRIME)
    })
}

/// Serialize `obj` to `path`, creating parent directories as needed.
/// An existing file is overwritten.
pub fn save_object<T: Serialize>(path: impl AsRef<Path>, obj: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let envelope = ArtifactEnvelope::wrap(obj)?;
    let bytes = bincode::serialize(&envelope)?;

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;

    info!(
        path = %path.display(),
        kind = %envelope.type_name,
        bytes = bytes.len(),
        "Artifact saved"
    );
    Ok(())
}

/// Load an object previously written by [`save_object`].
pub fn load_object<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        MlError::IoError(std::io::Error::new(
            e.kind(),
            format!("cannot open artifact {}: {}", path.display(), e),
        ))
    })?;

    let mut bytes = Vec::new();
    BufReader::new(file).read_to_end(&mut bytes)?;

    let envelope: ArtifactEnvelope = bincode::deserialize(&bytes).map_err(|e| {
        MlError::SerializationError(format!("Invalid artifact file {}: {}", path.display(), e))
    })?;
    debug!(
        path = %path.display(),
        kind = %envelope.type_name,
        created_at = %envelope.created_at,
        "Artifact envelope read"
    );
    envelope.unwrap_into()
}
