use bytes::Bytes;
use log::debug;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use crate::errors::ConvertError;
use crate::utils::{infer_file_type, name_extension};

/// where a source file's bytes live
#[derive(Debug, Clone)]
pub enum Payload {
    Memory(Bytes),
    /// read on demand, so oversized files can be rejected without loading them
    Disk(PathBuf),
}

/// an input file as handed over by the caller: immutable for its whole lifetime
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    media_type: String,
    size: u64,
    payload: Payload,
}

impl SourceFile {
    /// wraps in-memory bytes with the media type the caller declared (may be empty)
    pub fn from_bytes(name: impl Into<String>, media_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            media_type: media_type.into().to_ascii_lowercase(),
            size: data.len() as u64,
            payload: Payload::Memory(data),
        }
    }

    /// opens a file on disk; the media type is sniffed from its leading bytes
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(ConvertError::Path(format!("Input path is not a file: {:?}", path)));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| ConvertError::Path(format!("Input path has no usable file name: {:?}", path)))?;

        let mut head = Vec::with_capacity(4096);
        tokio::fs::File::open(path).await?.take(4096).read_to_end(&mut head).await?;
        let media_type = infer_file_type(&head)
            .map(|t| t.mime_type().to_string())
            .unwrap_or_default();

        debug!("Opened {:?}: {} bytes, sniffed media type '{}'", path, metadata.len(), media_type);

        Ok(Self {
            name,
            media_type,
            size: metadata.len(),
            payload: Payload::Disk(path.to_path_buf()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// lowercase extension of the display name, empty if there is none
    pub fn extension(&self) -> String {
        name_extension(&self.name)
    }

    /// loads the whole payload
    pub async fn read(&self) -> Result<Bytes, ConvertError> {
        match &self.payload {
            Payload::Memory(data) => Ok(data.clone()),
            Payload::Disk(path) => Ok(Bytes::from(tokio::fs::read(path).await?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_sniffs_media_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Clip.GIF");
        std::fs::write(&path, b"GIF89a\x01\x00\x01\x00\x00\x00\x00;").unwrap();

        let file = SourceFile::open(&path).await.unwrap();
        assert_eq!(file.name(), "Clip.GIF");
        assert_eq!(file.extension(), "gif");
        assert_eq!(file.media_type(), "image/gif");
        assert_eq!(file.size(), 14);
        assert_eq!(file.read().await.unwrap().len(), 14);
    }

    #[tokio::test]
    async fn test_open_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(SourceFile::open(dir.path()).await, Err(ConvertError::Path(_))));
    }

    #[test]
    fn test_from_bytes_lowercases_media_type() {
        let file = SourceFile::from_bytes("notes.txt", "Text/Plain", b"hi".to_vec());
        assert_eq!(file.media_type(), "text/plain");
        assert_eq!(file.size(), 2);
    }
}
