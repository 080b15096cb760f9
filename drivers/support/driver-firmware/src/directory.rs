use crate::{FetchError, FirmwareStore};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

/// Firmware files below a root directory (`/lib/firmware` style).
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `name` below the root. Absolute names and `..` are rejected.
    fn resolve(&self, name: &str) -> Result<PathBuf, FetchError> {
        let relative = Path::new(name);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || !plain {
            return Err(FetchError::InvalidName {
                name: name.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl FirmwareStore for DirectoryStore {
    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }

    fn request(&self, name: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.resolve(name)?;
        let io_error = |source: io::Error| {
            if source.kind() == io::ErrorKind::NotFound {
                FetchError::NotFound {
                    name: name.to_string(),
                }
            } else {
                FetchError::Io {
                    name: name.to_string(),
                    source,
                }
            }
        };

        let mut file = File::open(&path).map_err(io_error)?;
        let metadata = file.metadata().map_err(io_error)?;
        if !metadata.is_file() {
            return Err(FetchError::NotFound {
                name: name.to_string(),
            });
        }

        let expected = usize::try_from(metadata.len()).map_err(|_| FetchError::ShortRead {
            name: name.to_string(),
            read: 0,
            expected: usize::MAX,
        })?;
        let mut buf = Vec::with_capacity(expected);
        let read = file.read_to_end(&mut buf).map_err(io_error)?;
        if read != expected {
            return Err(FetchError::ShortRead {
                name: name.to_string(),
                read,
                expected,
            });
        }

        log::debug!("loaded {name} ({read} bytes) from {}", self.root.display());
        Ok(buf)
    }
}
