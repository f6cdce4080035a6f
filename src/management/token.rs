use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{config, error::AuthError, types::TokenRecord};

/// Durable storage of the single [`TokenRecord`] kept between invocations.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the moodify configuration directory.
    pub fn default_location() -> Self {
        Self::new(config::config_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(config::TOKEN_FILE_NAME)
    }

    /// Writes the token with owner-only permissions.
    ///
    /// The record goes to a sibling temp file which is then renamed over the
    /// target, so a concurrent `load` sees either the old or the new file.
    pub async fn save(&self, token: &TokenRecord) -> Result<(), AuthError> {
        // The directory may have been removed since the last call.
        async_fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| storage_error(&self.dir, source))?;

        let json = serde_json::to_string_pretty(token).map_err(|e| AuthError::Storage {
            path: self.path(),
            source: e.into(),
        })?;

        let path = self.path();
        let tmp = path.with_extension("json.tmp");

        // Restrict the temp file before the secret is written into it.
        async_fs::write(&tmp, b"")
            .await
            .map_err(|source| storage_error(&tmp, source))?;
        restrict_permissions(&tmp).await?;
        async_fs::write(&tmp, json)
            .await
            .map_err(|source| storage_error(&tmp, source))?;

        if let Err(source) = async_fs::rename(&tmp, &path).await {
            let _ = async_fs::remove_file(&tmp).await;
            return Err(storage_error(&path, source));
        }
        restrict_permissions(&path).await?;

        debug!(path = %path.display(), expiry = %token.expiry, "token saved");
        Ok(())
    }

    pub async fn load(&self) -> Result<TokenRecord, AuthError> {
        let path = self.path();
        let content = match async_fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(AuthError::NotAuthenticated),
            Err(source) => return Err(storage_error(&path, source)),
        };

        serde_json::from_str(&content).map_err(|source| AuthError::CorruptData { path, source })
    }

    /// Removes the token file. Already absent counts as success.
    pub async fn delete(&self) -> Result<(), AuthError> {
        let path = self.path();
        match async_fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "token removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(storage_error(&path, source)),
        }
    }

    pub async fn exists(&self) -> bool {
        async_fs::metadata(self.path()).await.is_ok()
    }
}

fn storage_error(path: &Path, source: std::io::Error) -> AuthError {
    AuthError::Storage {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), AuthError> {
    use std::os::unix::fs::PermissionsExt;

    async_fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|source| storage_error(path, source))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), AuthError> {
    Ok(())
}
