//! Token storage.
//!
//! The stored pair is read synchronously right before every connection attempt
//! and every REST call, so a refresh performed by one collaborator is seen by
//! the next handshake without any coordination.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use roomline_proto::payloads::TokenPair;

use crate::error::CredentialError;

/// Storage for the access/refresh token pair.
pub trait CredentialStore: Send + Sync {
    /// Stored pair. `None` when logged out.
    fn tokens(&self) -> Result<Option<TokenPair>, CredentialError>;

    /// Replace the stored pair.
    fn set_tokens(&self, tokens: &TokenPair) -> Result<(), CredentialError>;

    /// Forget the stored pair.
    fn clear(&self) -> Result<(), CredentialError>;

    /// Stored access token.
    fn access_token(&self) -> Result<Option<String>, CredentialError> {
        Ok(self.tokens()?.map(|pair| pair.access_token))
    }

    /// Stored refresh token.
    fn refresh_token(&self) -> Result<Option<String>, CredentialError> {
        Ok(self.tokens()?.map(|pair| pair.refresh_token))
    }
}

/// In-process store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    slot: Arc<RwLock<Option<TokenPair>>>,
}

impl MemoryCredentialStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `tokens`.
    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self { slot: Arc::new(RwLock::new(Some(tokens))) }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn tokens(&self) -> Result<Option<TokenPair>, CredentialError> {
        Ok(self.slot.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn set_tokens(&self, tokens: &TokenPair) -> Result<(), CredentialError> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// JSON file store: `{"accessToken": ..., "refreshToken": ...}`.
///
/// A missing file means no tokens.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store backed by `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn tokens(&self) -> Result<Option<TokenPair>, CredentialError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set_tokens(&self, tokens: &TokenPair) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(tokens)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
