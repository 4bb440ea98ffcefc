//! Response envelope of the expert agent API.
//!
//! Every JSON answer is an object with an optional `status` (`"success"` or `"error"`), an
//! optional `message`, and the payload under an endpoint-specific key (`cases`, `case`,
//! `cas_ecole`, `cas_cliniques`).

use casebook_core::{RepositoryError, RepositoryResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Message used when an error envelope carries none.
const UNKNOWN_API_ERROR: &str = "Erreur API inconnue";

#[derive(Debug, Default, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Envelope {
    /// Parse a response body. An empty body is an empty envelope.
    pub fn parse(body: &str) -> RepositoryResult<Self> {
        if body.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(body)
            .map_err(|e| RepositoryError::new(format!("Erreur de réponse du serveur: {e}"), None))
    }

    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }

    /// Turn an `"error"` envelope into a [`RepositoryError`].
    pub fn check(self) -> RepositoryResult<Self> {
        if self.is_error() {
            let message = self
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| UNKNOWN_API_ERROR.to_string());
            return Err(RepositoryError::new(message, None));
        }
        Ok(self)
    }

    /// Remove and decode the payload under `key`. A missing or `null` payload is `None`.
    ///
    /// Decoding failures name the JSON path that did not match.
    pub fn take<T: DeserializeOwned>(&mut self, key: &str) -> RepositoryResult<Option<T>> {
        match self.fields.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_path_to_error::deserialize(value)
                .map(Some)
                .map_err(|e| {
                    RepositoryError::new(
                        format!("unexpected {key} payload at {}: {}", e.path(), e.inner()),
                        None,
                    )
                }),
        }
    }

    /// Like [`Envelope::take`], but a missing payload is an error.
    pub fn require<T: DeserializeOwned>(&mut self, key: &str) -> RepositoryResult<T> {
        self.take(key)?.ok_or_else(|| {
            RepositoryError::new(format!("Réponse API invalide: {key} non retourné"), None)
        })
    }
}
