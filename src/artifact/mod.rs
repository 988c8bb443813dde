// SPDX-License-Identifier: MIT OR Apache-2.0

//! C1 — Artifact Store: content-addressed immutable storage of code/SQL/UI
//! blobs keyed by a strong digest.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// The three shapes a stored artifact body can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Script,
    Select,
    Ui,
}

impl ArtifactKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Select => "select",
            Self::Ui => "ui",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "script" => Some(Self::Script),
            "select" => Some(Self::Select),
            "ui" => Some(Self::Ui),
            _ => None,
        }
    }
}

/// An immutable, content-addressed blob. `digest` is the primary key and is
/// always `hash(body)` — callers never choose it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub digest: String,
    pub body: String,
    pub kind: ArtifactKind,
}

/// Compute the strong digest for a body. SHA-256 is used as the collision
/// resistant hash; the digest is rendered as lowercase hex so it is a stable,
/// printable primary key across backends.
#[must_use]
pub fn compute_digest(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

impl Artifact {
    #[must_use]
    pub fn new(body: impl Into<String>, kind: ArtifactKind) -> Self {
        let body = body.into();
        let digest = compute_digest(&body);
        Self { digest, body, kind }
    }

    /// `spec.md §4.1`/P1 — recompute the digest and compare to the stored one.
    #[must_use]
    pub fn verify_integrity(&self) -> bool {
        compute_digest(&self.body) == self.digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_idempotent_and_deterministic() {
        let a = Artifact::new("SELECT 1", ArtifactKind::Select);
        let b = Artifact::new("SELECT 1", ArtifactKind::Select);
        assert_eq!(a.digest, b.digest);
        assert!(a.verify_integrity());
    }

    #[test]
    fn different_bodies_yield_different_digests() {
        let a = Artifact::new("SELECT 1", ArtifactKind::Select);
        let b = Artifact::new("SELECT 2", ArtifactKind::Select);
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn kind_round_trips_through_str() {
        assert_eq!(ArtifactKind::parse("ui"), Some(ArtifactKind::Ui));
        assert_eq!(ArtifactKind::parse("bogus"), None);
        assert_eq!(ArtifactKind::Script.as_str(), "script");
    }
}
