//! Validation laws applied to every commit
//!
//! A `Law` sees each patch before it reaches the history and may reject it
//! or hand back a transformed patch. Rejection leaves the store untouched.

use thiserror::Error;

use crate::algebra::Patch;
use crate::types::Event;

/// A patch was refused by a law
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("law '{law}' rejected patch: {reason}")]
pub struct LawViolation {
    pub law: String,
    pub reason: String,
}

impl LawViolation {
    pub fn new(law: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            law: law.into(),
            reason: reason.into(),
        }
    }
}

/// Validation strategy injected into the entity store
pub trait Law: Send + Sync {
    /// Name used in logs and violations
    fn name(&self) -> &str {
        "custom"
    }

    /// Accept (possibly transformed) or reject a patch
    fn enforce(&self, patch: Patch) -> Result<Patch, LawViolation>;
}

impl<F> Law for F
where
    F: Fn(Patch) -> Result<Patch, LawViolation> + Send + Sync,
{
    fn enforce(&self, patch: Patch) -> Result<Patch, LawViolation> {
        self(patch)
    }
}

/// Accepts every patch unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PermitAll;

impl Law for PermitAll {
    fn name(&self) -> &str {
        "permit-all"
    }

    fn enforce(&self, patch: Patch) -> Result<Patch, LawViolation> {
        Ok(patch)
    }
}

/// Rejects any patch that carries events
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnly;

impl Law for ReadOnly {
    fn name(&self) -> &str {
        "read-only"
    }

    fn enforce(&self, patch: Patch) -> Result<Patch, LawViolation> {
        if patch.is_empty() {
            Ok(patch)
        } else {
            Err(LawViolation::new(
                self.name(),
                format!("store is read-only ({} events refused)", patch.len()),
            ))
        }
    }
}

/// Constrains entity ids
#[derive(Debug, Clone)]
pub struct IdPolicy {
    /// Maximum id length in bytes
    pub max_len: usize,
    /// If non-empty, ids must start with one of these prefixes
    pub allowed_prefixes: Vec<String>,
}

impl Default for IdPolicy {
    fn default() -> Self {
        Self {
            max_len: 256,
            allowed_prefixes: Vec::new(),
        }
    }
}

impl IdPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }

    pub fn allow_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.allowed_prefixes.push(prefix.into());
        self
    }

    fn check(&self, event: &Event) -> Result<(), String> {
        let id = event.id();
        if id.is_empty() {
            return Err(format!("{} with empty id", event.kind()));
        }
        if id.len() > self.max_len {
            return Err(format!("id '{}' exceeds {} bytes", id, self.max_len));
        }
        if !self.allowed_prefixes.is_empty()
            && !self.allowed_prefixes.iter().any(|p| id.starts_with(p.as_str()))
        {
            return Err(format!(
                "id '{}' outside allowed prefixes {:?}",
                id, self.allowed_prefixes
            ));
        }
        Ok(())
    }
}

impl Law for IdPolicy {
    fn name(&self) -> &str {
        "id-policy"
    }

    fn enforce(&self, patch: Patch) -> Result<Patch, LawViolation> {
        for event in patch.events() {
            self.check(event)
                .map_err(|reason| LawViolation::new(self.name(), reason))?;
        }
        Ok(patch)
    }
}
