//! Identity registry: institutes, issuers and verifiers.
//!
//! Institutes own the secret that keys document hashes. The registry is
//! also the [`SecretKeyProvider`] the engine asks for those secrets.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::VerifyError;
use crate::store::{load_json, write_json_atomic};
use crate::types::{generate_id, now_unix};

/// File name of the persisted identities.
pub const IDENTITIES_FILE: &str = "identities.json";

/// Supplies the per-institute hashing secret.
pub trait SecretKeyProvider: Send + Sync {
    /// Secret for `institute_id`.
    ///
    /// # Errors
    ///
    /// [`VerifyError::NotFound`] for an unknown institute;
    /// [`VerifyError::HashComputation`] if the institute has no secret.
    fn secret_for_institute(&self, institute_id: &str) -> Result<String, VerifyError>;
}

/// An issuing organization.
#[derive(Clone, Serialize, Deserialize)]
pub struct Institute {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Kind of institution (school, university, ...).
    pub kind: String,
    /// HMAC key for this institute's documents.
    #[serde(default)]
    secret_key: Option<String>,
    /// Registration time (Unix seconds).
    pub created_at: i64,
}

impl Institute {
    /// Check whether a hashing secret is configured.
    #[must_use]
    pub fn has_secret(&self) -> bool {
        self.secret_key.is_some()
    }

    /// Public view without the secret.
    #[must_use]
    pub fn profile(&self) -> InstituteProfile {
        InstituteProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind.clone(),
            has_secret: self.has_secret(),
            created_at: self.created_at,
        }
    }
}

impl fmt::Debug for Institute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Institute")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Institute without its secret, safe to print.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstituteProfile {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Kind of institution.
    pub kind: String,
    /// Whether a hashing secret is configured.
    pub has_secret: bool,
    /// Registration time (Unix seconds).
    pub created_at: i64,
}

/// Someone who registers originals on behalf of an institute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issuer {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact email, unique across issuers.
    pub email: String,
    /// Owning institute.
    pub institute_id: String,
    /// Registration time (Unix seconds).
    pub created_at: i64,
}

/// Someone who submits documents for checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verifier {
    /// Identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Employing organization.
    pub organization: String,
    /// Registration time (Unix seconds).
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegistryState {
    #[serde(default)]
    institutes: BTreeMap<String, Institute>,
    #[serde(default)]
    issuers: BTreeMap<String, Issuer>,
    #[serde(default)]
    verifiers: BTreeMap<String, Verifier>,
}

/// In-memory identity registry with optional JSON persistence.
#[derive(Debug)]
pub struct IdentityRegistry {
    state: RwLock<RegistryState>,
    path: Option<PathBuf>,
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityRegistry {
    /// Memory-only registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            path: None,
        }
    }

    /// Registry persisted under `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::StoreError`] if an existing file cannot be parsed.
    pub fn open(data_dir: &Path) -> Result<Self, VerifyError> {
        let path = data_dir.join(IDENTITIES_FILE);
        let state: RegistryState = load_json(&path)?.unwrap_or_default();
        info!(
            institutes = state.institutes.len(),
            issuers = state.issuers.len(),
            verifiers = state.verifiers.len(),
            "Registry: opened"
        );
        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    /// Register an institute. An empty secret counts as none.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::InvalidIdentity`] if the name is empty.
    pub fn add_institute(
        &self,
        name: &str,
        kind: &str,
        secret_key: Option<&str>,
    ) -> Result<Institute, VerifyError> {
        let name = required("institute name", name)?;
        let institute = Institute {
            id: generate_id("inst"),
            name,
            kind: kind.trim().to_string(),
            secret_key: secret_key.filter(|s| !s.is_empty()).map(str::to_string),
            created_at: now_unix(),
        };

        self.mutate(|state| {
            state
                .institutes
                .insert(institute.id.clone(), institute.clone());
            Ok(())
        })?;
        info!(id = %institute.id, has_secret = institute.has_secret(), "Registry: institute added");
        Ok(institute)
    }

    /// Register an issuer under an existing institute.
    ///
    /// # Errors
    ///
    /// [`VerifyError::InvalidIdentity`] for an empty name, a malformed or
    /// taken email; [`VerifyError::NotFound`] for an unknown institute.
    pub fn add_issuer(
        &self,
        name: &str,
        email: &str,
        institute_id: &str,
    ) -> Result<Issuer, VerifyError> {
        let name = required("issuer name", name)?;
        let email = email.trim().to_ascii_lowercase();
        if !is_plausible_email(&email) {
            return Err(VerifyError::invalid_identity(format!(
                "invalid email: {:?}",
                email
            )));
        }

        let issuer = Issuer {
            id: generate_id("iss"),
            name,
            email,
            institute_id: institute_id.to_string(),
            created_at: now_unix(),
        };

        self.mutate(|state| {
            if !state.institutes.contains_key(institute_id) {
                return Err(VerifyError::not_found("institute", institute_id));
            }
            if state.issuers.values().any(|i| i.email == issuer.email) {
                return Err(VerifyError::invalid_identity(format!(
                    "email already registered: {}",
                    issuer.email
                )));
            }
            state.issuers.insert(issuer.id.clone(), issuer.clone());
            Ok(())
        })?;
        info!(id = %issuer.id, institute_id = %issuer.institute_id, "Registry: issuer added");
        Ok(issuer)
    }

    /// Register a verifier.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::InvalidIdentity`] if the name is empty.
    pub fn add_verifier(&self, name: &str, organization: &str) -> Result<Verifier, VerifyError> {
        let verifier = Verifier {
            id: generate_id("ver"),
            name: required("verifier name", name)?,
            organization: organization.trim().to_string(),
            created_at: now_unix(),
        };
        self.mutate(|state| {
            state.verifiers.insert(verifier.id.clone(), verifier.clone());
            Ok(())
        })?;
        info!(id = %verifier.id, "Registry: verifier added");
        Ok(verifier)
    }

    /// Institute by id.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::NotFound`] if unknown.
    pub fn institute(&self, id: &str) -> Result<Institute, VerifyError> {
        self.lookup(|s| s.institutes.get(id).cloned())?
            .ok_or_else(|| VerifyError::not_found("institute", id))
    }

    /// Issuer by id.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::NotFound`] if unknown.
    pub fn issuer(&self, id: &str) -> Result<Issuer, VerifyError> {
        self.lookup(|s| s.issuers.get(id).cloned())?
            .ok_or_else(|| VerifyError::not_found("issuer", id))
    }

    /// Verifier by id.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::NotFound`] if unknown.
    pub fn verifier(&self, id: &str) -> Result<Verifier, VerifyError> {
        self.lookup(|s| s.verifiers.get(id).cloned())?
            .ok_or_else(|| VerifyError::not_found("verifier", id))
    }

    fn lookup<T>(&self, f: impl FnOnce(&RegistryState) -> T) -> Result<T, VerifyError> {
        let state = self
            .state
            .read()
            .map_err(|_| VerifyError::store("identity registry lock poisoned"))?;
        Ok(f(&state))
    }

    fn mutate(
        &self,
        f: impl FnOnce(&mut RegistryState) -> Result<(), VerifyError>,
    ) -> Result<(), VerifyError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| VerifyError::store("identity registry lock poisoned"))?;
        // Changes land on a copy that replaces the live state only once saved.
        let mut staged = state.clone();
        f(&mut staged)?;
        if let Some(path) = &self.path {
            write_json_atomic(path, &staged)?;
            debug!(path = %path.display(), "Registry: persisted");
        }
        *state = staged;
        Ok(())
    }
}

impl SecretKeyProvider for IdentityRegistry {
    fn secret_for_institute(&self, institute_id: &str) -> Result<String, VerifyError> {
        self.institute(institute_id)?
            .secret_key
            .ok_or_else(|| VerifyError::HashComputation {
                reason: format!("institute {} has no secret key", institute_id),
            })
    }
}

fn required(field: &str, value: &str) -> Result<String, VerifyError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(VerifyError::invalid_identity(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_institute_secret_lookup() {
        let registry = IdentityRegistry::new();
        let keyed = registry
            .add_institute("VJTI", "university", Some("s3cret"))
            .unwrap();
        let unkeyed = registry.add_institute("Night School", "school", Some("")).unwrap();

        assert_eq!(registry.secret_for_institute(&keyed.id).unwrap(), "s3cret");
        assert!(!unkeyed.has_secret());

        let err = registry.secret_for_institute(&unkeyed.id).unwrap_err();
        assert!(err.is_hash_degradation());

        let err = registry.secret_for_institute("inst-missing").unwrap_err();
        assert!(matches!(err, VerifyError::NotFound { kind: "institute", .. }));
    }

    #[test]
    fn test_secret_is_redacted() {
        let registry = IdentityRegistry::new();
        let inst = registry.add_institute("VJTI", "university", Some("s3cret")).unwrap();
        assert!(!format!("{:?}", inst).contains("s3cret"));
        let profile = serde_json::to_string(&inst.profile()).unwrap();
        assert!(!profile.contains("s3cret"));
        assert!(profile.contains("\"has_secret\":true"));
    }

    #[test]
    fn test_issuer_requires_institute_and_unique_email() {
        let registry = IdentityRegistry::new();
        let inst = registry.add_institute("VJTI", "university", Some("k")).unwrap();

        let err = registry
            .add_issuer("Registrar", "reg@vjti.ac.in", "inst-missing")
            .unwrap_err();
        assert!(matches!(err, VerifyError::NotFound { .. }));

        let issuer = registry
            .add_issuer("Registrar", "Reg@VJTI.ac.in", &inst.id)
            .unwrap();
        assert_eq!(issuer.email, "reg@vjti.ac.in");
        assert_eq!(registry.issuer(&issuer.id).unwrap().institute_id, inst.id);

        let err = registry
            .add_issuer("Other", "reg@vjti.ac.in", &inst.id)
            .unwrap_err();
        assert!(err.is_client_error());

        assert!(registry.add_issuer("X", "not-an-email", &inst.id).is_err());
    }

    #[test]
    fn test_verifier_lookup() {
        let registry = IdentityRegistry::new();
        let ver = registry.add_verifier("Acme HR", "Acme Corp").unwrap();
        assert_eq!(registry.verifier(&ver.id).unwrap().organization, "Acme Corp");
        assert!(registry.add_verifier("  ", "Acme").is_err());
        assert!(matches!(
            registry.verifier("ver-missing").unwrap_err(),
            VerifyError::NotFound { kind: "verifier", .. }
        ));
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let (inst_id, ver_id) = {
            let registry = IdentityRegistry::open(dir.path()).unwrap();
            let inst = registry.add_institute("VJTI", "university", Some("k")).unwrap();
            let ver = registry.add_verifier("Acme HR", "Acme").unwrap();
            (inst.id, ver.id)
        };

        let reopened = IdentityRegistry::open(dir.path()).unwrap();
        assert_eq!(reopened.secret_for_institute(&inst_id).unwrap(), "k");
        assert_eq!(reopened.verifier(&ver_id).unwrap().name, "Acme HR");
    }

    #[test]
    fn test_failed_write_keeps_registry_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let registry = IdentityRegistry::open(dir.path()).unwrap();
        let inst = registry.add_institute("VJTI", "university", Some("k")).unwrap();

        let blocker = dir.path().join("identities.json.tmp");
        std::fs::create_dir(&blocker).unwrap();
        let err = registry
            .add_issuer("Registrar", "reg@vjti.ac.in", &inst.id)
            .unwrap_err();
        assert!(matches!(err, VerifyError::StoreError { .. }));

        // The email was never taken, so the retry succeeds and is saved.
        std::fs::remove_dir(&blocker).unwrap();
        let issuer = registry
            .add_issuer("Registrar", "reg@vjti.ac.in", &inst.id)
            .unwrap();

        let reopened = IdentityRegistry::open(dir.path()).unwrap();
        assert_eq!(reopened.issuer(&issuer.id).unwrap().email, "reg@vjti.ac.in");
    }
}
