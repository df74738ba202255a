//! Ed25519 device identity.
//!
//! The device signs every credential it issues so a claimant can check the
//! credential came from this device. The signing key is a 32-byte seed kept
//! in the state directory; it is generated on first start.

use std::{
    fs::{self, OpenOptions},
    io::{self, ErrorKind, Write},
    path::{Path, PathBuf},
};

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use latch_core::{
    BlessingName, DeviceIdentity, Environment, IdentityError, IssuedCredential,
};

use crate::error::ServerError;

/// Domain separation prefix for issued blessing signatures.
const BLESSING_CONTEXT: &[u8] = b"latch blessing v1\0";

/// Size of the persisted seed.
const SEED_SIZE: usize = 32;

fn signed_message(blessing: &BlessingName) -> Vec<u8> {
    let mut message = Vec::with_capacity(BLESSING_CONTEXT.len() + blessing.as_str().len());
    message.extend_from_slice(BLESSING_CONTEXT);
    message.extend_from_slice(blessing.as_str().as_bytes());
    message
}

/// Device identity backed by an Ed25519 key.
pub struct SigningIdentity {
    name: BlessingName,
    key: SigningKey,
}

impl SigningIdentity {
    /// Identity from an explicit seed.
    pub fn from_seed(name: BlessingName, seed: [u8; SEED_SIZE]) -> Self {
        Self { name, key: SigningKey::from_bytes(&seed) }
    }

    /// Fresh identity with a seed drawn from `env`.
    pub fn generate(name: BlessingName, env: &impl Environment) -> Result<Self, ServerError> {
        let mut seed = [0u8; SEED_SIZE];
        env.random_bytes(&mut seed);
        if seed.iter().all(|&b| b == 0) {
            return Err(ServerError::Identity("entropy source returned an all-zero seed".into()));
        }
        Ok(Self::from_seed(name, seed))
    }

    /// Load the seed at `path`, or generate and persist one.
    pub fn load_or_generate(
        path: &Path,
        name: BlessingName,
        env: &impl Environment,
    ) -> Result<Self, ServerError> {
        match fs::read(path) {
            Ok(bytes) => {
                let seed: [u8; SEED_SIZE] = bytes.as_slice().try_into().map_err(|_| {
                    ServerError::Identity(format!(
                        "{}: expected {} byte seed, found {}",
                        path.display(),
                        SEED_SIZE,
                        bytes.len()
                    ))
                })?;
                tracing::info!("loaded device identity from {}", path.display());
                Ok(Self::from_seed(name, seed))
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let identity = Self::generate(name, env)?;
                write_seed(path, &identity.key.to_bytes())?;
                tracing::info!("generated new device identity at {}", path.display());
                Ok(identity)
            },
            Err(e) => Err(ServerError::Identity(format!("{}: {}", path.display(), e))),
        }
    }

    /// Public half of the device key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

fn write_seed(path: &Path, seed: &[u8; SEED_SIZE]) -> Result<(), ServerError> {
    let failed = |e: io::Error| ServerError::Identity(format!("{}: {}", path.display(), e));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(failed)?;
    }

    let tmp: PathBuf = path.with_extension("tmp");
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&tmp).map_err(failed)?;
    file.write_all(seed).map_err(failed)?;
    file.sync_all().map_err(failed)?;
    drop(file);

    fs::rename(&tmp, path).map_err(failed)?;
    Ok(())
}

impl DeviceIdentity for SigningIdentity {
    fn name(&self) -> &BlessingName {
        &self.name
    }

    fn extend_with(&self, extension: &BlessingName) -> Result<IssuedCredential, IdentityError> {
        let blessing = self.name.extend(extension)?;
        let signature = self.key.sign(&signed_message(&blessing));

        let mut issued = IssuedCredential::unsigned(blessing);
        issued.issuer_key = self.key.verifying_key().to_bytes().to_vec();
        issued.signature = signature.to_bytes().to_vec();
        Ok(issued)
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("name", &self.name)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Check that `issued` carries a valid signature from its stated issuer.
pub fn verify_issued(issued: &IssuedCredential) -> bool {
    let Ok(key_bytes) = <[u8; 32]>::try_from(issued.issuer_key.as_slice()) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&issued.signature) else {
        return false;
    };
    key.verify(&signed_message(&issued.blessing), &signature).is_ok()
}
