use thiserror::Error;
use tokio::task;

/// bcrypt work factor used for passwords and one-time codes.
pub const DEFAULT_COST: u32 = 10;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("hashing task was cancelled: {0}")]
    Join(#[from] task::JoinError),
}

/// Hashes and checks secrets off the async executor.
#[derive(Debug, Clone, Copy)]
pub struct Hasher {
    cost: u32,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}

impl Hasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, secret: &str) -> Result<String, CredentialError> {
        let secret = secret.to_owned();
        let cost = self.cost;
        let hashed = task::spawn_blocking(move || bcrypt::hash(secret, cost)).await??;
        Ok(hashed)
    }

    pub async fn verify(&self, secret: &str, hash: &str) -> Result<bool, CredentialError> {
        let secret = secret.to_owned();
        let hash = hash.to_owned();
        let matches = task::spawn_blocking(move || bcrypt::verify(secret, &hash)).await??;
        Ok(matches)
    }
}
