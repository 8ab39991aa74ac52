use reservo_core::{DomainError, DomainResult};

/// One-way password hashing.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain: &str) -> DomainResult<String>;

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
    fn verify(&self, plain: &str, hash: &str) -> DomainResult<bool>;
}

/// bcrypt with a configurable work factor.
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, plain: &str) -> DomainResult<String> {
        bcrypt::hash(plain, self.cost).map_err(|e| DomainError::internal(format!("password hashing failed: {e}")))
    }

    fn verify(&self, plain: &str, hash: &str) -> DomainResult<bool> {
        bcrypt::verify(plain, hash).map_err(|e| DomainError::internal(format!("password verification failed: {e}")))
    }
}
