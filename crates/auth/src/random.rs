use rand::Rng;
use uuid::Uuid;

/// Cryptographically secure randomness for token material.
pub trait RandomSource: Send + Sync {
    /// 32 random bytes, hex encoded (pairing secrets, reset tokens).
    fn secret(&self) -> String;

    /// Fresh unique identifier.
    fn uuid(&self) -> Uuid;
}

/// Thread-local OS-seeded CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn secret(&self) -> String {
        let bytes: [u8; 32] = rand::rng().random();
        hex::encode(bytes)
    }

    fn uuid(&self) -> Uuid {
        Uuid::now_v7()
    }
}
