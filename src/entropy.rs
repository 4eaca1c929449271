use blake2::{Blake2s256, Digest};
use console::Term;
use rand::rngs::OsRng;
use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const POOL_LEN: usize = 32;
pub const SALT_CONTRIBUTION_LEN: usize = 16;

/// Rolling 32-byte secret seeded from the OS random source and folded on
/// every recognized interaction event. Supplementary salt material only;
/// the OS random source remains the root of trust.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EntropyPool {
    pool: [u8; POOL_LEN],
}

impl EntropyPool {
    /// Seeds the pool from the platform CSPRNG and folds in the startup
    /// timestamp. A failed read is reported as a warning and the pool
    /// continues with a degraded seed; it is never fatal.
    pub fn initialize() -> Self {
        let mut seed = [0u8; POOL_LEN];
        if let Err(e) = OsRng.try_fill_bytes(&mut seed) {
            let term = Term::stderr();
            term.write_line(&format!(
                "WARNING: system random source returned fewer bytes than requested ({e}); \
                 continuing with a degraded entropy seed"
            ))
            .ok();
        }

        let mut pool = Self { pool: seed };
        pool.fold("startup");
        pool
    }

    /// Replaces the pool with the 256-bit digest of (current pool,
    /// material, millisecond timestamp). One-way; the previous value is
    /// unrecoverable from the new one.
    pub fn fold(&mut self, material: &str) {
        let mut hasher = Blake2s256::new();
        hasher.update(self.pool);
        hasher.update(material.as_bytes());
        hasher.update(timestamp_millis().to_le_bytes());
        self.pool.copy_from_slice(&hasher.finalize());
    }

    /// First 16 bytes of the current pool, used as the trailing half of a
    /// hash salt. The pool itself is never exposed whole.
    pub fn salt_material(&self) -> [u8; SALT_CONTRIBUTION_LEN] {
        let mut out = [0u8; SALT_CONTRIBUTION_LEN];
        out.copy_from_slice(&self.pool[..SALT_CONTRIBUTION_LEN]);
        out
    }
}

fn timestamp_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
