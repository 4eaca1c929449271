use anyhow::Result;
use argon2::password_hash::SaltString;
use argon2::{password_hash, Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use clap::ValueEnum;
use console::Term;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::entropy::EntropyPool;

pub const SALT_LEN: usize = 32;
pub const FRESH_SALT_LEN: usize = 16;

/// Argon2 variant. Passed explicitly with every request; there is no
/// process-global algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Id,
    I,
    D,
}

impl Variant {
    pub fn algorithm(self) -> Algorithm {
        match self {
            Variant::Id => Algorithm::Argon2id,
            Variant::I => Algorithm::Argon2i,
            Variant::D => Algorithm::Argon2d,
        }
    }

    /// Infers the variant from an encoded hash's leading tag. Strings
    /// without a recognized tag are treated as Argon2d.
    pub fn from_encoded(encoded: &str) -> Self {
        if encoded.starts_with("$argon2id$") {
            Variant::Id
        } else if encoded.starts_with("$argon2i$") {
            Variant::I
        } else {
            Variant::D
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Variant::Id => "argon2id",
            Variant::I => "argon2i",
            Variant::D => "argon2d",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HashRequest<'a> {
    pub password: &'a [u8],
    pub time_cost: u32,
    pub memory_cost_kib: u32,
    pub parallelism: u32,
    pub output_len: usize,
    pub salt: [u8; SALT_LEN],
    pub variant: Variant,
}

/// Assembles a 32-byte salt: 16 fresh bytes from the OS random source
/// followed by 16 bytes drawn from the entropy pool. A failed read is
/// reported as a warning; the pooled half still contributes.
pub fn generate_salt(pool: &EntropyPool) -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];

    if let Err(e) = OsRng.try_fill_bytes(&mut salt[..FRESH_SALT_LEN]) {
        let term = Term::stderr();
        term.write_line(&format!(
            "WARNING: system random source returned fewer bytes than requested ({e}); \
             salt entropy is degraded"
        ))
        .ok();
    }

    salt[FRESH_SALT_LEN..].copy_from_slice(&pool.salt_material());
    salt
}

/// Computes the PHC-encoded hash for the request. Synchronous and
/// blocking; duration grows with time and memory cost. The caller is
/// expected to have clamped the parameters to valid ranges.
pub fn hash(request: &HashRequest<'_>) -> Result<String> {
    let params = Params::new(
        request.memory_cost_kib,
        request.time_cost,
        request.parallelism,
        Some(request.output_len),
    )
    .map_err(|e| anyhow::anyhow!("Invalid {} parameters: {e}", request.variant.tag()))?;

    let argon2 = Argon2::new(request.variant.algorithm(), Version::V0x13, params);

    let salt = SaltString::encode_b64(&request.salt)
        .map_err(|e| anyhow::anyhow!("Salt encoding failed: {e}"))?;

    let encoded = argon2
        .hash_password(request.password, &salt)
        .map_err(|e| anyhow::anyhow!("{} hashing failed: {e}", request.variant.tag()))?;

    Ok(encoded.to_string())
}

/// Verifies a password against an encoded hash. Whitespace and newlines
/// are stripped from the encoded input before parsing. Returns `Ok(false)`
/// on a mismatch; malformed input or a library failure is an error.
pub fn verify(encoded: &str, password: &[u8]) -> Result<bool> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let variant = Variant::from_encoded(&cleaned);

    let parsed = PasswordHash::new(&cleaned)
        .map_err(|e| anyhow::anyhow!("Unparseable {} hash: {e}", variant.tag()))?;

    let argon2 = Argon2::new(variant.algorithm(), Version::V0x13, Params::default());

    match argon2.verify_password(password, &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("{} verification failed: {e}", variant.tag())),
    }
}

/// Explicit Idle/Busy token. Acquisition is a single atomic check-and-set
/// so the guard stays correct even if event dispatch ever becomes
/// concurrent.
#[derive(Debug, Default)]
pub struct Gate {
    busy: AtomicBool,
}

pub struct GatePass<'a> {
    gate: &'a Gate,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Transitions Idle -> Busy. Returns `None` when already Busy. The
    /// returned pass restores Idle on drop.
    pub fn try_acquire(&self) -> Option<GatePass<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| GatePass { gate: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }
}

impl Drop for GatePass<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

/// Whether verification shares the busy gate with hashing. Hashing is
/// always gated; verification is unguarded unless opted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyPolicy {
    GuardHashOnly,
    GuardAll,
}

#[derive(Debug, PartialEq, Eq)]
pub enum HashOutcome {
    Encoded(String),
    Busy,
}

#[derive(Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Match,
    Mismatch,
    Busy,
}

/// Gated entry point for hash and verify requests. A hash request that
/// arrives while Busy is dropped without queuing or cancellation.
pub struct Invoker {
    gate: Gate,
    policy: ConcurrencyPolicy,
}

impl Invoker {
    pub fn new(policy: ConcurrencyPolicy) -> Self {
        Self {
            gate: Gate::new(),
            policy,
        }
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn hash(&self, request: &HashRequest<'_>) -> Result<HashOutcome> {
        let Some(_pass) = self.gate.try_acquire() else {
            return Ok(HashOutcome::Busy);
        };

        hash(request).map(HashOutcome::Encoded)
    }

    pub fn verify(&self, encoded: &str, password: &[u8]) -> Result<VerifyOutcome> {
        let _pass = match self.policy {
            ConcurrencyPolicy::GuardAll => match self.gate.try_acquire() {
                Some(pass) => Some(pass),
                None => return Ok(VerifyOutcome::Busy),
            },
            ConcurrencyPolicy::GuardHashOnly => None,
        };

        verify(encoded, password).map(|matched| {
            if matched {
                VerifyOutcome::Match
            } else {
                VerifyOutcome::Mismatch
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_request<'a>(password: &'a [u8], salt: [u8; SALT_LEN], variant: Variant) -> HashRequest<'a> {
        HashRequest {
            password,
            time_cost: 1,
            memory_cost_kib: 1024,
            parallelism: 1,
            output_len: 32,
            salt,
            variant,
        }
    }

    #[test]
    fn test_variant_from_encoded_id() {
        assert_eq!(Variant::from_encoded("$argon2id$v=19$m=65536,t=2,p=1$abc$def"), Variant::Id);
    }

    #[test]
    fn test_variant_from_encoded_i() {
        assert_eq!(Variant::from_encoded("$argon2i$v=19$m=65536,t=2,p=1$abc$def"), Variant::I);
    }

    #[test]
    fn test_variant_from_encoded_defaults_to_d() {
        assert_eq!(Variant::from_encoded("$argon2d$v=19$m=8,t=1,p=1$abc$def"), Variant::D);
        assert_eq!(Variant::from_encoded("not an encoded hash"), Variant::D);
        assert_eq!(Variant::from_encoded(""), Variant::D);
    }

    #[test]
    fn test_hash_deterministic_for_fixed_salt() {
        let salt = [7u8; SALT_LEN];
        let request = small_request(b"correct horse", salt, Variant::Id);

        let first = hash(&request).unwrap();
        let second = hash(&request).unwrap();

        assert_eq!(first, second);
        assert!(first.starts_with("$argon2id$"));
    }

    #[test]
    fn test_hash_variants_carry_their_tag() {
        let salt = [9u8; SALT_LEN];

        let id = hash(&small_request(b"pw", salt, Variant::Id)).unwrap();
        let i = hash(&small_request(b"pw", salt, Variant::I)).unwrap();
        let d = hash(&small_request(b"pw", salt, Variant::D)).unwrap();

        assert!(id.starts_with("$argon2id$"));
        assert!(i.starts_with("$argon2i$"));
        assert!(d.starts_with("$argon2d$"));
        assert_ne!(id, i);
        assert_ne!(i, d);
    }

    #[test]
    fn test_hash_then_verify_roundtrip() {
        let salt = [3u8; SALT_LEN];
        let encoded = hash(&small_request(b"correct horse", salt, Variant::Id)).unwrap();

        assert!(verify(&encoded, b"correct horse").unwrap());
        assert!(!verify(&encoded, b"wrong password").unwrap());
    }

    #[test]
    fn test_verify_rejects_mutated_password() {
        let salt = [5u8; SALT_LEN];
        let encoded = hash(&small_request(b"hunter2", salt, Variant::I)).unwrap();

        assert!(verify(&encoded, b"hunter2").unwrap());
        assert!(!verify(&encoded, b"hunter3").unwrap());
        assert!(!verify(&encoded, b"Hunter2").unwrap());
        assert!(!verify(&encoded, b"hunter").unwrap());
    }

    #[test]
    fn test_verify_strips_whitespace() {
        let salt = [11u8; SALT_LEN];
        let encoded = hash(&small_request(b"pw", salt, Variant::Id)).unwrap();

        let padded = format!("  {}\t\n", encoded);
        assert!(verify(&padded, b"pw").unwrap());

        let wrapped = encoded.replace("$v=19$", "$v=19$\r\n");
        assert!(verify(&wrapped, b"pw").unwrap());
    }

    #[test]
    fn test_verify_rejects_garbage_input() {
        assert!(verify("not an encoded hash", b"pw").is_err());
        assert!(verify("", b"pw").is_err());
    }

    #[test]
    fn test_generate_salt_layout() {
        let mut pool = EntropyPool::initialize();
        pool.fold("Parallelism (2 threads)");

        let salt = generate_salt(&pool);
        assert_eq!(&salt[FRESH_SALT_LEN..], &pool.salt_material()[..]);

        let again = generate_salt(&pool);
        assert_ne!(&salt[..FRESH_SALT_LEN], &again[..FRESH_SALT_LEN]);
        assert_eq!(&salt[FRESH_SALT_LEN..], &again[FRESH_SALT_LEN..]);
    }

    #[test]
    fn test_gate_transitions() {
        let gate = Gate::new();
        assert!(!gate.is_busy());

        let pass = gate.try_acquire().unwrap();
        assert!(gate.is_busy());
        assert!(gate.try_acquire().is_none());

        drop(pass);
        assert!(!gate.is_busy());
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn test_invoker_hash_while_busy_is_noop() {
        let invoker = Invoker::new(ConcurrencyPolicy::GuardHashOnly);
        let _held = invoker.gate().try_acquire().unwrap();

        let request = small_request(b"pw", [1u8; SALT_LEN], Variant::Id);
        assert_eq!(invoker.hash(&request).unwrap(), HashOutcome::Busy);
    }

    #[test]
    fn test_invoker_verify_unguarded_by_default() {
        let invoker = Invoker::new(ConcurrencyPolicy::GuardHashOnly);
        let encoded = hash(&small_request(b"pw", [2u8; SALT_LEN], Variant::Id)).unwrap();

        let _held = invoker.gate().try_acquire().unwrap();
        assert_eq!(invoker.verify(&encoded, b"pw").unwrap(), VerifyOutcome::Match);
    }

    #[test]
    fn test_invoker_verify_guarded_when_opted_in() {
        let invoker = Invoker::new(ConcurrencyPolicy::GuardAll);
        let encoded = hash(&small_request(b"pw", [2u8; SALT_LEN], Variant::Id)).unwrap();

        {
            let _held = invoker.gate().try_acquire().unwrap();
            assert_eq!(invoker.verify(&encoded, b"pw").unwrap(), VerifyOutcome::Busy);
        }

        assert_eq!(invoker.verify(&encoded, b"pw").unwrap(), VerifyOutcome::Match);
    }

    #[test]
    fn test_invoker_gate_released_after_hash() {
        let invoker = Invoker::new(ConcurrencyPolicy::GuardHashOnly);
        let request = small_request(b"pw", [4u8; SALT_LEN], Variant::D);

        match invoker.hash(&request).unwrap() {
            HashOutcome::Encoded(encoded) => assert!(encoded.starts_with("$argon2d$")),
            HashOutcome::Busy => panic!("gate should have been idle"),
        }

        assert!(!invoker.gate().is_busy());
    }

    #[test]
    fn test_reference_parameters() {
        let mut pool = EntropyPool::initialize();
        pool.fold("Hash length (64 B)");

        let request = HashRequest {
            password: b"correct horse",
            time_cost: 16,
            memory_cost_kib: 32 * 1024,
            parallelism: 2,
            output_len: 64,
            salt: generate_salt(&pool),
            variant: Variant::Id,
        };

        let encoded = hash(&request).unwrap();
        assert!(encoded.starts_with("$argon2id$"));
        assert!(encoded.contains("m=32768,t=16,p=2"));

        assert!(verify(&encoded, b"correct horse").unwrap());
        assert!(!verify(&encoded, b"wrong password").unwrap());
    }
}
