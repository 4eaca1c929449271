pub mod entropy;
pub mod hasher;
pub mod settings;

pub use entropy::EntropyPool;
pub use hasher::{
    generate_salt, hash, verify, ConcurrencyPolicy, Gate, HashOutcome, HashRequest, Invoker,
    Variant, VerifyOutcome,
};
pub use settings::Settings;
