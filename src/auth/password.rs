use tracing::error;

/// bcrypt work factor for stored pins.
pub const HASH_COST: u32 = 10;

pub fn hash_pin(plain: &str) -> anyhow::Result<String> {
    bcrypt::hash(plain, HASH_COST).map_err(|e| {
        error!(error = %e, "bcrypt hash error");
        anyhow::anyhow!(e.to_string())
    })
}

/// Returns `Ok(false)` on mismatch; errors only when `hash` is not a bcrypt hash.
pub fn verify_pin(plain: &str, hash: &str) -> anyhow::Result<bool> {
    bcrypt::verify(plain, hash).map_err(|e| {
        error!(error = %e, "bcrypt verify error");
        anyhow::anyhow!(e.to_string())
    })
}
