// ============================
// crates/backend-lib/src/auth/token_generator.rs
// ============================
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
/** Secure token generation for session bearer tokens
Tokens are opaque: they carry no structure, only OS-provided entropy. */
use rand::{rngs::OsRng, RngCore};

/// Session token size in bytes (32 bytes = 256 bits of entropy)
pub const SESSION_TOKEN_BYTES: usize = 32;

/** Generate a cryptographically secure random session token
# Returns
A base64 URL-safe encoded string without padding */
pub fn generate_secure_token() -> String {
    generate_secure_token_with_size(SESSION_TOKEN_BYTES)
}

/** Generate a cryptographically secure random token with specified size
# Arguments
* `bytes` - The size of the random token in bytes */
pub fn generate_secure_token_with_size(bytes: usize) -> String {
    let mut buffer = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buffer);
    URL_SAFE_NO_PAD.encode(buffer)
}

/// Fill `buf` with OS randomness. Used for salts.
pub(crate) fn fill_random(buf: &mut [u8]) {
    OsRng.fill_bytes(buf);
}
