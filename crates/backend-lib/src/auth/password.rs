// ============================
// crates/backend-lib/src/auth/password.rs
// ============================
//! Password hashing and verification.
//!
//! Hashes are PBKDF2-HMAC-SHA256 encoded as
//! `$pbkdf2$<iterations>$<base64 salt>$<base64 key>`. The iteration count
//! travels with each hash, so raising the configured cost never invalidates
//! stored credentials.
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;
use zeroize::Zeroizing;

use super::token_generator::fill_random;

/// Algorithm tag carried in the second segment of every hash
pub const ALGORITHM_TAG: &str = "pbkdf2";

/// Default PBKDF2 iteration count
pub const DEFAULT_ITERATIONS: u32 = 10_000;

/// Lowest iteration count accepted by configuration
pub const MIN_ITERATIONS: u32 = 1_000;

/// Stored hashes claiming more rounds than this are rejected outright
const MAX_ITERATIONS: u32 = 10_000_000;

/// Salt size in bytes
pub const SALT_LEN: usize = 16;

/// Derived key size in bytes (256 bits)
pub const KEY_LEN: usize = 32;

/// Length of the unsalted hex SHA-256 digests written by the first schema
const LEGACY_DIGEST_LEN: usize = 64;

/// Derives and verifies password hashes
#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    iterations: u32,
}

impl Default for CredentialHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

/// The pieces of a well-formed stored hash
struct ParsedHash {
    iterations: u32,
    salt: Vec<u8>,
    key: Vec<u8>,
}

impl CredentialHasher {
    /// Create a hasher deriving new hashes with `iterations` rounds
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        fill_random(&mut salt);
        let key = derive(password, &salt, self.iterations);
        encode(self.iterations, &salt, key.as_slice())
    }

    /// Verify a password against a stored hash.
    ///
    /// Anything that does not parse as a current-format hash verifies as
    /// `false`, after a derivation at the configured cost so the rejection
    /// takes as long as a real mismatch.
    pub fn verify(&self, password: &str, encoded: &str) -> bool {
        let Some(parsed) = parse(encoded) else {
            derive(password, &[0u8; SALT_LEN], self.iterations);
            return false;
        };
        let actual = derive(password, &parsed.salt, parsed.iterations);
        parsed.key.ct_eq(actual.as_slice()).into()
    }

    /// Whether a stored hash should be replaced on the next successful login
    pub fn needs_rehash(&self, encoded: &str) -> bool {
        parse(encoded).map_or(true, |parsed| parsed.iterations < self.iterations)
    }

    /// A well-formed hash at the configured cost that no password matches.
    ///
    /// Verifying against it costs the same derivation as a real account.
    pub fn decoy_hash(&self) -> String {
        encode(self.iterations, &[0u8; SALT_LEN], &[0u8; KEY_LEN])
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, key.as_mut_slice());
    key
}

fn encode(iterations: u32, salt: &[u8], key: &[u8]) -> String {
    format!(
        "${ALGORITHM_TAG}${iterations}${}${}",
        STANDARD.encode(salt),
        STANDARD.encode(key)
    )
}

fn parse(encoded: &str) -> Option<ParsedHash> {
    if encoded.len() == LEGACY_DIGEST_LEN && !encoded.contains('$') {
        warn!("legacy unsalted password hash rejected; account needs a password reset");
        return None;
    }

    let mut segments = encoded.split('$');
    let (Some(""), Some(ALGORITHM_TAG), Some(iterations), Some(salt), Some(key), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let iterations: u32 = iterations.parse().ok()?;
    if iterations == 0 || iterations > MAX_ITERATIONS {
        return None;
    }
    let salt = STANDARD.decode(salt).ok()?;
    let key = STANDARD.decode(key).ok()?;
    if salt.is_empty() || key.is_empty() {
        return None;
    }

    Some(ParsedHash {
        iterations,
        salt,
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Low cost keeps the suite fast; the format is identical.
    fn hasher() -> CredentialHasher {
        CredentialHasher::new(MIN_ITERATIONS)
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let hash = hasher.hash("correct horse battery");
        assert!(hasher.verify("correct horse battery", &hash));
        assert!(!hasher.verify("correct horse battery!", &hash));
        assert!(!hasher.verify("", &hash));
    }

    #[test]
    fn test_hash_is_salted() {
        let hasher = hasher();
        let first = hasher.hash("repeat-me-please");
        let second = hasher.hash("repeat-me-please");
        assert_ne!(first, second);
        assert!(hasher.verify("repeat-me-please", &first));
        assert!(hasher.verify("repeat-me-please", &second));
    }

    #[test]
    fn test_encoded_layout() {
        let hash = hasher().hash("layout-check");
        let segments: Vec<&str> = hash.split('$').collect();
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0], "");
        assert_eq!(segments[1], "pbkdf2");
        assert_eq!(segments[2], MIN_ITERATIONS.to_string());
        assert_eq!(STANDARD.decode(segments[3]).unwrap().len(), SALT_LEN);
        assert_eq!(STANDARD.decode(segments[4]).unwrap().len(), KEY_LEN);
    }

    #[test]
    fn test_malformed_hashes_fail_closed() {
        let hasher = hasher();
        let valid = hasher.hash("secret-value");
        let parts: Vec<&str> = valid.split('$').collect();

        let cases = vec![
            "garbage".to_string(),
            String::new(),
            "$pbkdf2$".to_string(),
            format!("$bcrypt${}${}${}", parts[2], parts[3], parts[4]),
            format!("$pbkdf2${}${}", parts[2], parts[3]),
            format!("{valid}$extra"),
            format!("x$pbkdf2${}${}${}", parts[2], parts[3], parts[4]),
            format!("$pbkdf2$ten${}${}", parts[3], parts[4]),
            format!("$pbkdf2$0${}${}", parts[3], parts[4]),
            format!("$pbkdf2$-5${}${}", parts[3], parts[4]),
            format!("$pbkdf2$99999999999${}${}", parts[3], parts[4]),
            format!("$pbkdf2${}$!!not-base64!!${}", parts[2], parts[4]),
            format!("$pbkdf2${}${}$", parts[2], parts[3]),
        ];
        for case in cases {
            assert!(!hasher.verify("secret-value", &case), "accepted {case:?}");
        }
    }

    #[test]
    fn test_legacy_digest_rejected() {
        // hex SHA-256 of "password"
        let legacy = "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8";
        assert_eq!(legacy.len(), 64);
        assert!(!hasher().verify("password", legacy));
        assert!(hasher().needs_rehash(legacy));
    }

    #[test]
    fn test_iteration_count_is_per_hash() {
        let old = CredentialHasher::new(MIN_ITERATIONS);
        let stronger = CredentialHasher::new(MIN_ITERATIONS * 2);
        let hash = old.hash("carried-over");

        assert!(stronger.verify("carried-over", &hash));
        assert!(stronger.needs_rehash(&hash));
        assert!(!old.needs_rehash(&hash));
        assert!(!stronger.needs_rehash(&stronger.hash("carried-over")));
    }

    #[test]
    fn test_decoy_hash_never_verifies() {
        let hasher = hasher();
        let decoy = hasher.decoy_hash();
        assert!(!hasher.verify("", &decoy));
        assert!(!hasher.verify("anything", &decoy));
        assert!(!hasher.needs_rehash(&decoy));
    }

    #[test]
    fn test_tampered_key_rejected() {
        let hasher = hasher();
        let hash = hasher.hash("tamper");
        let (head, key) = hash.rsplit_once('$').unwrap();
        let mut bytes = STANDARD.decode(key).unwrap();
        bytes[KEY_LEN - 1] ^= 0x01;
        let tampered = format!("{head}${}", STANDARD.encode(&bytes));
        assert!(!hasher.verify("tamper", &tampered));

        // a truncated key is a length mismatch, not a panic
        let truncated = format!("{head}${}", STANDARD.encode(&bytes[..16]));
        assert!(!hasher.verify("tamper", &truncated));
    }

    #[test]
    fn test_unparsable_hash_costs_a_derivation() {
        fn fastest_of_three(mut f: impl FnMut()) -> std::time::Duration {
            (0..3)
                .map(|_| {
                    let start = std::time::Instant::now();
                    f();
                    start.elapsed()
                })
                .min()
                .unwrap()
        }

        let hasher = CredentialHasher::new(200_000);
        let decoy = hasher.decoy_hash();
        let legacy = "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8";

        let real = fastest_of_three(|| assert!(!hasher.verify("password", &decoy)));
        let rejected = fastest_of_three(|| assert!(!hasher.verify("password", legacy)));
        let garbage = fastest_of_three(|| assert!(!hasher.verify("password", "$md5$x")));

        assert!(rejected * 4 >= real, "legacy {rejected:?} vs decoy {real:?}");
        assert!(garbage * 4 >= real, "malformed {garbage:?} vs decoy {real:?}");
    }
}
