use rand::distributions::Alphanumeric;
use rand::Rng;

/// Four digit numeric code, as mailed to users.
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

/// Opaque random token for OAuth state and CSRF checks.
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
