use base64::Engine as _;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const TOKEN_PREFIX: &str = "deploys-api.";
pub const GOOGLE_ACCESS_TOKEN_PREFIX: &str = "ya29.";

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    buf
}

/// Opaque bearer token: prefix + base64url(32 random bytes).
pub fn generate_token() -> String {
    format!(
        "{}{}",
        TOKEN_PREFIX,
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes::<32>())
    )
}

/// Nonce sent to the identity provider, 32 hex chars.
pub fn generate_state() -> String {
    hex::encode(random_bytes::<16>())
}

pub fn generate_session_id() -> String {
    hex::encode(random_bytes::<32>())
}

pub fn generate_code() -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(random_bytes::<32>())
}

/// SHA-256 of the token, base64url without padding. This is the token store's primary key.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// A bearer credential classified by its prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedToken {
    /// Issued by this broker; validated by hash lookup.
    Broker { hash: String },
    /// Raw Google access token; validated by introspection.
    GoogleAccess(String),
    Malformed,
}

impl ParsedToken {
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        match token {
            t if t.len() > TOKEN_PREFIX.len() && t.starts_with(TOKEN_PREFIX) => {
                ParsedToken::Broker { hash: hash_token(t) }
            }
            t if t.len() > GOOGLE_ACCESS_TOKEN_PREFIX.len() && t.starts_with(GOOGLE_ACCESS_TOKEN_PREFIX) => {
                ParsedToken::GoogleAccess(t.to_string())
            }
            _ => ParsedToken::Malformed,
        }
    }
}

/// Extracts the credential from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let header = header.trim();
    let (scheme, rest) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_known_digest() {
        // sha256("abc") = ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad
        assert_eq!(hash_token("abc"), "ungWv48Bz-pBQUDeXa4iI7ADYaOWF3qctBD_YfIAFa0");
    }

    #[test]
    fn generated_token_shape() {
        let token = generate_token();
        let payload = token.strip_prefix(TOKEN_PREFIX).expect("prefix");
        assert_eq!(payload.len(), 43);
        assert!(!payload.contains('=') && !payload.contains('+') && !payload.contains('/'));
        assert_ne!(generate_token(), token);
    }

    #[test]
    fn state_is_32_hex_chars() {
        let state = generate_state();
        assert_eq!(state.len(), 32);
        assert!(state.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(generate_session_id().len(), 64);
    }

    #[test]
    fn parse_dispatches_on_prefix() {
        let token = generate_token();
        assert_eq!(ParsedToken::parse(&token), ParsedToken::Broker { hash: hash_token(&token) });
        assert_eq!(
            ParsedToken::parse("ya29.a0AfH6"),
            ParsedToken::GoogleAccess("ya29.a0AfH6".to_string())
        );
        assert_eq!(ParsedToken::parse("deploys-api."), ParsedToken::Malformed);
        assert_eq!(ParsedToken::parse("gho_abcdef"), ParsedToken::Malformed);
        assert_eq!(ParsedToken::parse(""), ParsedToken::Malformed);
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token(""), None);
    }
}
