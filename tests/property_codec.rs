//! Property-based tests for the refresh token wire format.

#![allow(clippy::unwrap_used, unreachable_pub)]

use ipbound_auth::services::credential_codec::{CredentialCodec, REFRESH_SECRET_LEN};
use proptest::prelude::*;
use uuid::Uuid;

fn arb_token_id() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

fn arb_secret() -> impl Strategy<Value = [u8; REFRESH_SECRET_LEN]> {
    any::<[u8; REFRESH_SECRET_LEN]>()
}

fn arb_base64url_char() -> impl Strategy<Value = char> {
    prop_oneof![
        (b'A'..=b'Z').prop_map(char::from),
        (b'a'..=b'z').prop_map(char::from),
        (b'0'..=b'9').prop_map(char::from),
        Just('-'),
        Just('_'),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Encoding then decoding yields the identifier and secret unchanged.
    #[test]
    fn prop_decode_recovers_encoded_pair(id in arb_token_id(), secret in arb_secret()) {
        let token = CredentialCodec::encode_refresh_token(id, &secret);
        let (decoded_id, decoded_secret) = CredentialCodec::decode_refresh_token(&token).unwrap();

        prop_assert_eq!(decoded_id, id);
        prop_assert_eq!(decoded_secret.as_slice(), secret.as_slice());
    }

    /// The token only uses the URL-safe alphabet and carries no padding.
    #[test]
    fn prop_token_is_url_safe(id in arb_token_id(), secret in arb_secret()) {
        let token = CredentialCodec::encode_refresh_token(id, &secret);
        prop_assert!(token.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
    }

    /// A single substituted character never decodes back to the original pair.
    #[test]
    fn prop_substitution_changes_or_breaks_token(
        id in arb_token_id(),
        secret in arb_secret(),
        pos in any::<prop::sample::Index>(),
        replacement in arb_base64url_char(),
    ) {
        let token = CredentialCodec::encode_refresh_token(id, &secret);
        let pos = pos.index(token.len());
        prop_assume!(token.as_bytes()[pos] != replacement as u8);

        let mut tampered = token.into_bytes();
        tampered[pos] = replacement as u8;
        let tampered = String::from_utf8(tampered).unwrap();

        if let Ok((decoded_id, decoded_secret)) = CredentialCodec::decode_refresh_token(&tampered) {
            prop_assert!(decoded_id != id || decoded_secret.as_slice() != secret.as_slice());
        }
    }

    /// Arbitrary strings never panic the decoder.
    #[test]
    fn prop_decode_arbitrary_input_does_not_panic(input in ".{0,200}") {
        let _ = CredentialCodec::decode_refresh_token(&input);
    }
}
