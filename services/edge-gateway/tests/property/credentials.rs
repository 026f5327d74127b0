//! Property tests for credential assessment.
//!
//! - usability holds exactly when expiry is more than five seconds away
//! - a token signed with any other key is a signature failure, never expiry

use proptest::prelude::*;

use edge_gateway::error::GatewayError;
use edge_gateway::jwt::{EXPIRY_SAFETY_MARGIN_SECS, Role, TokenCodec, Usability};

use crate::common::{SECRET, fixed_now, mint, mint_with, validator};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// *For any* expiry offset, the credential is usable iff it outlives
    /// `now` by more than the safety margin.
    #[test]
    fn usable_iff_beyond_safety_margin(offset in -3_600i64..3_600) {
        let now = fixed_now();
        let token = mint("user-1", Some(Role::User), now.timestamp() + offset);

        prop_assert_eq!(
            validator().is_usable_at(&token, now),
            offset > EXPIRY_SAFETY_MARGIN_SECS
        );
    }

    /// *For any* offset within the margin or past expiry, the credential is
    /// stale rather than invalid, so a refresh may be attempted.
    #[test]
    fn near_expiry_is_stale(offset in -86_400i64..=EXPIRY_SAFETY_MARGIN_SECS) {
        let now = fixed_now();
        let token = mint("user-1", None, now.timestamp() + offset);

        prop_assert!(matches!(validator().assess_at(&token, now), Usability::Stale));
    }

    /// *For any* foreign secret and expiry, verification reports a
    /// signature failure.
    #[test]
    fn foreign_key_is_signature_invalid(
        secret in "[a-zA-Z0-9]{32,64}",
        offset in -86_400i64..86_400,
    ) {
        prop_assume!(secret != SECRET);
        let now = fixed_now();
        let token = mint_with(&secret, "user-1", Some(Role::Admin), now.timestamp() + offset);

        let codec = TokenCodec::new(SECRET.as_bytes()).unwrap();
        prop_assert!(matches!(
            codec.verify_at(&token, now),
            Err(GatewayError::SignatureInvalid)
        ));
        prop_assert!(!validator().is_usable_at(&token, now));
    }

    /// *For any* input string, assessment never panics and garbage is never usable.
    #[test]
    fn garbage_is_never_usable(token in ".{0,200}") {
        prop_assert!(!validator().is_usable_at(&token, fixed_now()));
    }
}
