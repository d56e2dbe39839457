//! Admin credential gate for mutating API actions.

use crate::brand::Brand;
use crate::proxy::action::ApiAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    MissingCredential,
    BadCredential,
    AdminDisabled,
}

impl DenyReason {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingCredential => "admin key required",
            Self::BadCredential => "invalid admin key",
            Self::AdminDisabled => "admin actions are disabled for this brand",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

/// Read-only actions pass; mutating actions need the brand's admin key.
#[must_use]
pub fn authorize(brand: &Brand, action: ApiAction, credential: Option<&str>) -> Decision {
    if !action.is_mutating() {
        return Decision::Allow;
    }
    let Some(expected) = brand.admin_key() else {
        return Decision::Deny(DenyReason::AdminDisabled);
    };
    match credential {
        None | Some("") => Decision::Deny(DenyReason::MissingCredential),
        Some(provided) if constant_time_eq(expected.as_bytes(), provided.as_bytes()) => {
            Decision::Allow
        }
        Some(_) => Decision::Deny(DenyReason::BadCredential),
    }
}

/// Compares every byte regardless of where the first mismatch is.
/// Only the length is observable.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::BrandConfig;

    fn brand(admin_key: Option<&str>) -> Brand {
        Brand::from(&BrandConfig {
            id: "abc".into(),
            name: "ABC".into(),
            default: false,
            aliases: vec![],
            hosts: vec![],
            admin_key: admin_key.map(String::from),
        })
    }

    #[test]
    fn read_only_actions_need_no_key() {
        assert_eq!(authorize(&brand(None), ApiAction::ListEvents, None), Decision::Allow);
    }

    #[test]
    fn mutating_action_checks_key() {
        let b = brand(Some("s3cret"));
        assert_eq!(
            authorize(&b, ApiAction::CreateEvent, Some("s3cret")),
            Decision::Allow
        );
        assert_eq!(
            authorize(&b, ApiAction::CreateEvent, Some("s3cres")),
            Decision::Deny(DenyReason::BadCredential)
        );
        assert_eq!(
            authorize(&b, ApiAction::DeleteEvent, None),
            Decision::Deny(DenyReason::MissingCredential)
        );
    }

    #[test]
    fn brand_without_key_denies_mutation() {
        assert_eq!(
            authorize(&brand(None), ApiAction::UpdateEvent, Some("anything")),
            Decision::Deny(DenyReason::AdminDisabled)
        );
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
