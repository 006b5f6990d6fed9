//! GDPR consent staleness.

use chrono::{DateTime, Utc};
use consent_sdk::ConsentStatus;

/// `true` when `created` is strictly before a known `change` date.
#[must_use]
pub fn predates(created: DateTime<Utc>, change: Option<DateTime<Utc>>) -> bool {
    change.is_some_and(|change| created < change)
}

/// Flag a consent recorded before the vendor list or the legal bases changed.
///
/// Grants and consent strings are never touched; only status flags move. A
/// previously full opt-in is downgraded and remembered in `previous_opt_in_all`.
#[must_use]
pub fn flag_stale_consent(
    status: &ConsentStatus,
    created: DateTime<Utc>,
    additions_change: DateTime<Utc>,
    legal_basis_change: DateTime<Utc>,
) -> ConsentStatus {
    let before_additions = created < additions_change;
    let before_legal_basis = created < legal_basis_change;

    let mut updated = status.clone();
    if before_additions {
        updated.vendor_list_additions = true;
    }
    if before_legal_basis {
        updated.legal_basis_changes = true;
    }
    if updated.consented_all && (before_additions || before_legal_basis) {
        if let Some(granular) = updated.granular_status.as_mut() {
            granular.previous_opt_in_all = Some(true);
        }
        updated.consented_all = false;
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use consent_sdk::GranularStatus;

    fn at(year: i32, month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()
    }

    fn opted_in() -> ConsentStatus {
        ConsentStatus {
            consented_all: true,
            consented_to_any: true,
            granular_status: Some(GranularStatus::default()),
            ..ConsentStatus::default()
        }
    }

    #[test]
    fn consent_before_legal_basis_change_is_flagged_and_downgraded() {
        let status = flag_stale_consent(&opted_in(), at(2023, 1), at(2022, 1), at(2023, 6));

        assert!(status.legal_basis_changes);
        assert!(!status.vendor_list_additions);
        assert!(!status.consented_all);
        assert!(status.consented_to_any);
        assert_eq!(
            status.granular_status.unwrap().previous_opt_in_all,
            Some(true)
        );
    }

    #[test]
    fn consent_before_vendor_additions_is_flagged() {
        let status = flag_stale_consent(&ConsentStatus::default(), at(2023, 1), at(2023, 2), at(2020, 1));

        assert!(status.vendor_list_additions);
        assert!(!status.legal_basis_changes);
        assert!(status.granular_status.is_none());
    }

    #[test]
    fn fresh_consent_is_left_alone() {
        let status = flag_stale_consent(&opted_in(), at(2024, 1), at(2023, 2), at(2023, 6));

        assert_eq!(status, opted_in());
    }

    #[test]
    fn predates_requires_a_known_change_date() {
        assert!(predates(at(2023, 1), Some(at(2023, 2))));
        assert!(!predates(at(2023, 2), Some(at(2023, 2))));
        assert!(!predates(at(2023, 1), None));
    }
}
