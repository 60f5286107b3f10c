use crate::workflows::applications::domain::{Role, Track};
use crate::workflows::applications::policy::{
    authorize, require_role, AccessMode, Operation, PolicyViolation,
};

const OWNED: Operation = Operation::Modify {
    owns_application: true,
};
const NOT_OWNED: Operation = Operation::Modify {
    owns_application: false,
};

#[test]
fn admin_edits_non_technical_free_form() {
    assert_eq!(
        authorize(Role::Admin, Track::NonTechnical, NOT_OWNED),
        Ok(AccessMode::FreeForm)
    );
}

#[test]
fn admin_is_rejected_on_technical_track() {
    let violation = authorize(Role::Admin, Track::Technical, NOT_OWNED).unwrap_err();
    assert_eq!(
        violation,
        PolicyViolation::TrackMismatch {
            role: Role::Admin,
            track: Track::Technical,
        }
    );
    assert!(violation.to_string().contains("BotMimic"));
}

#[test]
fn applicant_needs_ownership_before_track_is_considered() {
    assert_eq!(
        authorize(Role::Applicant, Track::Technical, NOT_OWNED),
        Err(PolicyViolation::NotOwner)
    );
    assert_eq!(
        authorize(Role::Applicant, Track::NonTechnical, NOT_OWNED),
        Err(PolicyViolation::NotOwner)
    );
    assert_eq!(
        authorize(Role::Applicant, Track::Technical, OWNED),
        Err(PolicyViolation::TrackMismatch {
            role: Role::Applicant,
            track: Track::Technical,
        })
    );
    assert_eq!(
        authorize(Role::Applicant, Track::NonTechnical, OWNED),
        Ok(AccessMode::FreeForm)
    );
}

#[test]
fn bot_is_sequenced_and_limited_to_technical() {
    assert_eq!(
        authorize(Role::BotMimic, Track::Technical, NOT_OWNED),
        Ok(AccessMode::Sequenced)
    );
    assert_eq!(
        authorize(Role::BotMimic, Track::NonTechnical, NOT_OWNED),
        Err(PolicyViolation::TrackMismatch {
            role: Role::BotMimic,
            track: Track::NonTechnical,
        })
    );
}

#[test]
fn reads_are_open_to_every_role_and_track() {
    for role in [Role::Admin, Role::Applicant, Role::BotMimic] {
        for track in Track::ALL {
            assert_eq!(
                authorize(role, track, Operation::Read),
                Ok(AccessMode::ReadOnly)
            );
        }
    }
}

#[test]
fn reset_is_privileged_for_staff_only() {
    for track in Track::ALL {
        assert_eq!(
            authorize(Role::Admin, track, Operation::Reset),
            Ok(AccessMode::Privileged)
        );
        assert_eq!(
            authorize(Role::BotMimic, track, Operation::Reset),
            Ok(AccessMode::Privileged)
        );
        assert!(matches!(
            authorize(Role::Applicant, track, Operation::Reset),
            Err(PolicyViolation::Forbidden {
                role: Role::Applicant,
                ..
            })
        ));
    }
}

#[test]
fn require_role_checks_membership() {
    assert!(require_role(Role::Admin, &[Role::Admin, Role::BotMimic]).is_ok());
    assert!(matches!(
        require_role(Role::Applicant, &[Role::Admin]),
        Err(PolicyViolation::Forbidden { .. })
    ));
}
