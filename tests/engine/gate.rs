//! Membership-gated checks, filtering and typed permits.

use grantree::config::{DEFAULT_MAX_DEPTH, Resolution};
use grantree::{Error, PermissionLevel, PermissionService, ResourceNode, level};

use super::common::{Fixture, NS, OTHER_NS, tree};

#[tokio::test]
async fn non_members_are_refused_whatever_the_grants() {
    let fx = tree().await;
    fx.user("outsider", "outsider@example.com").await;
    fx.service
        .set_global_level(NS, "root", Some(PermissionLevel::FullAccess))
        .await
        .unwrap();
    fx.service
        .set_user_grant(NS, "a", "outsider", PermissionLevel::FullAccess)
        .await
        .unwrap();

    // Resolution alone sees the grants, the gate does not
    assert_eq!(fx.level("a", "outsider").await, PermissionLevel::FullAccess);
    assert!(
        !fx.service
            .user_has_permission(NS, "a", "outsider", PermissionLevel::CanView)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn membership_in_another_namespace_does_not_count() {
    let fx = tree().await;
    fx.user("u1", "u1@example.com").await;
    fx.member(OTHER_NS, "u1").await;
    fx.service
        .set_global_level(NS, "root", Some(PermissionLevel::CanView))
        .await
        .unwrap();

    assert!(
        !fx.service
            .user_has_permission(NS, "a", "u1", PermissionLevel::CanView)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn members_pass_at_or_below_their_level() {
    let fx = tree().await;
    fx.member_user("u1").await;
    fx.service
        .set_user_grant(NS, "a", "u1", PermissionLevel::CanComment)
        .await
        .unwrap();

    for (required, expected) in [
        (PermissionLevel::NoAccess, true),
        (PermissionLevel::CanView, true),
        (PermissionLevel::CanComment, true),
        (PermissionLevel::CanEdit, false),
        (PermissionLevel::FullAccess, false),
    ] {
        let allowed = fx
            .service
            .user_has_permission(NS, "a1x", "u1", required)
            .await
            .unwrap();
        assert_eq!(allowed, expected, "required {required}");
    }
}

#[tokio::test]
async fn user_can_access_uses_the_configured_default() {
    let fx = tree().await;
    fx.member_user("u1").await;
    fx.service
        .set_user_grant(NS, "a", "u1", PermissionLevel::CanView)
        .await
        .unwrap();

    assert!(fx.service.user_can_access(NS, "a", "u1").await.unwrap());

    let strict = PermissionService::with_resolution(
        fx.service.store().clone(),
        Resolution {
            default_required: PermissionLevel::CanEdit,
            ..Resolution::default()
        },
    );
    assert!(!strict.user_can_access(NS, "a", "u1").await.unwrap());
}

#[tokio::test]
async fn gate_over_a_preloaded_chain() {
    use grantree::AncestorProvider;

    let fx = tree().await;
    fx.member_user("u1").await;
    fx.user("outsider", "outsider@example.com").await;
    fx.service
        .set_global_level(NS, "root", Some(PermissionLevel::CanEdit))
        .await
        .unwrap();

    let chain = fx
        .service
        .store()
        .ancestor_chain(NS, "a1", DEFAULT_MAX_DEPTH)
        .await
        .unwrap();
    assert!(
        fx.service
            .user_has_permission_in(NS, &chain, "u1", PermissionLevel::CanEdit)
            .await
            .unwrap()
    );
    assert!(
        !fx.service
            .user_has_permission_in(NS, &chain, "outsider", PermissionLevel::CanView)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn filter_keeps_permitted_resources_in_input_order() {
    let fx = tree().await;
    fx.member_user("u1").await;
    fx.service
        .set_user_grant(NS, "b", "u1", PermissionLevel::CanEdit)
        .await
        .unwrap();
    fx.service
        .set_user_grant(NS, "a1", "u1", PermissionLevel::CanView)
        .await
        .unwrap();

    let resources = vec![
        ResourceNode::child(NS, "b", "root"),
        ResourceNode::child(NS, "a", "root"),
        ResourceNode::child(NS, "a1x", "a1"),
        ResourceNode::child(NS, "a1", "a"),
    ];

    let viewable = fx
        .service
        .filter_by_permission("u1", NS, resources.clone(), PermissionLevel::CanView)
        .await
        .unwrap();
    let viewable: Vec<&str> = viewable.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(viewable, ["b", "a1x", "a1"]);

    let editable = fx
        .service
        .filter_by_permission("u1", NS, resources, PermissionLevel::CanEdit)
        .await
        .unwrap();
    let editable: Vec<&str> = editable.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(editable, ["b"]);
}

#[tokio::test]
async fn filter_returns_nothing_for_non_members() {
    let fx = tree().await;
    fx.user("outsider", "outsider@example.com").await;
    fx.service
        .set_global_level(NS, "root", Some(PermissionLevel::FullAccess))
        .await
        .unwrap();

    let kept = fx
        .service
        .filter_by_permission(
            "outsider",
            NS,
            vec![ResourceNode::root(NS, "root")],
            PermissionLevel::CanView,
        )
        .await
        .unwrap();
    assert!(kept.is_empty());
}

#[tokio::test]
async fn require_hands_out_a_permit() {
    let fx = tree().await;
    fx.member_user("u1").await;
    fx.service
        .set_user_grant(NS, "a", "u1", PermissionLevel::FullAccess)
        .await
        .unwrap();

    let permit = fx
        .service
        .require::<level::Edit>(NS, "a1", "u1")
        .await
        .unwrap();
    assert_eq!(permit.namespace_id(), NS);
    assert_eq!(permit.resource_id(), "a1");
    assert_eq!(permit.user_id(), "u1");
    assert_eq!(permit.effective(), PermissionLevel::FullAccess);
}

#[tokio::test]
async fn require_is_forbidden_below_the_level() {
    let fx = tree().await;
    fx.member_user("u1").await;
    fx.service
        .set_user_grant(NS, "a", "u1", PermissionLevel::CanComment)
        .await
        .unwrap();

    let err = fx
        .service
        .require::<level::Full>(NS, "a", "u1")
        .await
        .unwrap_err();
    match &err {
        Error::Forbidden { resource, action } => {
            assert_eq!(resource, "a");
            assert_eq!(action, "full_access");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn require_is_forbidden_for_non_members() {
    let fx = Fixture::new().await;
    fx.user("outsider", "outsider@example.com").await;
    fx.resource(NS, "root", None, Some(PermissionLevel::FullAccess))
        .await;

    let err = fx
        .service
        .require::<level::View>(NS, "root", "outsider")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden { .. }), "got: {err}");
}

#[tokio::test]
async fn foreign_chain_cannot_lend_its_public_level() {
    let fx = Fixture::new().await;
    fx.member_user("u1").await;
    fx.resource(OTHER_NS, "elsewhere", None, Some(PermissionLevel::FullAccess))
        .await;

    let chain =
        vec![ResourceNode::root(OTHER_NS, "elsewhere").with_global(PermissionLevel::FullAccess)];
    let err = fx
        .service
        .user_has_permission_in(NS, &chain, "u1", PermissionLevel::CanView)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BadRequest(_)), "got: {err}");
    assert_eq!(err.status_code(), 400);
}
