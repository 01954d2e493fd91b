//! Single-resource resolution against the SQL store.

use grantree::config::{DEFAULT_MAX_DEPTH, Resolution};
use grantree::{Error, PermissionLevel, PermissionService, ResourceNode};

use super::common::{Fixture, NS, OTHER_NS, ids, tree};

#[tokio::test]
async fn nothing_set_means_no_access() {
    let fx = tree().await;
    fx.member_user("u1").await;
    assert_eq!(fx.level("a1x", "u1").await, PermissionLevel::NoAccess);
}

#[tokio::test]
async fn root_global_is_inherited_by_descendants() {
    let fx = Fixture::new().await;
    fx.member_user("u1").await;
    fx.resource(NS, "root", None, Some(PermissionLevel::CanView)).await;
    fx.resource(NS, "child", Some("root"), None).await;
    fx.resource(NS, "grandchild", Some("child"), None).await;

    assert_eq!(fx.level("grandchild", "u1").await, PermissionLevel::CanView);
}

#[tokio::test]
async fn nearest_global_wins_even_when_lower() {
    let fx = Fixture::new().await;
    fx.member_user("u1").await;
    fx.resource(NS, "root", None, Some(PermissionLevel::FullAccess)).await;
    fx.resource(NS, "mid", Some("root"), Some(PermissionLevel::CanView)).await;
    fx.resource(NS, "leaf", Some("mid"), None).await;

    assert_eq!(fx.level("root", "u1").await, PermissionLevel::FullAccess);
    assert_eq!(fx.level("leaf", "u1").await, PermissionLevel::CanView);
}

#[tokio::test]
async fn nearest_user_grant_wins() {
    let fx = tree().await;
    fx.member_user("u1").await;
    fx.service
        .set_user_grant(NS, "root", "u1", PermissionLevel::CanEdit)
        .await
        .unwrap();
    fx.service
        .set_user_grant(NS, "a1", "u1", PermissionLevel::CanView)
        .await
        .unwrap();

    assert_eq!(fx.level("a", "u1").await, PermissionLevel::CanEdit);
    assert_eq!(fx.level("a1", "u1").await, PermissionLevel::CanView);
    assert_eq!(fx.level("a1x", "u1").await, PermissionLevel::CanView);
    assert_eq!(fx.level("b", "u1").await, PermissionLevel::CanEdit);
}

#[tokio::test]
async fn highest_scope_wins() {
    let fx = Fixture::new().await;
    fx.member_user("u1").await;
    fx.resource(NS, "root", None, Some(PermissionLevel::CanEdit)).await;
    fx.resource(NS, "leaf", Some("root"), None).await;
    fx.service
        .set_user_grant(NS, "leaf", "u1", PermissionLevel::CanView)
        .await
        .unwrap();

    assert_eq!(fx.level("leaf", "u1").await, PermissionLevel::CanEdit);
}

#[tokio::test]
async fn explicit_no_access_does_not_revoke_public_level() {
    let fx = Fixture::new().await;
    fx.member_user("u1").await;
    fx.resource(NS, "root", None, Some(PermissionLevel::CanView)).await;
    fx.resource(NS, "leaf", Some("root"), None).await;
    fx.service
        .set_user_grant(NS, "leaf", "u1", PermissionLevel::NoAccess)
        .await
        .unwrap();

    assert_eq!(fx.level("leaf", "u1").await, PermissionLevel::CanView);
}

#[tokio::test]
async fn groups_resolve_independently() {
    let fx = tree().await;
    fx.member_user("u1").await;
    fx.group(NS, "g1", "Editors").await;
    fx.group(NS, "g2", "Readers").await;
    fx.join_group(NS, "g1", "u1").await;
    fx.join_group(NS, "g2", "u1").await;

    fx.service
        .set_group_grant(NS, "root", "g1", PermissionLevel::CanComment)
        .await
        .unwrap();
    fx.service
        .set_group_grant(NS, "a1", "g2", PermissionLevel::CanView)
        .await
        .unwrap();

    // g2's nearer grant does not hide g1's grant on the root
    assert_eq!(fx.level("a1x", "u1").await, PermissionLevel::CanComment);
}

#[tokio::test]
async fn same_group_nearest_wins() {
    let fx = tree().await;
    fx.member_user("u1").await;
    fx.group(NS, "g1", "Editors").await;
    fx.join_group(NS, "g1", "u1").await;
    fx.service
        .set_group_grant(NS, "root", "g1", PermissionLevel::FullAccess)
        .await
        .unwrap();
    fx.service
        .set_group_grant(NS, "a", "g1", PermissionLevel::CanComment)
        .await
        .unwrap();

    assert_eq!(fx.level("a1", "u1").await, PermissionLevel::CanComment);
    assert_eq!(fx.level("b", "u1").await, PermissionLevel::FullAccess);
}

#[tokio::test]
async fn group_grants_need_group_membership() {
    let fx = tree().await;
    fx.member_user("u1").await;
    fx.member_user("u2").await;
    fx.group(NS, "g1", "Editors").await;
    fx.join_group(NS, "g1", "u1").await;
    fx.service
        .set_group_grant(NS, "root", "g1", PermissionLevel::CanEdit)
        .await
        .unwrap();

    assert_eq!(fx.level("a", "u1").await, PermissionLevel::CanEdit);
    assert_eq!(fx.level("a", "u2").await, PermissionLevel::NoAccess);
}

#[tokio::test]
async fn soft_deleted_ancestor_cuts_off_grants() {
    let fx = tree().await;
    fx.member_user("u1").await;
    fx.service
        .set_user_grant(NS, "a1x", "u1", PermissionLevel::FullAccess)
        .await
        .unwrap();
    assert_eq!(fx.level("a1x", "u1").await, PermissionLevel::FullAccess);

    fx.soft_delete_resource("a").await;

    assert_eq!(fx.level("a1x", "u1").await, PermissionLevel::NoAccess);
    assert_eq!(fx.level("a1", "u1").await, PermissionLevel::NoAccess);
}

#[tokio::test]
async fn unknown_resource_is_no_access() {
    let fx = tree().await;
    fx.member_user("u1").await;
    assert_eq!(fx.level("missing", "u1").await, PermissionLevel::NoAccess);
}

#[tokio::test]
async fn resources_of_other_namespaces_are_invisible() {
    let fx = Fixture::new().await;
    fx.member_user("u1").await;
    fx.resource(OTHER_NS, "foreign", None, Some(PermissionLevel::FullAccess))
        .await;

    assert_eq!(fx.level("foreign", "u1").await, PermissionLevel::NoAccess);
}

#[tokio::test]
async fn cyclic_parents_never_resolve() {
    let fx = Fixture::new().await;
    fx.member_user("u1").await;
    fx.resource(NS, "x", Some("y"), Some(PermissionLevel::FullAccess))
        .await;
    fx.resource(NS, "y", Some("x"), None).await;

    assert_eq!(fx.level("x", "u1").await, PermissionLevel::NoAccess);
}

#[tokio::test]
async fn chains_deeper_than_the_limit_resolve_to_no_access() {
    let fx = Fixture::new().await;
    fx.member_user("u1").await;
    fx.resource(NS, "root", None, Some(PermissionLevel::CanView)).await;
    fx.resource(NS, "d1", Some("root"), None).await;
    fx.resource(NS, "d2", Some("d1"), None).await;
    fx.resource(NS, "d3", Some("d2"), None).await;

    let shallow = PermissionService::with_resolution(
        fx.service.store().clone(),
        Resolution {
            max_depth: 2,
            ..Resolution::default()
        },
    );

    assert_eq!(
        shallow.resolve(NS, "d2", "u1").await.unwrap(),
        PermissionLevel::CanView
    );
    assert_eq!(
        shallow.resolve(NS, "d3", "u1").await.unwrap(),
        PermissionLevel::NoAccess
    );
}

#[tokio::test]
async fn depth_limit_is_shared_by_single_and_batch_resolution() {
    let fx = Fixture::new().await;
    fx.member_user("u1").await;
    fx.resource(NS, "root", None, Some(PermissionLevel::CanView)).await;
    fx.resource(NS, "d1", Some("root"), None).await;
    fx.resource(NS, "d2", Some("d1"), None).await;
    fx.resource(NS, "d3", Some("d2"), None).await;

    for max_depth in 1..=4 {
        let service = PermissionService::with_resolution(
            fx.service.store().clone(),
            Resolution {
                max_depth,
                ..Resolution::default()
            },
        );
        let wanted = ids(&["root", "d1", "d2", "d3"]);
        let batch = service.resolve_all(NS, &wanted, "u1").await.unwrap();
        for id in &wanted {
            let single = service.resolve(NS, id, "u1").await.unwrap();
            assert_eq!(batch[id], single, "{id} at max_depth {max_depth}");
        }
    }
}

#[tokio::test]
async fn resolve_chain_accepts_a_preloaded_chain() {
    use grantree::AncestorProvider;

    let fx = tree().await;
    fx.member_user("u1").await;
    fx.service
        .set_user_grant(NS, "a", "u1", PermissionLevel::CanComment)
        .await
        .unwrap();

    let chain = fx
        .service
        .store()
        .ancestor_chain(NS, "a1x", DEFAULT_MAX_DEPTH)
        .await
        .unwrap();
    let ids: Vec<&str> = chain.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, ["a1x", "a1", "a", "root"]);

    let level = fx.service.resolve_chain(NS, &chain, "u1").await.unwrap();
    assert_eq!(level, PermissionLevel::CanComment);

    // Dropping the root leaves the chain unrooted
    let level = fx
        .service
        .resolve_chain(NS, &chain[..3], "u1")
        .await
        .unwrap();
    assert_eq!(level, PermissionLevel::NoAccess);
}

#[tokio::test]
async fn raising_any_grant_never_lowers_the_result() {
    let fx = tree().await;
    fx.member_user("u1").await;
    fx.group(NS, "g1", "Editors").await;
    fx.join_group(NS, "g1", "u1").await;

    let mut previous = fx.level("a1x", "u1").await;
    for level in PermissionLevel::ALL {
        fx.service
            .set_group_grant(NS, "a", "g1", level)
            .await
            .unwrap();
        let current = fx.level("a1x", "u1").await;
        assert!(current >= previous, "{current} < {previous} after raising to {level}");
        previous = current;
    }
    assert_eq!(previous, PermissionLevel::FullAccess);
}

#[tokio::test]
async fn open_builds_a_ready_service() {
    let config = grantree::Config {
        database: grantree::config::Database {
            url: ":memory:".to_string(),
        },
        resolution: grantree::config::Resolution {
            max_depth: 4,
            default_required: PermissionLevel::CanComment,
        },
    };

    let service = grantree::open(&config).await.unwrap();

    assert_eq!(service.resolution().max_depth, 4);
    assert_eq!(service.resolution().default_required, PermissionLevel::CanComment);
    assert_eq!(
        service.resolve(NS, "anything", "anyone").await.unwrap(),
        PermissionLevel::NoAccess
    );
}

#[tokio::test]
async fn preloaded_chain_from_another_namespace_is_rejected() {
    let fx = Fixture::new().await;
    fx.member_user("u1").await;

    let chain = vec![
        ResourceNode::child(OTHER_NS, "leaf", "root"),
        ResourceNode::root(OTHER_NS, "root").with_global(PermissionLevel::FullAccess),
    ];
    let err = fx
        .service
        .resolve_chain(NS, &chain, "u1")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BadRequest(_)), "got: {err}");
}
