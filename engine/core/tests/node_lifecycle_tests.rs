// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end node lifecycle tests over a fully wired tenant: creation,
//! retrieval, ancestry, recursive deletion, body round-trips, permission
//! boundaries, and the audit trail the mutations leave behind.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::{json, Map};

use antbox_core::application::node_service::CreateNodeInput;
use antbox_core::application::rate_limiter::FeatureRateLimiter;
use antbox_core::application::tenant::Tenant;
use antbox_core::domain::auth::{AccessMode, AuthenticationContext, Principal};
use antbox_core::domain::builtins::{ADMINS_GROUP_UUID, ROOT_FOLDER_UUID, ROOT_USER_EMAIL};
use antbox_core::domain::error::AntboxError;
use antbox_core::domain::node::{mimetypes, Permission, Permissions};
use antbox_core::infrastructure::ai::DeterministicAiModel;

async fn tenant() -> Arc<Tenant> {
    Tenant::in_memory(
        "default",
        FeatureRateLimiter::default(),
        Arc::new(DeterministicAiModel::new()),
    )
    .await
    .unwrap()
}

fn admin_ctx() -> AuthenticationContext {
    AuthenticationContext::new(
        "default",
        Principal::new(ROOT_USER_EMAIL, vec![ADMINS_GROUP_UUID.to_string()]),
        AccessMode::Direct,
    )
}

fn folder(title: &str, parent: Option<&str>) -> CreateNodeInput {
    CreateNodeInput {
        title: title.to_string(),
        mimetype: mimetypes::FOLDER.to_string(),
        parent: parent.map(|p| p.to_string()),
        ..CreateNodeInput::default()
    }
}

fn file(title: &str, mimetype: &str, parent: &str) -> CreateNodeInput {
    CreateNodeInput {
        title: title.to_string(),
        mimetype: mimetype.to_string(),
        parent: Some(parent.to_string()),
        ..CreateNodeInput::default()
    }
}

// Scenario: create folder under root as admin.
#[tokio::test]
async fn test_admin_creates_folder_under_root() {
    let tenant = tenant().await;
    let ctx = admin_ctx();

    let docs = tenant
        .node_service
        .create(&ctx, folder("Docs", Some(ROOT_FOLDER_UUID)))
        .await
        .unwrap();

    assert!(!docs.uuid.is_empty());
    assert_eq!(docs.owner, "root@antbox.io");
    assert_eq!(docs.parent, ROOT_FOLDER_UUID);

    // get returns the node with all persisted fields equal, and
    // createdTime == modifiedTime.
    let fetched = tenant.node_service.get(&ctx, &docs.uuid).await.unwrap();
    assert_eq!(fetched, docs);
    assert_eq!(fetched.created_time, fetched.modified_time);
}

// Scenario: upload a file and export it byte-equal.
#[tokio::test]
async fn test_upload_and_export_round_trip() {
    let tenant = tenant().await;
    let ctx = admin_ctx();
    let docs = tenant.node_service.create(&ctx, folder("Docs", None)).await.unwrap();

    let node = tenant
        .node_service
        .create_file(
            &ctx,
            Bytes::from_static(b"hello"),
            file("a.txt", "text/plain", &docs.uuid),
        )
        .await
        .unwrap();
    assert_eq!(node.size, 5);

    let bundle = tenant.node_service.export(&ctx, &node.uuid).await.unwrap();
    assert_eq!(bundle.content, Bytes::from_static(b"hello"));
    assert_eq!(bundle.name, "a.txt");
    assert_eq!(bundle.mimetype, "text/plain");
}

// update_file followed by export returns the most recent bytes.
#[tokio::test]
async fn test_update_file_then_export() {
    let tenant = tenant().await;
    let ctx = admin_ctx();
    let docs = tenant.node_service.create(&ctx, folder("Docs", None)).await.unwrap();
    let node = tenant
        .node_service
        .create_file(
            &ctx,
            Bytes::from_static(b"first"),
            file("a.txt", "text/plain", &docs.uuid),
        )
        .await
        .unwrap();

    let updated = tenant
        .node_service
        .update_file(&ctx, &node.uuid, Bytes::from_static(b"second version"))
        .await
        .unwrap();
    assert_eq!(updated.size, 14);
    assert!(updated.modified_time >= node.modified_time);

    let bundle = tenant.node_service.export(&ctx, &node.uuid).await.unwrap();
    assert_eq!(bundle.content, Bytes::from_static(b"second version"));
}

// Ancestry chains terminate at the root without repetitions.
#[tokio::test]
async fn test_ancestry_chain_has_no_repetitions() {
    let tenant = tenant().await;
    let ctx = admin_ctx();

    let mut parent = ROOT_FOLDER_UUID.to_string();
    for depth in 0..6 {
        let child = tenant
            .node_service
            .create(&ctx, folder(&format!("level-{}", depth), Some(&parent)))
            .await
            .unwrap();
        parent = child.uuid;
    }

    let chain = tenant.node_service.breadcrumbs(&ctx, &parent).await.unwrap();
    assert_eq!(chain.len(), 7);
    assert_eq!(chain[0].uuid, ROOT_FOLDER_UUID);
    let mut seen = std::collections::HashSet::new();
    for crumb in &chain {
        assert!(seen.insert(crumb.uuid.clone()), "repeated ancestor {}", crumb.uuid);
    }
}

// After a folder delete, no descendant is retrievable.
#[tokio::test]
async fn test_folder_delete_removes_all_descendants() {
    let tenant = tenant().await;
    let ctx = admin_ctx();

    let top = tenant.node_service.create(&ctx, folder("Top", None)).await.unwrap();
    let mut uuids = vec![top.uuid.clone()];
    let mut parent = top.uuid.clone();
    for depth in 0..3 {
        let sub = tenant
            .node_service
            .create(&ctx, folder(&format!("sub-{}", depth), Some(&parent)))
            .await
            .unwrap();
        let doc = tenant
            .node_service
            .create_file(
                &ctx,
                Bytes::from_static(b"x"),
                file("doc.txt", "text/plain", &sub.uuid),
            )
            .await
            .unwrap();
        uuids.push(sub.uuid.clone());
        uuids.push(doc.uuid.clone());
        parent = sub.uuid;
    }

    tenant.node_service.delete(&ctx, &top.uuid).await.unwrap();
    for uuid in uuids {
        assert!(matches!(
            tenant.node_service.get(&ctx, &uuid).await,
            Err(AntboxError::NodeNotFound(_))
        ));
    }
}

// Boundary: a folder with empty permission sets is accessible only to its
// owner and admins.
#[tokio::test]
async fn test_empty_permissions_folder_is_private() {
    let tenant = tenant().await;
    let admin = admin_ctx();

    // An owner-operated folder subtree with all sets empty.
    let owner = AuthenticationContext::new(
        "default",
        Principal::new("owner@example.com", vec![]),
        AccessMode::Direct,
    );
    let shared = tenant
        .node_service
        .create(
            &admin,
            CreateNodeInput {
                permissions: Some(Permissions {
                    authenticated: [Permission::Read, Permission::Write].into(),
                    ..Permissions::default()
                }),
                ..folder("Shared", None)
            },
        )
        .await
        .unwrap();
    let private = tenant
        .node_service
        .create(
            &owner,
            CreateNodeInput {
                permissions: Some(Permissions::default()),
                ..folder("Private", Some(&shared.uuid))
            },
        )
        .await
        .unwrap();

    // Owner and admin read it; an authenticated stranger does not.
    assert!(tenant.node_service.get(&owner, &private.uuid).await.is_ok());
    assert!(tenant.node_service.get(&admin, &private.uuid).await.is_ok());

    let stranger = AuthenticationContext::new(
        "default",
        Principal::new("stranger@example.com", vec![]),
        AccessMode::Direct,
    );
    assert!(matches!(
        tenant.node_service.get(&stranger, &private.uuid).await,
        Err(AntboxError::Forbidden(_))
    ));

    // And listing the parent hides it from the stranger.
    let listing = tenant.node_service.list(&stranger, Some(&shared.uuid)).await.unwrap();
    assert!(listing.iter().all(|n| n.uuid != private.uuid));
}

// Every mutation appends a matching audit record.
#[tokio::test]
async fn test_mutations_leave_an_audit_trail() {
    let tenant = tenant().await;
    let ctx = admin_ctx();
    let docs = tenant.node_service.create(&ctx, folder("Docs", None)).await.unwrap();
    let node = tenant
        .node_service
        .create_file(
            &ctx,
            Bytes::from_static(b"v1"),
            file("a.txt", "text/plain", &docs.uuid),
        )
        .await
        .unwrap();

    let mut patch = Map::new();
    patch.insert("title".to_string(), json!("b.txt"));
    tenant.node_service.update(&ctx, &node.uuid, patch).await.unwrap();
    tenant.node_service.delete(&ctx, &node.uuid).await.unwrap();

    // The audit subscriber is a weak consumer; give it a beat.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let stream = tenant.audit.get_stream(&ctx, &node.uuid).await.unwrap();
    let kinds: Vec<&str> = stream.iter().map(|r| r.event_type.as_str()).collect();
    assert_eq!(kinds, vec!["NodeCreated", "NodeUpdated", "NodeDeleted"]);
    assert!(stream.iter().all(|r| r.user_email == ROOT_USER_EMAIL));
    assert!(stream.iter().all(|r| r.tenant == "default"));
    let sequences: Vec<u64> = stream.iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);

    // The update record keeps the {uuid, oldValues, newValues} shape.
    assert_eq!(stream[1].payload["oldValues"]["title"], "a.txt");
    assert_eq!(stream[1].payload["newValues"]["title"], "b.txt");

    // getDeleted aggregates the removal.
    let deleted = tenant.audit.get_deleted(&ctx, "text/plain").await.unwrap();
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].uuid, node.uuid);
    assert_eq!(deleted[0].title, "b.txt");
    assert_eq!(deleted[0].deleted_by, ROOT_USER_EMAIL);
}

// Conflict semantics: duplicate fids collide within the tenant.
#[tokio::test]
async fn test_fid_conflicts_surface_as_conflict() {
    let tenant = tenant().await;
    let ctx = admin_ctx();

    let mut input = folder("One", None);
    input.fid = Some("shared-fid".to_string());
    tenant.node_service.create(&ctx, input).await.unwrap();

    let mut input = folder("Two", None);
    input.fid = Some("shared-fid".to_string());
    assert!(matches!(
        tenant.node_service.create(&ctx, input).await,
        Err(AntboxError::Conflict(_))
    ));
}

// find paginates with opaque increasing tokens and respects permissions.
#[tokio::test]
async fn test_find_pagination() {
    let tenant = tenant().await;
    let ctx = admin_ctx();
    let docs = tenant.node_service.create(&ctx, folder("Docs", None)).await.unwrap();
    for i in 0..7 {
        tenant
            .node_service
            .create_file(
                &ctx,
                Bytes::from_static(b"x"),
                file(&format!("f{}.txt", i), "text/plain", &docs.uuid),
            )
            .await
            .unwrap();
    }

    let filters = serde_json::from_value(json!([["mimetype", "==", "text/plain"]])).unwrap();
    let page1 = tenant.node_service.find(&ctx, &filters, 3, 1).await.unwrap();
    assert_eq!(page1.nodes.len(), 3);
    assert_eq!(page1.next_page_token, Some(2));

    let page3 = tenant.node_service.find(&ctx, &filters, 3, 3).await.unwrap();
    assert_eq!(page3.nodes.len(), 1);
    assert_eq!(page3.next_page_token, None);
}
