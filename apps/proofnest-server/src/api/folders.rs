// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 ProofNest

//! Folder endpoints.
//!
//! Folders are a per-user tree. Deleting a folder never deletes proofs: its
//! proofs move to the root and its child folders move up one level.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::ApiError,
    state::AppState,
    storage::{validate_folder_name, AuditEvent, AuditEventType, FolderRepository, StoredFolder},
};

use super::record_audit;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateFolderRequest {
    pub name: String,
    pub parent_id: Option<String>,
}

/// Partial update. An absent `parent_id` keeps the parent; `null` moves the
/// folder to the top level.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateFolderRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub parent_id: Option<Option<String>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FolderListResponse {
    pub folders: Vec<StoredFolder>,
    pub total: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteFolderResponse {
    /// Proofs moved to the root
    pub proofs_moved: usize,
    /// Child folders moved to the deleted folder's parent
    pub folders_reparented: usize,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[utoipa::path(
    get,
    path = "/v1/folders",
    tag = "Folders",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's folders, sorted by name", body = FolderListResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_folders(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<FolderListResponse>, ApiError> {
    let folders = FolderRepository::new(state.storage()).list_by_owner(&user.user_id)?;
    let total = folders.len();
    Ok(Json(FolderListResponse { folders, total }))
}

#[utoipa::path(
    post,
    path = "/v1/folders",
    tag = "Folders",
    request_body = CreateFolderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Folder created", body = StoredFolder),
        (status = 400, description = "Invalid name"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Parent folder not found")
    )
)]
pub async fn create_folder(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateFolderRequest>,
) -> Result<(StatusCode, Json<StoredFolder>), ApiError> {
    let name = validate_folder_name(&request.name)?;
    let repo = FolderRepository::new(state.storage());

    let parent_id = request.parent_id.filter(|p| !p.is_empty());
    if let Some(parent_id) = &parent_id {
        repo.get_owned(parent_id, &user.user_id)?;
    }

    let folder = StoredFolder::new(&user.user_id, name, parent_id);
    repo.create(&folder)?;

    record_audit(
        &state,
        AuditEvent::new(AuditEventType::FolderCreated)
            .with_user(&user.user_id)
            .with_resource("folder", &folder.id),
    );

    Ok((StatusCode::CREATED, Json(folder)))
}

#[utoipa::path(
    put,
    path = "/v1/folders/{id}",
    tag = "Folders",
    params(("id" = String, Path, description = "Folder id")),
    request_body = UpdateFolderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Folder updated", body = StoredFolder),
        (status = 400, description = "Invalid name or cyclic parent"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Folder not found")
    )
)]
pub async fn update_folder(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(folder_id): Path<String>,
    Json(request): Json<UpdateFolderRequest>,
) -> Result<Json<StoredFolder>, ApiError> {
    let repo = FolderRepository::new(state.storage());
    let mut folder = repo.get_owned(&folder_id, &user.user_id)?;

    if let Some(name) = request.name.as_deref() {
        folder.name = validate_folder_name(name)?;
    }
    if let Some(parent_id) = request.parent_id {
        let parent_id = parent_id.filter(|p| !p.is_empty());
        if let Some(parent_id) = &parent_id {
            repo.validate_parent(Some(&folder.id), parent_id, &user.user_id)?;
        }
        folder.parent_id = parent_id;
    }

    folder.updated_at = Utc::now();
    repo.update(&folder)?;

    record_audit(
        &state,
        AuditEvent::new(AuditEventType::FolderUpdated)
            .with_user(&user.user_id)
            .with_resource("folder", &folder.id),
    );

    Ok(Json(folder))
}

#[utoipa::path(
    delete,
    path = "/v1/folders/{id}",
    tag = "Folders",
    params(("id" = String, Path, description = "Folder id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Folder deleted", body = DeleteFolderResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Folder not found")
    )
)]
pub async fn delete_folder(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(folder_id): Path<String>,
) -> Result<Json<DeleteFolderResponse>, ApiError> {
    let repo = FolderRepository::new(state.storage());
    let folder = repo.get_owned(&folder_id, &user.user_id)?;

    let proofs_moved = state.proofs.move_folder_to_root(&user.user_id, &folder.id)?;
    let folders_reparented =
        repo.reparent_children(&folder.id, folder.parent_id.as_deref(), &user.user_id)?;
    repo.delete(&folder.id)?;
    state.cache.invalidate(&user.user_id);

    tracing::info!(
        folder_id = %folder.id,
        user_id = %user.user_id,
        proofs_moved,
        folders_reparented,
        "Folder deleted"
    );
    record_audit(
        &state,
        AuditEvent::new(AuditEventType::FolderDeleted)
            .with_user(&user.user_id)
            .with_resource("folder", &folder.id)
            .with_details(serde_json::json!({
                "proofs_moved": proofs_moved,
                "folders_reparented": folders_reparented,
            })),
    );

    Ok(Json(DeleteFolderResponse {
        proofs_moved,
        folders_reparented,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::client;
    use crate::state::test_support::TestContext;
    use crate::storage::StoredProof;

    async fn create(ctx: &TestContext, user: &str, name: &str, parent_id: Option<&str>) -> Result<StoredFolder, ApiError> {
        create_folder(
            Auth(client(user)),
            State(ctx.state.clone()),
            Json(CreateFolderRequest {
                name: name.to_string(),
                parent_id: parent_id.map(str::to_string),
            }),
        )
        .await
        .map(|(_, Json(folder))| folder)
    }

    #[test]
    fn update_request_distinguishes_null_from_absent() {
        let absent: UpdateFolderRequest = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert!(absent.parent_id.is_none());

        let null: UpdateFolderRequest = serde_json::from_str(r#"{"parent_id":null}"#).unwrap();
        assert_eq!(null.parent_id, Some(None));

        let set: UpdateFolderRequest = serde_json::from_str(r#"{"parent_id":"f1"}"#).unwrap();
        assert_eq!(set.parent_id, Some(Some("f1".to_string())));
    }

    #[tokio::test]
    async fn create_trims_and_validates_name() {
        let ctx = TestContext::new();
        let folder = create(&ctx, "alice", "  Contracts  ", None).await.unwrap();
        assert_eq!(folder.name, "Contracts");

        let err = create(&ctx, "alice", "   ", None).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = create(&ctx, "alice", "Sub", Some("missing")).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_is_scoped_to_owner() {
        let ctx = TestContext::new();
        create(&ctx, "alice", "b", None).await.unwrap();
        create(&ctx, "alice", "A", None).await.unwrap();
        create(&ctx, "bob", "Bob's", None).await.unwrap();

        let Json(list) = list_folders(Auth(client("alice")), State(ctx.state.clone()))
            .await
            .unwrap();
        assert_eq!(list.total, 2);
        assert_eq!(list.folders[0].name, "A");
    }

    #[tokio::test]
    async fn update_rejects_cycles_and_foreign_folders() {
        let ctx = TestContext::new();
        let top = create(&ctx, "alice", "Top", None).await.unwrap();
        let child = create(&ctx, "alice", "Child", Some(&top.id)).await.unwrap();

        let err = update_folder(
            Auth(client("alice")),
            State(ctx.state.clone()),
            Path(top.id.clone()),
            Json(UpdateFolderRequest {
                name: None,
                parent_id: Some(Some(child.id.clone())),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = update_folder(
            Auth(client("bob")),
            State(ctx.state.clone()),
            Path(top.id.clone()),
            Json(UpdateFolderRequest {
                name: Some("Mine".to_string()),
                parent_id: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let Json(moved) = update_folder(
            Auth(client("alice")),
            State(ctx.state.clone()),
            Path(child.id.clone()),
            Json(UpdateFolderRequest {
                name: Some("Renamed".to_string()),
                parent_id: Some(None),
            }),
        )
        .await
        .unwrap();
        assert_eq!(moved.name, "Renamed");
        assert!(moved.parent_id.is_none());
    }

    #[tokio::test]
    async fn delete_moves_proofs_and_children_up() {
        let ctx = TestContext::new();
        let top = create(&ctx, "alice", "Top", None).await.unwrap();
        let middle = create(&ctx, "alice", "Middle", Some(&top.id)).await.unwrap();
        let leaf = create(&ctx, "alice", "Leaf", Some(&middle.id)).await.unwrap();

        let proof = StoredProof::new_pending(
            "alice",
            "note-1",
            &"ab".repeat(32),
            "local",
            Some(middle.id.clone()),
        );
        ctx.state.proofs.insert_proof(&proof).unwrap();

        let Json(result) = delete_folder(
            Auth(client("alice")),
            State(ctx.state.clone()),
            Path(middle.id.clone()),
        )
        .await
        .unwrap();
        assert_eq!(result.proofs_moved, 1);
        assert_eq!(result.folders_reparented, 1);

        let repo = FolderRepository::new(ctx.state.storage());
        assert!(!repo.exists(&middle.id));
        assert_eq!(repo.get(&leaf.id).unwrap().parent_id.as_deref(), Some(top.id.as_str()));
        let stored = ctx.state.proofs.get_proof(&proof.id).unwrap().unwrap();
        assert!(stored.folder_id.is_none());
    }
}
