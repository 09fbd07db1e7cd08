use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use snapshot_publisher_core::compare::DiffEntry;
use uuid::Uuid;

use super::{success, Success};
use crate::error::ApiResult;
use crate::state::AppState;

/// Release comparison, against the live release unless `?to=` names another.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/releases/{uuid}/compare", get(compare))
        .route(
            "/v1/releases/{uuid}/compare/{content_type}/{document_key}",
            get(diff_document),
        )
}

#[derive(Debug, Deserialize)]
struct CompareQuery {
    to: Option<Uuid>,
}

async fn compare(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    Query(query): Query<CompareQuery>,
) -> ApiResult<Json<Success<Vec<DiffEntry>>>> {
    Ok(success(state.publisher().compare(uuid, query.to).await?))
}

async fn diff_document(
    State(state): State<AppState>,
    Path((uuid, content_type, document_key)): Path<(Uuid, String, String)>,
    Query(query): Query<CompareQuery>,
) -> ApiResult<Json<Success<String>>> {
    let diff = state
        .publisher()
        .diff_document(uuid, query.to, &content_type, &document_key)
        .await?;
    Ok(success(diff))
}

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use serde_json::{json, Value};
    use snapshot_publisher_core::release::model::NewRelease;

    use crate::routes::testing::spawn_app;

    #[tokio::test]
    async fn compares_against_live_by_default() {
        let (base, state) = spawn_app().await;
        let publisher = state.publisher();
        let live = publisher.create_release(NewRelease::new("s1", "live")).await.unwrap();
        publisher
            .documents()
            .put(&live, "page", "1", json!({"title": "Old"}), Default::default())
            .await
            .unwrap();
        publisher.lifecycle().set_live(live.uuid, None, None).await.unwrap();

        let next = publisher
            .create_release(NewRelease::new("s1", "next").base_release(live.uuid))
            .await
            .unwrap();
        publisher
            .documents()
            .put(&next, "page", "1", json!({"title": "New"}), Default::default())
            .await
            .unwrap();
        publisher
            .documents()
            .put(&next, "page", "2", json!({"title": "Added"}), Default::default())
            .await
            .unwrap();

        let client = Client::new();
        let body: Value = client
            .get(format!("{base}/v1/releases/{}/compare", next.uuid))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            body["content"],
            json!([
                {"document_key": "1", "content_type": "page", "diff": "Changed",
                 "parameters": {"release_from": {}, "release_compare_to": {}}},
                {"document_key": "2", "content_type": "page", "diff": "Added", "parameters": {}},
            ])
        );

        let diff: Value = client
            .get(format!("{base}/v1/releases/{}/compare/page/1?to={}", next.uuid, live.uuid))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(diff["content"].as_str().unwrap().contains("+  \"title\": \"Old\""));

        let response = client
            .get(format!("{base}/v1/releases/{}/compare", uuid::Uuid::new_v4()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
