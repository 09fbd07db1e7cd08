use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use snapshot_publisher_core::document::model::{ReleaseDocument, ReleaseSelector};
use uuid::Uuid;

use super::{success, Success};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Document publication and live-serve reads.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/releases/{uuid}/documents", get(list_documents))
        .route(
            "/v1/releases/{uuid}/documents/{content_type}/{document_key}",
            put(publish_document).delete(unpublish_document),
        )
        .route(
            "/v1/releases/{uuid}/documents/{content_type}/{document_key}/remove",
            post(remove_document),
        )
        .route(
            "/v1/sites/{site_code}/documents/{release}/{content_type}/{document_key}",
            get(read_document),
        )
}

#[derive(Debug, Deserialize)]
struct PublishRequest {
    document_json: Value,
    #[serde(default)]
    parameters: Map<String, Value>,
}

async fn list_documents(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> ApiResult<Json<Success<Vec<ReleaseDocument>>>> {
    let release = state.publisher().release(uuid).await?;
    Ok(success(state.publisher().documents().list(&release).await?))
}

async fn publish_document(
    State(state): State<AppState>,
    Path((uuid, content_type, document_key)): Path<(Uuid, String, String)>,
    Json(request): Json<PublishRequest>,
) -> ApiResult<Json<Success<ReleaseDocument>>> {
    let release = state.publisher().release(uuid).await?;
    let document = state
        .publisher()
        .documents()
        .publish(
            &release,
            &content_type,
            &document_key,
            request.document_json,
            request.parameters,
        )
        .await?;
    Ok(success(document))
}

/// Hard delete: reads fall back to the base release again.
async fn unpublish_document(
    State(state): State<AppState>,
    Path((uuid, content_type, document_key)): Path<(Uuid, String, String)>,
) -> ApiResult<Json<Success<Value>>> {
    let release = state.publisher().release(uuid).await?;
    state
        .publisher()
        .documents()
        .unpublish(&release, &content_type, &document_key)
        .await?;
    Ok(success(Value::Null))
}

/// Tombstone: hides the key, including any inherited copy.
async fn remove_document(
    State(state): State<AppState>,
    Path((uuid, content_type, document_key)): Path<(Uuid, String, String)>,
) -> ApiResult<Json<Success<ReleaseDocument>>> {
    let release = state.publisher().release(uuid).await?;
    let document = state
        .publisher()
        .documents()
        .soft_delete(&release, &content_type, &document_key)
        .await?;
    Ok(success(document))
}

async fn read_document(
    State(state): State<AppState>,
    Path((site_code, release, content_type, document_key)): Path<(String, String, String, String)>,
) -> ApiResult<Json<Success<Value>>> {
    let selector = ReleaseSelector::parse(&release).ok_or_else(|| {
        ApiError::BadRequest(format!("{release:?} is neither \"live\" nor a release uuid"))
    })?;
    let body = state
        .publisher()
        .get_document(&site_code, selector, &content_type, &document_key)
        .await?;
    Ok(success(body))
}

#[cfg(test)]
mod tests {
    use reqwest::{Client, StatusCode};
    use serde_json::{json, Value};

    use crate::routes::testing::spawn_app;

    async fn send(request: reqwest::RequestBuilder) -> (StatusCode, Value) {
        let response = request.send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn published_document_is_served_live() {
        let (base, _) = spawn_app().await;
        let client = Client::new();
        let (_, created) = send(
            client
                .post(format!("{base}/v1/releases"))
                .json(&json!({"site_code": "s1", "title": "r1", "version": "0.1"})),
        )
        .await;
        let uuid = created["content"]["uuid"].as_str().unwrap().to_string();

        let (status, _) = send(
            client
                .put(format!("{base}/v1/releases/{uuid}/documents/page/3"))
                .json(&json!({"document_json": {"title": "T1"}, "parameters": {"revision_id": 9}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(client.post(format!("{base}/v1/releases/{uuid}/live"))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) =
            send(client.get(format!("{base}/v1/sites/s1/documents/live/page/3"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["content"], json!({"title": "T1"}));

        let (status, body) =
            send(client.get(format!("{base}/v1/sites/s1/documents/live/page/4"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error_code"], "release_document_does_not_exist");

        let (status, _) =
            send(client.get(format!("{base}/v1/sites/s1/documents/latest/page/3"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn remove_keeps_a_tombstone_and_unpublish_does_not() {
        let (base, _) = spawn_app().await;
        let client = Client::new();
        let (_, created) = send(
            client
                .post(format!("{base}/v1/releases"))
                .json(&json!({"site_code": "s1", "title": "r1"})),
        )
        .await;
        let uuid = created["content"]["uuid"].as_str().unwrap().to_string();
        let doc_url = |key: &str| format!("{base}/v1/releases/{uuid}/documents/page/{key}");

        for key in ["1", "2"] {
            send(client.put(doc_url(key)).json(&json!({"document_json": {"title": key}}))).await;
        }

        let (status, removed) = send(client.post(format!("{}/remove", doc_url("1")))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(removed["content"]["deleted"], true);

        let (status, _) = send(client.delete(doc_url("2"))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(client.delete(doc_url("2"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");

        let (_, listed) = send(client.get(format!("{base}/v1/releases/{uuid}/documents"))).await;
        let listed = listed["content"].as_array().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["document_key"], "1");
        assert_eq!(listed[0]["deleted"], true);
    }
}
