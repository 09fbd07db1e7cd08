use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use snapshot_publisher_core::release::model::{ContentRelease, NewRelease, ReleaseStatus};
use uuid::Uuid;

use super::{success, Success};
use crate::error::ApiResult;
use crate::state::AppState;

type ReleaseResponse = ApiResult<Json<Success<ContentRelease>>>;

/// Release queries and lifecycle transitions.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/sites", get(list_site_codes))
        .route("/v1/sites/{site_code}/releases", get(list_releases))
        .route("/v1/sites/{site_code}/live", get(live_release))
        .route("/v1/sites/{site_code}/stage", get(stage_release))
        .route("/v1/sites/{site_code}/upcoming", get(upcoming_releases))
        .route("/v1/releases", post(create_release))
        .route("/v1/releases/{uuid}", get(get_release))
        .route("/v1/releases/{uuid}/stage", post(set_stage))
        .route("/v1/releases/{uuid}/unstage", post(unset_stage))
        .route("/v1/releases/{uuid}/live", post(set_live))
        .route("/v1/releases/{uuid}/archive", post(archive))
        .route("/v1/releases/{uuid}/unfreeze", post(unfreeze))
        .route("/v1/releases/{uuid}/restore", post(restore))
        .route("/v1/releases/{uuid}/reindex", post(reindex))
}

#[derive(Debug, Default, Deserialize)]
struct ScheduleRequest {
    publish_datetime: Option<DateTime<Utc>>,
    publisher: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpcomingQuery {
    status: Option<ReleaseStatus>,
    after: Option<DateTime<Utc>>,
}

async fn list_site_codes(State(state): State<AppState>) -> ApiResult<Json<Success<Vec<String>>>> {
    Ok(success(state.publisher().list_site_codes().await?))
}

async fn list_releases(
    State(state): State<AppState>,
    Path(site_code): Path<String>,
) -> ApiResult<Json<Success<Vec<ContentRelease>>>> {
    Ok(success(state.publisher().list_releases(&site_code).await?))
}

async fn live_release(State(state): State<AppState>, Path(site_code): Path<String>) -> ReleaseResponse {
    Ok(success(state.publisher().get_live_release(&site_code).await?))
}

async fn stage_release(State(state): State<AppState>, Path(site_code): Path<String>) -> ReleaseResponse {
    Ok(success(state.publisher().get_stage_release(&site_code).await?))
}

/// Scheduled releases still ahead. Defaults to staged releases after now.
async fn upcoming_releases(
    State(state): State<AppState>,
    Path(site_code): Path<String>,
    Query(query): Query<UpcomingQuery>,
) -> ApiResult<Json<Success<Vec<ContentRelease>>>> {
    let releases = state
        .publisher()
        .list_upcoming_releases(
            &site_code,
            query.status.unwrap_or(ReleaseStatus::Staged),
            query.after.unwrap_or_else(Utc::now),
        )
        .await?;
    Ok(success(releases))
}

async fn create_release(
    State(state): State<AppState>,
    Json(new): Json<NewRelease>,
) -> ApiResult<(StatusCode, Json<Success<ContentRelease>>)> {
    let release = state.publisher().create_release(new).await?;
    Ok((StatusCode::CREATED, success(release)))
}

async fn get_release(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> ReleaseResponse {
    Ok(success(state.publisher().release(uuid).await?))
}

async fn set_stage(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    body: Option<Json<ScheduleRequest>>,
) -> ReleaseResponse {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let release = state
        .publisher()
        .lifecycle()
        .set_stage(uuid, request.publish_datetime)
        .await?;
    Ok(success(release))
}

async fn unset_stage(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> ReleaseResponse {
    Ok(success(state.publisher().lifecycle().unset_stage(uuid).await?))
}

async fn set_live(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    body: Option<Json<ScheduleRequest>>,
) -> ReleaseResponse {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let release = state
        .publisher()
        .lifecycle()
        .set_live(uuid, request.publish_datetime, request.publisher)
        .await?;
    Ok(success(release))
}

async fn archive(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> ReleaseResponse {
    Ok(success(state.publisher().lifecycle().archive(uuid).await?))
}

async fn unfreeze(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> ReleaseResponse {
    Ok(success(state.publisher().lifecycle().unfreeze(uuid).await?))
}

async fn restore(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    body: Option<Json<ScheduleRequest>>,
) -> ReleaseResponse {
    let publisher = body.and_then(|Json(request)| request.publisher);
    Ok(success(state.publisher().lifecycle().restore(uuid, publisher).await?))
}

async fn reindex(State(state): State<AppState>, Path(uuid): Path<Uuid>) -> ReleaseResponse {
    Ok(success(state.publisher().lifecycle().reindex(uuid).await?))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use reqwest::{Client, StatusCode};
    use serde_json::{json, Value};

    use crate::routes::testing::spawn_app;

    async fn create(client: &Client, base: &str, site: &str, title: &str) -> Value {
        let response = client
            .post(format!("{base}/v1/releases"))
            .json(&json!({"site_code": site, "title": title}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json::<Value>().await.unwrap()["content"].clone()
    }

    #[tokio::test]
    async fn release_goes_live_through_the_api() {
        let (base, _) = spawn_app().await;
        let client = Client::new();
        let release = create(&client, &base, "s1", "Spring").await;
        let uuid = release["uuid"].as_str().unwrap();
        assert_eq!(release["status"], "DRAFT");

        let live: Value = client
            .post(format!("{base}/v1/releases/{uuid}/live"))
            .json(&json!({"publisher": "editor"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(live["status"], "success");
        assert_eq!(live["content"]["status"], "LIVE");
        assert_eq!(live["content"]["version"], "0.1");

        let current: Value = client
            .get(format!("{base}/v1/sites/s1/live"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(current["content"]["uuid"], uuid);

        let sites: Value = client
            .get(format!("{base}/v1/sites"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(sites["content"], json!(["s1"]));
    }

    #[tokio::test]
    async fn errors_use_the_envelope() {
        let (base, _) = spawn_app().await;
        let client = Client::new();

        let response = client
            .get(format!("{base}/v1/sites/s1/live"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["error_code"], "no_content_release_live");

        let release = create(&client, &base, "s1", "Spring").await;
        let uuid = release["uuid"].as_str().unwrap();
        let response = client
            .post(format!("{base}/v1/releases/{uuid}/archive"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error_code"], "illegal_state");

        let response = client
            .post(format!("{base}/v1/releases/{uuid}/live"))
            .json(&json!({"publish_datetime": "2001-01-01T00:00:00Z"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn scheduled_releases_are_listed_as_upcoming() {
        let (base, state) = spawn_app().await;
        let client = Client::new();
        let release = create(&client, &base, "s1", "Autumn").await;
        let uuid = release["uuid"].as_str().unwrap();
        let at = chrono::Utc::now() + Duration::days(3);

        let response = client
            .post(format!("{base}/v1/releases/{uuid}/live"))
            .json(&json!({"publish_datetime": at}))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        let upcoming: Value = client
            .get(format!("{base}/v1/sites/s1/upcoming"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(upcoming["content"][0]["uuid"], uuid);

        let promoted = state.publisher().settle_all(at + Duration::seconds(1)).await.unwrap();
        assert_eq!(promoted.len(), 1);
        let stage = client
            .get(format!("{base}/v1/sites/s1/stage"))
            .send()
            .await
            .unwrap();
        assert_eq!(stage.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn restore_creates_a_live_copy() {
        let (base, _) = spawn_app().await;
        let client = Client::new();
        let first = create(&client, &base, "s1", "Winter").await;
        let second = create(&client, &base, "s1", "Spring").await;
        let first_uuid = first["uuid"].as_str().unwrap();
        let second_uuid = second["uuid"].as_str().unwrap();

        for uuid in [first_uuid, second_uuid] {
            client
                .post(format!("{base}/v1/releases/{uuid}/live"))
                .send()
                .await
                .unwrap();
        }

        let restored: Value = client
            .post(format!("{base}/v1/releases/{first_uuid}/restore"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(restored["content"]["title"], "Winter - Restored");
        assert_eq!(restored["content"]["base_release"], first_uuid);
        assert_eq!(restored["content"]["status"], "LIVE");
    }
}
