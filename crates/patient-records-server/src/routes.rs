//! HTTP routes mapping requests onto the record store.
//!
//! Every body is a JSON envelope with an explicit `success` flag so callers
//! can tell delivery apart from outcome. Store calls run on the blocking pool
//! since SQLite access is synchronous.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use patient_records_core::{HealthReport, NewPatient, RecordStore, StoreError, StoreResult};
use serde::Serialize;
use tracing::{error, warn};

pub type SharedStore = Arc<RecordStore>;

/// Response envelope shared by every route.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            count: None,
            error: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            count: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            count: None,
            error: Some(error.into()),
        }
    }
}

/// Request failure carrying its HTTP status.
#[derive(Debug)]
pub enum ApiError {
    Store(StoreError),
    BadRequest(String),
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Store(StoreError::Validation { field, reason }) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid field {}: {}", field, reason),
            ),
            ApiError::Store(StoreError::Conflict(_)) => {
                (StatusCode::CONFLICT, "Patient ID already exists".to_string())
            }
            ApiError::Store(StoreError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "Patient not found".to_string())
            }
            ApiError::Store(StoreError::StorageUnavailable(detail)) => {
                error!(error = %detail, "storage unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Storage unavailable: {}", detail),
                )
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(detail) => {
                error!(error = %detail, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
        };
        (status, Json(ApiResponse::failure(message))).into_response()
    }
}

/// Build the application router around a shared store.
pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/api/patients", get(list_patients).post(add_patient))
        .route("/api/patients/{pid}", get(get_patient).delete(delete_patient))
        .route("/api/health", get(health))
        .layer(middleware::from_fn(cors))
        .with_state(store)
}

/// Run a store operation on the blocking pool.
async fn with_store<T, F>(store: SharedStore, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&RecordStore) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {}", e)))?
        .map_err(ApiError::from)
}

pub async fn list_patients(State(store): State<SharedStore>) -> Result<Response, ApiError> {
    let records = with_store(store, |s| s.get_all()).await?;
    let count = records.len();
    Ok((StatusCode::OK, Json(ApiResponse::ok(records).with_count(count))).into_response())
}

pub async fn get_patient(
    State(store): State<SharedStore>,
    Path(pid): Path<String>,
) -> Result<Response, ApiError> {
    let record = with_store(store, move |s| s.get(&pid)).await?;
    Ok((StatusCode::OK, Json(ApiResponse::ok(record))).into_response())
}

pub async fn add_patient(
    State(store): State<SharedStore>,
    payload: Result<Json<NewPatient>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(candidate) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected patient payload");
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let record = with_store(store, move |s| s.insert(&candidate)).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(record).with_message("Patient added successfully")),
    )
        .into_response())
}

pub async fn delete_patient(
    State(store): State<SharedStore>,
    Path(pid): Path<String>,
) -> Result<Response, ApiError> {
    with_store(store, move |s| s.delete(&pid)).await?;
    Ok((
        StatusCode::OK,
        Json(ApiResponse::message("Patient deleted successfully")),
    )
        .into_response())
}

pub async fn health(State(store): State<SharedStore>) -> Response {
    let report = tokio::task::spawn_blocking(move || store.health()).await;
    match report {
        Ok(report) if report.database_reachable => (
            StatusCode::OK,
            Json(
                ApiResponse::ok(report)
                    .with_message("API is running and database connection is healthy"),
            ),
        )
            .into_response(),
        Ok(report) => degraded(report.error.unwrap_or_default()),
        Err(e) => degraded(format!("health probe failed: {}", e)),
    }
}

fn degraded(error: String) -> Response {
    let body: ApiResponse<HealthReport> = ApiResponse {
        success: false,
        message: Some("API is running but database connection failed".into()),
        data: None,
        count: None,
        error: Some(error),
    };
    (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
}

/// Permissive cross-origin headers; preflight requests are answered here.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use patient_records_core::models::AgeField;
    use serde_json::Value;

    fn shared_store() -> SharedStore {
        Arc::new(RecordStore::open_in_memory().unwrap())
    }

    fn jane() -> NewPatient {
        NewPatient::new("P100", "Jane Doe", 34, "F", "flu", "Dr. Lee")
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_list_empty() {
        let response = list_patients(State(shared_store())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 0);
        assert_eq!(body["data"], Value::Array(vec![]));
    }

    #[tokio::test]
    async fn test_add_then_get() {
        let store = shared_store();

        let response = add_patient(State(store.clone()), Ok(Json(jane())))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Patient added successfully");
        assert_eq!(body["data"]["pid"], "P100");
        assert_eq!(body["data"]["hash_index"], 5);

        let response = get_patient(State(store.clone()), Path("P100".to_string()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["name"], "Jane Doe");
        assert_eq!(body["data"]["disease"], "flu");
        assert_eq!(body["data"]["doctor"], "Dr. Lee");

        let response = list_patients(State(store)).await.into_response();
        let body = body_json(response).await;
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn test_add_validation_and_conflict_statuses_differ() {
        let store = shared_store();

        let mut bad = jane();
        bad.age = Some(AgeField::Integer(151));
        let response = add_patient(State(store.clone()), Ok(Json(bad)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("age"));

        add_patient(State(store.clone()), Ok(Json(jane())))
            .await
            .into_response();
        let response = add_patient(State(store), Ok(Json(jane())))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Patient ID already exists");
    }

    #[tokio::test]
    async fn test_get_and_delete_missing() {
        let store = shared_store();

        let response = get_patient(State(store.clone()), Path("P404".to_string()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Patient not found");

        let response = delete_patient(State(store), Path("P404".to_string()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = shared_store();
        store.insert(&jane()).unwrap();

        let response = delete_patient(State(store.clone()), Path("P100".to_string()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Patient deleted successfully");
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_health_ok() {
        let response = health(State(shared_store())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["database_reachable"], true);
    }

    #[tokio::test]
    async fn test_degraded_health_shape() {
        let response = degraded("disk gone".into());
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "disk gone");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn test_storage_error_maps_to_500() {
        let response =
            ApiError::from(StoreError::StorageUnavailable("locked".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["success"], false);
    }
}
