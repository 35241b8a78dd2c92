//! REST handlers for the clinical data dictionary.
//!
//! Thin translation layer: extract the request, call the dictionary
//! service, map [`DictionaryError`] to a status code and JSON error body.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cdd_common::{CancerStudy, ClinicalAttributeMetadata, DictionaryError};
use cdd_dictionary::{DictionaryService, MetadataCache};
use serde::Deserialize;

/// Shared state for API handlers.
pub struct AppState {
    pub service: DictionaryService,
    pub cache: Arc<MetadataCache>,
}

/// Query parameters accepted by the metadata endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct MetadataQuery {
    #[serde(rename = "cancerStudy")]
    pub cancer_study: Option<String>,
}

/// Handler error: a [`DictionaryError`] plus its wire representation.
pub struct ApiError(DictionaryError);

impl From<DictionaryError> for ApiError {
    fn from(error: DictionaryError) -> Self {
        Self(error)
    }
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self.0 {
            DictionaryError::SourceUnavailable(_) => "source_unavailable",
            DictionaryError::CacheInvalid => "cache_invalid",
            DictionaryError::StudyNotFound(_) => "study_not_found",
            DictionaryError::AttributeNotFound { .. } => "attribute_not_found",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::json!({
            "error": self.kind(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// GET /api: every attribute in the dictionary, with the study's overrides
/// applied when `?cancerStudy=` is given.
pub async fn list_metadata(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MetadataQuery>,
) -> ApiResult<Json<Vec<ClinicalAttributeMetadata>>> {
    let records = state.service.all_metadata(query.cancer_study.as_deref())?;
    Ok(Json(records))
}

/// POST /api: just the requested column headers, in request order. One
/// unknown header fails the whole request.
pub async fn resolve_metadata(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MetadataQuery>,
    Json(column_headers): Json<Vec<String>>,
) -> ApiResult<Json<Vec<ClinicalAttributeMetadata>>> {
    let records = state
        .service
        .resolve(query.cancer_study.as_deref(), &column_headers)?;
    Ok(Json(records))
}

/// GET /api/cancerStudies: every study with at least one override.
pub async fn list_cancer_studies(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<CancerStudy>>> {
    Ok(Json(state.service.cancer_studies()?))
}

/// GET /api/refreshCache: refresh from the source right now. Responds 200
/// with an empty body on success, 503 when the source is down.
pub async fn refresh_cache(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    state.service.force_refresh().await?;
    Ok(StatusCode::OK)
}

/// GET /api/{column_header}: a single attribute, study-resolved like the
/// batch endpoints.
pub async fn get_metadata(
    State(state): State<Arc<AppState>>,
    Path(column_header): Path<String>,
    Query(query): Query<MetadataQuery>,
) -> ApiResult<Json<ClinicalAttributeMetadata>> {
    let record = state
        .service
        .metadata_for_header(query.cancer_study.as_deref(), &column_header)?;
    Ok(Json(record))
}

/// GET /health: 200 while the dictionary is being served, 503 once it has
/// expired (or was never loaded).
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    if state.cache.is_valid() {
        (
            StatusCode::OK,
            Json(serde_json::json!({"status": "healthy"})),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "degraded"})),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cdd_graphite::{ClinicalAttributeSource, SourceError};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Two defaults and one override, switchable to a dead source mid-test.
    struct FakeSource {
        broken: AtomicBool,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                broken: AtomicBool::new(false),
            }
        }

        fn set_broken(&self, broken: bool) {
            self.broken.store(broken, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), SourceError> {
            if self.broken.load(Ordering::SeqCst) {
                Err(SourceError::Unavailable("source offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ClinicalAttributeSource for FakeSource {
        async fn fetch_attributes(&self) -> Result<Vec<ClinicalAttributeMetadata>, SourceError> {
            self.check()?;
            Ok(vec![
                ClinicalAttributeMetadata::new(
                    "SAMPLE_TYPE",
                    "Sample Type",
                    "The type of sample.",
                    "STRING",
                    "SAMPLE",
                    "1",
                ),
                ClinicalAttributeMetadata::new(
                    "AGE",
                    "Diagnosis Age",
                    "Age at which a condition or disease was first diagnosed.",
                    "NUMBER",
                    "PATIENT",
                    "1",
                ),
            ])
        }

        async fn fetch_overrides(
            &self,
        ) -> Result<HashMap<String, Vec<ClinicalAttributeMetadata>>, SourceError> {
            self.check()?;
            Ok(HashMap::from([(
                "mskimpact".to_string(),
                vec![ClinicalAttributeMetadata {
                    column_header: "AGE".to_string(),
                    display_name: None,
                    description: None,
                    datatype: None,
                    attribute_type: None,
                    priority: Some("100".to_string()),
                    study_id: Some("mskimpact".to_string()),
                }],
            )]))
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    async fn loaded_state() -> (Arc<AppState>, Arc<FakeSource>) {
        let source = Arc::new(FakeSource::new());
        let cache = Arc::new(MetadataCache::new(source.clone()));
        cache.refresh(false).await.unwrap();
        let state = Arc::new(AppState {
            service: DictionaryService::new(cache.clone()),
            cache,
        });
        (state, source)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_list_metadata_sorted_by_header() {
        let (state, _) = loaded_state().await;
        let response = list_metadata(State(state), Query(MetadataQuery::default()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let records: Vec<ClinicalAttributeMetadata> = body_json(response).await;
        let headers: Vec<_> = records.iter().map(|r| r.column_header.as_str()).collect();
        assert_eq!(headers, vec!["AGE", "SAMPLE_TYPE"]);
    }

    #[tokio::test]
    async fn test_resolve_metadata_applies_study_override() {
        let (state, _) = loaded_state().await;
        let query = MetadataQuery {
            cancer_study: Some("mskimpact".to_string()),
        };
        let response = resolve_metadata(
            State(state),
            Query(query),
            Json(vec!["age".to_string()]),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let records: Vec<ClinicalAttributeMetadata> = body_json(response).await;
        assert_eq!(records[0].priority.as_deref(), Some("100"));
        assert_eq!(records[0].study_id.as_deref(), Some("mskimpact"));
    }

    #[tokio::test]
    async fn test_resolve_metadata_unknown_column_is_404() {
        let (state, _) = loaded_state().await;
        let response = resolve_metadata(
            State(state),
            Query(MetadataQuery::default()),
            Json(vec!["AGE".to_string(), "NOT_A_COLUMN".to_string()]),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["error"], "attribute_not_found");
        assert!(body["message"].as_str().unwrap().contains("NOT_A_COLUMN"));
    }

    #[tokio::test]
    async fn test_unknown_study_is_404() {
        let (state, _) = loaded_state().await;
        let query = MetadataQuery {
            cancer_study: Some("no_such_study".to_string()),
        };
        let response = list_metadata(State(state), Query(query))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["error"], "study_not_found");
    }

    #[tokio::test]
    async fn test_list_cancer_studies() {
        let (state, _) = loaded_state().await;
        let response = list_cancer_studies(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let studies: Vec<CancerStudy> = body_json(response).await;
        assert_eq!(studies, vec![CancerStudy::new("mskimpact")]);
    }

    #[tokio::test]
    async fn test_get_metadata_single_header() {
        let (state, _) = loaded_state().await;
        let response = get_metadata(
            State(state),
            Path("sample_type".to_string()),
            Query(MetadataQuery::default()),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let record: ClinicalAttributeMetadata = body_json(response).await;
        assert_eq!(record.column_header, "SAMPLE_TYPE");
    }

    #[tokio::test]
    async fn test_refresh_cache_ok_with_empty_body() {
        let (state, _) = loaded_state().await;
        let response = refresh_cache(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_cache_reports_source_outage() {
        let (state, source) = loaded_state().await;
        source.set_broken(true);
        let response = refresh_cache(State(state.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["error"], "source_unavailable");
        // The previous dictionary is still served to readers.
        let response = list_metadata(State(state), Query(MetadataQuery::default()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_tracks_dictionary_validity() {
        let (state, source) = loaded_state().await;
        let response = health_check(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);

        source.set_broken(true);
        for _ in 0..3 {
            state.cache.refresh(false).await.unwrap_err();
        }
        let response = health_check(State(state)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
