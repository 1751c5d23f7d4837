//! HTTP routes.
//!
//! `/api/...` is the UI-facing contract: four read endpoints plus the
//! fine-tune trigger. `/internal/...` is the trainer-facing ingestion
//! surface; the trainer pushes progress, loss samples, and lifecycle calls
//! in, and observes job state for cooperative cancellation.

use crate::error::ApiError;
use crate::facade::{AbTestSet, BaseModelRow, FineTuneRow};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use flywheel_experiments::{SetId, Trial, TrialId, Variant};
use flywheel_registry::{Model, ModelId};
use flywheel_training::{JobId, LossSample, TrainingJob};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/basemodels", get(get_base_models))
        .route("/api/finetunes", get(get_fine_tunes))
        .route("/api/lossdata", get(get_loss_data))
        .route("/api/abtests", get(get_ab_tests))
        .route("/api/finetune", post(trigger_fine_tune))
        .route("/internal/basemodels", post(register_base_model))
        .route("/internal/jobs/{id}", get(get_job))
        .route("/internal/jobs/{id}/start", post(start_job))
        .route("/internal/jobs/{id}/progress", post(report_job_progress))
        .route("/internal/jobs/{id}/loss", post(append_job_loss))
        .route("/internal/jobs/{id}/complete", post(complete_job))
        .route("/internal/jobs/{id}/fail", post(fail_job))
        .route("/internal/jobs/{id}/cancel", post(cancel_job))
        .route("/internal/experiments/{set_id}/trials", post(record_trial))
        .with_state(state)
}

async fn get_base_models(State(state): State<Arc<AppState>>) -> Json<Vec<BaseModelRow>> {
    Json(state.facade.base_models().await)
}

async fn get_fine_tunes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<FineTuneRow>>, ApiError> {
    Ok(Json(state.facade.fine_tunes().await?))
}

#[derive(Deserialize)]
struct LossQuery {
    model: String,
}

async fn get_loss_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LossQuery>,
) -> Json<Vec<LossSample>> {
    Json(state.facade.loss_data(&query.model).await)
}

async fn get_ab_tests(State(state): State<Arc<AppState>>) -> Json<Vec<AbTestSet>> {
    Json(state.facade.ab_tests().await)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FineTuneRequest {
    model_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FineTuneAccepted {
    job_id: JobId,
}

async fn trigger_fine_tune(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FineTuneRequest>,
) -> Result<(StatusCode, Json<FineTuneAccepted>), ApiError> {
    let job = state.scheduler.submit(&ModelId(req.model_id)).await?;
    Ok((StatusCode::ACCEPTED, Json(FineTuneAccepted { job_id: job.id })))
}

#[derive(Deserialize)]
struct RegisterBaseRequest {
    name: String,
}

async fn register_base_model(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterBaseRequest>,
) -> Result<Json<Model>, ApiError> {
    Ok(Json(state.registry.register_base(&req.name).await?))
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TrainingJob>, ApiError> {
    Ok(Json(state.scheduler.get(&JobId(id)).await?))
}

async fn start_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.scheduler.start(&JobId(id)).await?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct ProgressRequest {
    progress: u8,
}

async fn report_job_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ProgressRequest>,
) -> Result<StatusCode, ApiError> {
    state.scheduler.report_progress(&JobId(id), req.progress).await?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct LossRequest {
    epoch: u32,
    loss: f64,
}

async fn append_job_loss(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<LossRequest>,
) -> Result<StatusCode, ApiError> {
    state.recorder.append_sample(&JobId(id), req.epoch, req.loss).await?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteRequest {
    model_name: String,
}

async fn complete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<Model>, ApiError> {
    Ok(Json(state.scheduler.complete(&JobId(id), &req.model_name).await?))
}

#[derive(Deserialize)]
struct FailRequest {
    reason: String,
}

async fn fail_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<FailRequest>,
) -> Result<StatusCode, ApiError> {
    state.scheduler.fail(&JobId(id), &req.reason).await?;
    Ok(StatusCode::OK)
}

async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.scheduler.cancel(&JobId(id)).await?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantInput {
    name: String,
    conversions: u64,
    visitors: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrialInput {
    name: String,
    variants_label: String,
    variants: Vec<VariantInput>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordTrialRequest {
    name: String,
    #[serde(default)]
    description: String,
    trial: TrialInput,
}

async fn record_trial(
    State(state): State<Arc<AppState>>,
    Path(set_id): Path<String>,
    Json(req): Json<RecordTrialRequest>,
) -> Result<StatusCode, ApiError> {
    let trial = Trial {
        id: TrialId::new(),
        name: req.trial.name,
        variants_label: req.trial.variants_label,
        variants: req
            .trial
            .variants
            .into_iter()
            .map(|v| Variant { name: v.name, conversions: v.conversions, visitors: v.visitors })
            .collect(),
    };
    state
        .experiments
        .record_trial(&SetId(set_id), &req.name, &req.description, trial)
        .await?;
    Ok(StatusCode::OK)
}
