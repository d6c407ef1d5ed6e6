//! Email masking and classification handlers
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use mailmask_pii::MaskedEntity;
use mailmask_pipeline::{MaskedEmail, ProcessedEmail};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Email request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailRequest {
    /// Raw support email body
    #[schema(example = "Hi, my name is John Doe. My card 4111 1111 1111 1111 was charged twice.")]
    pub input_email_body: String,
}

/// One masked entity
#[derive(Debug, Serialize, ToSchema)]
pub struct MaskedEntityResponse {
    /// `[start, end)` character offsets in the normalized body
    #[schema(value_type = Vec<usize>)]
    pub position: [usize; 2],

    /// Entity type
    #[schema(example = "credit_debit_no")]
    pub classification: String,

    /// Original value
    #[schema(example = "4111 1111 1111 1111")]
    pub entity: String,
}

impl From<MaskedEntity> for MaskedEntityResponse {
    fn from(entity: MaskedEntity) -> Self {
        Self {
            position: entity.position,
            classification: entity.classification.as_str().to_string(),
            entity: entity.entity,
        }
    }
}

/// Masking and classification response body
#[derive(Debug, Serialize, ToSchema)]
pub struct ClassifyResponse {
    /// Body exactly as received
    pub input_email_body: String,

    pub list_of_masked_entities: Vec<MaskedEntityResponse>,

    #[schema(example = "Hi, my name is [full_name]. My card [credit_debit_no] was charged twice.")]
    pub masked_email: String,

    /// Incident, Request, Change or Problem
    #[schema(example = "Problem")]
    pub category_of_the_email: String,
}

impl From<ProcessedEmail> for ClassifyResponse {
    fn from(result: ProcessedEmail) -> Self {
        Self {
            input_email_body: result.input_email_body,
            list_of_masked_entities: result
                .list_of_masked_entities
                .into_iter()
                .map(Into::into)
                .collect(),
            masked_email: result.masked_email,
            category_of_the_email: result.category_of_the_email.as_str().to_string(),
        }
    }
}

/// Masking-only response body
#[derive(Debug, Serialize, ToSchema)]
pub struct MaskResponse {
    pub input_email_body: String,
    pub list_of_masked_entities: Vec<MaskedEntityResponse>,
    pub masked_email: String,
}

impl From<MaskedEmail> for MaskResponse {
    fn from(result: MaskedEmail) -> Self {
        Self {
            input_email_body: result.input_email_body,
            list_of_masked_entities: result
                .list_of_masked_entities
                .into_iter()
                .map(Into::into)
                .collect(),
            masked_email: result.masked_email,
        }
    }
}

/// Mask PII/PCI in an email and classify it
#[utoipa::path(
    post,
    path = "/classify",
    tag = "email",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Email masked and classified", body = ClassifyResponse),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 500, description = "Masking failed", body = crate::error::ApiError),
        (status = 502, description = "Classifier failed", body = crate::error::ApiError)
    )
)]
pub async fn classify_email(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let Json(req) = payload?;

    let result = state.processor.process(&req.input_email_body).await?;

    state.record_entities(result.list_of_masked_entities.iter().map(|e| e.classification));
    state.record_category(result.category_of_the_email);

    Ok(Json(result.into()))
}

/// Mask PII/PCI in an email without classifying it
#[utoipa::path(
    post,
    path = "/mask",
    tag = "email",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Email masked", body = MaskResponse),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 500, description = "Masking failed", body = crate::error::ApiError)
    )
)]
pub async fn mask_email(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<MaskResponse>, AppError> {
    let Json(req) = payload?;

    let result = state.processor.mask_only(&req.input_email_body)?;

    state.record_entities(result.list_of_masked_entities.iter().map(|e| e.classification));

    Ok(Json(result.into()))
}
