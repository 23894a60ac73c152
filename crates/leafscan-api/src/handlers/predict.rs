//! Prediction handler.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use leafscan_media::supported_extension;
use leafscan_models::{BoundingBox, InferenceResult, Prediction};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

const IMAGE_FIELDS: [&str; 2] = ["file", "image"];
const PLANT_FIELDS: [&str; 2] = ["plant", "plant_type"];

/// One prediction as returned to the client.
#[derive(Debug, Serialize)]
pub struct PredictionView {
    #[serde(rename = "class")]
    pub label: String,
    pub confidence: f64,
    pub confidence_text: String,
    pub bbox: Option<BoundingBox>,
}

impl From<&Prediction> for PredictionView {
    fn from(prediction: &Prediction) -> Self {
        Self {
            label: prediction.label.clone(),
            confidence: prediction.confidence,
            confidence_text: prediction.confidence_text(),
            bbox: prediction.spatial.map(|b| b.to_corners()),
        }
    }
}

/// Successful prediction response.
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub plant: String,
    pub model_id: String,
    /// Body returned by the remote service, untouched
    pub results: Value,
    pub predictions: Vec<PredictionView>,
    /// Whether any box was drawn
    pub annotated: bool,
    pub annotated_image_url: String,
}

/// Multipart fields of a prediction request, fully buffered.
#[derive(Debug, Default)]
struct PredictForm {
    image: Option<Vec<u8>>,
    plant: Option<String>,
}

impl PredictForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if IMAGE_FIELDS.contains(&name.as_str()) {
                form.image = Some(field.bytes().await?.to_vec());
            } else if PLANT_FIELDS.contains(&name.as_str()) {
                form.plant = Some(field.text().await?);
            }
        }

        Ok(form)
    }
}

/// Classify an uploaded leaf image with the model registered for its plant.
///
/// The plant label and the image format are checked before anything touches
/// disk or the network. The upload lives in a temporary file only for the
/// duration of the inference call.
pub async fn predict(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<PredictResponse>> {
    let form = PredictForm::read(multipart).await?;

    let plant = form
        .plant
        .ok_or_else(|| ApiError::bad_request("Missing 'plant' field"))?;
    let model = match state.registry.resolve(&plant) {
        Ok(model) => model.clone(),
        Err(e) => {
            metrics::record_prediction("unknown", "invalid_plant");
            return Err(e.into());
        }
    };
    let plant = plant.trim().to_lowercase();

    let image = form
        .image
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing image in 'file' field"))?;
    metrics::record_upload_size(image.len());
    let extension = supported_extension(&image).ok_or_else(|| {
        metrics::record_prediction(&plant, "invalid_image");
        ApiError::bad_request("Uploaded file is not a JPEG, PNG, WebP or BMP image")
    })?;

    let upload = state.store.save_upload(&image, extension).await?;

    let result = match state.inference.infer(upload.path(), &model).await {
        Ok(result) => result,
        Err(e) => {
            warn!(plant = %plant, model = %model, "Inference failed: {}", e);
            metrics::record_prediction(&plant, "inference_failed");
            upload.remove().await;
            return Err(e.into());
        }
    };
    upload.remove().await;

    let annotator = Arc::clone(&state.annotator);
    let (annotated, result) = tokio::task::spawn_blocking(move || {
        let annotated = annotator.annotate(&image, &result);
        (annotated, result)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Annotation task failed: {}", e)))?;
    let annotated = annotated?;

    let name = state
        .store
        .save_annotated(&annotated.bytes, annotated.extension)
        .await?;

    info!(
        plant = %plant,
        model = %model,
        predictions = result.predictions.len(),
        boxes = annotated.boxes_drawn,
        file = %name,
        "Prediction completed"
    );
    metrics::record_prediction(&plant, "success");

    Ok(Json(build_response(plant, model.to_string(), result, annotated.is_modified(), name.download_path())))
}

fn build_response(
    plant: String,
    model_id: String,
    result: InferenceResult,
    annotated: bool,
    annotated_image_url: String,
) -> PredictResponse {
    PredictResponse {
        plant,
        model_id,
        predictions: result.predictions.iter().map(PredictionView::from).collect(),
        results: result.raw,
        annotated,
        annotated_image_url,
    }
}
