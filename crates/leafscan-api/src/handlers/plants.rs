//! Supported plant listing.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct PlantEntry {
    pub plant: String,
    pub model_id: String,
}

#[derive(Serialize)]
pub struct PlantsResponse {
    pub plants: Vec<PlantEntry>,
}

/// List every accepted plant label with the model it maps to.
pub async fn list_plants(State(state): State<AppState>) -> Json<PlantsResponse> {
    let plants = state
        .registry
        .iter()
        .map(|(plant, model)| PlantEntry {
            plant: plant.to_string(),
            model_id: model.to_string(),
        })
        .collect();

    Json(PlantsResponse { plants })
}
