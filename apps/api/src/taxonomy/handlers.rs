use axum::{extract::State, Json};

use crate::state::AppState;
use crate::taxonomy::{summarize, TaxonomySummary};

/// GET /api/v1/taxonomy
pub async fn handle_get_taxonomy(State(state): State<AppState>) -> Json<TaxonomySummary> {
    Json(summarize(&state.taxonomy))
}
