use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::info;

use crate::models::{InvestorSearchRequest, InvestorSearchResponse};
use crate::services::InvestorService;
use crate::utils::error::ApiError;

/// Upper bound on `limit` for direct searches.
const MAX_LIMIT: usize = 100;

pub async fn search_investors_handler(
    State(investor_service): State<Arc<InvestorService>>,
    Json(request): Json<InvestorSearchRequest>,
) -> Result<Json<InvestorSearchResponse>, ApiError> {
    let sectors: Vec<String> = request
        .sectors
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if sectors.is_empty() {
        return Err(ApiError::BadRequest("At least one sector is required".to_string()));
    }

    let limit = request
        .limit
        .unwrap_or_else(|| investor_service.default_limit())
        .clamp(1, MAX_LIMIT);
    let found = investor_service
        .find_investors(
            &sectors,
            request.location.as_deref(),
            limit,
            request.enrich.unwrap_or(true),
            None,
        )
        .await?;

    info!("Direct search for {:?} returned {} investors", sectors, found.investors.len());
    Ok(Json(InvestorSearchResponse {
        total: found.investors.len(),
        investors: found.investors,
        search_results: found.search_results,
        cached: found.cached,
    }))
}
