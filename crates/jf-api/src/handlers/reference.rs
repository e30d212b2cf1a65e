use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use jf_common::gazetteer::available_countries;
use jf_common::ReferenceData;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::SharedState;

#[derive(Debug, Serialize)]
pub struct CountriesResponse {
    pub countries: Vec<String>,
}

/// Countries that have a reference table directory.
pub async fn list_countries(
    State(state): State<SharedState>,
    _auth: AuthUser,
) -> Result<Json<CountriesResponse>, ApiError> {
    let countries = available_countries(state.catalog.resources_dir())?;
    Ok(Json(CountriesResponse { countries }))
}

/// Filter options for one country's dashboard.
pub async fn options(
    State(state): State<SharedState>,
    _auth: AuthUser,
    Path(country): Path<String>,
) -> Result<Json<ReferenceData>, ApiError> {
    let reference = state.catalog.reference(&country)?;
    Ok(Json(ReferenceData::clone(&reference)))
}
