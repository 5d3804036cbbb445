use objcentric_core::{HealthResponse, PredictError, PredictRequest, PredictResponse};
use rocket::{
    Catcher, Request, Route, State,
    response::content::RawHtml,
    serde::json::{self, Json, Value},
};

use crate::{docs, error::ApiError, state::AppState};

pub fn routes() -> Vec<Route> {
    routes![predict, swagger_ui, redoc, openapi, health]
}

pub fn catchers() -> Vec<Catcher> {
    catchers![bad_request, not_found, unprocessable, internal]
}

/// Run pool work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PredictError> + Send + 'static,
{
    rocket::tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| ApiError::Internal(format!("Blocking task failed: {err}")))?
        .map_err(ApiError::from)
}

#[post("/predict", data = "<body>")]
pub async fn predict(
    state: &State<AppState>,
    body: Result<Json<PredictRequest>, json::Error<'_>>,
) -> Result<Json<PredictResponse>, ApiError> {
    let request = body?.into_inner();
    let predictor = state.predictor();
    let response = blocking(move || predictor.predict(&request)).await?;
    log::debug!(
        "Prediction: {} matches, pool size {}",
        response.matched_kernel_ids.len(),
        response.num_kernels
    );
    Ok(Json(response))
}

#[get("/docs")]
pub fn swagger_ui() -> RawHtml<&'static str> {
    RawHtml(docs::DOCS_PAGE)
}

#[get("/redoc")]
pub fn redoc() -> RawHtml<&'static str> {
    RawHtml(docs::REDOC_PAGE)
}

#[get("/openapi.json")]
pub fn openapi() -> Json<Value> {
    Json(docs::openapi_document())
}

#[get("/health")]
pub async fn health(state: &State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let state = state.inner().clone();
    Ok(Json(blocking(move || state.health()).await?))
}

#[catch(400)]
pub fn bad_request(req: &Request<'_>) -> ApiError {
    ApiError::BadRequest(format!("Malformed request to {}", req.uri()))
}

#[catch(404)]
pub fn not_found(req: &Request<'_>) -> ApiError {
    ApiError::NotFound(format!("No route for {} {}", req.method(), req.uri()))
}

#[catch(422)]
pub fn unprocessable(req: &Request<'_>) -> ApiError {
    ApiError::Unprocessable(format!("Unprocessable request to {}", req.uri()))
}

#[catch(500)]
pub fn internal(req: &Request<'_>) -> ApiError {
    ApiError::Internal(format!("Internal error while handling {}", req.uri()))
}
