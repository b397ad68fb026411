use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::AppError;
use crate::handlers::authenticate;
use crate::models::{CaseRecord, CaseStatus};
use crate::server::app_state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct CourtDateQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// GET /api/cases
pub async fn list_cases(req: HttpRequest, state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    authenticate(&req, &state)?;
    let cases = state.cases.list().await?;
    Ok(HttpResponse::Ok().json(cases))
}

/// POST /api/cases
pub async fn create_case(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CaseRecord>,
) -> ActixResult<HttpResponse> {
    let identity = authenticate(&req, &state)?;
    let case = state.cases.create(body.into_inner()).await?;
    debug!("Case {} created by {}", case.id, identity.email);
    Ok(HttpResponse::Created().json(case))
}

/// GET /api/cases/{id}
pub async fn get_case(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    authenticate(&req, &state)?;
    let case = state.cases.get(&path).await?;
    Ok(HttpResponse::Ok().json(case))
}

/// GET /api/cases/{id}/summary
pub async fn case_summary(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    authenticate(&req, &state)?;
    let summary = state.cases.summary(&path).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// PUT /api/cases/{id}
pub async fn update_case(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<CaseRecord>,
) -> ActixResult<HttpResponse> {
    let identity = authenticate(&req, &state)?;
    let case = state.cases.update(&path, body.into_inner()).await?;
    debug!("Case {} updated by {}", case.id, identity.email);
    Ok(HttpResponse::Ok().json(case))
}

/// DELETE /api/cases/{id}
pub async fn delete_case(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let identity = authenticate(&req, &state)?;
    state.cases.delete(&path).await?;
    debug!("Case {} deleted by {}", path.as_str(), identity.email);
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/cases/search?q=
pub async fn search_cases(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> ActixResult<HttpResponse> {
    authenticate(&req, &state)?;
    let cases = state.cases.search(&query.q).await?;
    Ok(HttpResponse::Ok().json(cases))
}

/// GET /api/cases/status/{status}
pub async fn cases_by_status(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    authenticate(&req, &state)?;
    let status: CaseStatus = path.parse().map_err(AppError::Validation)?;
    let cases = state.cases.by_status(status).await?;
    Ok(HttpResponse::Ok().json(cases))
}

/// GET /api/cases/court-dates?start=YYYY-MM-DD&end=YYYY-MM-DD
pub async fn cases_by_court_date(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<CourtDateQuery>,
) -> ActixResult<HttpResponse> {
    authenticate(&req, &state)?;
    let cases = state.cases.by_court_date(query.start, query.end).await?;
    Ok(HttpResponse::Ok().json(cases))
}

/// GET /api/cases/stats
pub async fn case_statistics(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    authenticate(&req, &state)?;
    let stats = state.cases.statistics().await?;
    Ok(HttpResponse::Ok().json(stats))
}

/// POST /api/cases/{id}/export
pub async fn export_case(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    authenticate(&req, &state)?;
    let written = state.cases.export_case(&path).await?;
    Ok(HttpResponse::Ok().json(json!({ "path": written.display().to_string() })))
}

/// POST /api/cases/export/csv
pub async fn export_all_csv(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    authenticate(&req, &state)?;
    let (path, rows) = state.cases.export_csv_snapshot().await?;
    Ok(HttpResponse::Ok().json(json!({
        "path": path.display().to_string(),
        "rows": rows,
    })))
}

/// POST /api/cases/export/json
pub async fn export_all_json(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    authenticate(&req, &state)?;
    let dir = state.cases.export_dir().join("json");
    let files = state.cases.export_json(&dir).await?;
    let paths: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
    Ok(HttpResponse::Ok().json(json!({ "files": paths })))
}
