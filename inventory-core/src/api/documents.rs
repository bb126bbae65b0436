use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Extension;
use uuid::Uuid;

use super::middleware::CurrentUser;
use crate::error::AppResult;
use crate::models::Company;
use crate::pdf::{self, PdfFile};
use crate::services::profiles::find_profile_with_company;
use crate::AppState;

/// Letterhead company of the requesting user, if their profile has one.
async fn company_for(state: &AppState, user: &CurrentUser) -> AppResult<Option<Company>> {
    let profile = find_profile_with_company(state.store.as_ref(), user.id).await?;
    Ok(profile.and_then(|p| p.company))
}

fn pdf_response(file: PdfFile) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            ),
        ],
        file.bytes,
    )
        .into_response()
}

pub async fn sales_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let sale = state.sales.get(id).await?;
    let company = company_for(&state, &user).await?;
    let file = pdf::sales_invoice_pdf(&sale, company.as_ref())?;
    Ok(pdf_response(file))
}

pub async fn purchase_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let purchase = state.purchases.get(id).await?;
    let company = company_for(&state, &user).await?;
    let file = pdf::purchase_order_pdf(&purchase, company.as_ref())?;
    Ok(pdf_response(file))
}
