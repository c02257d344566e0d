//! HTML pages
//!
//! The home page lists the demo records for the signed-in user.
//! Templates are compiled into the binary and rendered with tera.

use axum::{
    Router,
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
};

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;

const HOME_TEMPLATE: &str = include_str!("../../templates/home.html");

/// Build the template engine with all embedded templates
pub fn load_templates() -> Result<tera::Tera, AppError> {
    let mut tera = tera::Tera::default();
    tera.add_raw_template("home.html", HOME_TEMPLATE)?;
    Ok(tera)
}

/// Create page router
///
/// Authentication is applied by the top-level router composition.
pub fn pages_router() -> Router<AppState> {
    Router::new().route("/", get(home))
}

/// GET /
///
/// Renders the record listing for the signed-in user.
async fn home(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let records = state.db.get_records().await?;

    let mut context = tera::Context::new();
    context.insert("user", &user);
    context.insert("records", &records);

    let body = state.templates.render("home.html", &context)?;
    Ok(Html(body))
}
