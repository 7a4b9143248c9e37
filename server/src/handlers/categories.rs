use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;

use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{AppJson, AppPath};
use crate::utils::response::{created, empty_success, success};
use crate::utils::validation::parse_id;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Response, AppError> {
    let categories = state.categories().list().await?;
    Ok(success(categories, "Categories retrieved successfully"))
}

pub async fn get_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> Result<Response, AppError> {
    let category = state
        .categories()
        .get(parse_id(&id, "category id")?)
        .await?;
    Ok(success(category, "Category retrieved successfully"))
}

pub async fn create_category(
    State(state): State<AppState>,
    AppJson(body): AppJson<CategoryRequest>,
) -> Result<Response, AppError> {
    let category = state
        .categories()
        .create(body.name.as_deref(), body.description.as_deref())
        .await?;
    Ok(created(category, "Category created successfully"))
}

pub async fn update_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppJson(body): AppJson<CategoryRequest>,
) -> Result<Response, AppError> {
    let id = parse_id(&id, "category id")?;
    let category = state
        .categories()
        .update(id, body.name.as_deref(), body.description.as_deref())
        .await?;
    Ok(success(category, "Category updated successfully"))
}

pub async fn delete_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> Result<Response, AppError> {
    state.categories().delete(parse_id(&id, "category id")?).await?;
    Ok(empty_success("Category deleted successfully"))
}
