use tracing::info;
use uuid::Uuid;

use crate::models::{Category, CategoryChanges, NewCategory};
use crate::store::{Store, RESULT_LIMIT};
use crate::utils::error::AppError;
use crate::utils::validation::non_blank;

fn category_not_found() -> AppError {
    AppError::NotFound("Category not found".into())
}

fn name_required() -> AppError {
    AppError::ValidationError("Category name is required".into())
}

pub struct CategoryService<'a> {
    store: &'a dyn Store,
}

impl<'a> CategoryService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Category>, AppError> {
        Ok(self.store.list_categories(RESULT_LIMIT).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Category, AppError> {
        self.store
            .find_category(id)
            .await?
            .ok_or_else(category_not_found)
    }

    pub async fn create(
        &self,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Category, AppError> {
        let name = non_blank(name).ok_or_else(name_required)?;
        let category = self
            .store
            .insert_category(NewCategory {
                name,
                description: non_blank(description),
            })
            .await?;
        info!(category_id = %category.id, "category created");
        Ok(category)
    }

    /// `None` leaves a field alone. A blank description clears it; a blank name is rejected.
    pub async fn update(
        &self,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Category, AppError> {
        let name = match name {
            Some(raw) => Some(non_blank(Some(raw)).ok_or_else(name_required)?),
            None => None,
        };
        let changes = CategoryChanges {
            name,
            description: description.map(|raw| non_blank(Some(raw))),
        };

        self.store
            .update_category(id, changes)
            .await?
            .ok_or_else(category_not_found)
    }

    /// Events keep their category id after the category is deleted.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_category(id).await? {
            return Err(category_not_found());
        }
        info!(category_id = %id, "category deleted");
        Ok(())
    }
}
