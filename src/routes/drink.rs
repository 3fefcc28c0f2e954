use std::sync::Arc;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    auth::require_permission,
    config::Environment,
    errors::ApiError,
    models::{Drink, DrinkPayload, validate_recipe},
    router::AppState,
};

pub async fn fetch_drinks(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let drinks = list_drinks(&state.db).await?;
    let drinks: Vec<Value> = drinks.iter().map(Drink::short).collect::<Result<_, _>>()?;
    Ok(Json(json!({"success": true, "drinks": drinks})))
}

pub async fn fetch_drinks_detail(
    State(state): State<Arc<AppState>>,
    Extension(config): Extension<Environment>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&state, &config.auth0, &headers, "get:drinks-detail").await?;
    let drinks = list_drinks(&state.db).await?;
    let drinks: Vec<Value> = drinks.iter().map(Drink::long).collect::<Result<_, _>>()?;
    Ok(Json(json!({"success": true, "drinks": drinks})))
}

pub async fn create_drink(
    State(state): State<Arc<AppState>>,
    Extension(config): Extension<Environment>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&state, &config.auth0, &headers, "post:drinks").await?;
    // Authorization comes first, so the body is parsed by hand afterwards.
    let payload: DrinkPayload =
        serde_json::from_slice(&body).map_err(|_| ApiError::Unprocessable)?;
    let drink = store_new_drink(&state.db, payload).await?;
    info!(id = drink.id, title = %drink.title, "created drink");
    Ok(Json(json!({"success": true, "drinks": [drink.long()?]})))
}

pub async fn update_drink(
    State(state): State<Arc<AppState>>,
    Extension(config): Extension<Environment>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&state, &config.auth0, &headers, "patch:drinks").await?;
    let payload: DrinkPayload =
        serde_json::from_slice(&body).map_err(|_| ApiError::Unprocessable)?;
    let drink = apply_drink_update(&state.db, id, payload).await?;
    info!(id, title = %drink.title, "updated drink");
    Ok(Json(json!({"success": true, "drinks": [drink.long()?]})))
}

pub async fn delete_drink(
    State(state): State<Arc<AppState>>,
    Extension(config): Extension<Environment>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_permission(&state, &config.auth0, &headers, "delete:drinks").await?;
    remove_drink(&state.db, id).await?;
    info!(id, "deleted drink");
    Ok(Json(json!({"success": true, "delete": id})))
}

async fn list_drinks(db: &SqlitePool) -> Result<Vec<Drink>, sqlx::Error> {
    sqlx::query_as::<_, Drink>("SELECT id, title, recipe, created_at FROM drink ORDER BY id")
        .fetch_all(db)
        .await
}

async fn store_new_drink(db: &SqlitePool, payload: DrinkPayload) -> Result<Drink, ApiError> {
    let title = payload
        .title
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::BadRequest)?;
    let items = payload
        .recipe
        .filter(|r| !r.is_empty())
        .ok_or(ApiError::BadRequest)?;
    let recipe = validate_recipe(items).ok_or(ApiError::BadRequest)?;

    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM drink WHERE title = ?")
        .bind(&title)
        .fetch_optional(db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict);
    }

    let recipe = serde_json::to_string(&recipe)?;
    let drink = sqlx::query_as::<_, Drink>(
        "INSERT INTO drink (title, recipe) VALUES (?, ?) RETURNING id, title, recipe, created_at",
    )
    .bind(&title)
    .bind(&recipe)
    .fetch_one(db)
    .await?;
    Ok(drink)
}

async fn apply_drink_update(
    db: &SqlitePool,
    id: i64,
    payload: DrinkPayload,
) -> Result<Drink, ApiError> {
    let drink = sqlx::query_as::<_, Drink>(
        "SELECT id, title, recipe, created_at FROM drink WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or(ApiError::NotFound)?;

    let title = payload
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or(drink.title);
    let recipe = match payload.recipe {
        Some(items) if !items.is_empty() => {
            let validated = validate_recipe(items).ok_or(ApiError::BadRequest)?;
            serde_json::to_string(&validated)?
        }
        _ => drink.recipe,
    };

    let drink = sqlx::query_as::<_, Drink>(
        "UPDATE drink SET title = ?, recipe = ? WHERE id = ? RETURNING id, title, recipe, created_at",
    )
    .bind(&title)
    .bind(&recipe)
    .bind(id)
    .fetch_one(db)
    .await?;
    Ok(drink)
}

async fn remove_drink(db: &SqlitePool, id: i64) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM drink WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::models::IngredientPayload;

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::migrate(&pool).await.unwrap();
        pool
    }

    fn ingredient(name: &str, color: &str, parts: i64) -> IngredientPayload {
        IngredientPayload {
            name: Some(name.to_string()),
            color: Some(color.to_string()),
            parts: Some(parts),
        }
    }

    fn latte() -> DrinkPayload {
        DrinkPayload {
            title: Some("Latte".to_string()),
            recipe: Some(vec![
                ingredient("espresso", "brown", 1),
                ingredient("milk", "white", 3),
            ]),
        }
    }

    #[tokio::test]
    async fn storing_requires_a_title() {
        let db = pool().await;
        let payload = DrinkPayload {
            title: None,
            ..latte()
        };
        let err = store_new_drink(&db, payload).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest));
    }

    #[tokio::test]
    async fn storing_requires_a_non_empty_recipe() {
        let db = pool().await;
        let payload = DrinkPayload {
            recipe: Some(vec![]),
            ..latte()
        };
        let err = store_new_drink(&db, payload).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest));
    }

    #[tokio::test]
    async fn storing_rejects_incomplete_ingredients() {
        let db = pool().await;
        let payload = DrinkPayload {
            recipe: Some(vec![IngredientPayload {
                name: Some("espresso".to_string()),
                color: None,
                parts: Some(1),
            }]),
            ..latte()
        };
        let err = store_new_drink(&db, payload).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest));
    }

    #[tokio::test]
    async fn storing_returns_the_inserted_row() {
        let db = pool().await;
        let drink = store_new_drink(&db, latte()).await.unwrap();
        assert_eq!(drink.title, "Latte");
        let long = drink.long().unwrap();
        assert_eq!(long["recipe"][0]["name"], "espresso");
        assert_eq!(long["recipe"][1]["parts"], 3);
    }

    #[tokio::test]
    async fn duplicate_titles_conflict() {
        let db = pool().await;
        store_new_drink(&db, latte()).await.unwrap();
        let err = store_new_drink(&db, latte()).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict));
    }

    #[tokio::test]
    async fn updating_a_missing_drink_is_not_found() {
        let db = pool().await;
        let payload = DrinkPayload {
            title: Some("Flat White".to_string()),
            recipe: None,
        };
        let err = apply_drink_update(&db, 42, payload).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn updating_changes_only_the_provided_fields() {
        let db = pool().await;
        let drink = store_new_drink(&db, latte()).await.unwrap();

        let renamed = apply_drink_update(
            &db,
            drink.id,
            DrinkPayload {
                title: Some("Flat White".to_string()),
                recipe: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.title, "Flat White");
        assert_eq!(renamed.recipe, drink.recipe);

        // An empty recipe list leaves the stored recipe alone.
        let untouched = apply_drink_update(
            &db,
            drink.id,
            DrinkPayload {
                title: None,
                recipe: Some(vec![]),
            },
        )
        .await
        .unwrap();
        assert_eq!(untouched.title, "Flat White");
        assert_eq!(untouched.recipe, drink.recipe);
    }

    #[tokio::test]
    async fn updating_validates_the_replacement_recipe() {
        let db = pool().await;
        let drink = store_new_drink(&db, latte()).await.unwrap();
        let payload = DrinkPayload {
            title: None,
            recipe: Some(vec![IngredientPayload {
                name: None,
                color: Some("white".to_string()),
                parts: Some(1),
            }]),
        };
        let err = apply_drink_update(&db, drink.id, payload).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest));
    }

    #[tokio::test]
    async fn removing_a_missing_drink_is_not_found() {
        let db = pool().await;
        let err = remove_drink(&db, 7).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn removing_deletes_the_row() {
        let db = pool().await;
        let drink = store_new_drink(&db, latte()).await.unwrap();
        remove_drink(&db, drink.id).await.unwrap();
        assert!(list_drinks(&db).await.unwrap().is_empty());
    }
}
