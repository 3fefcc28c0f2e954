use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A drink row. The recipe is stored as a JSON-encoded ingredient array.
#[derive(Debug, sqlx::FromRow, Serialize, Deserialize)]
pub struct Drink {
    pub id: i64,
    pub title: String,
    pub recipe: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    pub name: String,
    pub color: String,
    pub parts: i64,
}

impl Drink {
    fn ingredients(&self) -> Result<Vec<RecipeIngredient>, serde_json::Error> {
        serde_json::from_str(&self.recipe)
    }

    /// Public representation: ingredient names withheld.
    pub fn short(&self) -> Result<Value, serde_json::Error> {
        let recipe: Vec<Value> = self
            .ingredients()?
            .into_iter()
            .map(|i| json!({"color": i.color, "parts": i.parts}))
            .collect();
        Ok(json!({"id": self.id, "title": self.title, "recipe": recipe}))
    }

    /// Privileged representation with the full recipe.
    pub fn long(&self) -> Result<Value, serde_json::Error> {
        Ok(json!({"id": self.id, "title": self.title, "recipe": self.ingredients()?}))
    }
}

/// Request body for creating or patching a drink. Presence is validated in
/// the handlers, so both fields are optional here.
#[derive(Debug, Deserialize)]
pub struct DrinkPayload {
    pub title: Option<String>,
    pub recipe: Option<Vec<IngredientPayload>>,
}

#[derive(Debug, Deserialize)]
pub struct IngredientPayload {
    pub name: Option<String>,
    pub color: Option<String>,
    pub parts: Option<i64>,
}

impl IngredientPayload {
    /// An ingredient needs a name, a color, and a positive part count.
    pub fn validate(self) -> Option<RecipeIngredient> {
        let name = self.name.filter(|s| !s.is_empty())?;
        let color = self.color.filter(|s| !s.is_empty())?;
        let parts = self.parts.filter(|p| *p > 0)?;
        Some(RecipeIngredient { name, color, parts })
    }
}

pub fn validate_recipe(items: Vec<IngredientPayload>) -> Option<Vec<RecipeIngredient>> {
    items
        .into_iter()
        .map(IngredientPayload::validate)
        .collect()
}
