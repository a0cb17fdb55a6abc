use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::analysis::dto::FoodAnalysis;

/// One logged meal as stored in `food_entries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FoodEntry {
    pub id: i64,
    pub dish_name: String,
    pub calories: i64,
    pub proteins: f64,
    pub fats: f64,
    pub carbs: f64,
    pub description: String,
    pub ai_tip: String,
    pub timestamp: i64, // epoch millis, set on insert
    pub image_path: Option<String>,
}

/// Entry fields supplied by the caller; id and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub dish_name: String,
    pub calories: i64,
    pub proteins: f64,
    pub fats: f64,
    pub carbs: f64,
    pub description: String,
    pub ai_tip: String,
    pub image_path: Option<String>,
}

impl NewEntry {
    pub fn from_analysis(analysis: &FoodAnalysis, image_path: Option<String>) -> Self {
        Self {
            dish_name: analysis.dish_name.clone(),
            calories: analysis.calories,
            proteins: analysis.proteins,
            fats: analysis.fats,
            carbs: analysis.carbs,
            description: analysis.description.clone(),
            ai_tip: analysis.ai_tip.clone(),
            image_path,
        }
    }
}

/// Nutrition totals over the current-day window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DailyStats {
    pub calories: i64,
    pub proteins: f64,
    pub fats: f64,
    pub carbs: f64,
}
