use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Client record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub notes: Option<String>,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

/// Exercise entry; only exists inside its workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub sets: u32,
  #[serde(default)]
  pub reps: u32,
  #[serde(default)]
  pub weight: f64,
  #[serde(default)]
  pub notes: Option<String>,
}

/// Workout log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
  pub id: String,
  pub client_id: String,
  /// Display name of the client, embedded by the server in listings
  #[serde(default)]
  pub client_name: Option<String>,
  pub date: NaiveDate,
  #[serde(rename = "type", default)]
  pub workout_type: Option<String>,
  /// Minutes
  #[serde(default)]
  pub duration: Option<u32>,
  #[serde(default)]
  pub notes: Option<String>,
  #[serde(default)]
  pub exercises: Vec<Exercise>,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

/// Exercise line recognised by OCR. Fields the scanner could not read are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedExercise {
  pub name: String,
  #[serde(default)]
  pub sets: Option<u32>,
  #[serde(default)]
  pub reps: Option<u32>,
  #[serde(default)]
  pub weight: Option<f64>,
  #[serde(default)]
  pub notes: Option<String>,
}

/// Workout record extracted from a scanned image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrExtraction {
  #[serde(default)]
  pub client_id: Option<String>,
  #[serde(default)]
  pub date: Option<NaiveDate>,
  #[serde(rename = "type", default)]
  pub workout_type: Option<String>,
  #[serde(default)]
  pub exercises: Vec<ExtractedExercise>,
  #[serde(default)]
  pub raw_text: Option<String>,
  /// 0.0 - 1.0
  #[serde(default)]
  pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
  pub name: String,
  #[serde(default)]
  pub calories: Option<f64>,
  #[serde(default)]
  pub items: Vec<String>,
}

/// Generated meal plan. Fields the client does not model are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlan {
  #[serde(default)]
  pub meals: Vec<Meal>,
  #[serde(default)]
  pub daily_calories: Option<f64>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionAnalysis {
  #[serde(default)]
  pub calories: Option<f64>,
  #[serde(default)]
  pub protein_g: Option<f64>,
  #[serde(default)]
  pub carbs_g: Option<f64>,
  #[serde(default)]
  pub fat_g: Option<f64>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// AI progress analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
  #[serde(default)]
  pub summary: Option<String>,
  #[serde(default)]
  pub recommendations: Vec<String>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Quota for the AI analysis endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitStatus {
  pub limit: u32,
  pub remaining: u32,
  #[serde(default)]
  pub reset_at: Option<DateTime<Utc>>,
}
