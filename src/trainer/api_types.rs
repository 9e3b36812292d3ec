//! Request payloads sent to the trainer API.
//!
//! These are kept apart from the records in `types` because they carry no
//! server-assigned fields (ids, timestamps) and serialize only what the
//! caller actually set.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use super::types::{Exercise, ExtractedExercise, OcrExtraction};

// ============================================================================
// Clients
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NewClient {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

/// Partial client update; unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub phone: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

// ============================================================================
// Workouts
// ============================================================================

/// Exercise being edited before its workout is saved.
///
/// Drafts carry a temporary `temp-<uuid>` id so they can be told apart while
/// editing. The id is never serialized; the server assigns the real one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExerciseDraft {
  #[serde(skip)]
  temp_id: String,
  pub name: String,
  pub sets: u32,
  pub reps: u32,
  pub weight: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
}

impl ExerciseDraft {
  pub fn new(name: impl Into<String>, sets: u32, reps: u32) -> Self {
    Self {
      temp_id: format!("temp-{}", Uuid::new_v4()),
      name: name.into(),
      sets,
      reps,
      weight: 0.0,
      notes: None,
    }
  }

  pub fn weight(mut self, weight: f64) -> Self {
    self.weight = weight;
    self
  }

  pub fn notes(mut self, notes: impl Into<String>) -> Self {
    self.notes = Some(notes.into());
    self
  }

  pub fn temp_id(&self) -> &str {
    &self.temp_id
  }

  /// Draft for editing a saved exercise. The saved id is dropped; the
  /// server re-assigns ids when the workout is updated.
  pub fn from_exercise(exercise: &Exercise) -> Self {
    Self {
      notes: exercise.notes.clone(),
      ..Self::new(exercise.name.clone(), exercise.sets, exercise.reps).weight(exercise.weight)
    }
  }

  /// Draft from an OCR line; unreadable counts default to a single set/rep.
  pub fn from_extracted(exercise: &ExtractedExercise) -> Self {
    Self {
      notes: exercise.notes.clone(),
      ..Self::new(
        exercise.name.clone(),
        exercise.sets.unwrap_or(1),
        exercise.reps.unwrap_or(1),
      )
      .weight(exercise.weight.unwrap_or_default())
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewWorkout {
  pub client_id: String,
  pub date: NaiveDate,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub workout_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub duration: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
  pub exercises: Vec<ExerciseDraft>,
}

/// Partial workout update. When `exercises` is set it replaces the whole list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkoutUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date: Option<NaiveDate>,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub workout_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub duration: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exercises: Option<Vec<ExerciseDraft>>,
}

// ============================================================================
// OCR
// ============================================================================

/// Confirmed scan, saved as a workout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrSaveRequest {
  pub client_id: String,
  pub date: NaiveDate,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub workout_type: Option<String>,
  pub exercises: Vec<ExerciseDraft>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub raw_text: Option<String>,
}

impl OcrSaveRequest {
  /// Build a save request from an extraction. `client_id` wins over the
  /// scanned one; `fallback_date` is used when the scan had no date.
  pub fn from_extraction(
    extraction: &OcrExtraction,
    client_id: Option<&str>,
    fallback_date: NaiveDate,
  ) -> Option<Self> {
    let client_id = client_id
      .map(String::from)
      .or_else(|| extraction.client_id.clone())?;

    Some(Self {
      client_id,
      date: extraction.date.unwrap_or(fallback_date),
      workout_type: extraction.workout_type.clone(),
      exercises: extraction
        .exercises
        .iter()
        .map(ExerciseDraft::from_extracted)
        .collect(),
      raw_text: extraction.raw_text.clone(),
    })
  }
}

// ============================================================================
// Nutrition & AI
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MealPlanRequest {
  pub client_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub goal: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub daily_calories: Option<u32>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub dietary_restrictions: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub days: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NutritionRequest {
  /// Free-text meal description
  pub description: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub client_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisRequest {
  pub client_id: String,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub analysis_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub question: Option<String>,
}
