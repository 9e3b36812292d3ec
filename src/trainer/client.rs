use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::api::{
  ApiError, ApiResult, AuthCoordinator, Dispatcher, MultipartForm, ReqwestTransport,
  RequestBody, RequestOptions,
};
use crate::cache::ResponseCache;
use crate::config::Config;

use super::api_types::{
  AnalysisRequest, ClientUpdate, MealPlanRequest, NewClient, NewWorkout, NutritionRequest,
  OcrSaveRequest, WorkoutUpdate,
};
use super::types::{
  AnalysisReport, Client, MealPlan, NutritionAnalysis, OcrExtraction, RateLimitStatus, Workout,
};

pub const CLIENTS: &str = "/clients";
pub const WORKOUTS: &str = "/workouts";
pub const OCR_PROCESS: &str = "/ocr/process";
pub const OCR_SAVE: &str = "/ocr/save";
pub const MEAL_PLAN: &str = "/nutrition/meal-plan";
pub const NUTRITION_ANALYZE: &str = "/nutrition/analyze";
pub const AI_ANALYZE: &str = "/ai/analyze";
pub const AI_CACHE: &str = "/ai/cache";
pub const AI_RATE_LIMIT: &str = "/ai/rate-limit";

/// Multipart field carrying the scanned image
const OCR_IMAGE_FIELD: &str = "image";

/// Typed operations on the trainer API
#[derive(Clone, Debug)]
pub struct TrainerClient {
  api: Dispatcher,
}

impl TrainerClient {
  pub fn new(api: Dispatcher) -> Self {
    Self { api }
  }

  /// Build a client over HTTP from configuration.
  pub fn from_config(config: &Config, auth: Arc<AuthCoordinator>) -> Result<Self> {
    let api_key = config.api_key()?;
    let transport = ReqwestTransport::new(Some(config.api.timeout()))
      .map_err(|e| eyre!("Failed to create trainer API transport: {}", e))?;

    let api = Dispatcher::builder(&config.api.base_url, transport)
      .api_key(api_key)
      .auth(auth)
      .cache(ResponseCache::with_ttl(config.cache.ttl()))
      .caching(config.cache.enabled)
      .retry(config.retry.policy())
      .build();

    Ok(Self::new(api))
  }

  pub fn dispatcher(&self) -> &Dispatcher {
    &self.api
  }

  // ==========================================================================
  // Clients
  // ==========================================================================

  pub async fn list_clients(&self) -> ApiResult<Vec<Client>> {
    decode(self.api.get_all(CLIENTS).await?)
  }

  pub async fn get_client(&self, id: &str) -> ApiResult<Client> {
    decode(self.api.get_by_id(CLIENTS, id).await?)
  }

  pub async fn create_client(&self, client: &NewClient) -> ApiResult<Client> {
    decode(self.api.create(CLIENTS, client).await?)
  }

  pub async fn update_client(&self, id: &str, update: &ClientUpdate) -> ApiResult<Client> {
    decode(self.api.update(CLIENTS, id, update).await?)
  }

  pub async fn delete_client(&self, id: &str) -> ApiResult<()> {
    self.api.remove(CLIENTS, id).await?;
    Ok(())
  }

  // ==========================================================================
  // Workouts
  // ==========================================================================

  /// All workouts, or those of one client.
  pub async fn list_workouts(&self, client_id: Option<&str>) -> ApiResult<Vec<Workout>> {
    let endpoint = match client_id {
      Some(id) => {
        let query = url::form_urlencoded::Serializer::new(String::new())
          .append_pair("client_id", id)
          .finish();
        format!("{}?{}", WORKOUTS, query)
      }
      None => WORKOUTS.to_string(),
    };
    decode(self.api.get_all(&endpoint).await?)
  }

  pub async fn get_workout(&self, id: &str) -> ApiResult<Workout> {
    decode(self.api.get_by_id(WORKOUTS, id).await?)
  }

  pub async fn create_workout(&self, workout: &NewWorkout) -> ApiResult<Workout> {
    decode(self.api.create(WORKOUTS, workout).await?)
  }

  pub async fn update_workout(&self, id: &str, update: &WorkoutUpdate) -> ApiResult<Workout> {
    decode(self.api.update(WORKOUTS, id, update).await?)
  }

  pub async fn delete_workout(&self, id: &str) -> ApiResult<()> {
    self.api.remove(WORKOUTS, id).await?;
    Ok(())
  }

  // ==========================================================================
  // OCR
  // ==========================================================================

  /// Upload a photo of a workout log and get the extracted record back.
  pub async fn process_workout_image(
    &self,
    image: Vec<u8>,
    file_name: &str,
    mime: &str,
  ) -> ApiResult<OcrExtraction> {
    let form = MultipartForm::new().file(OCR_IMAGE_FIELD, file_name, mime, image);
    let payload = self
      .api
      .request(OCR_PROCESS, RequestOptions::post(RequestBody::Multipart(form)))
      .await?;
    decode(payload)
  }

  pub async fn save_ocr_workout(&self, request: &OcrSaveRequest) -> ApiResult<Workout> {
    decode(self.api.create(OCR_SAVE, request).await?)
  }

  // ==========================================================================
  // Nutrition & AI
  // ==========================================================================

  pub async fn meal_plan(&self, request: &MealPlanRequest) -> ApiResult<MealPlan> {
    decode(self.api.create(MEAL_PLAN, request).await?)
  }

  pub async fn analyze_nutrition(&self, request: &NutritionRequest) -> ApiResult<NutritionAnalysis> {
    decode(self.api.create(NUTRITION_ANALYZE, request).await?)
  }

  pub async fn analyze(&self, request: &AnalysisRequest) -> ApiResult<AnalysisReport> {
    decode(self.api.create(AI_ANALYZE, request).await?)
  }

  /// Drop the server-side AI response cache.
  pub async fn clear_ai_cache(&self) -> ApiResult<()> {
    self.api.request(AI_CACHE, RequestOptions::delete()).await?;
    Ok(())
  }

  /// Current AI quota. Never cached; the count changes with every call.
  pub async fn ai_rate_limit(&self) -> ApiResult<RateLimitStatus> {
    let payload = self
      .api
      .request(AI_RATE_LIMIT, RequestOptions::get().without_cache())
      .await?;
    decode(payload)
  }
}

fn decode<T: DeserializeOwned>(payload: Value) -> ApiResult<T> {
  serde_json::from_value(payload)
    .map_err(|e| ApiError::MalformedResponse(format!("Failed to decode response: {}", e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::testing::MockTransport;
  use crate::trainer::api_types::ExerciseDraft;
  use chrono::NaiveDate;
  use serde_json::json;

  fn client(transport: &MockTransport) -> TrainerClient {
    TrainerClient::new(
      Dispatcher::builder("https://api.trainer.test", transport.clone())
        .api_key("k")
        .build(),
    )
  }

  fn client_json(id: &str, name: &str) -> Value {
    json!({
      "id": id,
      "name": name,
      "email": format!("{}@example.com", name.to_lowercase()),
      "phone": null,
      "notes": null,
      "created_at": "2026-01-05T09:30:00Z",
      "updated_at": null
    })
  }

  fn workout_json(id: &str, client_id: &str) -> Value {
    json!({
      "id": id,
      "client_id": client_id,
      "client_name": "Ana",
      "date": "2026-02-01",
      "type": "strength",
      "duration": 60,
      "notes": null,
      "exercises": [
        {"id": "e1", "name": "Squat", "sets": 5, "reps": 5, "weight": 100.0, "notes": null}
      ],
      "created_at": "2026-02-01T18:00:00Z"
    })
  }

  #[tokio::test]
  async fn test_list_clients_unwraps_and_decodes() {
    let transport = MockTransport::new();
    transport.push_success(json!({"clients": [client_json("c1", "Ana"), client_json("c2", "Ben")]}));
    let trainer = client(&transport);

    let clients = trainer.list_clients().await.unwrap();

    assert_eq!(clients.len(), 2);
    assert_eq!(clients[1].name, "Ben");
    assert_eq!(clients[0].email.as_deref(), Some("ana@example.com"));
  }

  #[tokio::test]
  async fn test_create_client_then_list_hits_network() {
    let transport = MockTransport::new();
    transport.push_success(json!([client_json("c1", "Ana")]));
    transport.push_success(client_json("c2", "Ben"));
    transport.push_success(json!([client_json("c1", "Ana"), client_json("c2", "Ben")]));
    let trainer = client(&transport);

    trainer.list_clients().await.unwrap();
    let created = trainer
      .create_client(&NewClient {
        name: "Ben".into(),
        ..Default::default()
      })
      .await
      .unwrap();
    let clients = trainer.list_clients().await.unwrap();

    assert_eq!(created.id, "c2");
    assert_eq!(clients.len(), 2);
    assert_eq!(transport.calls(), 3);

    let requests = transport.requests();
    assert_eq!(requests[1].body, RequestBody::Json(json!({"name": "Ben"})));
  }

  #[tokio::test]
  async fn test_list_workouts_filters_by_client() {
    let transport = MockTransport::new();
    transport.push_success(json!({"workouts": [workout_json("w1", "c 1")]}));
    let trainer = client(&transport);

    let workouts = trainer.list_workouts(Some("c 1")).await.unwrap();

    assert_eq!(workouts[0].exercises[0].name, "Squat");
    assert_eq!(workouts[0].workout_type.as_deref(), Some("strength"));
    assert_eq!(
      transport.requests()[0].url,
      "https://api.trainer.test/workouts?client_id=c+1"
    );
  }

  #[tokio::test]
  async fn test_update_client_invalidates_workout_listing() {
    let transport = MockTransport::new();
    transport.push_success(json!([workout_json("w1", "c1")]));
    transport.push_success(client_json("c1", "Anna"));
    transport.push_success(json!([workout_json("w1", "c1")]));
    let trainer = client(&transport);

    trainer.list_workouts(Some("c1")).await.unwrap();
    trainer
      .update_client(
        "c1",
        &ClientUpdate {
          name: Some("Anna".into()),
          ..Default::default()
        },
      )
      .await
      .unwrap();
    trainer.list_workouts(Some("c1")).await.unwrap();

    assert_eq!(transport.calls(), 3);
  }

  #[tokio::test]
  async fn test_create_workout_sends_drafts_without_temp_ids() {
    let transport = MockTransport::new();
    transport.push_success(workout_json("w9", "c1"));
    let trainer = client(&transport);

    let workout = trainer
      .create_workout(&NewWorkout {
        client_id: "c1".into(),
        date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
        workout_type: Some("strength".into()),
        duration: Some(60),
        notes: None,
        exercises: vec![ExerciseDraft::new("Squat", 5, 5).weight(100.0)],
      })
      .await
      .unwrap();

    assert_eq!(workout.id, "w9");
    let body = match &transport.requests()[0].body {
      RequestBody::Json(value) => value.to_string(),
      other => panic!("unexpected body {:?}", other),
    };
    assert!(!body.contains("temp-"));
  }

  #[tokio::test]
  async fn test_ocr_upload_and_save() {
    let transport = MockTransport::new();
    transport.push_success(json!({
      "client_id": null,
      "date": "2026-03-01",
      "exercises": [{"name": "Lunge", "sets": 3, "reps": 12}],
      "raw_text": "Lunge 3x12",
      "confidence": 0.92
    }));
    transport.push_success(workout_json("w5", "c1"));
    let trainer = client(&transport);

    let extraction = trainer
      .process_workout_image(vec![0xff, 0xd8], "log.jpg", "image/jpeg")
      .await
      .unwrap();
    assert_eq!(extraction.exercises[0].reps, Some(12));
    assert_eq!(extraction.confidence, Some(0.92));

    let upload = &transport.requests()[0];
    assert_eq!(upload.url, "https://api.trainer.test/ocr/process");
    assert_eq!(upload.header("Content-Type"), None);
    match &upload.body {
      RequestBody::Multipart(form) => {
        assert_eq!(form.parts()[0].name, "image");
        assert_eq!(form.parts()[0].file_name.as_deref(), Some("log.jpg"));
      }
      other => panic!("expected multipart body, got {:?}", other),
    }

    let request = OcrSaveRequest::from_extraction(
      &extraction,
      Some("c1"),
      NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
    )
    .unwrap();
    let saved = trainer.save_ocr_workout(&request).await.unwrap();
    assert_eq!(saved.id, "w5");
  }

  #[tokio::test]
  async fn test_ocr_save_invalidates_workouts() {
    let transport = MockTransport::new();
    transport.push_success(json!([]));
    transport.push_success(workout_json("w5", "c1"));
    transport.push_success(json!([workout_json("w5", "c1")]));
    let trainer = client(&transport);

    trainer.list_workouts(None).await.unwrap();
    let request = OcrSaveRequest {
      client_id: "c1".into(),
      date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
      workout_type: None,
      exercises: vec![],
      raw_text: None,
    };
    trainer.save_ocr_workout(&request).await.unwrap();
    let workouts = trainer.list_workouts(None).await.unwrap();

    assert_eq!(workouts.len(), 1);
    assert_eq!(transport.calls(), 3);
  }

  #[tokio::test]
  async fn test_rate_limit_is_never_cached() {
    let transport = MockTransport::new();
    transport.push_success(json!({"limit": 50, "remaining": 10}));
    transport.push_success(json!({"limit": 50, "remaining": 9, "reset_at": "2026-10-20T00:00:00Z"}));
    let trainer = client(&transport);

    trainer.ai_rate_limit().await.unwrap();
    let status = trainer.ai_rate_limit().await.unwrap();

    assert_eq!(status.remaining, 9);
    assert!(status.reset_at.is_some());
    assert_eq!(transport.calls(), 2);
  }

  #[tokio::test]
  async fn test_ai_and_nutrition_endpoints() {
    let transport = MockTransport::new();
    transport.push_success(json!({"summary": "Steady progress", "recommendations": ["Deload"], "score": 7}));
    transport.push_success(json!({"meals": [{"name": "Breakfast", "calories": 450}], "daily_calories": 2200}));
    transport.push_success(json!({"calories": 620, "protein_g": 40}));
    transport.push_no_content();
    let trainer = client(&transport);

    let report = trainer
      .analyze(&AnalysisRequest {
        client_id: "c1".into(),
        ..Default::default()
      })
      .await
      .unwrap();
    assert_eq!(report.recommendations, vec!["Deload".to_string()]);
    assert_eq!(report.extra.get("score"), Some(&json!(7)));

    let plan = trainer
      .meal_plan(&MealPlanRequest {
        client_id: "c1".into(),
        ..Default::default()
      })
      .await
      .unwrap();
    assert_eq!(plan.meals[0].name, "Breakfast");

    let analysis = trainer
      .analyze_nutrition(&NutritionRequest {
        description: "chicken and rice".into(),
        client_id: None,
      })
      .await
      .unwrap();
    assert_eq!(analysis.protein_g, Some(40.0));

    trainer.clear_ai_cache().await.unwrap();

    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
      urls,
      vec![
        "https://api.trainer.test/ai/analyze",
        "https://api.trainer.test/nutrition/meal-plan",
        "https://api.trainer.test/nutrition/analyze",
        "https://api.trainer.test/ai/cache",
      ]
    );
  }

  #[tokio::test]
  async fn test_undecodable_payload_is_malformed() {
    let transport = MockTransport::new();
    transport.push_success(json!({"id": 5}));
    let trainer = client(&transport);

    let err = trainer.get_client("c1").await.unwrap_err();
    assert!(matches!(err, ApiError::MalformedResponse(_)));
  }

  #[tokio::test]
  async fn test_delete_workout() {
    let transport = MockTransport::new();
    transport.push_no_content();
    let trainer = client(&transport);

    trainer.delete_workout("w1").await.unwrap();
    assert_eq!(transport.requests()[0].method, crate::api::Method::Delete);
    assert!(trainer.delete_workout("").await.is_err());
  }
}
