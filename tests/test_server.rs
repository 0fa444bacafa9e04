//! Integration test: Server API endpoints

use ames_predictor::features::{FeatureSchema, FeatureTransformer, RawRecord, Scaler, ScalerType};
use ames_predictor::inference::Predictor;
use ames_predictor::model::{FittedModel, LinearRegression, Regressor};
use ames_predictor::server::{create_router, AppState, ServerConfig};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use ndarray::{Array1, Array2};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        model_path: "/nonexistent/model.json".into(),
        schema_path: "/nonexistent/feature_schema.json".into(),
        max_body_size: 64 * 1024,
    }
}

fn house(area: f64, qual: f64, built: f64) -> Value {
    json!({
        "Gr Liv Area": area,
        "Total Bsmt SF": 900,
        "Garage Cars": 2,
        "Overall Qual": qual,
        "Year Built": built,
        "Yr Sold": 2010
    })
}

/// Scaled linear model over the default features, fitted on synthetic houses
fn test_predictor() -> Predictor {
    let schema = FeatureSchema::new(FeatureSchema::default_features()).unwrap();
    let transformer = FeatureTransformer::new(Arc::new(schema.clone()));

    let records: Vec<RawRecord> = (0..40)
        .map(|i| {
            let area = 900.0 + 45.0 * i as f64;
            let qual = (i % 10 + 1) as f64;
            let built = 1950.0 + (i * 3 % 55) as f64;
            serde_json::from_value(house(area, qual, built)).unwrap()
        })
        .collect();
    let values: Vec<f64> = records
        .iter()
        .flat_map(|r| transformer.transform_unscaled(r).unwrap())
        .collect();
    let x = Array2::from_shape_vec((records.len(), schema.len()), values).unwrap();
    let y: Array1<f64> = x
        .outer_iter()
        .map(|r| 70.0 * r[0] + 9000.0 * r[3] - 250.0 * r[7] + 20_000.0)
        .collect();

    let (scaler, xs) = Scaler::fit_transform(ScalerType::Standard, &x).unwrap();
    let mut model = FittedModel::from(LinearRegression::new().with_alpha(1e-6));
    model.fit(&xs, &y).unwrap();

    Predictor::new(schema.with_scaler(scaler).unwrap(), Arc::new(model)).unwrap()
}

fn ready_state() -> Arc<AppState> {
    Arc::new(AppState::with_predictor(test_config(), test_predictor()))
}

async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Value) {
    let response = create_router(Arc::clone(state)).oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), 1024 * 64).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn post_json(body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_not_ready() {
    let state = Arc::new(AppState::new(test_config()));
    let (status, body) = send(&state, get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["model_loaded"], false);
}

#[tokio::test]
async fn test_health_ready() {
    let state = ready_state();
    let (status, body) = send(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["scaler"], true);
    assert_eq!(body["model_type"], "ridge");
    assert_eq!(body["n_features"], 8);
}

#[tokio::test]
async fn test_predict_single_record() {
    let state = ready_state();
    let request = post_json(
        r#"{"data":[{"Gr Liv Area":1800,"Total Bsmt SF":900,"Garage Cars":2,"Overall Qual":7,"Year Built":2005,"Yr Sold":2010}]}"#,
    );
    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::OK);

    let predictions = body["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 1);
    let price = predictions[0].as_f64().unwrap();
    // 70 * 1800 + 9000 * 7 - 250 * 5 + 20000
    assert!((price - 207_750.0).abs() < 1.0, "price = {}", price);
}

#[tokio::test]
async fn test_predict_batch_preserves_order() {
    let state = ready_state();
    let data: Vec<Value> = (0..25).map(|i| house(1000.0 + 40.0 * i as f64, 6.0, 1990.0)).collect();
    let (status, body) = send(&state, post_json(json!({ "data": data }).to_string())).await;
    assert_eq!(status, StatusCode::OK);

    let predictions: Vec<f64> = body["predictions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    assert_eq!(predictions.len(), 25);
    for pair in predictions.windows(2) {
        assert!((pair[1] - pair[0] - 2800.0).abs() < 1.0);
    }
}

#[tokio::test]
async fn test_predict_empty_batch() {
    let state = ready_state();
    let (status, body) = send(&state, post_json(r#"{"data": []}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predictions"], json!([]));
}

#[tokio::test]
async fn test_numeric_strings_accepted() {
    let state = ready_state();
    let mut row = house(1800.0, 7.0, 2005.0);
    row["Gr Liv Area"] = json!("1800");
    let (status, body) = send(&state, post_json(json!({ "data": [row] }).to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["predictions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_field_rejects_batch() {
    let state = ready_state();
    let mut bad = house(1500.0, 5.0, 1980.0);
    bad.as_object_mut().unwrap().remove("Garage Cars");
    let body = json!({ "data": [house(1200.0, 5.0, 1980.0), bad] });

    let (status, body) = send(&state, post_json(body.to_string())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], true);
    assert_eq!(body["record"], 1);
    assert_eq!(body["fields"], json!(["Garage Cars"]));
    assert!(body["message"].as_str().unwrap().contains("Garage Cars"));
}

#[tokio::test]
async fn test_out_of_range_rejected() {
    let state = ready_state();
    let body = json!({ "data": [house(1500.0, 11.0, 1980.0)] });
    let (status, body) = send(&state, post_json(body.to_string())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["record"], 0);
    assert_eq!(body["fields"], json!(["Overall Qual"]));
}

#[tokio::test]
async fn test_non_numeric_rejected() {
    let state = ready_state();
    let mut row = house(1500.0, 5.0, 1980.0);
    row["Total Bsmt SF"] = json!("large");
    let (status, body) = send(&state, post_json(json!({ "data": [row] }).to_string())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"], json!(["Total Bsmt SF"]));
}

#[tokio::test]
async fn test_malformed_bodies_leave_service_healthy() {
    let state = ready_state();

    let (status, body) = send(&state, post_json("{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);

    let (status, _) = send(&state, post_json(r#"{"rows": []}"#)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&state, post_json(r#"{"data": [1, 2]}"#)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&state, post_json(r#"{"data": {"Gr Liv Area": 1}}"#)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_wrong_content_type() {
    let state = ready_state();
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "text/plain")
        .body(Body::from(r#"{"data": []}"#))
        .unwrap();
    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn test_predict_not_ready() {
    let state = Arc::new(AppState::new(test_config()));
    let (status, body) = send(&state, post_json(r#"{"data": []}"#)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn test_unknown_route_and_method() {
    let state = ready_state();

    let (status, body) = send(&state, get("/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], true);

    let (status, body) = send(&state, get("/predict")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn test_body_limit() {
    let state = ready_state();
    let data: Vec<Value> = (0..2000).map(|_| house(1500.0, 5.0, 1980.0)).collect();
    let (status, _) = send(&state, post_json(json!({ "data": data }).to_string())).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
