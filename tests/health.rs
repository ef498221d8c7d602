use axum_pharmacy_api::routes::health::health_check;

#[tokio::test]
async fn health_check_reports_ok() {
    let response = health_check().await;

    assert_eq!(response.0.msg, "Health check");
    assert_eq!(response.0.data.unwrap().status, "ok");
}
