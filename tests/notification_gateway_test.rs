use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use lapangan::{
    config::WhatsAppConfig,
    error::AppError,
    notifications::{whatsapp::WhatsAppChannel, NotificationChannel, OutboundMessage},
};
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Gateway {
    received: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn accept(State(gateway): State<Gateway>, headers: HeaderMap, Json(body): Json<Value>) -> StatusCode {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    gateway.received.lock().unwrap().push((auth, body));
    StatusCode::OK
}

async fn refuse() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "quota exceeded")
}

async fn serve(router: Router) -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{}", addr))
}

fn config(api_url: String) -> WhatsAppConfig {
    WhatsAppConfig {
        enabled: true,
        api_url,
        token: "secret-token".to_string(),
        country_code: "62".to_string(),
        timeout_secs: 5,
    }
}

fn message() -> OutboundMessage {
    OutboundMessage {
        recipient: "6281234567890".to_string(),
        subject: "Booking BK-20240110-ABC234 received".to_string(),
        body: "Hi Budi".to_string(),
    }
}

#[tokio::test]
async fn test_whatsapp_posts_to_gateway() -> anyhow::Result<()> {
    let gateway = Gateway::default();
    let base = serve(
        Router::new()
            .route("/send", post(accept))
            .with_state(gateway.clone()),
    )
    .await?;

    let channel = WhatsAppChannel::new(Some(config(format!("{}/send", base))))?
        .expect("enabled channel");
    channel.send(&message()).await?;

    let received = gateway.received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let (auth, body) = &received[0];
    assert_eq!(auth.as_deref(), Some("secret-token"));
    assert_eq!(body["target"], "6281234567890");
    assert_eq!(body["message"], "Hi Budi");
    assert_eq!(body["countryCode"], "62");
    Ok(())
}

#[tokio::test]
async fn test_gateway_error_status_is_a_delivery_failure() -> anyhow::Result<()> {
    let base = serve(Router::new().route("/send", post(refuse))).await?;

    let channel = WhatsAppChannel::new(Some(config(format!("{}/send", base))))?
        .expect("enabled channel");
    let err = channel.send(&message()).await.unwrap_err();
    match err {
        AppError::NotificationDeliveryFailed(msg) => assert!(msg.contains("quota exceeded")),
        other => panic!("expected NotificationDeliveryFailed, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_disabled_gateway_builds_no_channel() -> anyhow::Result<()> {
    let mut disabled = config("http://127.0.0.1:9/send".to_string());
    disabled.enabled = false;
    assert!(WhatsAppChannel::new(Some(disabled))?.is_none());
    assert!(WhatsAppChannel::new(None)?.is_none());
    Ok(())
}
