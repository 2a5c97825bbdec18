//! AWS Lambda handler for underwriting recommendations
//!
//! Accepts a `DecisionEngineInput` as the JSON body of a Lambda Function URL
//! request and returns the `DecisionEngineResult`.
//!
//! The catalog is loaded once per container from `UNDERWRITING_CATALOG_DIR`
//! (default `data/catalog`).

use aws_lambda_events::event::lambda_function_urls::{LambdaFunctionUrlRequest, LambdaFunctionUrlResponse};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use log::{error, info};
use serde::Serialize;
use underwriting_engine::{DecisionEngine, DecisionEngineInput, EngineConfig, EngineError, ProductCatalog};

const CATALOG_ENV_VAR: &str = "UNDERWRITING_CATALOG_DIR";
const DEFAULT_CATALOG_DIR: &str = "data/catalog";

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

fn load_engine() -> anyhow::Result<DecisionEngine> {
    let dir = std::env::var(CATALOG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CATALOG_DIR.to_string());
    let config = EngineConfig::from_env()?;
    let catalog = ProductCatalog::load_from(&dir)?;
    info!("Loaded {} products from {}", catalog.products().len(), dir);
    Ok(DecisionEngine::new(catalog, config)?)
}

fn response(status: i64, body: Option<String>) -> Result<LambdaFunctionUrlResponse, Error> {
    let mut response = LambdaFunctionUrlResponse {
        status_code: status,
        headers: Default::default(),
        body: None,
        is_base64_encoded: false,
        cookies: Vec::new(),
    };
    response.headers.insert("access-control-allow-origin", "*".parse()?);
    response.headers.insert("access-control-allow-methods", "POST, OPTIONS".parse()?);
    response.headers.insert("access-control-allow-headers", "Content-Type".parse()?);
    if body.is_some() {
        response.headers.insert("content-type", "application/json".parse()?);
    }
    response.body = body;
    Ok(response)
}

fn error_response(status: i64, message: &str) -> Result<LambdaFunctionUrlResponse, Error> {
    let body = serde_json::to_string(&ErrorBody { error: message })?;
    response(status, Some(body))
}

/// Lambda handler function
async fn handler(
    engine: &Result<DecisionEngine, String>,
    event: LambdaEvent<LambdaFunctionUrlRequest>,
) -> Result<LambdaFunctionUrlResponse, Error> {
    let request = event.payload;

    // Handle CORS preflight
    if request.request_context.http.method.as_deref() == Some("OPTIONS") {
        return response(200, None);
    }

    let engine = match engine {
        Ok(engine) => engine,
        Err(message) => return error_response(500, message),
    };

    if request.is_base64_encoded {
        return error_response(400, "Request body must be JSON text");
    }
    let body = request.body.as_deref().unwrap_or("{}");
    let input: DecisionEngineInput = match serde_json::from_str(body) {
        Ok(input) => input,
        Err(e) => return error_response(400, &format!("Invalid JSON: {}", e)),
    };

    match engine.get_recommendations(&input) {
        Ok(result) => response(200, Some(serde_json::to_string(&result)?)),
        Err(EngineError::InvalidInput(message)) => error_response(400, &message),
        Err(e) => {
            error!("Recommendation failed: {}", e);
            error_response(500, &e.to_string())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let engine = load_engine().map_err(|e| {
        error!("Failed to load catalog: {:#}", e);
        format!("Failed to load catalog: {}", e)
    });
    let engine = &engine;

    run(service_fn(move |event| async move { handler(engine, event).await })).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_runtime::Context;
    use serde_json::json;

    fn event(method: &str, body: Option<&str>) -> LambdaEvent<LambdaFunctionUrlRequest> {
        let payload: LambdaFunctionUrlRequest = serde_json::from_value(json!({
            "version": "2.0",
            "rawPath": "/",
            "rawQueryString": "",
            "headers": {"content-type": "application/json"},
            "requestContext": {
                "accountId": "123456789012",
                "apiId": "abcdefghij",
                "domainName": "abcdefghij.lambda-url.us-east-1.on.aws",
                "domainPrefix": "abcdefghij",
                "requestId": "req-1",
                "routeKey": "$default",
                "stage": "$default",
                "time": "15/Jan/2026:12:00:00 +0000",
                "timeEpoch": 1768478400000i64,
                "http": {
                    "method": method,
                    "path": "/",
                    "protocol": "HTTP/1.1",
                    "sourceIp": "127.0.0.1",
                    "userAgent": "test"
                }
            },
            "body": body,
            "isBase64Encoded": false
        }))
        .unwrap();
        LambdaEvent::new(payload, Context::default())
    }

    fn empty_engine() -> Result<DecisionEngine, String> {
        Ok(DecisionEngine::new(ProductCatalog::new(Vec::new()), EngineConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn test_preflight_returns_cors_headers() {
        let response = handler(&empty_engine(), event("OPTIONS", None)).await.unwrap();
        assert_eq!(response.status_code, 200);
        assert!(response.body.is_none());
        assert_eq!(response.headers["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_bad_json_is_client_error() {
        let response = handler(&empty_engine(), event("POST", Some("{not json"))).await.unwrap();
        assert_eq!(response.status_code, 400);
        assert!(response.body.unwrap().contains("Invalid JSON"));
    }

    #[tokio::test]
    async fn test_invalid_input_is_client_error() {
        let body = json!({
            "client": {"age": 40, "gender": "male"},
            "coverage": {"faceAmount": 250000.0},
            "imoId": "short"
        })
        .to_string();
        let response = handler(&empty_engine(), event("POST", Some(&body))).await.unwrap();
        assert_eq!(response.status_code, 400);
        assert!(response.body.unwrap().contains("Invalid imoId"));
    }

    #[tokio::test]
    async fn test_catalog_failure_is_server_error() {
        let engine = Err("Failed to load catalog: missing products.csv".to_string());
        let response = handler(&engine, event("POST", Some("{}"))).await.unwrap();
        assert_eq!(response.status_code, 500);

        let preflight = handler(&engine, event("OPTIONS", None)).await.unwrap();
        assert_eq!(preflight.status_code, 200);
    }
}
