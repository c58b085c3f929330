use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use caserelay_core::domain::case::{
    AccountInfo, CaseRequest, CaseResult, InteractionEntry, ResultMetadata,
};
use caserelay_core::errors::ErrorKind;
use utoipa::OpenApi;

use crate::cases::{ErrorBody, RootMessage};
use crate::health::{HealthCheck, HealthResponse};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "caserelay API",
        description = "Relays CRM cases to a hosted language model and returns structured analysis."
    ),
    paths(crate::cases::root, crate::cases::analyze_case, crate::health::health),
    components(schemas(
        CaseRequest,
        AccountInfo,
        InteractionEntry,
        CaseResult,
        ResultMetadata,
        ErrorBody,
        ErrorKind,
        RootMessage,
        HealthResponse,
        HealthCheck
    )),
    tags(
        (name = "cases", description = "CRM case analysis"),
        (name = "service", description = "Service status")
    )
)]
pub struct ApiDoc;

const SWAGGER_UI_PAGE: &str = r##"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <title>caserelay API docs</title>
    <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
  </head>
  <body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js" crossorigin></script>
    <script>
      window.onload = () => {
        window.ui = SwaggerUIBundle({ url: "/openapi.json", dom_id: "#swagger-ui" });
      };
    </script>
  </body>
</html>
"##;

pub fn router() -> Router {
    Router::new().route("/openapi.json", get(openapi_json)).route("/docs", get(swagger_ui))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

async fn swagger_ui() -> Html<&'static str> {
    Html(SWAGGER_UI_PAGE)
}
