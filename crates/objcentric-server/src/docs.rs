//! Human readable API documentation.
//!
//! `/docs` doubles as the container liveness target, so these pages are static and
//! never touch the kernel pool.

use serde_json::{Value, json};

pub const OPENAPI_PATH: &str = "/openapi.json";

pub const DOCS_PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
  <title>objcentric - Swagger UI</title>
  <meta charset="utf-8"/>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    SwaggerUIBundle({ url: "/openapi.json", dom_id: "#swagger-ui" });
  </script>
</body>
</html>
"##;

pub const REDOC_PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
  <title>objcentric - ReDoc</title>
  <meta charset="utf-8"/>
</head>
<body>
  <redoc spec-url="/openapi.json"></redoc>
  <script src="https://cdn.jsdelivr.net/npm/redoc@2/bundles/redoc.standalone.js"></script>
</body>
</html>
"##;

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": { "schema": { "$ref": "#/components/schemas/ErrorBody" } }
        }
    })
}

/// OpenAPI 3 description of the public routes.
pub fn openapi_document() -> Value {
    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "objcentric",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Match images against a bounded pool of reference embeddings."
        },
        "paths": {
            "/predict": {
                "post": {
                    "summary": "Match an image against the kernel pool",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/PredictRequest" }
                            }
                        }
                    },
                    "responses": {
                        "200": {
                            "description": "Ranked matches",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/PredictResponse" }
                                }
                            }
                        },
                        "400": error_response("Empty payload, invalid base64 or undecodable image"),
                        "422": error_response("Malformed JSON body"),
                        "500": error_response("Internal failure")
                    }
                }
            },
            "/health": {
                "get": {
                    "summary": "Pool and encoder status",
                    "responses": {
                        "200": {
                            "description": "Service status",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/HealthResponse" }
                                }
                            }
                        }
                    }
                }
            }
        },
        "components": {
            "schemas": {
                "PredictRequest": {
                    "type": "object",
                    "required": ["image_base64"],
                    "properties": {
                        "image_base64": { "type": "string", "format": "byte" }
                    }
                },
                "PredictResponse": {
                    "type": "object",
                    "required": ["num_kernels", "matched_kernel_ids", "matched_scores"],
                    "properties": {
                        "num_kernels": { "type": "integer", "minimum": 0 },
                        "matched_kernel_ids": {
                            "type": "array",
                            "items": { "type": "string", "format": "uuid" }
                        },
                        "matched_scores": {
                            "type": "array",
                            "items": { "type": "number", "minimum": -1, "maximum": 1 }
                        }
                    }
                },
                "HealthResponse": {
                    "type": "object",
                    "properties": {
                        "status": { "type": "string" },
                        "num_kernels": { "type": "integer" },
                        "capacity": { "type": "integer" },
                        "encoder": { "type": "string" },
                        "devices": { "type": "string", "nullable": true }
                    }
                },
                "ErrorBody": {
                    "type": "object",
                    "required": ["error", "detail"],
                    "properties": {
                        "error": { "type": "string" },
                        "detail": { "type": "string" }
                    }
                }
            }
        }
    })
}
