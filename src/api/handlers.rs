use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{Html, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::problem::{bad_request, problem_response, ApiError};
use crate::config::Environment;
use crate::logic::pipeline::{Behaviors, RequestContext};
use crate::logic::users::{
    create_user_pipeline, delete_user_pipeline, get_user_pipeline, list_users_pipeline,
    update_user_pipeline, CreateUserRequest, DeleteUserRequest, GetUserRequest, ListUsersRequest,
    UpdateUserRequest,
};
use crate::model::{parse_identifier, CreateUserResponse, Id, ListResponse, UserContext, UserResponse};
use crate::store::PersistenceStore;

/// Shared state handed to every handler.
pub struct AppState<S> {
    pub store: Arc<S>,
    pub environment: Environment,
    pub behaviors: Behaviors,
}

impl<S> AppState<S> {
    pub fn new(store: Arc<S>, environment: Environment, behaviors: Behaviors) -> Self {
        Self {
            store,
            environment,
            behaviors,
        }
    }
}

// Manual impl: S itself need not be Clone
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            environment: self.environment,
            behaviors: self.behaviors,
        }
    }
}

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub user_name: Option<String>,
    pub include: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IncludeQuery {
    pub include: Option<String>,
}

fn parse_path_id(
    ctx: &RequestContext,
    environment: Environment,
    raw: &str,
) -> Result<Id, ApiError> {
    parse_identifier(raw)
        .ok_or_else(|| bad_request(ctx, environment, format!("'{}' is not a valid identifier", raw)))
}

fn body<T>(
    ctx: &RequestContext,
    environment: Environment,
    payload: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| bad_request(ctx, environment, rejection.body_text()))
}

pub async fn create_user<S: PersistenceStore>(
    State(state): State<AppState<S>>,
    user: UserContext,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateUserResponse>), ApiError> {
    let ctx = RequestContext::new(user);
    let request = body(&ctx, state.environment, payload)?;

    match create_user_pipeline(state.store.clone(), state.behaviors)
        .send(&ctx, request)
        .await
    {
        Ok(response) => Ok((StatusCode::CREATED, Json(response))),
        Err(failure) => Err(problem_response(&ctx, state.environment, &failure)),
    }
}

pub async fn list_users<S: PersistenceStore>(
    State(state): State<AppState<S>>,
    user: UserContext,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<ListResponse<UserResponse>>, ApiError> {
    let ctx = RequestContext::new(user);
    let request = ListUsersRequest {
        user_name: query.user_name,
        include: query.include,
    };

    list_users_pipeline(state.store.clone(), state.behaviors)
        .send(&ctx, request)
        .await
        .map(Json)
        .map_err(|failure| problem_response(&ctx, state.environment, &failure))
}

pub async fn get_user<S: PersistenceStore>(
    State(state): State<AppState<S>>,
    user: UserContext,
    Path(id): Path<String>,
    Query(query): Query<IncludeQuery>,
) -> Result<Json<UserResponse>, ApiError> {
    let ctx = RequestContext::new(user);
    let id = parse_path_id(&ctx, state.environment, &id)?;

    get_user_pipeline(state.store.clone(), state.behaviors)
        .send(
            &ctx,
            GetUserRequest {
                id,
                include: query.include,
            },
        )
        .await
        .map(Json)
        .map_err(|failure| problem_response(&ctx, state.environment, &failure))
}

pub async fn update_user<S: PersistenceStore>(
    State(state): State<AppState<S>>,
    user: UserContext,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let ctx = RequestContext::new(user);
    let id = parse_path_id(&ctx, state.environment, &id)?;
    let mut request = body(&ctx, state.environment, payload)?;
    request.id = id;

    update_user_pipeline(state.store.clone(), state.behaviors)
        .send(&ctx, request)
        .await
        .map(Json)
        .map_err(|failure| problem_response(&ctx, state.environment, &failure))
}

pub async fn delete_user<S: PersistenceStore>(
    State(state): State<AppState<S>>,
    user: UserContext,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let ctx = RequestContext::new(user);
    let id = parse_path_id(&ctx, state.environment, &id)?;

    delete_user_pipeline(state.store.clone(), state.behaviors)
        .send(&ctx, DeleteUserRequest { id })
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|failure| problem_response(&ctx, state.environment, &failure))
}

// API Documentation handlers
pub async fn get_api_docs() -> Html<String> {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Hendry Template API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui.css" />
    <style>
        html {
            box-sizing: border-box;
            overflow-y: scroll;
        }
        body {
            margin: 0;
            background: #fafafa;
        }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5.9.0/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            const ui = SwaggerUIBundle({
                url: '/docs/openapi.json',
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    Html(html.to_string())
}

fn problem_responses() -> serde_json::Value {
    let problem = serde_json::json!({
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ProblemDetails" }
            }
        }
    });
    let with = |description: &str| {
        let mut response = problem.clone();
        response["description"] = serde_json::Value::String(description.to_string());
        response
    };
    serde_json::json!({
        "400": with("Malformed request"),
        "404": with("User not found"),
        "422": with("Validation failed"),
        "500": with("Internal server error")
    })
}

pub async fn get_openapi_spec() -> Json<serde_json::Value> {
    let errors = problem_responses();
    let id_parameter = serde_json::json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "string", "format": "uuid" }
    });
    let include_parameter = serde_json::json!({
        "name": "include",
        "in": "query",
        "required": false,
        "description": "Comma-separated navigation paths to load, e.g. `addresses`. All navigations are loaded when omitted.",
        "schema": { "type": "string" }
    });
    let user_response = serde_json::json!({
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/UserResponse" }
            }
        }
    });
    let user_body = serde_json::json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": {
                    "type": "object",
                    "required": ["data"],
                    "properties": {
                        "data": { "$ref": "#/components/schemas/UserCommand" }
                    }
                }
            }
        }
    });

    let spec = serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Hendry Template API",
            "version": "1.0.0",
            "description": "User management over a command/response pipeline with partial updates."
        },
        "servers": [
            { "url": "/", "description": "Current server" }
        ],
        "tags": [
            { "name": "Documentation", "description": "API documentation endpoints" },
            { "name": "Users", "description": "User management" },
            { "name": "Health", "description": "Liveness probe" }
        ],
        "paths": {
            "/health": {
                "get": {
                    "tags": ["Health"],
                    "summary": "Health check",
                    "responses": { "200": { "description": "Service is healthy" } }
                }
            },
            "/api/user": {
                "get": {
                    "tags": ["Users"],
                    "summary": "List users ordered by user name",
                    "parameters": [
                        {
                            "name": "userName",
                            "in": "query",
                            "required": false,
                            "description": "Case-insensitive substring filter",
                            "schema": { "type": "string" }
                        },
                        include_parameter.clone()
                    ],
                    "responses": {
                        "200": {
                            "description": "Users",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/ListResponseUser" }
                                }
                            }
                        },
                        "500": errors["500"].clone()
                    }
                },
                "post": {
                    "tags": ["Users"],
                    "summary": "Create a user",
                    "requestBody": user_body.clone(),
                    "responses": {
                        "201": {
                            "description": "User created",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "properties": {
                                            "data": { "$ref": "#/components/schemas/UserResponse" }
                                        }
                                    }
                                }
                            }
                        },
                        "400": errors["400"].clone(),
                        "422": errors["422"].clone(),
                        "500": errors["500"].clone()
                    }
                }
            },
            "/api/user/{id}": {
                "get": {
                    "tags": ["Users"],
                    "summary": "Get a user",
                    "parameters": [id_parameter.clone(), include_parameter],
                    "responses": {
                        "200": user_response.clone(),
                        "400": errors["400"].clone(),
                        "404": errors["404"].clone()
                    }
                },
                "patch": {
                    "tags": ["Users"],
                    "summary": "Partially update a user",
                    "description": "Only fields present in `data` are applied. `null` clears a field.",
                    "parameters": [id_parameter.clone()],
                    "requestBody": user_body,
                    "responses": {
                        "200": user_response,
                        "400": errors["400"].clone(),
                        "404": errors["404"].clone(),
                        "422": errors["422"].clone()
                    }
                },
                "delete": {
                    "tags": ["Users"],
                    "summary": "Delete a user",
                    "parameters": [id_parameter],
                    "responses": {
                        "204": { "description": "User deleted" },
                        "404": errors["404"].clone()
                    }
                }
            },
            "/docs": {
                "get": {
                    "tags": ["Documentation"],
                    "summary": "Get interactive API documentation",
                    "responses": { "200": { "description": "HTML page with Swagger UI" } }
                }
            },
            "/docs/openapi.json": {
                "get": {
                    "tags": ["Documentation"],
                    "summary": "Get OpenAPI specification",
                    "responses": { "200": { "description": "OpenAPI specification" } }
                }
            }
        },
        "components": {
            "schemas": {
                "ProblemDetails": {
                    "type": "object",
                    "properties": {
                        "type": { "type": "string" },
                        "title": { "type": "string" },
                        "status": { "type": "integer" },
                        "detail": { "type": "string" },
                        "errors": {
                            "type": "object",
                            "additionalProperties": { "type": "array", "items": { "type": "string" } }
                        },
                        "traceId": { "type": "string" }
                    }
                },
                "AddressCommand": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "Empty for a new address" },
                        "label": { "type": "string" },
                        "street": { "type": "string" },
                        "city": { "type": "string" },
                        "postalCode": { "type": "string", "nullable": true }
                    }
                },
                "UserCommand": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "description": "Must be empty on create" },
                        "userName": { "type": "string" },
                        "password": { "type": "string" },
                        "email": { "type": "string", "nullable": true },
                        "profile": {
                            "type": "object",
                            "nullable": true,
                            "properties": {
                                "displayName": { "type": "string" },
                                "bio": { "type": "string", "nullable": true }
                            }
                        },
                        "permissions": { "type": "array", "items": { "type": "string" } },
                        "tags": { "type": "array", "items": { "type": "string" } },
                        "addresses": {
                            "type": "array",
                            "items": { "$ref": "#/components/schemas/AddressCommand" }
                        }
                    }
                },
                "UserResponse": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "format": "uuid" },
                        "userName": { "type": "string" },
                        "password": { "type": "string" },
                        "email": { "type": "string", "nullable": true },
                        "profile": { "type": "object", "nullable": true },
                        "permissions": { "type": "array", "items": { "type": "string" } },
                        "tags": { "type": "string", "description": "Semicolon-joined tags" },
                        "addresses": { "type": "array", "items": { "type": "object" } },
                        "createdAt": { "type": "string", "format": "date-time", "nullable": true },
                        "lastModifiedAt": { "type": "string", "format": "date-time", "nullable": true }
                    }
                },
                "ListResponseUser": {
                    "type": "object",
                    "properties": {
                        "items": {
                            "type": "array",
                            "items": { "$ref": "#/components/schemas/UserResponse" }
                        },
                        "total": { "type": "integer" }
                    }
                }
            }
        }
    });

    Json(spec)
}
