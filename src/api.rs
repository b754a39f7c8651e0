//! Zone Control HTTP API
//!
//! Operator endpoints for the zones loaded in the running DNS server:
//! - `GET /zone` lists zone names
//! - `GET /zone/{name}` returns a zone as currently served
//! - `POST /zone/{name}` creates or replaces a zone from a JSON document
//!
//! Every request passes the bearer token check before routing.

use hyper::body::HttpBody;
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::BearerAuth;
use crate::error::ApiError;
use crate::persistence::ZoneFiles;
use crate::registry::{ZoneRegistry, SENTINEL_ZONE};
use crate::zone::Zone;

const ZONE_COLLECTION: &str = "/zone";
const ZONE_PREFIX: &str = "/zone/";

/// Default request body limit
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

// =============================================================================
// API RESPONSE
// =============================================================================

/// Response envelope: a success flag and exactly one of `result` or `error`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(result: T) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(message.to_string()),
        }
    }
}

// =============================================================================
// CONTROL API
// =============================================================================

/// Request handler for the zone control plane
pub struct ControlApi {
    registry: Arc<dyn ZoneRegistry>,
    files: ZoneFiles,
    auth: BearerAuth,
    max_body_bytes: usize,
}

impl ControlApi {
    pub fn new(registry: Arc<dyn ZoneRegistry>, files: ZoneFiles, auth: BearerAuth) -> Self {
        Self {
            registry,
            files,
            auth,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Set the request body limit
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Handle an incoming HTTP request
    pub async fn handle_request(&self, req: Request<Body>) -> Result<Response<Body>, Infallible> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        debug!("Control API request: {} {}", method, path);

        if let Err(e) = self.auth.authorize(req.headers()) {
            debug!("Rejected {} {}: {}", method, path, e);
            return Ok(api_error(&e));
        }

        let response = match route(&method, &path) {
            Ok(Route::ListZones) => self.handle_list_zones().await,
            Ok(Route::GetZone(name)) => self.handle_get_zone(&name).await,
            Ok(Route::PutZone(name)) => self.handle_create_zone(&name, req).await,
            Err(e) => api_error(&e),
        };

        Ok(response)
    }

    // =========================================================================
    // ZONE HANDLERS
    // =========================================================================

    async fn handle_list_zones(&self) -> Response<Body> {
        let mut names: Vec<String> = self
            .registry
            .zone_names()
            .await
            .into_iter()
            .filter(|name| name != SENTINEL_ZONE)
            .collect();
        names.sort();

        json_response(StatusCode::OK, &ApiResponse::success(names))
    }

    async fn handle_get_zone(&self, name: &str) -> Response<Body> {
        match self.registry.get(name).await {
            Some(zone) => json_response(StatusCode::OK, &ApiResponse::success(zone)),
            None => api_error(&ApiError::ZoneNotFound),
        }
    }

    async fn handle_create_zone(&self, name: &str, req: Request<Body>) -> Response<Body> {
        match self.create_zone(name, req).await {
            Ok(()) => {
                info!("Published zone {}", name);
                json_response(
                    StatusCode::OK,
                    &ApiResponse::success("Zone created successfully"),
                )
            }
            Err(e) => {
                warn!("Failed to publish zone {}: {}", name, e);
                api_error(&e)
            }
        }
    }

    /// Apply, persist, then publish. A zone only becomes visible in the
    /// registry once its document is on disk.
    async fn create_zone(&self, name: &str, req: Request<Body>) -> Result<(), ApiError> {
        let mut zone = match self.registry.get(name).await {
            Some(zone) => zone,
            None => Zone::new(name),
        };

        let body = read_body(req, self.max_body_bytes).await?;
        let doc: Map<String, Value> = serde_json::from_slice(&body)
            .map_err(|e| ApiError::InvalidDocument(e.to_string()))?;

        zone.apply_document(&doc);

        let data =
            serde_json::to_vec(&doc).map_err(|e| ApiError::InvalidDocument(e.to_string()))?;

        self.files
            .write(name, &data)
            .await
            .map_err(|e| ApiError::Persistence(e.to_string()))?;

        self.registry.upsert(name, zone).await;
        Ok(())
    }
}

// =============================================================================
// ROUTING
// =============================================================================

#[derive(Debug, PartialEq, Eq)]
enum Route {
    ListZones,
    GetZone(String),
    PutZone(String),
}

fn route(method: &Method, path: &str) -> Result<Route, ApiError> {
    if path == ZONE_COLLECTION {
        return match *method {
            Method::GET => Ok(Route::ListZones),
            _ => Err(ApiError::MethodNotAllowed),
        };
    }

    let Some(segment) = path.strip_prefix(ZONE_PREFIX) else {
        return Err(ApiError::RouteNotFound);
    };
    if segment.is_empty() || segment.contains('/') {
        return Err(ApiError::RouteNotFound);
    }

    match *method {
        Method::GET => Ok(Route::GetZone(decode_zone_name(segment)?)),
        Method::POST => Ok(Route::PutZone(decode_zone_name(segment)?)),
        _ => Err(ApiError::MethodNotAllowed),
    }
}

/// Percent-decode a path segment into a zone name that is safe to use as a
/// file name in the zones directory
fn decode_zone_name(segment: &str) -> Result<String, ApiError> {
    let name = urlencoding::decode(segment).map_err(|_| ApiError::InvalidZoneName)?;
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(ApiError::InvalidZoneName);
    }
    Ok(name.into_owned())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Collect a request body, refusing anything over `limit` bytes
async fn read_body(req: Request<Body>, limit: usize) -> Result<Vec<u8>, ApiError> {
    let mut body = req.into_body();
    let mut data = Vec::new();

    while let Some(chunk) = body.data().await {
        let chunk =
            chunk.map_err(|e| ApiError::InvalidDocument(format!("Failed to read body: {}", e)))?;
        if data.len() + chunk.len() > limit {
            return Err(ApiError::BodyTooLarge(limit));
        }
        data.extend_from_slice(&chunk);
    }

    Ok(data)
}

/// Create JSON response
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Body::from(json));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}

/// Create JSON error response for an API error
pub fn api_error(err: &ApiError) -> Response<Body> {
    json_response(err.status(), &ApiResponse::<()>::error(&err.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================
