use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{LabId, OrderId, PhlebotomistId, Priority};
use super::engine::DispatchError;
use super::registry::RegistryError;
use super::service::DispatchService;
use super::status::{OrderStatus, TransitionError};
use super::store::OrderFilters;

/// Router builder exposing the dispatch endpoints.
pub fn dispatch_router(service: Arc<DispatchService>) -> Router {
    Router::new()
        .route("/api/v1/orders", get(list_orders))
        .route("/api/v1/orders/:order_id/status", patch(update_status))
        .route("/api/v1/phlebotomists/available", get(available_phlebotomists))
        .route("/api/v1/labs/available", get(available_labs))
        .route("/api/v1/assignments", post(create_assignment))
        .route("/api/v1/assignments/unassign", post(unassign_orders))
        .route("/api/v1/dispatch/summary", get(dispatch_summary))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OrderQueryParams {
    search: Option<String>,
    status: Option<String>,
    priority: Option<String>,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignmentRequest {
    order_ids: Vec<String>,
    lab_id: Option<String>,
    phlebotomist_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnassignRequest {
    order_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusUpdateRequest {
    status: String,
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            DispatchError::InvalidResource(source) => match source {
                RegistryError::UnknownResource { .. } => {
                    (StatusCode::NOT_FOUND, "unknown_resource")
                }
                _ => (StatusCode::UNPROCESSABLE_ENTITY, "resource_unavailable"),
            },
            DispatchError::Registry(RegistryError::UnknownResource { .. }) => {
                (StatusCode::NOT_FOUND, "unknown_resource")
            }
            DispatchError::Registry(RegistryError::ResourceUnavailable { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "resource_unavailable")
            }
            DispatchError::Registry(RegistryError::CapacityExceeded { .. }) => {
                (StatusCode::CONFLICT, "capacity_exceeded")
            }
            DispatchError::UnknownOrder(_) => (StatusCode::NOT_FOUND, "unknown_order"),
            DispatchError::PartialOrderFailure { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "partial_order_failure")
            }
            DispatchError::Transition(TransitionError::TerminalState { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "terminal_state_violation")
            }
            DispatchError::Transition(TransitionError::InvalidTransition { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_transition")
            }
        };

        let mut body = json!({
            "kind": kind,
            "error": self.to_string(),
        });
        if let DispatchError::PartialOrderFailure { failed_id, .. } = &self {
            body["failed_order_id"] = json!(failed_id);
        }

        (status, Json(body)).into_response()
    }
}

fn bad_request(message: &str) -> Response {
    let payload = json!({
        "kind": "invalid_request",
        "error": message,
    });
    (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
}

fn filter_value(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("all"))
}

pub(crate) async fn list_orders(
    State(service): State<Arc<DispatchService>>,
    Query(params): Query<OrderQueryParams>,
) -> Response {
    let status = match filter_value(params.status) {
        Some(raw) => match OrderStatus::parse_param(&raw) {
            Some(status) => Some(status),
            None => return bad_request(&format!("unrecognized status filter '{raw}'")),
        },
        None => None,
    };
    let priority = match filter_value(params.priority) {
        Some(raw) => match Priority::parse_param(&raw) {
            Some(priority) => Some(priority),
            None => return bad_request(&format!("unrecognized priority filter '{raw}'")),
        },
        None => None,
    };

    let filters = OrderFilters {
        search: filter_value(params.search),
        status,
        priority,
        location: filter_value(params.location),
    };

    Json(service.orders(&filters)).into_response()
}

pub(crate) async fn available_phlebotomists(
    State(service): State<Arc<DispatchService>>,
) -> Response {
    Json(service.available_phlebotomists()).into_response()
}

pub(crate) async fn available_labs(State(service): State<Arc<DispatchService>>) -> Response {
    Json(service.available_labs()).into_response()
}

pub(crate) async fn create_assignment(
    State(service): State<Arc<DispatchService>>,
    Json(request): Json<AssignmentRequest>,
) -> Response {
    let (Some(lab_id), Some(phlebotomist_id)) = (
        request.lab_id.filter(|id| !id.trim().is_empty()),
        request.phlebotomist_id.filter(|id| !id.trim().is_empty()),
    ) else {
        return bad_request("select both a lab and a phlebotomist");
    };
    if request.order_ids.is_empty() {
        return bad_request("select at least one order to assign");
    }

    let order_ids: Vec<OrderId> = request.order_ids.into_iter().map(OrderId).collect();
    match service.assign(&order_ids, &LabId(lab_id), &PhlebotomistId(phlebotomist_id)) {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn unassign_orders(
    State(service): State<Arc<DispatchService>>,
    Json(request): Json<UnassignRequest>,
) -> Response {
    if request.order_ids.is_empty() {
        return bad_request("select at least one order to unassign");
    }
    let order_ids: Vec<OrderId> = request.order_ids.into_iter().map(OrderId).collect();
    match service.unassign(&order_ids) {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn update_status(
    State(service): State<Arc<DispatchService>>,
    Path(order_id): Path<String>,
    Json(request): Json<StatusUpdateRequest>,
) -> Response {
    let Some(status) = OrderStatus::parse_param(&request.status) else {
        return bad_request(&format!("unrecognized status '{}'", request.status));
    };
    if status == OrderStatus::Unassigned {
        return bad_request("orders return to unassigned through the unassign operation");
    }
    if status == OrderStatus::Assigned {
        return bad_request("orders become assigned through the assignment operation");
    }

    match service.set_status(&OrderId(order_id), status) {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(crate) async fn dispatch_summary(State(service): State<Arc<DispatchService>>) -> Response {
    Json(service.summary()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::roster;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use chrono::Utc;
    use tower::ServiceExt;

    fn app() -> Router {
        dispatch_router(Arc::new(DispatchService::new(roster::standard(Utc::now()))))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn list_orders_applies_status_filter() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/orders?status=unassigned")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let orders = body.as_array().expect("array body");
        assert_eq!(orders.len(), 4);
    }

    #[tokio::test]
    async fn list_orders_rejects_unknown_status_filter() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/orders?status=bogus")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn missing_selection_yields_inline_validation_message() {
        let payload = json!({ "order_ids": ["ORD-1001"], "lab_id": "LAB-001" });
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/assignments")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"], "select both a lab and a phlebotomist");
    }

    #[tokio::test]
    async fn capacity_exhaustion_maps_to_conflict() {
        let payload = json!({
            "order_ids": ["ORD-1001", "ORD-1002", "ORD-1003", "ORD-1004"],
            "lab_id": "LAB-001",
            "phlebotomist_id": "PHL-001",
        });
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/assignments")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "capacity_exceeded");
    }

    #[tokio::test]
    async fn status_patch_rejects_terminal_orders() {
        let payload = json!({ "status": "in_progress" });
        let response = app()
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri("/api/v1/orders/ORD-1007/status")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "terminal_state_violation");
    }

    #[tokio::test]
    async fn status_patch_cannot_target_assigned() {
        let payload = json!({ "status": "assigned" });
        let response = app()
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri("/api/v1/orders/ORD-1001/status")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(
            body["error"],
            "orders become assigned through the assignment operation"
        );
    }

    #[tokio::test]
    async fn summary_endpoint_reports_average_turnaround() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/dispatch/summary")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["average_turnaround"], "36h");
    }
}
