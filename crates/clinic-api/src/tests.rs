//! Router tests: every request goes through the full axum stack via
//! `tower::ServiceExt::oneshot` against an in-memory SQLite store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Method, Request, StatusCode},
};
use chrono::{Duration, Utc};
use clinic_core::actor::{Actor, Role};
use clinic_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER, api_router};

async fn app() -> Router {
  let store = SqliteStore::open_in_memory()
    .await
    .expect("in-memory store");
  api_router(Arc::new(store))
}

fn actor(role: Role) -> Actor { Actor::new(Uuid::new_v4(), role) }

async fn call(
  app: &Router,
  method: Method,
  uri: &str,
  as_actor: Option<&Actor>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(a) = as_actor {
    builder = builder
      .header(ACTOR_ID_HEADER, a.id.to_string())
      .header(ACTOR_ROLE_HEADER, a.role.as_str());
  }
  let req = match body {
    Some(json) => builder
      .header("content-type", "application/json")
      .body(Body::from(json.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let resp = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

async fn book(app: &Router, client: &Actor, vet_id: Option<Uuid>) -> Uuid {
  let (status, body) = call(
    app,
    Method::POST,
    "/appointments",
    Some(client),
    Some(json!({
      "pet_id": Uuid::new_v4(),
      "service_id": Uuid::new_v4(),
      "vet_id": vet_id,
      "scheduled_at": (Utc::now() + Duration::days(1)).to_rfc3339(),
      "notes": "annual vaccination",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  body["appointment"]["appointment_id"]
    .as_str()
    .unwrap()
    .parse()
    .unwrap()
}

async fn transition(
  app: &Router,
  id: Uuid,
  as_actor: &Actor,
  body: Value,
) -> (StatusCode, Value) {
  call(
    app,
    Method::PUT,
    &format!("/appointments/{id}"),
    Some(as_actor),
    Some(body),
  )
  .await
}

// ─── Identity ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_identity_is_unauthorized() {
  let app = app().await;
  let (status, body) = call(&app, Method::GET, "/appointments", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["kind"], "unauthorized");
}

// ─── Appointments ────────────────────────────────────────────────────────────

#[tokio::test]
async fn book_then_read_back() {
  let app = app().await;
  let client = actor(Role::Client);
  let id = book(&app, &client, None).await;

  let (status, body) = call(
    &app,
    Method::GET,
    &format!("/appointments/{id}"),
    Some(&client),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "pending");
  assert_eq!(body["client_id"], client.id.to_string());

  let (_, listed) =
    call(&app, Method::GET, "/appointments", Some(&client), None).await;
  assert_eq!(listed.as_array().unwrap().len(), 1);

  // Another client neither sees nor lists it.
  let stranger = actor(Role::Client);
  let (status, _) = call(
    &app,
    Method::GET,
    &format!("/appointments/{id}"),
    Some(&stranger),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (_, listed) =
    call(&app, Method::GET, "/appointments", Some(&stranger), None).await;
  assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn booking_in_the_past_is_unprocessable() {
  let app = app().await;
  let (status, body) = call(
    &app,
    Method::POST,
    "/appointments",
    Some(&actor(Role::Client)),
    Some(json!({
      "pet_id": Uuid::new_v4(),
      "service_id": Uuid::new_v4(),
      "scheduled_at": (Utc::now() - Duration::hours(1)).to_rfc3339(),
    })),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["kind"], "invalid_schedule");
}

#[tokio::test]
async fn status_filter() {
  let app = app().await;
  let client = actor(Role::Client);
  let admin = actor(Role::Admin);
  let first = book(&app, &client, None).await;
  book(&app, &client, None).await;
  transition(&app, first, &client, json!({ "new_status": "cancelled" })).await;

  let (_, cancelled) = call(
    &app,
    Method::GET,
    "/appointments?status=cancelled",
    Some(&admin),
    None,
  )
  .await;
  assert_eq!(cancelled.as_array().unwrap().len(), 1);

  let (status, body) = call(
    &app,
    Method::GET,
    "/appointments?status=archived",
    Some(&admin),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["kind"], "bad_request");
}

#[tokio::test]
async fn vet_accepts_and_client_is_notified() {
  let app = app().await;
  let client = actor(Role::Client);
  let vet = actor(Role::Veterinarian);
  let id = book(&app, &client, None).await;

  let (status, body) = transition(
    &app,
    id,
    &vet,
    json!({ "new_status": "accepted", "expected_status": "pending" }),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["appointment"]["status"], "accepted");
  assert_eq!(body["appointment"]["vet_id"], vet.id.to_string());
  assert!(body["warnings"].as_array().unwrap().is_empty());

  let (_, inbox) =
    call(&app, Method::GET, "/notifications", Some(&client), None).await;
  let inbox = inbox.as_array().unwrap();
  assert_eq!(inbox.len(), 1);
  assert_eq!(inbox[0]["kind"], "appointment-accepted");
  assert_eq!(inbox[0]["appointment_id"], id.to_string());

  let (_, history) = call(
    &app,
    Method::GET,
    &format!("/appointments/{id}/history"),
    Some(&client),
    None,
  )
  .await;
  let history = history.as_array().unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[1]["from"], "pending");
  assert_eq!(history[1]["to"], "accepted");
  assert_eq!(history[1]["actor_role"], "veterinarian");
}

#[tokio::test]
async fn error_statuses() {
  let app = app().await;
  let client = actor(Role::Client);
  let vet = actor(Role::Veterinarian);
  let id = book(&app, &client, None).await;

  // A client cannot approve its own booking.
  let (status, body) =
    transition(&app, id, &client, json!({ "new_status": "accepted" })).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["kind"], "permission_denied");

  // No pending -> completed edge.
  let (status, body) =
    transition(&app, id, &vet, json!({ "new_status": "completed" })).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  assert_eq!(body["kind"], "invalid_transition");

  transition(&app, id, &vet, json!({ "new_status": "accepted" })).await;

  // Stale view of the appointment.
  let (status, body) = transition(
    &app,
    id,
    &client,
    json!({ "new_status": "cancelled", "expected_status": "pending" }),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["kind"], "conflict");
  assert_eq!(body["current"], "accepted");

  let (status, body) = transition(
    &app,
    Uuid::new_v4(),
    &vet,
    json!({ "new_status": "accepted" }),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn strangers_get_not_found_on_transition() {
  let app = app().await;
  let owner = actor(Role::Client);
  let stranger = actor(Role::Client);
  let id = book(&app, &owner, None).await;

  let (status, _) = call(
    &app,
    Method::GET,
    &format!("/appointments/{id}"),
    Some(&stranger),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, body) = transition(
    &app,
    id,
    &stranger,
    json!({ "new_status": "cancelled", "expected_status": "accepted" }),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["kind"], "not_found");
  assert!(body.get("current").is_none());
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
  let app = app().await;
  let client = actor(Role::Client);
  let id = book(&app, &client, None).await;

  let (status, body) =
    transition(&app, id, &client, json!({ "new_status": "archived" })).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["kind"], "bad_request");

  let (status, body) = call(
    &app,
    Method::POST,
    "/appointments",
    Some(&client),
    Some(json!({ "notes": "no pet" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["kind"], "bad_request");
}

#[tokio::test]
async fn reschedule_over_http() {
  let app = app().await;
  let client = actor(Role::Client);
  let admin = actor(Role::Admin);
  let id = book(&app, &client, None).await;
  transition(&app, id, &admin, json!({ "new_status": "accepted" })).await;

  let at = Utc::now() + Duration::days(4);
  let (status, body) = transition(
    &app,
    id,
    &client,
    json!({ "new_status": "pending", "scheduled_at": at.to_rfc3339() }),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["appointment"]["status"], "pending");

  // Booked, accepted, rescheduled: one admin notification each.
  let (_, unread) = call(
    &app,
    Method::GET,
    "/notifications/unread?audience=admin",
    Some(&admin),
    None,
  )
  .await;
  assert_eq!(unread["unread"], 3);
}

#[tokio::test]
async fn actions_follow_role() {
  let app = app().await;
  let client = actor(Role::Client);
  let vet = actor(Role::Veterinarian);
  let id = book(&app, &client, None).await;
  let uri = format!("/appointments/{id}/actions");

  let (_, client_actions) = call(&app, Method::GET, &uri, Some(&client), None).await;
  assert_eq!(client_actions, json!(["cancelled"]));

  let (_, vet_actions) = call(&app, Method::GET, &uri, Some(&vet), None).await;
  let vet_actions = vet_actions.as_array().unwrap();
  assert!(vet_actions.contains(&json!("accepted")));
  assert!(vet_actions.contains(&json!("rejected")));
  assert!(!vet_actions.contains(&json!("completed")));
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[tokio::test]
async fn read_and_delete_are_idempotent() {
  let app = app().await;
  let client = actor(Role::Client);
  let vet = actor(Role::Veterinarian);
  let id = book(&app, &client, None).await;
  transition(&app, id, &vet, json!({ "new_status": "rejected" })).await;

  let (_, inbox) =
    call(&app, Method::GET, "/notifications", Some(&client), None).await;
  let nid = inbox[0]["notification_id"].as_str().unwrap().to_owned();

  let (_, unread) =
    call(&app, Method::GET, "/notifications/unread", Some(&client), None).await;
  assert_eq!(unread["unread"], 1);

  for _ in 0..2 {
    let (status, _) = call(
      &app,
      Method::PUT,
      &format!("/notifications/{nid}/read"),
      Some(&client),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
  }
  let (_, unread) =
    call(&app, Method::GET, "/notifications/unread", Some(&client), None).await;
  assert_eq!(unread["unread"], 0);

  for _ in 0..2 {
    let (status, _) = call(
      &app,
      Method::DELETE,
      &format!("/notifications/{nid}"),
      Some(&client),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
  }
  let (_, inbox) =
    call(&app, Method::GET, "/notifications", Some(&client), None).await;
  assert!(inbox.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn audience_scoping() {
  let app = app().await;
  let client = actor(Role::Client);
  let other = actor(Role::Client);

  let (status, body) = call(
    &app,
    Method::GET,
    "/notifications?audience=admin",
    Some(&client),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["kind"], "permission_denied");

  let (status, _) = call(
    &app,
    Method::GET,
    &format!("/notifications?audience=user:{}", other.id),
    Some(&client),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, body) = call(
    &app,
    Method::GET,
    "/notifications?audience=everyone",
    Some(&client),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["kind"], "bad_request");
}

#[tokio::test]
async fn foreign_notification_ids_are_a_silent_no_op() {
  let app = app().await;
  let client = actor(Role::Client);
  let admin = actor(Role::Admin);
  book(&app, &client, None).await;

  let (_, admin_inbox) = call(
    &app,
    Method::GET,
    "/notifications?audience=admin",
    Some(&admin),
    None,
  )
  .await;
  let nid = admin_inbox[0]["notification_id"].as_str().unwrap().to_owned();

  let (status, _) = call(
    &app,
    Method::DELETE,
    &format!("/notifications/{nid}"),
    Some(&client),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let (_, admin_inbox) = call(
    &app,
    Method::GET,
    "/notifications?audience=admin",
    Some(&admin),
    None,
  )
  .await;
  assert_eq!(admin_inbox.as_array().unwrap().len(), 1);
}
