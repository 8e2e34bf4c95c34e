mod common;

use std::net::TcpListener;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{rt, test, web, App, HttpServer};
use common::{
    auth_service, create_todo, init_app, init_app_with_store, register_user, test_config,
    token_for, FailingStore,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use todo_api::auth::AuthMiddleware;
use todo_api::db::{MemoryStore, Store};
use todo_api::routes;

fn ids(todos: &serde_json::Value) -> Vec<i64> {
    todos
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_i64().unwrap())
        .collect()
}

#[actix_rt::test]
async fn test_create_applies_defaults_and_is_publicly_readable() {
    let app = init_app().await;
    let user = register_user(&app, "alice", "password123").await;

    let todo = create_todo(&app, &user, json!({ "title": "T", "dueDate": "2024-01-01" })).await;
    let id = todo["id"].as_i64().unwrap();

    // No Authorization header: single todos are public.
    let req = test::TestRequest::get().uri(&format!("/todos/{}", id)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    let fetched = &body["todo"];
    assert_eq!(fetched["title"], "T");
    assert_eq!(fetched["status"], "PENDING");
    assert_eq!(fetched["priority"], "MEDIUM");
    assert_eq!(fetched["starred"], false);
    assert_eq!(fetched["creatorId"], user.id);
    assert_eq!(fetched["creator"]["username"], "alice");
    assert_eq!(fetched["assignedTo"], json!([]));
    assert_eq!(fetched["subtasks"], json!([]));
    assert!(fetched["dueDate"].as_str().unwrap().starts_with("2024-01-01T00:00:00"));
}

#[actix_rt::test]
async fn test_get_todo_by_id_errors() {
    let app = init_app().await;

    let req = test::TestRequest::get().uri("/todos/abc").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Invalid todo ID");

    let req = test::TestRequest::get().uri("/todos/999").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_create_validation() {
    let app = init_app().await;
    let user = register_user(&app, "alice", "password123").await;

    let cases = [
        (json!({ "dueDate": "2024-01-01" }), "Title is required"),
        (json!({ "title": "   ", "dueDate": "2024-01-01" }), "Title is required"),
        (json!({ "title": "T" }), "Due date is required"),
        (json!({ "title": "T", "dueDate": "tomorrow" }), "Invalid due date"),
        (
            json!({ "title": "T", "dueDate": "2024-01-01", "assignedTo": [404] }),
            "Unknown assignee id(s): 404",
        ),
    ];

    for (payload, expected) in cases {
        let req = test::TestRequest::post()
            .uri("/todos")
            .insert_header(user.bearer())
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "payload: {}", payload);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], expected);
    }

    let req = test::TestRequest::post()
        .uri("/todos")
        .insert_header(user.bearer())
        .set_json(json!({ "title": "T", "dueDate": "2024-01-01", "status": "DONE" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_create_with_assignees_and_subtasks() {
    let app = init_app().await;
    let alice = register_user(&app, "alice", "password123").await;
    let bob = register_user(&app, "bob", "password123").await;
    let carol = register_user(&app, "carol", "password123").await;

    let todo = create_todo(
        &app,
        &alice,
        json!({
            "title": "Design homepage layout",
            "description": "Create wireframes",
            "dueDate": "2023-06-05T10:00:00Z",
            "reminderDate": "2023-06-04T10:00:00Z",
            "priority": "HIGH",
            "starred": true,
            "assignedTo": [carol.id, bob.id],
            "subtasks": [
                { "title": "Research examples" },
                { "title": "Draft wireframe", "completed": true }
            ]
        }),
    )
    .await;

    assert_eq!(ids(&todo["assignedTo"]), vec![bob.id as i64, carol.id as i64]);
    assert_eq!(todo["subtasks"][0]["title"], "Research examples");
    assert_eq!(todo["subtasks"][0]["completed"], false);
    assert_eq!(todo["subtasks"][1]["completed"], true);
    assert_eq!(todo["subtasks"][1]["todoId"], todo["id"]);
    assert_eq!(todo["priority"], "HIGH");
    assert_eq!(todo["starred"], true);
}

#[actix_rt::test]
async fn test_list_filters() {
    let app = init_app().await;
    let alice = register_user(&app, "alice", "password123").await;
    let bob = register_user(&app, "bob", "password123").await;

    let pending_starred = create_todo(
        &app,
        &alice,
        json!({ "title": "a", "dueDate": "2024-01-01", "starred": true, "assignedTo": [bob.id] }),
    )
    .await;
    let completed_starred = create_todo(
        &app,
        &alice,
        json!({ "title": "b", "dueDate": "2024-01-01", "starred": true, "status": "COMPLETED", "priority": "LOW" }),
    )
    .await;
    let progress_starred = create_todo(
        &app,
        &alice,
        json!({ "title": "c", "dueDate": "2024-01-01", "starred": true, "status": "IN_PROGRESS" }),
    )
    .await;
    let pending_plain = create_todo(&app, &alice, json!({ "title": "d", "dueDate": "2024-01-01" })).await;

    let list = |query: &str| {
        test::TestRequest::get()
            .uri(&format!("/todos{}", query))
            .insert_header(alice.bearer())
            .to_request()
    };

    let body: serde_json::Value =
        test::call_and_read_body_json(&app, list("?status=PENDING,COMPLETED&starred=true")).await;
    assert_eq!(
        ids(&body["todos"]),
        vec![
            completed_starred["id"].as_i64().unwrap(),
            pending_starred["id"].as_i64().unwrap()
        ]
    );
    assert_eq!(body["filters"]["status"], json!(["PENDING", "COMPLETED"]));
    assert_eq!(body["filters"]["starred"], true);

    let body: serde_json::Value =
        test::call_and_read_body_json(&app, list("?status=all&starred=true")).await;
    assert_eq!(
        ids(&body["todos"]),
        vec![
            progress_starred["id"].as_i64().unwrap(),
            completed_starred["id"].as_i64().unwrap(),
            pending_starred["id"].as_i64().unwrap()
        ]
    );

    let body: serde_json::Value =
        test::call_and_read_body_json(&app, list(&format!("?assignedTo={}", bob.id))).await;
    assert_eq!(ids(&body["todos"]), vec![pending_starred["id"].as_i64().unwrap()]);

    let body: serde_json::Value = test::call_and_read_body_json(&app, list("?priority=low")).await;
    assert_eq!(ids(&body["todos"]), vec![completed_starred["id"].as_i64().unwrap()]);

    let body: serde_json::Value = test::call_and_read_body_json(&app, list("")).await;
    assert_eq!(body["todos"].as_array().unwrap().len(), 4);
    assert_eq!(body["todos"][0]["id"], pending_plain["id"]);

    for bad in ["?status=DONE", "?starred=maybe", "?assignedTo=bob", "?priority=URGENT"] {
        let resp = test::call_service(&app, list(bad)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "query: {}", bad);
    }
}

#[actix_rt::test]
async fn test_update_replaces_assignees() {
    let app = init_app().await;
    let alice = register_user(&app, "alice", "password123").await;
    let bob = register_user(&app, "bob", "password123").await;
    let carol = register_user(&app, "carol", "password123").await;
    let dave = register_user(&app, "dave", "password123").await;

    let todo = create_todo(
        &app,
        &alice,
        json!({ "title": "Shared", "dueDate": "2024-01-01", "assignedTo": [bob.id, carol.id] }),
    )
    .await;
    let uri = format!("/todos/{}", todo["id"]);

    let req = test::TestRequest::put()
        .uri(&uri)
        .insert_header(alice.bearer())
        .set_json(json!({ "assignedTo": [carol.id, dave.id], "status": "IN_PROGRESS" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    let updated = &body["todo"];
    assert_eq!(ids(&updated["assignedTo"]), vec![carol.id as i64, dave.id as i64]);
    assert_eq!(updated["status"], "IN_PROGRESS");
    assert_eq!(updated["title"], "Shared");

    let req = test::TestRequest::put()
        .uri(&uri)
        .insert_header(alice.bearer())
        .set_json(json!({ "assignedTo": [] }))
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["todo"]["assignedTo"], json!([]));
    assert_eq!(body["todo"]["status"], "IN_PROGRESS");
}

#[actix_rt::test]
async fn test_update_errors() {
    let app = init_app().await;
    let alice = register_user(&app, "alice", "password123").await;
    let bob = register_user(&app, "bob", "password123").await;

    let todo = create_todo(
        &app,
        &alice,
        json!({ "title": "Mine", "dueDate": "2024-01-01", "assignedTo": [bob.id] }),
    )
    .await;
    let uri = format!("/todos/{}", todo["id"]);

    let cases = [
        ("/todos/abc", &alice, json!({ "title": "x" }), StatusCode::BAD_REQUEST),
        ("/todos/999", &alice, json!({ "title": "x" }), StatusCode::NOT_FOUND),
        (uri.as_str(), &bob, json!({ "title": "x" }), StatusCode::FORBIDDEN),
        // Ownership is settled before the body is parsed.
        (uri.as_str(), &bob, json!({ "status": "DONE" }), StatusCode::FORBIDDEN),
        (uri.as_str(), &alice, json!({ "status": "DONE" }), StatusCode::BAD_REQUEST),
        (uri.as_str(), &alice, json!({ "title": "   " }), StatusCode::BAD_REQUEST),
        (uri.as_str(), &alice, json!({ "dueDate": "whenever" }), StatusCode::BAD_REQUEST),
    ];

    for (path, user, payload, expected) in cases {
        let req = test::TestRequest::put()
            .uri(path)
            .insert_header(user.bearer())
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), expected, "{} {}", path, payload);
    }

    // Missing body and content type on a todo that does not exist.
    let req = test::TestRequest::put()
        .uri("/todos/999")
        .insert_header(alice.bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "error": "Todo not found" }));

    let req = test::TestRequest::put()
        .uri(&uri)
        .insert_header(alice.bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "error": "Invalid request body" }));

    let req = test::TestRequest::put()
        .uri(&uri)
        .set_json(json!({ "title": "x" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_store_failures_are_opaque_500s() {
    let app = init_app_with_store(Arc::new(FailingStore)).await;
    let bearer = ("Authorization", format!("Bearer {}", token_for(1, "down@example.com")));

    let requests = vec![
        // The middleware's user lookup fails before any handler runs.
        test::TestRequest::get()
            .uri("/my-todos")
            .insert_header(bearer.clone())
            .to_request(),
        test::TestRequest::get()
            .uri("/users")
            .insert_header(bearer)
            .to_request(),
        // Public route, so the failure comes from the handler.
        test::TestRequest::get().uri("/todos/1").to_request(),
        test::TestRequest::post()
            .uri("/login")
            .set_json(json!({ "email": "down@example.com", "password": "password123" }))
            .to_request(),
    ];

    for req in requests {
        let path = req.path().to_string();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", path);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Internal server error" }), "{}", path);
    }
}

#[actix_rt::test]
async fn test_delete_is_creator_only_and_not_repeatable() {
    let app = init_app().await;
    let alice = register_user(&app, "alice", "password123").await;
    let bob = register_user(&app, "bob", "password123").await;

    let todo = create_todo(
        &app,
        &alice,
        json!({ "title": "Gone soon", "dueDate": "2024-01-01", "assignedTo": [bob.id] }),
    )
    .await;
    let uri = format!("/todos/{}", todo["id"]);

    let delete_as = |user: &common::TestUser| {
        test::TestRequest::delete()
            .uri(&uri)
            .insert_header(user.bearer())
            .to_request()
    };

    let resp = test::call_service(&app, delete_as(&bob)).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(&app, delete_as(&alice)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Todo deleted successfully");

    let resp = test::call_service(&app, delete_as(&alice)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::get().uri(&uri).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_my_todos_lists_created_and_assigned() {
    let app = init_app().await;
    let alice = register_user(&app, "alice", "password123").await;
    let bob = register_user(&app, "bob", "password123").await;

    let own = create_todo(&app, &alice, json!({ "title": "own", "dueDate": "2024-01-01" })).await;
    let shared = create_todo(
        &app,
        &bob,
        json!({ "title": "shared", "dueDate": "2024-01-01", "assignedTo": [alice.id] }),
    )
    .await;
    create_todo(&app, &bob, json!({ "title": "bob only", "dueDate": "2024-01-01" })).await;

    let req = test::TestRequest::get()
        .uri("/my-todos")
        .insert_header(alice.bearer())
        .to_request();
    let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(
        ids(&body["todos"]),
        vec![shared["id"].as_i64().unwrap(), own["id"].as_i64().unwrap()]
    );
}

#[actix_rt::test]
async fn test_unknown_route_is_json_404() {
    let app = init_app().await;
    let user = register_user(&app, "alice", "password123").await;

    let req = test::TestRequest::get()
        .uri("/does-not-exist")
        .insert_header(user.bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Route not found");
}

#[actix_rt::test]
async fn test_live_server_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let store_data: web::Data<dyn Store> = web::Data::from(store);
    let auth = web::Data::new(auth_service());
    let config = web::Data::new(test_config());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware)
            .app_data(config.clone())
            .app_data(auth.clone())
            .app_data(store_data.clone())
            .configure(routes::config)
            .default_service(web::route().to(routes::not_found))
    })
    .workers(1)
    .listen(listener)
    .expect("Failed to listen")
    .run();
    let handle = server.handle();
    rt::spawn(server);

    let base = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/todos", base))
        .json(&json!({ "title": "T", "dueDate": "2024-01-01" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(resp.status().as_u16(), 401);

    let resp = client
        .post(format!("{}/register", base))
        .json(&json!({ "username": "live", "email": "live@example.com", "password": "password123" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(resp.status().as_u16(), 201);
    let registered: serde_json::Value = resp.json().await.unwrap();
    let token = registered["token"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{}/todos", base))
        .bearer_auth(&token)
        .json(&json!({ "title": "T", "dueDate": "2024-01-01" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(resp.status().as_u16(), 201);
    let created: serde_json::Value = resp.json().await.unwrap();

    let resp = client
        .get(format!("{}/todos/{}", base, created["todo"]["id"]))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(resp.status().as_u16(), 200);

    handle.stop(true).await;
}
