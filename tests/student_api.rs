use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use chrono::{Duration, Utc};
use mentor_portal::errors::FieldError;
use mentor_portal::model::EventStatus;
use mentor_portal::model::registration::RegistrationReceipt;
use mentor_portal::model::workshop::{SubmissionReceipt, VisibleTask};
use mentor_portal::response::ApiResponse;
use serde_json::{Value, json};
use uuid::Uuid;

mod helpers;
use helpers::{
    as_user, count_registrations, create_test_event, create_test_group, create_test_task,
    create_test_workshop, setup_test_environment, setup_test_environment_with_settings,
    stored_objects,
};

fn member(name: &str) -> Value {
    json!({
        "full_name": name,
        "course": "B.Sc Computer Science",
        "contact_number": "9876543210",
        "national_id": "123412341234"
    })
}

fn registration(event_id: Option<Uuid>, additional_members: usize) -> Value {
    let members: Vec<Value> = (0..additional_members)
        .map(|i| member(&format!("Member {}", i + 1)))
        .collect();
    json!({
        "event_id": event_id,
        "team_name": "Byte Busters",
        "selected_events": ["Hackathon", "Code Relay"],
        "team_leader": member("Leader"),
        "team_members": members
    })
}

fn pdf(name: &str) -> Part {
    Part::bytes(b"%PDF-1.4 test".to_vec())
        .file_name(name)
        .mime_type("application/pdf")
}

// registrations

#[tokio::test]
async fn test_submit_registration_stores_every_document() {
    let (server, pool, settings) = setup_test_environment_with_settings().await;
    let user = Uuid::new_v4();
    let event_id = create_test_event(&pool, "Tech Fest", EventStatus::Upcoming).await;

    let form = MultipartForm::new()
        .add_text("registration", registration(Some(event_id), 2).to_string())
        .add_part("id_proof_0", pdf("leader-id.pdf"))
        .add_part("institution_id_0", pdf("leader-college.pdf"))
        .add_part("id_proof_2", pdf("member2-id.pdf"));

    let (name, value) = as_user(user);
    let response = server
        .post("/dashboard/student/registrations")
        .add_header(name, value)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: ApiResponse<RegistrationReceipt> = response.json();
    let receipt = body.data.unwrap();
    assert_eq!(receipt.redirect_to, "/dashboard/student");
    assert_eq!(receipt.redirect_after_ms, 2000);

    let mut paths = receipt.document_paths.clone();
    paths.sort();
    assert_eq!(paths.len(), 3);
    assert_eq!(stored_objects(&settings), paths);
    assert!(paths.iter().all(|p| p.starts_with(&user.to_string())));
    assert!(paths.iter().any(|p| p.contains("/id_proof_2_")));
    assert_eq!(count_registrations(&pool, user).await, 1);
}

#[tokio::test]
async fn test_submit_registration_rejects_five_member_team() {
    let (server, pool, settings) = setup_test_environment_with_settings().await;
    let user = Uuid::new_v4();

    let form = MultipartForm::new()
        .add_text("registration", registration(None, 4).to_string())
        .add_part("id_proof_0", pdf("leader-id.pdf"));

    let (name, value) = as_user(user);
    let response = server
        .post("/dashboard/student/registrations")
        .add_header(name, value)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ApiResponse<Vec<FieldError>> = response.json();
    assert!(body.data.unwrap().iter().any(|e| e.field == "team_members"));
    assert!(stored_objects(&settings).is_empty());
    assert_eq!(count_registrations(&pool, user).await, 0);
}

#[tokio::test]
async fn test_submit_registration_reports_field_paths() {
    let (server, _pool) = setup_test_environment().await;
    let mut form = registration(None, 2);
    form["team_members"][1]["contact_number"] = json!("12345");
    form["team_leader"]["national_id"] = json!("1234");

    let (name, value) = as_user(Uuid::new_v4());
    let response = server
        .post("/dashboard/student/registrations")
        .add_header(name, value)
        .multipart(MultipartForm::new().add_text("registration", form.to_string()))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ApiResponse<Vec<FieldError>> = response.json();
    let fields: Vec<String> = body.data.unwrap().into_iter().map(|e| e.field).collect();
    assert_eq!(
        fields,
        vec!["team_leader.national_id", "team_members[1].contact_number"]
    );
}

#[tokio::test]
async fn test_submit_registration_closed_event() {
    let (server, pool) = setup_test_environment().await;
    let event_id = create_test_event(&pool, "Last Year", EventStatus::Completed).await;

    let (name, value) = as_user(Uuid::new_v4());
    let response = server
        .post("/dashboard/student/registrations")
        .add_header(name, value)
        .multipart(
            MultipartForm::new()
                .add_text("registration", registration(Some(event_id), 0).to_string()),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_submit_registration_validates_before_event_lookup() {
    let (server, pool, settings) = setup_test_environment_with_settings().await;
    let closed = create_test_event(&pool, "Archived", EventStatus::Completed).await;

    for event_id in [Uuid::new_v4(), closed] {
        let mut form = registration(Some(event_id), 4);
        form["team_leader"]["contact_number"] = json!("123");

        let (name, value) = as_user(Uuid::new_v4());
        let response = server
            .post("/dashboard/student/registrations")
            .add_header(name, value)
            .multipart(
                MultipartForm::new()
                    .add_text("registration", form.to_string())
                    .add_part("id_proof_0", pdf("leader-id.pdf")),
            )
            .await;

        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: ApiResponse<Vec<FieldError>> = response.json();
        let fields: Vec<String> = body.data.unwrap().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"team_members".to_string()));
        assert!(fields.contains(&"team_leader.contact_number".to_string()));
    }
    assert!(stored_objects(&settings).is_empty());
}

#[tokio::test]
async fn test_submit_registration_requires_form_field() {
    let (server, _pool) = setup_test_environment().await;

    let (name, value) = as_user(Uuid::new_v4());
    let response = server
        .post("/dashboard/student/registrations")
        .add_header(name, value)
        .multipart(MultipartForm::new().add_part("id_proof_0", pdf("id.pdf")))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

// workshop tasks

#[tokio::test]
async fn test_workshop_tasks_only_show_open_tasks() {
    let (server, pool) = setup_test_environment().await;
    let leader = Uuid::new_v4();
    let workshop_id = create_test_workshop(&pool, "Sprint").await;
    create_test_group(&pool, workshop_id, "Alpha", leader, vec![]).await;
    let open = create_test_task(&pool, workshop_id, 1, 10, Some(60), Some(Utc::now())).await;
    let _expired = create_test_task(
        &pool,
        workshop_id,
        2,
        10,
        Some(15),
        Some(Utc::now() - Duration::minutes(30)),
    )
    .await;
    let _inactive = create_test_task(&pool, workshop_id, 3, 10, None, None).await;

    let (name, value) = as_user(leader);
    let response = server
        .get(&format!("/dashboard/student/workshops/{}/tasks", workshop_id))
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<Vec<VisibleTask>> = response.json();
    let tasks = body.data.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, open);
    assert!(tasks[0].deadline.is_some());
}

#[tokio::test]
async fn test_workshop_tasks_forbidden_outside_groups() {
    let (server, pool) = setup_test_environment().await;
    let workshop_id = create_test_workshop(&pool, "Closed Circle").await;
    create_test_group(&pool, workshop_id, "Alpha", Uuid::new_v4(), vec![]).await;

    let (name, value) = as_user(Uuid::new_v4());
    let response = server
        .get(&format!("/dashboard/student/workshops/{}/tasks", workshop_id))
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

// task submissions

#[tokio::test]
async fn test_submit_task_with_attachment() {
    let (server, pool, settings) = setup_test_environment_with_settings().await;
    let leader = Uuid::new_v4();
    let member = Uuid::new_v4();
    let workshop_id = create_test_workshop(&pool, "Build Day").await;
    let group_id = create_test_group(&pool, workshop_id, "Beta", leader, vec![member]).await;
    let task_id = create_test_task(&pool, workshop_id, 1, 20, None, Some(Utc::now())).await;

    let form = MultipartForm::new()
        .add_text("content", "see attached")
        .add_part("file", pdf("solution.pdf"));

    let (name, value) = as_user(member);
    let response = server
        .post(&format!("/dashboard/student/tasks/{}/submissions", task_id))
        .add_header(name, value)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: ApiResponse<SubmissionReceipt> = response.json();
    let receipt = body.data.unwrap();
    assert_eq!(receipt.group_id, group_id);
    assert_eq!(receipt.file_paths.len(), 1);
    assert!(receipt.file_paths[0].contains("/submission_0_"));
    assert_eq!(stored_objects(&settings), receipt.file_paths);
}

#[tokio::test]
async fn test_submit_task_closed_task() {
    let (server, pool) = setup_test_environment().await;
    let leader = Uuid::new_v4();
    let workshop_id = create_test_workshop(&pool, "Late").await;
    create_test_group(&pool, workshop_id, "Gamma", leader, vec![]).await;
    let task_id = create_test_task(&pool, workshop_id, 1, 20, None, None).await;

    let (name, value) = as_user(leader);
    let response = server
        .post(&format!("/dashboard/student/tasks/{}/submissions", task_id))
        .add_header(name, value)
        .multipart(MultipartForm::new().add_text("content", "too early"))
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_submit_task_requires_an_answer() {
    let (server, pool) = setup_test_environment().await;
    let leader = Uuid::new_v4();
    let workshop_id = create_test_workshop(&pool, "Empty").await;
    create_test_group(&pool, workshop_id, "Delta", leader, vec![]).await;
    let task_id = create_test_task(&pool, workshop_id, 1, 20, None, Some(Utc::now())).await;

    let (name, value) = as_user(leader);
    let response = server
        .post(&format!("/dashboard/student/tasks/{}/submissions", task_id))
        .add_header(name, value)
        .multipart(MultipartForm::new().add_text("content", "   "))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

// overview

#[tokio::test]
async fn test_overview_lists_own_registrations_and_groups() {
    let (server, pool) = setup_test_environment().await;
    let user = Uuid::new_v4();
    let workshop_id = create_test_workshop(&pool, "Mine").await;
    let group_id = create_test_group(&pool, workshop_id, "Epsilon", Uuid::new_v4(), vec![user]).await;

    let (name, value) = as_user(user);
    server
        .post("/dashboard/student/registrations")
        .add_header(name, value)
        .multipart(MultipartForm::new().add_text("registration", registration(None, 0).to_string()))
        .await
        .assert_status(StatusCode::CREATED);

    let (name, value) = as_user(user);
    let response = server
        .get("/dashboard/student/overview")
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: ApiResponse<Value> = response.json();
    let overview = body.data.unwrap();
    assert_eq!(overview["registrations"].as_array().unwrap().len(), 1);
    assert_eq!(overview["registrations"][0]["team_name"], "Byte Busters");
    assert_eq!(
        overview["workshop_groups"][0]["id"],
        Value::String(group_id.to_string())
    );
}
