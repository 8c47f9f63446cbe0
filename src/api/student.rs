use super::helper;
use crate::errors::{AppError, FieldError};
use crate::guards::{Access, STUDENT_DASHBOARD};
use crate::model::dashboard::StudentOverview;
use crate::model::registration::{EventRegistration, RegistrationReceipt};
use crate::model::workshop::{
    LeaderboardEntry, NewTeamTaskSubmission, SubmissionReceipt, VisibleTask, WorkshopGroup,
    WorkshopTask,
};
use crate::registration::{
    DocumentUpload, PgRegistrationSink, RegistrationForm, RegistrationPipeline, remove_documents,
    upload_documents,
};
use crate::response::ApiResponse;
use crate::schema::{
    event_registrations::dsl as regs_dsl, internship_applications::dsl as apps_dsl,
    team_task_submissions::dsl as subs_dsl, user_courses::dsl as enrollments_dsl,
    workshop_groups::dsl as groups_dsl, workshop_leaderboard::dsl as board_dsl,
    workshop_tasks::dsl as tasks_dsl,
};
use crate::session::Principal;
use crate::state::AppState;
use crate::storage::DocumentType;
use crate::workshop;
use axum::Extension;
use axum::extract::{Multipart, Path, State};
use chrono::Utc;
use diesel::prelude::*;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Everything the student dashboard shows for the caller.
///
/// Returns (wrapped in `ApiResponse`)
/// * `StudentOverview` (200)
#[instrument(skip(state, access), fields(user_id = %access.principal.id))]
pub async fn get_overview(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
) -> Result<ApiResponse<StudentOverview>, AppError> {
    let user_id = access.principal.id;
    info!("Loading dashboard overview for user {}", user_id);

    let role = match access.role {
        Some(role) => Some(role),
        None => state.roles.primary_role(user_id).await?,
    };

    let (registrations, applied_internships, enrolled_courses, workshop_groups) =
        helper::run_query(&state.pool, move |conn| {
            let registrations = regs_dsl::event_registrations
                .filter(regs_dsl::user_id.eq(user_id))
                .order(regs_dsl::created_at.desc())
                .select(EventRegistration::as_select())
                .load::<EventRegistration>(conn)?;
            let applied = apps_dsl::internship_applications
                .filter(apps_dsl::user_id.eq(user_id))
                .select(apps_dsl::internship_id)
                .load::<Uuid>(conn)?;
            let enrolled = enrollments_dsl::user_courses
                .filter(enrollments_dsl::user_id.eq(user_id))
                .select(enrollments_dsl::course_id)
                .load::<Uuid>(conn)?;
            let groups = groups_dsl::workshop_groups
                .filter(
                    groups_dsl::leader_id
                        .eq(user_id)
                        .or(groups_dsl::member_ids.contains(vec![user_id])),
                )
                .select(WorkshopGroup::as_select())
                .load::<WorkshopGroup>(conn)?;
            Ok((registrations, applied, enrolled, groups))
        })
        .await?;

    debug!(
        "User {} has {} registration(s) and {} group(s)",
        user_id,
        registrations.len(),
        workshop_groups.len()
    );

    Ok(ApiResponse::ok(StudentOverview {
        user_id,
        role,
        registrations,
        applied_internships,
        enrolled_courses,
        workshop_groups,
    }))
}

fn multipart_error(e: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("Multipart error: {e}"))
}

fn check_size(state: &AppState, field: &str, len: usize) -> Result<(), AppError> {
    if len as u64 > state.settings.max_upload_bytes {
        return Err(AppError::Validation(vec![FieldError::new(
            field,
            format!(
                "File exceeds the {} byte upload limit",
                state.settings.max_upload_bytes
            ),
        )]));
    }
    Ok(())
}

/// `id_proof_2` names the ID proof of the third team member.
fn parse_document_field(name: &str) -> Option<(DocumentType, usize)> {
    let (kind, index) = name.rsplit_once('_')?;
    Some((DocumentType::parse(kind)?, index.parse().ok()?))
}

/// Submits a team registration with its identity documents.
///
/// Multipart fields:
/// * `registration`: the `RegistrationForm` as JSON
/// * `{document_type}_{member_index}`: one file per document, member 0 being the leader
///
/// Returns (wrapped in `ApiResponse`)
/// * `RegistrationReceipt` (201) with the dashboard redirect
/// * `422 Unprocessable Entity` with field errors, before anything is stored
/// * `502 Bad Gateway` when an upload fails; nothing is kept in that case
#[instrument(skip(state, principal, multipart))]
pub async fn submit_registration(
    State(state): State<AppState>,
    principal: Option<Principal>,
    mut multipart: Multipart,
) -> Result<ApiResponse<RegistrationReceipt>, AppError> {
    let mut form: Option<RegistrationForm> = None;
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "registration" {
            let bytes = field.bytes().await.map_err(multipart_error)?;
            form = Some(serde_json::from_slice(&bytes).map_err(|e| {
                AppError::BadRequest(format!("Invalid registration form: {e}"))
            })?);
            continue;
        }

        let Some((document_type, member_index)) = parse_document_field(&name) else {
            return Err(AppError::BadRequest(format!(
                "Unexpected multipart field '{}'",
                name
            )));
        };
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        check_size(&state, &format!("documents.{name}"), bytes.len())?;
        uploads.push(DocumentUpload {
            member_index,
            document_type,
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    let form = form.ok_or_else(|| AppError::BadRequest("Missing 'registration' field".into()))?;
    info!(
        "Registration for team '{}' with {} document(s)",
        form.team_name,
        uploads.len()
    );

    let sink = PgRegistrationSink::new(state.pool.clone());
    let pipeline = RegistrationPipeline::new(state.storage.as_ref(), &sink);
    let submitted = pipeline
        .submit(principal, form, uploads, Utc::now())
        .await?;

    Ok(ApiResponse::created(RegistrationReceipt {
        registration_id: submitted.registration_id,
        document_paths: submitted.document_paths,
        redirect_to: STUDENT_DASHBOARD.to_string(),
        redirect_after_ms: state.settings.redirect_delay.as_millis() as u64,
    }))
}

async fn load_task(state: &AppState, task_id: Uuid) -> Result<WorkshopTask, AppError> {
    helper::run_query(&state.pool, move |conn| {
        tasks_dsl::workshop_tasks
            .find(task_id)
            .select(WorkshopTask::as_select())
            .first::<WorkshopTask>(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Task with ID {} not found.", task_id)))
}

/// The caller's group in a workshop.
async fn group_of(
    state: &AppState,
    workshop_id: Uuid,
    user_id: Uuid,
) -> Result<WorkshopGroup, AppError> {
    let groups = helper::run_query(&state.pool, move |conn| {
        groups_dsl::workshop_groups
            .filter(groups_dsl::workshop_id.eq(workshop_id))
            .order(groups_dsl::created_at.asc())
            .select(WorkshopGroup::as_select())
            .load::<WorkshopGroup>(conn)
    })
    .await?;

    groups
        .into_iter()
        .find(|group| workshop::is_member(group, user_id))
        .ok_or_else(|| {
            warn!(
                "User {} is not in any group of workshop {}",
                user_id, workshop_id
            );
            AppError::Forbidden("You are not part of a group in this workshop.".to_string())
        })
}

/// Tasks the caller's group can currently work on.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<VisibleTask>` (200), ordered by position
/// * `403 Forbidden` if the caller belongs to no group of the workshop
#[instrument(skip(state, access), fields(user_id = %access.principal.id))]
pub async fn get_workshop_tasks(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Path(workshop_id): Path<Uuid>,
) -> Result<ApiResponse<Vec<VisibleTask>>, AppError> {
    let group = group_of(&state, workshop_id, access.principal.id).await?;
    debug!("Listing tasks of workshop {} for group {}", workshop_id, group.id);

    let tasks = helper::run_query(&state.pool, move |conn| {
        tasks_dsl::workshop_tasks
            .filter(tasks_dsl::workshop_id.eq(workshop_id))
            .select(WorkshopTask::as_select())
            .load::<WorkshopTask>(conn)
    })
    .await?;

    Ok(ApiResponse::ok(workshop::visible_tasks(tasks, Utc::now())))
}

/// Submits a group's answer to a task.
///
/// Multipart fields:
/// * `content`: optional text answer
/// * any other field: a file attachment
///
/// Returns (wrapped in `ApiResponse`)
/// * `SubmissionReceipt` (201)
/// * `403 Forbidden` if the task is closed or the caller has no group
/// * `422 Unprocessable Entity` when neither text nor files were sent
#[instrument(skip(state, access, multipart), fields(user_id = %access.principal.id))]
pub async fn submit_task(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Path(task_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<ApiResponse<SubmissionReceipt>, AppError> {
    let user_id = access.principal.id;
    let task = load_task(&state, task_id).await?;
    let now = Utc::now();
    if !workshop::is_visible(&task, now) {
        warn!("Submission to closed task {} by user {}", task_id, user_id);
        return Err(AppError::Forbidden(
            "This task is not open for submissions.".to_string(),
        ));
    }
    let group = group_of(&state, task.workshop_id, user_id).await?;

    let mut content: Option<String> = None;
    let mut attachments = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("content") {
            let text = field.text().await.map_err(multipart_error)?;
            content = Some(text).filter(|text| !text.trim().is_empty());
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        check_size(&state, "files", bytes.len())?;
        if bytes.is_empty() {
            continue;
        }
        attachments.push(DocumentUpload {
            member_index: attachments.len(),
            document_type: DocumentType::Submission,
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    if content.is_none() && attachments.is_empty() {
        return Err(AppError::Validation(vec![FieldError::new(
            "content",
            "Provide an answer or attach at least one file",
        )]));
    }

    let stored = upload_documents(state.storage.as_ref(), user_id, attachments, now).await?;
    let file_paths: Vec<String> = stored.into_iter().map(|(_, doc)| doc.path).collect();

    let submission = NewTeamTaskSubmission {
        task_id,
        group_id: group.id,
        submitted_by: user_id,
        content,
        file_paths: file_paths.clone(),
    };
    let inserted = helper::run_query(&state.pool, move |conn| {
        diesel::insert_into(subs_dsl::team_task_submissions)
            .values(&submission)
            .returning(subs_dsl::id)
            .get_result::<Uuid>(conn)
    })
    .await;

    match inserted {
        Ok(submission_id) => {
            info!(
                "Group {} submitted task {} (submission {}, {} file(s))",
                group.id,
                task_id,
                submission_id,
                file_paths.len()
            );
            Ok(ApiResponse::created(SubmissionReceipt {
                submission_id,
                group_id: group.id,
                file_paths,
            }))
        }
        Err(e) => {
            error!("Submission insert failed for task {}: {}", task_id, e);
            remove_documents(state.storage.as_ref(), &file_paths).await;
            Err(e)
        }
    }
}

/// The stored leaderboard of a workshop, best rank first.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<LeaderboardEntry>` (200)
#[instrument(skip(state))]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(workshop_id): Path<Uuid>,
) -> Result<ApiResponse<Vec<LeaderboardEntry>>, AppError> {
    let entries = helper::run_query(&state.pool, move |conn| {
        board_dsl::workshop_leaderboard
            .filter(board_dsl::workshop_id.eq(workshop_id))
            .order((board_dsl::rank.asc(), board_dsl::group_id.asc()))
            .select(LeaderboardEntry::as_select())
            .load::<LeaderboardEntry>(conn)
    })
    .await?;
    Ok(ApiResponse::ok(entries))
}
