//! Team registration: validation, document uploads and the registration row.
//!
//! Everything is validated before any storage or database call. Uploads run
//! concurrently and must all succeed before the row is written; when either
//! step fails, the objects already stored are deleted again.

use crate::api::helper;
use crate::errors::{AppError, FieldError};
use crate::model::registration::{NewEventRegistration, StoredDocument, TeamMember};
use crate::schema::event_registrations::dsl as regs_dsl;
use crate::session::Principal;
use crate::storage::{DocumentType, ObjectStorage, document_path, file_extension};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_diesel::postgres::Pool;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use futures::future::join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Competitions a team may enter.
pub const EVENT_CATALOG: &[&str] = &[
    "Hackathon",
    "Code Relay",
    "Tech Quiz",
    "Robo Race",
    "Paper Presentation",
    "Project Expo",
    "Debugging Challenge",
    "Startup Pitch",
];

/// Members allowed besides the team leader.
pub const MAX_ADDITIONAL_MEMBERS: usize = 3;

static CONTACT_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{10}$").expect("valid contact regex"));
static NATIONAL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{12}$").expect("valid national id regex"));

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MemberForm {
    pub full_name: String,
    pub course: String,
    pub contact_number: String,
    #[serde(default)]
    pub parent_contact: Option<String>,
    pub national_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RegistrationForm {
    #[serde(default)]
    pub event_id: Option<Uuid>,
    pub team_name: String,
    pub selected_events: Vec<String>,
    pub team_leader: MemberForm,
    #[serde(default)]
    pub team_members: Vec<MemberForm>,
}

impl RegistrationForm {
    /// Leader included.
    pub fn team_size(&self) -> usize {
        self.team_members.len() + 1
    }
}

/// A file attached to one member; index 0 is the leader.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub member_index: usize,
    pub document_type: DocumentType,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

fn validate_member(prefix: &str, member: &MemberForm, errors: &mut Vec<FieldError>) {
    if member.full_name.trim().chars().count() < 2 {
        errors.push(FieldError::new(
            format!("{prefix}.full_name"),
            "Full name must be at least 2 characters",
        ));
    }

    let course_len = member.course.trim().chars().count();
    if !(2..=200).contains(&course_len) {
        errors.push(FieldError::new(
            format!("{prefix}.course"),
            "Course/school must be between 2 and 200 characters",
        ));
    }

    if !CONTACT_NUMBER.is_match(member.contact_number.trim()) {
        errors.push(FieldError::new(
            format!("{prefix}.contact_number"),
            "Contact number must be exactly 10 digits",
        ));
    }

    if let Some(parent) = member.parent_contact.as_deref().map(str::trim) {
        if !parent.is_empty() && !CONTACT_NUMBER.is_match(parent) {
            errors.push(FieldError::new(
                format!("{prefix}.parent_contact"),
                "Parent contact must be exactly 10 digits",
            ));
        }
    }

    if !NATIONAL_ID.is_match(member.national_id.trim()) {
        errors.push(FieldError::new(
            format!("{prefix}.national_id"),
            "National ID must be exactly 12 digits",
        ));
    }
}

/// Checks the form the way the registration page does before submitting.
pub fn validate_registration(form: &RegistrationForm) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    if form.team_name.trim().chars().count() < 3 {
        errors.push(FieldError::new(
            "team_name",
            "Team name must be at least 3 characters",
        ));
    }

    if form.selected_events.is_empty() {
        errors.push(FieldError::new(
            "selected_events",
            "Select at least one event",
        ));
    }
    for (i, event) in form.selected_events.iter().enumerate() {
        if !EVENT_CATALOG.contains(&event.as_str()) {
            errors.push(FieldError::new(
                format!("selected_events[{i}]"),
                format!("Unknown event '{event}'"),
            ));
        }
    }

    if form.team_members.len() > MAX_ADDITIONAL_MEMBERS {
        errors.push(FieldError::new(
            "team_members",
            format!(
                "A team has at most {} members including the leader",
                MAX_ADDITIONAL_MEMBERS + 1
            ),
        ));
    }

    validate_member("team_leader", &form.team_leader, &mut errors);
    for (i, member) in form.team_members.iter().enumerate() {
        validate_member(&format!("team_members[{i}]"), member, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Each upload must belong to an existing member, and a member carries at
/// most one document of each type.
pub fn validate_documents(form: &RegistrationForm, uploads: &[DocumentUpload]) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for upload in uploads {
        let field = format!(
            "documents.{}_{}",
            upload.document_type.as_str(),
            upload.member_index
        );
        if upload.document_type == DocumentType::Submission {
            errors.push(FieldError::new(
                field.clone(),
                "Task submissions cannot be attached to a registration",
            ));
        }
        if upload.member_index >= form.team_size() {
            errors.push(FieldError::new(
                field.clone(),
                format!("No team member at position {}", upload.member_index),
            ));
        }
        if upload.bytes.is_empty() {
            errors.push(FieldError::new(field.clone(), "Uploaded file is empty"));
        }
        if !seen.insert((upload.member_index, upload.document_type)) {
            errors.push(FieldError::new(field, "Document uploaded twice"));
        }
    }
    errors
}

#[async_trait]
pub trait RegistrationSink: Send + Sync {
    /// Fails unless the event exists and still accepts registrations.
    async fn ensure_event_open(&self, event_id: Uuid) -> Result<(), AppError>;

    async fn insert(&self, registration: NewEventRegistration) -> Result<Uuid, AppError>;
}

pub struct PgRegistrationSink {
    pool: Pool,
}

impl PgRegistrationSink {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RegistrationSink for PgRegistrationSink {
    async fn ensure_event_open(&self, event_id: Uuid) -> Result<(), AppError> {
        helper::ensure_event_open(&self.pool, event_id).await?;
        Ok(())
    }

    async fn insert(&self, registration: NewEventRegistration) -> Result<Uuid, AppError> {
        let event_id = registration.event_id;
        let result = helper::run_query(&self.pool, move |conn| {
            diesel::insert_into(regs_dsl::event_registrations)
                .values(&registration)
                .returning(regs_dsl::id)
                .get_result::<Uuid>(conn)
        })
        .await;

        match result {
            Err(AppError::DieselError(DieselError::DatabaseError(
                DatabaseErrorKind::ForeignKeyViolation,
                _,
            ))) => Err(AppError::NotFound(format!(
                "Event with ID {} not found.",
                event_id.map(|id| id.to_string()).unwrap_or_default()
            ))),
            other => other,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubmittedRegistration {
    pub registration_id: Uuid,
    pub document_paths: Vec<String>,
}

pub struct RegistrationPipeline<'a> {
    storage: &'a dyn ObjectStorage,
    sink: &'a dyn RegistrationSink,
}

impl<'a> RegistrationPipeline<'a> {
    pub fn new(storage: &'a dyn ObjectStorage, sink: &'a dyn RegistrationSink) -> Self {
        Self { storage, sink }
    }

    #[instrument(skip(self, form, uploads), fields(team = %form.team_name, uploads = uploads.len()))]
    pub async fn submit(
        &self,
        principal: Option<Principal>,
        form: RegistrationForm,
        uploads: Vec<DocumentUpload>,
        now: DateTime<Utc>,
    ) -> Result<SubmittedRegistration, AppError> {
        let mut errors = validate_registration(&form).err().unwrap_or_default();
        errors.extend(validate_documents(&form, &uploads));
        if !errors.is_empty() {
            info!("Registration rejected with {} field error(s)", errors.len());
            return Err(AppError::Validation(errors));
        }

        let principal = principal
            .ok_or_else(|| AppError::Unauthorized("Please sign in to register".to_string()))?;

        if let Some(event_id) = form.event_id {
            self.sink.ensure_event_open(event_id).await?;
        }

        let uploaded = upload_documents(self.storage, principal.id, uploads, now).await?;
        let document_paths: Vec<String> =
            uploaded.iter().map(|(_, doc)| doc.path.clone()).collect();

        let registration = match build_registration(principal.id, form, uploaded) {
            Ok(registration) => registration,
            Err(e) => {
                remove_documents(self.storage, &document_paths).await;
                return Err(e);
            }
        };

        match self.sink.insert(registration).await {
            Ok(registration_id) => {
                info!(
                    "Registration {} stored for user {} with {} document(s)",
                    registration_id,
                    principal.id,
                    document_paths.len()
                );
                Ok(SubmittedRegistration {
                    registration_id,
                    document_paths,
                })
            }
            Err(e) => {
                error!("Registration insert failed after uploads: {}", e);
                remove_documents(self.storage, &document_paths).await;
                Err(e)
            }
        }
    }
}

/// Uploads every document concurrently under the user's folder. Either all
/// of them are stored, or none are: on any failure the objects already
/// written are removed and the first failure is reported.
pub async fn upload_documents(
    storage: &dyn ObjectStorage,
    user_id: Uuid,
    uploads: Vec<DocumentUpload>,
    now: DateTime<Utc>,
) -> Result<Vec<(usize, StoredDocument)>, AppError> {
    let attempts = join_all(uploads.into_iter().map(|upload| {
        let extension =
            file_extension(upload.file_name.as_deref(), upload.content_type.as_deref());
        let path = document_path(
            user_id,
            upload.document_type,
            upload.member_index,
            now,
            &extension,
        );
        async move {
            let result = storage.put(&path, upload.bytes).await;
            (upload.member_index, upload.document_type, result)
        }
    }))
    .await;

    let mut uploaded = Vec::with_capacity(attempts.len());
    let mut failure = None;
    for (member_index, document_type, result) in attempts {
        match result {
            Ok(path) => uploaded.push((
                member_index,
                StoredDocument {
                    document_type,
                    path,
                },
            )),
            Err(e) if failure.is_none() => {
                failure = Some(format!(
                    "Failed to upload {} for team member {}: {}",
                    document_type.as_str(),
                    member_index,
                    e
                ));
            }
            Err(e) => warn!("Additional upload failure: {}", e),
        }
    }

    if let Some(message) = failure {
        let paths: Vec<String> = uploaded.into_iter().map(|(_, doc)| doc.path).collect();
        remove_documents(storage, &paths).await;
        return Err(AppError::UploadFailed(message));
    }
    Ok(uploaded)
}

/// Best-effort removal of objects written for a submission that did not land.
pub async fn remove_documents(storage: &dyn ObjectStorage, paths: &[String]) {
    if paths.is_empty() {
        return;
    }
    warn!("Removing {} orphaned upload(s)", paths.len());
    let results = join_all(
        paths
            .iter()
            .map(|path| async move { (path, storage.delete(path).await) }),
    )
    .await;
    for (path, result) in results {
        if let Err(e) = result {
            error!("Failed to remove orphaned upload {}: {}", path, e);
        }
    }
}

fn into_member(form: MemberForm, documents: Vec<StoredDocument>) -> TeamMember {
    TeamMember {
        full_name: form.full_name.trim().to_string(),
        course: form.course.trim().to_string(),
        contact_number: form.contact_number.trim().to_string(),
        parent_contact: form
            .parent_contact
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        national_id: form.national_id.trim().to_string(),
        documents,
    }
}

fn build_registration(
    user_id: Uuid,
    form: RegistrationForm,
    uploaded: Vec<(usize, StoredDocument)>,
) -> Result<NewEventRegistration, AppError> {
    let mut documents: Vec<Vec<StoredDocument>> = vec![Vec::new(); form.team_size()];
    for (member_index, document) in uploaded {
        if let Some(slot) = documents.get_mut(member_index) {
            slot.push(document);
        }
    }
    let mut documents = documents.into_iter();

    let leader = into_member(form.team_leader, documents.next().unwrap_or_default());
    let members: Vec<TeamMember> = form
        .team_members
        .into_iter()
        .zip(documents)
        .map(|(member, docs)| into_member(member, docs))
        .collect();

    let mut selected_events = Vec::with_capacity(form.selected_events.len());
    for event in form.selected_events {
        if !selected_events.contains(&event) {
            selected_events.push(event);
        }
    }

    Ok(NewEventRegistration {
        event_id: form.event_id,
        user_id,
        team_name: form.team_name.trim().to_string(),
        selected_events,
        team_leader: serde_json::to_value(&leader)?,
        team_members: serde_json::to_value(&members)?,
        status: "pending".to_string(),
    })
}
