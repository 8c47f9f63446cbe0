use crate::schema::event_registrations;
use crate::storage::DocumentType;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A document attached to a team member, by storage path only.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub document_type: DocumentType,
    pub path: String,
}

/// One team member as persisted in the `team_leader` / `team_members` jsonb columns.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TeamMember {
    pub full_name: String,
    pub course: String,
    pub contact_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_contact: Option<String>,
    pub national_id: String,
    #[serde(default)]
    pub documents: Vec<StoredDocument>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = event_registrations)]
pub struct NewEventRegistration {
    pub event_id: Option<Uuid>,
    pub user_id: Uuid,
    pub team_name: String,
    pub selected_events: Vec<String>,
    pub team_leader: JsonValue,
    pub team_members: JsonValue,
    pub status: String,
    // created_at, updated_at have DB defaults
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = event_registrations)]
pub struct EventRegistration {
    pub id: Uuid,
    pub event_id: Option<Uuid>,
    pub user_id: Uuid,
    pub team_name: String,
    pub selected_events: Vec<String>,
    pub team_leader: JsonValue,
    pub team_members: JsonValue,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RegistrationReceipt {
    pub registration_id: Uuid,
    pub document_paths: Vec<String>,
    pub redirect_to: String,
    pub redirect_after_ms: u64,
}
