use crate::model::EventStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateEventPayload {
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: String,
    pub banner_url: Option<String>,
    pub status: Option<EventStatus>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateInternshipPayload {
    pub title: String,
    pub company: String,
    pub duration: String,
    pub description: String,
    pub location: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateWorkshopPayload {
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateTaskPayload {
    pub position: i32,
    pub title: String,
    pub description: String,
    pub points: i32,
    pub timer_minutes: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CreateGroupPayload {
    pub name: String,
    pub leader_id: Uuid,
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ListRegistrationsParams {
    pub event_id: Option<Uuid>,
}
