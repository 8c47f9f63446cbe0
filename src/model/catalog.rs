use super::{ApplicationStatus, EnrollmentStatus, EventStatus};
use crate::feed::Keyed;
use crate::schema::{courses, events, internship_applications, internships, user_courses};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = events)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: String,
    pub banner_url: Option<String>,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = events)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: String,
    pub banner_url: Option<String>,
    pub status: EventStatus,
    // created_at has a DB default
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = internships)]
pub struct Internship {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub duration: String,
    pub description: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = internships)]
pub struct NewInternship {
    pub title: String,
    pub company: String,
    pub duration: String,
    pub description: String,
    pub location: String,
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = courses)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = internship_applications)]
pub struct NewInternshipApplication {
    pub internship_id: Uuid,
    pub user_id: Uuid,
    pub status: ApplicationStatus,
    // applied_at has a DB default
}

#[derive(Insertable, Debug)]
#[diesel(table_name = user_courses)]
pub struct NewUserCourse {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub status: EnrollmentStatus,
}

/// What a student dashboard offers for an event in a given state.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Register,
    ViewTasks,
    ViewCertificate,
}

impl From<EventStatus> for EventAction {
    fn from(status: EventStatus) -> Self {
        match status {
            EventStatus::Upcoming => EventAction::Register,
            EventStatus::Ongoing => EventAction::ViewTasks,
            EventStatus::Completed => EventAction::ViewCertificate,
        }
    }
}

impl Keyed for Event {
    fn key(&self) -> Uuid {
        self.id
    }
}

impl Keyed for Internship {
    fn key(&self) -> Uuid {
        self.id
    }
}
