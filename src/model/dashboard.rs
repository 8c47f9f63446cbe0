use super::AppRole;
use super::registration::EventRegistration;
use super::workshop::{TeamTaskSubmission, WorkshopGroup};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug)]
pub struct StudentOverview {
    pub user_id: Uuid,
    pub role: Option<AppRole>,
    pub registrations: Vec<EventRegistration>,
    pub applied_internships: Vec<Uuid>,
    pub enrolled_courses: Vec<Uuid>,
    pub workshop_groups: Vec<WorkshopGroup>,
}

/// A submission as listed for judging, with the caller's own score if any.
#[derive(Serialize, Deserialize, Debug)]
pub struct JudgeSubmissionView {
    pub submission: TeamTaskSubmission,
    pub task_title: String,
    pub points: i32,
    pub my_score: Option<BigDecimal>,
}
