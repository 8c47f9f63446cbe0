use crate::schema::{
    judge_scores, team_task_submissions, workshop_groups, workshop_leaderboard, workshop_tasks,
    workshops,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = workshops)]
pub struct Workshop {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = workshops)]
pub struct NewWorkshop {
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = workshop_tasks)]
pub struct WorkshopTask {
    pub id: Uuid,
    pub workshop_id: Uuid,
    pub position: i32,
    pub title: String,
    pub description: String,
    pub points: i32,
    pub timer_minutes: Option<i32>,
    pub is_active: bool,
    pub activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = workshop_tasks)]
pub struct NewWorkshopTask {
    pub workshop_id: Uuid,
    pub position: i32,
    pub title: String,
    pub description: String,
    pub points: i32,
    pub timer_minutes: Option<i32>,
    // is_active defaults to false, activated_at to NULL
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = workshop_groups)]
pub struct WorkshopGroup {
    pub id: Uuid,
    pub workshop_id: Uuid,
    pub name: String,
    pub leader_id: Uuid,
    pub member_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = workshop_groups)]
pub struct NewWorkshopGroup {
    pub workshop_id: Uuid,
    pub name: String,
    pub leader_id: Uuid,
    pub member_ids: Vec<Uuid>,
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone)]
#[diesel(table_name = team_task_submissions)]
pub struct TeamTaskSubmission {
    pub id: Uuid,
    pub task_id: Uuid,
    pub group_id: Uuid,
    pub submitted_by: Uuid,
    pub content: Option<String>,
    pub file_paths: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = team_task_submissions)]
pub struct NewTeamTaskSubmission {
    pub task_id: Uuid,
    pub group_id: Uuid,
    pub submitted_by: Uuid,
    pub content: Option<String>,
    pub file_paths: Vec<String>,
    // submitted_at has a DB default
}

#[derive(Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = judge_scores)]
pub struct NewJudgeScore {
    pub submission_id: Uuid,
    pub judge_id: Uuid,
    pub score: BigDecimal,
    pub feedback: Option<String>,
    pub scored_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = workshop_leaderboard)]
pub struct LeaderboardEntry {
    pub workshop_id: Uuid,
    pub group_id: Uuid,
    pub total_score: BigDecimal,
    pub tasks_completed: i32,
    pub rank: i32,
    pub qualified_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A task as shown to a team, with the deadline derived from its timer.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VisibleTask {
    pub id: Uuid,
    pub position: i32,
    pub title: String,
    pub description: String,
    pub points: i32,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubmissionReceipt {
    pub submission_id: Uuid,
    pub group_id: Uuid,
    pub file_paths: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScoreReceipt {
    pub submission_id: Uuid,
    pub judge_id: Uuid,
    pub score: BigDecimal,
    pub leaderboard: Vec<LeaderboardEntry>,
}
