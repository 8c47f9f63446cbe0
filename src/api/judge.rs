use super::helper;
use crate::errors::AppError;
use crate::guards::Access;
use crate::leaderboard::recompute_workshop_leaderboard;
use crate::model::dashboard::JudgeSubmissionView;
use crate::model::workshop::{NewJudgeScore, ScoreReceipt, TeamTaskSubmission};
use crate::payloads::judge::ScoreSubmissionPayload;
use crate::response::ApiResponse;
use crate::schema::{
    judge_scores::dsl as scores_dsl, team_task_submissions::dsl as subs_dsl,
    workshop_tasks::dsl as tasks_dsl,
};
use crate::state::AppState;
use crate::workshop;
use axum::Extension;
use axum::extract::{Path, State};
use axum::response::Json;
use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Submissions of a workshop, oldest first, with the caller's own scores.
///
/// Returns (wrapped in `ApiResponse`)
/// * `Vec<JudgeSubmissionView>` (200)
#[instrument(skip(state, access), fields(judge_id = %access.principal.id))]
pub async fn list_submissions(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Path(workshop_id): Path<Uuid>,
) -> Result<ApiResponse<Vec<JudgeSubmissionView>>, AppError> {
    let judge_id = access.principal.id;
    info!("Listing submissions of workshop {} for judging", workshop_id);

    let (rows, my_scores) = helper::run_query(&state.pool, move |conn| {
        let rows = subs_dsl::team_task_submissions
            .inner_join(tasks_dsl::workshop_tasks)
            .filter(tasks_dsl::workshop_id.eq(workshop_id))
            .order(subs_dsl::submitted_at.asc())
            .select((
                TeamTaskSubmission::as_select(),
                tasks_dsl::title,
                tasks_dsl::points,
            ))
            .load::<(TeamTaskSubmission, String, i32)>(conn)?;

        let submission_ids: Vec<Uuid> = rows.iter().map(|(s, _, _)| s.id).collect();
        let my_scores = scores_dsl::judge_scores
            .filter(scores_dsl::judge_id.eq(judge_id))
            .filter(scores_dsl::submission_id.eq_any(submission_ids))
            .select((scores_dsl::submission_id, scores_dsl::score))
            .load::<(Uuid, BigDecimal)>(conn)?;
        Ok((rows, my_scores))
    })
    .await?;

    let mut my_scores: HashMap<Uuid, BigDecimal> = my_scores.into_iter().collect();
    let views = rows
        .into_iter()
        .map(|(submission, task_title, points)| JudgeSubmissionView {
            my_score: my_scores.remove(&submission.id),
            submission,
            task_title,
            points,
        })
        .collect::<Vec<_>>();

    debug!("Found {} submission(s)", views.len());
    Ok(ApiResponse::ok(views))
}

/// Scores a submission. A judge scores each submission once; scoring it
/// again replaces the earlier score. The workshop leaderboard is rebuilt in
/// the same transaction.
///
/// Request Body: `ScoreSubmissionPayload`
///
/// Returns (wrapped in `ApiResponse`)
/// * `ScoreReceipt` (200) with the updated leaderboard
/// * `404 Not Found` if the submission does not exist
/// * `422 Unprocessable Entity` if the score is outside `0..=points`
#[instrument(skip(state, access, payload), fields(judge_id = %access.principal.id, submission_id = %payload.submission_id))]
pub async fn score_submission(
    State(state): State<AppState>,
    Extension(access): Extension<Access>,
    Json(payload): Json<ScoreSubmissionPayload>,
) -> Result<ApiResponse<ScoreReceipt>, AppError> {
    let judge_id = access.principal.id;
    let submission_id = payload.submission_id;

    let (workshop_id, points) = helper::run_query(&state.pool, move |conn| {
        subs_dsl::team_task_submissions
            .inner_join(tasks_dsl::workshop_tasks)
            .filter(subs_dsl::id.eq(submission_id))
            .select((tasks_dsl::workshop_id, tasks_dsl::points))
            .first::<(Uuid, i32)>(conn)
            .optional()
    })
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Submission with ID {} not found.", submission_id)))?;

    workshop::check_score(&payload.score, points)?;

    let now = Utc::now();
    let score = NewJudgeScore {
        submission_id,
        judge_id,
        score: payload.score,
        feedback: payload.feedback,
        scored_at: now,
    };
    let stored_score = score.score.clone();

    let leaderboard = helper::run_query(&state.pool, move |conn| {
        conn.transaction(|conn| {
            diesel::insert_into(scores_dsl::judge_scores)
                .values(&score)
                .on_conflict((scores_dsl::submission_id, scores_dsl::judge_id))
                .do_update()
                .set(&score)
                .execute(conn)?;
            recompute_workshop_leaderboard(conn, workshop_id, now)
        })
    })
    .await?;

    info!(
        "Judge {} scored submission {} with {}; leaderboard of workshop {} has {} group(s)",
        judge_id,
        submission_id,
        stored_score,
        workshop_id,
        leaderboard.len()
    );

    Ok(ApiResponse::ok(ScoreReceipt {
        submission_id,
        judge_id,
        score: stored_score,
        leaderboard,
    }))
}
