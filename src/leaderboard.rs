//! Workshop leaderboard.
//!
//! For every (group, task) pair the best judge score across the group's
//! submissions counts. A group's total is the sum over tasks and its
//! `qualified_at` is when it last reached one of those best scores. Ranking
//! is by total (descending), then `qualified_at` (earlier first, never
//! qualified last); exact ties share a rank.

use crate::model::workshop::LeaderboardEntry;
use crate::schema::{
    judge_scores::dsl as scores_dsl, team_task_submissions::dsl as subs_dsl,
    workshop_groups::dsl as groups_dsl, workshop_leaderboard::dsl as board_dsl,
    workshop_tasks::dsl as tasks_dsl, workshops::dsl as workshops_dsl,
};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// One judge's score for one submission, with what it was submitted for.
#[derive(Debug, Clone, Queryable)]
pub struct ScoredSubmission {
    pub group_id: Uuid,
    pub task_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub score: BigDecimal,
}

#[derive(Default)]
struct BestScore {
    score: BigDecimal,
    reached_at: Option<DateTime<Utc>>,
}

struct Standing {
    group_id: Uuid,
    total: BigDecimal,
    tasks_completed: i32,
    qualified_at: Option<DateTime<Utc>>,
}

fn compare(a: &Standing, b: &Standing) -> Ordering {
    b.total
        .cmp(&a.total)
        .then_with(|| match (a.qualified_at, b.qualified_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

pub fn compute_leaderboard(
    workshop_id: Uuid,
    groups: &[Uuid],
    scores: &[ScoredSubmission],
    now: DateTime<Utc>,
) -> Vec<LeaderboardEntry> {
    let mut best: HashMap<Uuid, BTreeMap<Uuid, BestScore>> = groups
        .iter()
        .map(|group| (*group, BTreeMap::new()))
        .collect();

    for scored in scores {
        let Some(tasks) = best.get_mut(&scored.group_id) else {
            continue;
        };
        let entry = tasks.entry(scored.task_id).or_default();
        match entry.reached_at {
            None => {
                entry.score = scored.score.clone();
                entry.reached_at = Some(scored.submitted_at);
            }
            Some(reached_at) => match scored.score.cmp(&entry.score) {
                Ordering::Greater => {
                    entry.score = scored.score.clone();
                    entry.reached_at = Some(scored.submitted_at);
                }
                // First submission to hit the best score is the one that counts.
                Ordering::Equal if scored.submitted_at < reached_at => {
                    entry.reached_at = Some(scored.submitted_at);
                }
                _ => {}
            },
        }
    }

    let mut standings: Vec<Standing> = best
        .into_iter()
        .map(|(group_id, tasks)| Standing {
            group_id,
            total: tasks
                .values()
                .fold(BigDecimal::zero(), |acc, best| acc + &best.score),
            tasks_completed: tasks.len() as i32,
            qualified_at: tasks.values().filter_map(|best| best.reached_at).max(),
        })
        .collect();

    standings.sort_by(|a, b| compare(a, b).then_with(|| a.group_id.cmp(&b.group_id)));

    let mut entries = Vec::with_capacity(standings.len());
    let mut rank = 0;
    for (i, standing) in standings.iter().enumerate() {
        if i == 0 || compare(&standings[i - 1], standing) != Ordering::Equal {
            rank = i as i32 + 1;
        }
        entries.push(LeaderboardEntry {
            workshop_id,
            group_id: standing.group_id,
            total_score: standing.total.normalized(),
            tasks_completed: standing.tasks_completed,
            rank,
            qualified_at: standing.qualified_at,
            updated_at: now,
        });
    }
    entries
}

/// Rebuilds the stored leaderboard of a workshop. Meant to run inside the
/// transaction that changed a score.
///
/// The workshop row is locked first, so concurrent rebuilds of one workshop
/// run one after another and each reads the scores committed before it.
pub fn recompute_workshop_leaderboard(
    conn: &mut PgConnection,
    workshop_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Vec<LeaderboardEntry>, diesel::result::Error> {
    workshops_dsl::workshops
        .find(workshop_id)
        .select(workshops_dsl::id)
        .for_update()
        .first::<Uuid>(conn)?;

    let groups = groups_dsl::workshop_groups
        .filter(groups_dsl::workshop_id.eq(workshop_id))
        .select(groups_dsl::id)
        .load::<Uuid>(conn)?;

    let scores = scores_dsl::judge_scores
        .inner_join(subs_dsl::team_task_submissions.inner_join(tasks_dsl::workshop_tasks))
        .filter(tasks_dsl::workshop_id.eq(workshop_id))
        .select((
            subs_dsl::group_id,
            subs_dsl::task_id,
            subs_dsl::submitted_at,
            scores_dsl::score,
        ))
        .load::<ScoredSubmission>(conn)?;

    let entries = compute_leaderboard(workshop_id, &groups, &scores, now);

    diesel::delete(board_dsl::workshop_leaderboard.filter(board_dsl::workshop_id.eq(workshop_id)))
        .execute(conn)?;
    if !entries.is_empty() {
        diesel::insert_into(board_dsl::workshop_leaderboard)
            .values(&entries)
            .execute(conn)?;
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::{FromPrimitive, ToPrimitive};
    use chrono::Duration;
    use float_cmp::approx_eq;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    fn scored(group: u128, task: u128, minute: i64, score: f64) -> ScoredSubmission {
        ScoredSubmission {
            group_id: Uuid::from_u128(group),
            task_id: Uuid::from_u128(task),
            submitted_at: at(minute),
            score: BigDecimal::from_f64(score).unwrap(),
        }
    }

    fn groups(ids: &[u128]) -> Vec<Uuid> {
        ids.iter().map(|id| Uuid::from_u128(*id)).collect()
    }

    fn total(entry: &LeaderboardEntry) -> f64 {
        entry.total_score.to_f64().unwrap()
    }

    #[test]
    fn best_score_per_task_is_summed() {
        let scores = vec![
            scored(1, 100, 5, 4.0),
            scored(1, 100, 9, 7.5),
            scored(1, 100, 12, 6.0),
            scored(1, 200, 20, 3.0),
        ];
        let board = compute_leaderboard(Uuid::nil(), &groups(&[1]), &scores, at(60));
        assert_eq!(board.len(), 1);
        assert!(approx_eq!(f64, total(&board[0]), 10.5, epsilon = 1e-9));
        assert_eq!(board[0].tasks_completed, 2);
        assert_eq!(board[0].qualified_at, Some(at(20)));
        assert_eq!(board[0].rank, 1);
    }

    #[test]
    fn earlier_qualification_breaks_ties() {
        let scores = vec![scored(1, 100, 30, 5.0), scored(2, 100, 10, 5.0)];
        let board = compute_leaderboard(Uuid::nil(), &groups(&[1, 2]), &scores, at(60));
        assert_eq!(board[0].group_id, Uuid::from_u128(2));
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[1].rank, 2);
    }

    #[test]
    fn exact_ties_share_a_rank() {
        let scores = vec![
            scored(1, 100, 10, 9.0),
            scored(2, 100, 20, 5.0),
            scored(3, 100, 20, 5.0),
            scored(4, 100, 30, 1.0),
        ];
        let board = compute_leaderboard(Uuid::nil(), &groups(&[4, 3, 2, 1]), &scores, at(60));
        let ranks: Vec<(u128, i32)> = board
            .iter()
            .map(|e| (e.group_id.as_u128(), e.rank))
            .collect();
        assert_eq!(ranks, vec![(1, 1), (2, 2), (3, 2), (4, 4)]);
    }

    #[test]
    fn unscored_groups_trail_with_zero() {
        let scores = vec![scored(1, 100, 10, 0.0)];
        let board = compute_leaderboard(Uuid::nil(), &groups(&[1, 2]), &scores, at(60));
        assert_eq!(board[0].group_id, Uuid::from_u128(1));
        assert_eq!(board[0].tasks_completed, 1);
        assert_eq!(board[1].group_id, Uuid::from_u128(2));
        assert_eq!(board[1].tasks_completed, 0);
        assert_eq!(board[1].qualified_at, None);
        assert!(approx_eq!(f64, total(&board[1]), 0.0));
        assert_eq!(board[1].rank, 2);
    }

    #[test]
    fn several_judges_on_one_submission_keep_the_highest() {
        let scores = vec![scored(1, 100, 10, 6.0), scored(1, 100, 10, 8.0)];
        let board = compute_leaderboard(Uuid::nil(), &groups(&[1]), &scores, at(60));
        assert!(approx_eq!(f64, total(&board[0]), 8.0));
        assert_eq!(board[0].tasks_completed, 1);
    }

    #[test]
    fn scores_for_unknown_groups_are_ignored() {
        let scores = vec![scored(9, 100, 10, 6.0)];
        let board = compute_leaderboard(Uuid::nil(), &groups(&[1]), &scores, at(60));
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].tasks_completed, 0);
    }
}
