//! Workshop task rules: which tasks a group can see, who belongs to a group
//! and what a judge may award.

use crate::errors::{AppError, FieldError};
use crate::model::workshop::{VisibleTask, WorkshopGroup, WorkshopTask};
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Duration, Utc};

/// When the task's timer runs out, if it has one and has been started.
pub fn task_deadline(task: &WorkshopTask) -> Option<DateTime<Utc>> {
    let minutes = task.timer_minutes?;
    let activated_at = task.activated_at?;
    Some(activated_at + Duration::minutes(i64::from(minutes)))
}

/// An active task is visible until its deadline; without one it stays visible.
pub fn is_visible(task: &WorkshopTask, now: DateTime<Utc>) -> bool {
    if !task.is_active {
        return false;
    }
    match task_deadline(task) {
        Some(deadline) => now < deadline,
        None => true,
    }
}

pub fn visible_tasks(tasks: Vec<WorkshopTask>, now: DateTime<Utc>) -> Vec<VisibleTask> {
    let mut visible: Vec<VisibleTask> = tasks
        .into_iter()
        .filter(|task| is_visible(task, now))
        .map(|task| VisibleTask {
            deadline: task_deadline(&task),
            id: task.id,
            position: task.position,
            title: task.title,
            description: task.description,
            points: task.points,
        })
        .collect();
    visible.sort_by_key(|task| task.position);
    visible
}

pub fn is_member(group: &WorkshopGroup, user_id: uuid::Uuid) -> bool {
    group.leader_id == user_id || group.member_ids.contains(&user_id)
}

/// A score must lie within `0..=points` of the scored task.
pub fn check_score(score: &BigDecimal, points: i32) -> Result<(), AppError> {
    if *score < BigDecimal::zero() || *score > BigDecimal::from(points) {
        return Err(AppError::Validation(vec![FieldError::new(
            "score",
            format!("Score must be between 0 and {points}"),
        )]));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::FromPrimitive;
    use uuid::Uuid;

    fn task(active: bool, timer: Option<i32>, activated_at: Option<DateTime<Utc>>) -> WorkshopTask {
        WorkshopTask {
            id: Uuid::new_v4(),
            workshop_id: Uuid::from_u128(1),
            position: 1,
            title: "Warm-up".to_string(),
            description: "Reverse a list".to_string(),
            points: 10,
            timer_minutes: timer,
            is_active: active,
            activated_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn inactive_tasks_are_hidden() {
        assert!(!is_visible(&task(false, None, None), Utc::now()));
    }

    #[test]
    fn timer_closes_the_task() {
        let started = Utc::now() - Duration::minutes(30);
        let now = Utc::now();
        assert!(is_visible(&task(true, Some(45), Some(started)), now));
        assert!(!is_visible(&task(true, Some(30), Some(started)), now));
        assert!(!is_visible(&task(true, Some(10), Some(started)), now));
    }

    #[test]
    fn untimed_or_unstarted_tasks_have_no_deadline() {
        let now = Utc::now();
        let untimed = task(true, None, Some(now - Duration::days(2)));
        let unstarted = task(true, Some(5), None);
        assert_eq!(task_deadline(&untimed), None);
        assert_eq!(task_deadline(&unstarted), None);
        assert!(is_visible(&untimed, now));
        assert!(is_visible(&unstarted, now));
    }

    #[test]
    fn visible_tasks_are_ordered_by_position() {
        let now = Utc::now();
        let mut second = task(true, None, None);
        second.position = 2;
        let mut first = task(true, Some(60), Some(now));
        first.position = 1;
        let hidden = task(false, None, None);
        let visible = visible_tasks(vec![second, hidden, first], now);
        assert_eq!(
            visible.iter().map(|t| t.position).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(visible[0].deadline, Some(now + Duration::minutes(60)));
    }

    #[test]
    fn scores_are_bounded_by_task_points() {
        assert!(check_score(&BigDecimal::from(0), 10).is_ok());
        assert!(check_score(&BigDecimal::from_f64(9.5).unwrap(), 10).is_ok());
        assert!(check_score(&BigDecimal::from(10), 10).is_ok());
        assert!(matches!(
            check_score(&BigDecimal::from(11), 10),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            check_score(&BigDecimal::from(-1), 10),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn leader_and_members_belong_to_the_group() {
        let leader = Uuid::from_u128(1);
        let member = Uuid::from_u128(2);
        let group = WorkshopGroup {
            id: Uuid::from_u128(10),
            workshop_id: Uuid::from_u128(20),
            name: "Team Rocket".to_string(),
            leader_id: leader,
            member_ids: vec![member],
            created_at: Utc::now(),
        };
        assert!(is_member(&group, leader));
        assert!(is_member(&group, member));
        assert!(!is_member(&group, Uuid::from_u128(3)));
    }
}
