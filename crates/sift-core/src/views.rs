//! Read-only projections of the task list. Each call recomputes from the
//! slice it is given; nothing here caches.

use chrono::{DateTime, Duration, Utc};

use crate::task::{Category, Filter, Task};

pub const REVIEW_AGE_DAYS: i64 = 7;

pub fn default_review_age() -> Duration {
    Duration::days(REVIEW_AGE_DAYS)
}

pub fn filtered_tasks(tasks: &[Task], filter: Filter) -> Vec<Task> {
    match filter {
        Filter::All => tasks.to_vec(),
        Filter::Category(_) => tasks.iter().filter(|t| filter.matches(t)).cloned().collect(),
    }
}

/// `None` when `now - age` falls outside the representable range; nothing
/// is old enough then.
pub fn review_cutoff(now: DateTime<Utc>, age: Duration) -> Option<DateTime<Utc>> {
    now.checked_sub_signed(age)
}

pub fn is_stale(task: &Task, cutoff: Option<DateTime<Utc>>) -> bool {
    task.category == Category::Unclassified && cutoff.is_some_and(|c| task.created_at < c)
}

/// Unclassified tasks captured strictly before `now - age`.
pub fn weekly_review_tasks(tasks: &[Task], now: DateTime<Utc>, age: Duration) -> Vec<Task> {
    let cutoff = review_cutoff(now, age);
    tasks.iter().filter(|t| is_stale(t, cutoff)).cloned().collect()
}

pub fn task_count(tasks: &[Task]) -> usize {
    tasks.len()
}

pub fn category_counts(tasks: &[Task]) -> Vec<(Category, usize)> {
    Category::ALL
        .into_iter()
        .map(|category| {
            let n = tasks.iter().filter(|t| t.category == category).count();
            (category, n)
        })
        .collect()
}

/// Everything a render pass reads, computed against one `now`.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub filter: Filter,
    pub filtered: Vec<Task>,
    pub weekly_review: Vec<Task>,
    pub count: usize,
}

impl ViewSnapshot {
    pub fn compute(tasks: &[Task], filter: Filter, now: DateTime<Utc>, review_age: Duration) -> Self {
        Self {
            filter,
            filtered: filtered_tasks(tasks, filter),
            weekly_review: weekly_review_tasks(tasks, now, review_age),
            count: task_count(tasks),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{
        category_counts, default_review_age, filtered_tasks, review_cutoff, weekly_review_tasks,
    };
    use crate::task::{Category, Filter, Task};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0)
            .single()
            .expect("valid now")
    }

    fn task(id: &str, category: Category, age: Duration) -> Task {
        let mut t = Task::new_unclassified(format!("task {id}"), now() - age);
        t.id = id.to_string();
        t.category = category;
        t
    }

    fn sample() -> Vec<Task> {
        vec![
            task("a", Category::Ideas, Duration::days(1)),
            task("b", Category::Actions, Duration::days(2)),
            task("c", Category::Ideas, Duration::days(3)),
            task("d", Category::Unclassified, Duration::days(9)),
        ]
    }

    #[test]
    fn all_filter_is_identity() {
        let tasks = sample();
        assert_eq!(filtered_tasks(&tasks, Filter::All), tasks);
    }

    #[test]
    fn category_filter_keeps_order() {
        let tasks = sample();
        let ideas: Vec<String> = filtered_tasks(&tasks, Filter::Category(Category::Ideas))
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ideas, vec!["a".to_string(), "c".to_string()]);
        assert!(filtered_tasks(&tasks, Filter::Category(Category::Someday)).is_empty());
    }

    #[test]
    fn staleness_boundaries() {
        let old_inbox = task("old", Category::Unclassified, Duration::days(8));
        let fresh_inbox = task("fresh", Category::Unclassified, Duration::days(6));
        let old_idea = task("idea", Category::Ideas, Duration::days(8));
        let exactly_seven = task("edge", Category::Unclassified, Duration::days(7));
        let tasks = vec![old_inbox, fresh_inbox, old_idea, exactly_seven];

        let ids: Vec<String> = weekly_review_tasks(&tasks, now(), default_review_age())
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["old".to_string()]);
    }

    #[test]
    fn staleness_follows_the_clock() {
        let tasks = vec![task("x", Category::Unclassified, Duration::days(6))];
        assert!(weekly_review_tasks(&tasks, now(), default_review_age()).is_empty());
        let later = now() + Duration::days(2);
        assert_eq!(weekly_review_tasks(&tasks, later, default_review_age()).len(), 1);
    }

    #[test]
    fn age_beyond_calendar_range_marks_nothing_stale() {
        let tasks = vec![task("x", Category::Unclassified, Duration::days(400))];
        let age = Duration::days(200_000_000);
        assert!(review_cutoff(now(), age).is_none());
        assert!(weekly_review_tasks(&tasks, now(), age).is_empty());
    }

    #[test]
    fn counts_per_category() {
        let counts = category_counts(&sample());
        assert_eq!(counts[0], (Category::Ideas, 2));
        assert_eq!(counts[1], (Category::Actions, 1));
        assert_eq!(counts[4], (Category::Unclassified, 1));
    }
}
