//! Question selector: multi-tier priority selection.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use lp_domain::CoreError;

use crate::ports::{ContentRepository, RecordRepository};

pub struct QuestionSelector {
    content_repo: Arc<dyn ContentRepository>,
    record_repo: Arc<dyn RecordRepository>,
}

impl QuestionSelector {
    pub fn new(content_repo: Arc<dyn ContentRepository>, record_repo: Arc<dyn RecordRepository>) -> Self {
        Self {
            content_repo,
            record_repo,
        }
    }

    /// Selects up to `n` question ids for `user_id` in `course_id`.
    ///
    /// Tier ordering:
    /// 1. Due reviews.
    /// 2. Unseen-in-round (no record, or `completed_in_current_round = false`).
    /// 3. If `allow_new_round` and 1-2 are empty: roll the round over and
    /// re-run tier 2.
    #[tracing::instrument(skip(self), fields(user_id, course_id = %course_id, n, allow_new_round))]
    pub async fn select(
        &self,
        user_id: &str,
        course_id: uuid::Uuid,
        n: usize,
        allow_new_round: bool,
    ) -> Result<Vec<uuid::Uuid>, CoreError> {
        let now = Utc::now();

        let due = self
            .record_repo
            .due_reviews(user_id, course_id, now)
            .await
            .map_err(CoreError::from)?;
        let mut selected: Vec<uuid::Uuid> = due.into_iter().map(|r| r.question_id).collect();
        selected.truncate(n);
        if selected.len() >= n {
            return Ok(selected);
        }

        let remaining = n - selected.len();
        let tier2 = self.unseen_in_round(user_id, course_id, remaining).await?;
        selected.extend(tier2);

        if selected.len() < n && allow_new_round && selected.is_empty() {
            self.record_repo
                .reset_round(user_id, course_id)
                .await
                .map_err(CoreError::from)?;

            let mut progress = self
                .record_repo
                .get_progress(user_id, course_id)
                .await
                .map_err(CoreError::from)?
                .unwrap_or_else(|| lp_domain::UserCourseProgress {
                    user_id: user_id.to_string(),
                    course_id,
                    ..Default::default()
            });
            progress.current_round += 1;
            progress.total_rounds_completed += 1;
            self.record_repo
                .upsert_progress(&progress)
                .await
                .map_err(CoreError::from)?;

            let rolled_over = self.unseen_in_round(user_id, course_id, n).await?;
            selected.extend(rolled_over);
        }

        selected.truncate(n);
        Ok(selected)
    }

    /// Tier 2: questions in the course with no record, or with
    /// `completed_in_current_round = false`; tie-broken by question id.
    async fn unseen_in_round(
        &self,
        user_id: &str,
        course_id: uuid::Uuid,
        limit: usize,
    ) -> Result<Vec<uuid::Uuid>, CoreError> {
        let mut questions = self
            .content_repo
            .list_questions_for_course(course_id)
            .await
            .map_err(CoreError::from)?;
        questions.sort_by_key(|q| q.id);

        let records = self
            .record_repo
            .records_for_course(user_id, course_id)
            .await
            .map_err(CoreError::from)?;
        let completed: HashSet<uuid::Uuid> = records
            .iter()
            .filter(|r| r.completed_in_current_round)
            .map(|r| r.question_id)
            .collect();

        Ok(questions
            .into_iter()
            .filter(|q| !completed.contains(&q.id))
            .map(|q| q.id)
            .take(limit)
            .collect())
    }
}
