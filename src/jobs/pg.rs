use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::Value;
use tokio::task;
use uuid::Uuid;

use super::{
    JobQueue, JobQueueError, JobQueueResult, STATUS_FAILED, STATUS_PROCESSING, STATUS_QUEUED,
    STATUS_SUCCEEDED,
};
use crate::db::PgPool;
use crate::models::{Job, NewJob};
use crate::schema::jobs;

pub fn enqueue_job(
    conn: &mut PgConnection,
    job_type: &str,
    payload: Value,
    run_after: Option<NaiveDateTime>,
) -> JobQueueResult<Job> {
    let new_job = NewJob {
        id: Uuid::new_v4(),
        job_type: job_type.to_string(),
        payload,
        status: STATUS_QUEUED.to_string(),
        run_after: run_after.unwrap_or_else(|| Utc::now().naive_utc()),
    };

    let job = diesel::insert_into(jobs::table)
        .values(&new_job)
        .get_result(conn)?;
    Ok(job)
}

pub fn reserve_job(
    conn: &mut PgConnection,
    job_types: &[String],
    reclaim_after: Duration,
) -> JobQueueResult<Option<Job>> {
    let now = Utc::now().naive_utc();
    let abandoned_before =
        now - ChronoDuration::from_std(reclaim_after).unwrap_or_else(|_| ChronoDuration::hours(1));

    conn.transaction(|conn| {
        let job_opt = jobs::table
            .filter(
                jobs::status
                    .eq(STATUS_QUEUED)
                    .and(jobs::run_after.le(now))
                    .or(jobs::status
                        .eq(STATUS_PROCESSING)
                        .and(jobs::updated_at.lt(abandoned_before))),
            )
            .filter(jobs::job_type.eq_any(job_types))
            .order(jobs::run_after.asc())
            .for_update()
            .skip_locked()
            .first::<Job>(conn)
            .optional()?;

        if let Some(job) = job_opt {
            let refreshed = diesel::update(jobs::table.find(job.id))
                .set((
                    jobs::status.eq(STATUS_PROCESSING),
                    jobs::attempts.eq(job.attempts + 1),
                    jobs::updated_at.eq(now),
                ))
                .get_result::<Job>(conn)?;
            Ok::<Option<Job>, diesel::result::Error>(Some(refreshed))
        } else {
            Ok::<Option<Job>, diesel::result::Error>(None)
        }
    })
    .map_err(JobQueueError::from)
}

pub fn mark_job_succeeded(conn: &mut PgConnection, job_id: Uuid) -> JobQueueResult<()> {
    diesel::update(jobs::table.find(job_id))
        .set((
            jobs::status.eq(STATUS_SUCCEEDED),
            jobs::last_error.eq::<Option<String>>(None),
            jobs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn retry_job_after(
    conn: &mut PgConnection,
    job_id: Uuid,
    delay: Duration,
    error_message: &str,
) -> JobQueueResult<()> {
    let next_run = Utc::now()
        + ChronoDuration::from_std(delay).unwrap_or_else(|_| ChronoDuration::seconds(30));

    diesel::update(jobs::table.find(job_id))
        .set((
            jobs::status.eq(STATUS_QUEUED),
            jobs::run_after.eq(next_run.naive_utc()),
            jobs::last_error.eq(Some(error_message.to_string())),
            jobs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

pub fn mark_job_failed(
    conn: &mut PgConnection,
    job_id: Uuid,
    error_message: &str,
) -> JobQueueResult<()> {
    diesel::update(jobs::table.find(job_id))
        .set((
            jobs::status.eq(STATUS_FAILED),
            jobs::last_error.eq(Some(error_message.to_string())),
            jobs::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(conn)?;
    Ok(())
}

#[derive(Clone)]
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, f: F) -> JobQueueResult<T>
    where
        F: FnOnce(&mut PgConnection) -> JobQueueResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| JobQueueError::Pool(err.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|err| JobQueueError::Task(err.to_string()))?
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(
        &self,
        job_type: &str,
        payload: Value,
        run_after: Option<NaiveDateTime>,
    ) -> JobQueueResult<Job> {
        let job_type = job_type.to_string();
        self.run(move |conn| enqueue_job(conn, &job_type, payload, run_after))
            .await
    }

    async fn reserve(
        &self,
        job_types: &[&'static str],
        reclaim_after: Duration,
    ) -> JobQueueResult<Option<Job>> {
        let job_types: Vec<String> = job_types.iter().map(|ty| ty.to_string()).collect();
        self.run(move |conn| reserve_job(conn, &job_types, reclaim_after))
            .await
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> JobQueueResult<()> {
        self.run(move |conn| mark_job_succeeded(conn, job_id)).await
    }

    async fn retry_after(
        &self,
        job_id: Uuid,
        delay: Duration,
        error_message: &str,
    ) -> JobQueueResult<()> {
        let error_message = error_message.to_string();
        self.run(move |conn| retry_job_after(conn, job_id, delay, &error_message))
            .await
    }

    async fn mark_failed(&self, job_id: Uuid, error_message: &str) -> JobQueueResult<()> {
        let error_message = error_message.to_string();
        self.run(move |conn| mark_job_failed(conn, job_id, &error_message))
            .await
    }
}
