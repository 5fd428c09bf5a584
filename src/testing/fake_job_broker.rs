// src/testing/fake_job_broker.rs
// In-memory JobBroker double mirroring SqliteJobBroker's dedup/priority/
// dead-letter semantics closely enough to unit-test the Gateway Ingestor
// and Indexing Worker without a database.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::jb::{DeadLetterJob, Job, JbError, JbResult, JobBroker, JobKind, JobStatus, Priority};

struct Inner {
    jobs: Vec<Job>,
    dead_letters: Vec<DeadLetterJob>,
    next_id: i64,
    max_attempts: i32,
}

pub struct FakeJobBroker {
    inner: Mutex<Inner>,
}

impl FakeJobBroker {
    pub fn new(max_attempts: i32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                jobs: Vec::new(),
                dead_letters: Vec::new(),
                next_id: 1,
                max_attempts,
            }),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().jobs.iter().filter(|j| j.status == JobStatus::Pending).count()
    }
}

#[async_trait]
impl JobBroker for FakeJobBroker {
    async fn enqueue(
        &self,
        kind: JobKind,
        priority: Priority,
        dedup_key: Option<String>,
        _delay_secs: Option<i64>,
    ) -> JbResult<i64> {
        let mut inner = self.inner.lock();

        if let Some(key) = &dedup_key {
            if let Some(existing) = inner
                .jobs
                .iter()
                .find(|j| j.dedup_key.as_deref() == Some(key.as_str()) && matches!(j.status, JobStatus::Pending | JobStatus::Reserved))
            {
                return Ok(existing.id);
            }
        }

        let id = inner.next_id;
        inner.next_id += 1;
        let max_attempts = inner.max_attempts;
        let now = Utc::now();

        inner.jobs.push(Job {
            id,
            guild_id: kind.guild_id(),
            kind,
            priority,
            dedup_key,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts,
            available_at: now,
            reserved_until: None,
            last_error: None,
            created_at: now,
        });
        Ok(id)
    }

    async fn reserve(&self) -> JbResult<Option<Job>> {
        let mut inner = self.inner.lock();
        let now = Utc::now();

        let idx = inner
            .jobs
            .iter()
            .enumerate()
            .filter(|(_, j)| j.status == JobStatus::Pending && j.available_at <= now)
            .min_by_key(|(_, j)| (j.priority.rank(), j.created_at))
            .map(|(i, _)| i);

        let Some(idx) = idx else { return Ok(None) };
        let job = &mut inner.jobs[idx];
        job.status = JobStatus::Reserved;
        job.attempts += 1;
        job.reserved_until = Some(now + chrono::Duration::seconds(300));
        Ok(Some(job.clone()))
    }

    async fn ack(&self, job_id: i64) -> JbResult<()> {
        let mut inner = self.inner.lock();
        if let Some(job) = inner.jobs.iter_mut().find(|j| j.id == job_id) {
            job.status = JobStatus::Done;
        }
        Ok(())
    }

    async fn nack(&self, job_id: i64, error: &str) -> JbResult<()> {
        let mut inner = self.inner.lock();
        let dead_letter = {
            let job = inner
                .jobs
                .iter_mut()
                .find(|j| j.id == job_id)
                .ok_or(JbError::NotFound(job_id))?;
            job.last_error = Some(error.to_string());
            if job.attempts >= job.max_attempts {
                job.status = JobStatus::Dead;
                Some(DeadLetterJob {
                    id: job.id,
                    original_job_id: job.id,
                    kind: job.kind.clone(),
                    guild_id: job.guild_id,
                    attempts: job.attempts,
                    last_error: error.to_string(),
                    failed_at: Utc::now(),
                })
            } else {
                job.status = JobStatus::Pending;
                job.reserved_until = None;
                None
            }
        };
        if let Some(dl) = dead_letter {
            inner.dead_letters.push(dl);
        }
        Ok(())
    }

    async fn sweep_expired_leases(&self) -> JbResult<u64> {
        let mut inner = self.inner.lock();
        let now = Utc::now();
        let mut swept = 0;
        for job in inner.jobs.iter_mut() {
            if job.status == JobStatus::Reserved && job.reserved_until.map(|t| t < now).unwrap_or(false) {
                job.status = JobStatus::Pending;
                job.reserved_until = None;
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn queue_depth(&self, priority: Option<Priority>) -> JbResult<i64> {
        let inner = self.inner.lock();
        Ok(inner
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .filter(|j| priority.map(|p| p == j.priority).unwrap_or(true))
            .count() as i64)
    }

    async fn list_dead_letters(&self, guild_id: i64, limit: i64) -> JbResult<Vec<DeadLetterJob>> {
        let inner = self.inner.lock();
        Ok(inner
            .dead_letters
            .iter()
            .filter(|d| d.guild_id == guild_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
