use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::models::{CachedPosting, JobDescription};

/// Lookup/upsert of parsed postings keyed by source url.
pub trait JobStore: Send + Sync {
    fn get_job_description(&self, url: &str) -> Result<Option<JobDescription>>;
    fn save_job_description(&self, job: &JobDescription) -> Result<()>;
}

impl<T: JobStore + ?Sized> JobStore for std::sync::Arc<T> {
    fn get_job_description(&self, url: &str) -> Result<Option<JobDescription>> {
        (**self).get_job_description(url)
    }

    fn save_job_description(&self, job: &JobDescription) -> Result<()> {
        (**self).save_job_description(job)
    }
}

pub struct Database {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl Database {
    pub fn open() -> Result<Self> {
        Self::open_at(Self::default_path())
    }

    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        let db = Self {
            conn: Mutex::new(conn),
            path,
        };
        db.init()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn default_path() -> PathBuf {
        // Use XDG data directory or fallback
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "tailor") {
            proj_dirs.data_dir().join("tailor.db")
        } else {
            PathBuf::from("tailor.db")
        }
    }

    pub fn init(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS job_descriptions (
                url TEXT PRIMARY KEY,
                role TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT NOT NULL,
                responsibilities TEXT NOT NULL,
                requirements TEXT NOT NULL,
                salary TEXT,
                benefits TEXT NOT NULL,
                other_information TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Database connection mutex poisoned"))
    }

    pub fn list_job_descriptions(&self) -> Result<Vec<CachedPosting>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT url, role, company, updated_at FROM job_descriptions
             ORDER BY updated_at DESC, url",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CachedPosting {
                url: row.get(0)?,
                role: row.get(1)?,
                company: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list job descriptions")
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<StoredJob> {
        Ok(StoredJob {
            url: row.get(0)?,
            role: row.get(1)?,
            company: row.get(2)?,
            location: row.get(3)?,
            responsibilities: row.get(4)?,
            requirements: row.get(5)?,
            salary: row.get(6)?,
            benefits: row.get(7)?,
            other_information: row.get(8)?,
        })
    }
}

impl JobStore for Database {
    fn get_job_description(&self, url: &str) -> Result<Option<JobDescription>> {
        let stored = self
            .conn()?
            .query_row(
                "SELECT url, role, company, location, responsibilities, requirements,
                        salary, benefits, other_information
                 FROM job_descriptions WHERE url = ?1",
                [url],
                Self::row_to_job,
            )
            .optional()?;

        debug!(url, hit = stored.is_some(), "Posting cache lookup");
        stored.map(StoredJob::into_job).transpose()
    }

    fn save_job_description(&self, job: &JobDescription) -> Result<()> {
        let updated_at = chrono::Utc::now().to_rfc3339();
        self.conn()?.execute(
            "INSERT INTO job_descriptions (url, role, company, location, responsibilities,
                                           requirements, salary, benefits, other_information,
                                           updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(url) DO UPDATE SET
                role = excluded.role,
                company = excluded.company,
                location = excluded.location,
                responsibilities = excluded.responsibilities,
                requirements = excluded.requirements,
                salary = excluded.salary,
                benefits = excluded.benefits,
                other_information = excluded.other_information,
                updated_at = excluded.updated_at",
            params![
                job.url,
                job.role,
                job.company,
                job.location,
                serde_json::to_string(&job.responsibilities)?,
                serde_json::to_string(&job.requirements)?,
                job.salary,
                serde_json::to_string(&job.benefits)?,
                serde_json::to_string(&job.other_information)?,
                updated_at,
            ],
        )?;
        debug!(url = %job.url, "Saved posting to cache");
        Ok(())
    }
}

// Nested fields live in the table as JSON text.
struct StoredJob {
    url: String,
    role: String,
    company: String,
    location: String,
    responsibilities: String,
    requirements: String,
    salary: Option<String>,
    benefits: String,
    other_information: String,
}

impl StoredJob {
    fn into_job(self) -> Result<JobDescription> {
        let context = |field: &str| format!("Corrupt {} column for {}", field, self.url);
        Ok(JobDescription {
            responsibilities: serde_json::from_str(&self.responsibilities)
                .with_context(|| context("responsibilities"))?,
            requirements: serde_json::from_str(&self.requirements)
                .with_context(|| context("requirements"))?,
            benefits: serde_json::from_str(&self.benefits).with_context(|| context("benefits"))?,
            other_information: serde_json::from_str(&self.other_information)
                .with_context(|| context("other_information"))?,
            url: self.url,
            role: self.role,
            company: self.company,
            location: self.location,
            salary: self.salary,
        })
    }
}
