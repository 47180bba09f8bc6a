//! Shared fixtures and in-process doubles for the unit tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use crate::ai::AIProvider;
use crate::db::{Database, JobStore};
use crate::models::{JobDescription, JobRequirements};
use crate::render::DocumentRenderer;

pub const SAMPLE_RESUME: &str = "# John Doe
**Software Engineer**
San Francisco, CA | 123-456-7890 | john@email.com | github.com/john | linkedin.com/in/john

## Summary
Software Engineer with 5 years experience...

## Skills
Python, JavaScript, SQL

## Experience
**Software Engineer**
Previous Company | 2020-Present
- Built scalable systems
- Wrote clean code
";

pub const JD_REPLY: &str = r#"```json
{
  "role": "Software Engineer",
  "company": "Test Company",
  "location": "Remote",
  "responsibilities": ["Build scalable systems", "Write clean code"],
  "requirements": {
    "skills": ["Python", "SQL"],
    "experience": ["3+ years software development"],
    "education": ["Bachelor's in CS or related"]
  },
  "salary": "$120k-150k",
  "benefits": ["Health insurance", "401k"],
  "other_information": {"culture": "Fast-paced startup"}
}
```"#;

pub const RESUME_REPLY: &str = r#"{
  "name": "John Doe",
  "title": "Software Engineer",
  "location": "San Francisco, CA",
  "phone": "1234567890",
  "email": "john@email.com",
  "github": "github.com/john",
  "linkedin": "linkedin.com/in/john",
  "summary": "Software Engineer with 5 years building Python and SQL systems.",
  "education": [],
  "skills": [{"category": "Programming", "skills": ["Python", "SQL"]}],
  "experience": [{
    "title": "Software Engineer",
    "company": "Previous Company",
    "location": "SF",
    "dates": "2020-Present",
    "bullets": ["Built scalable systems in Python"]
  }]
}"#;

pub fn sample_job_description() -> JobDescription {
    JobDescription {
        url: "https://example.com/job".to_string(),
        role: "Software Engineer".to_string(),
        company: "Test Company".to_string(),
        location: "Remote".to_string(),
        responsibilities: vec![
            "Build scalable systems".to_string(),
            "Write clean code".to_string(),
        ],
        requirements: JobRequirements {
            skills: vec!["Python".to_string(), "SQL".to_string()],
            experience: vec!["3+ years software development".to_string()],
            education: vec!["Bachelor's in CS or related".to_string()],
        },
        salary: Some("$120k-150k".to_string()),
        benefits: vec!["Health insurance".to_string(), "401k".to_string()],
        other_information: BTreeMap::from([(
            "culture".to_string(),
            "Fast-paced startup".to_string(),
        )]),
    }
}

// --- Language model double ---

/// Answers extraction prompts with `jd_reply` and everything else with
/// `resume_reply`. `Err` replies simulate a failed model call.
pub struct ScriptedProvider {
    jd_reply: Result<String, String>,
    resume_reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(jd_reply: Result<&str, &str>, resume_reply: Result<&str, &str>) -> Self {
        Self {
            jd_reply: jd_reply.map(str::to_string).map_err(str::to_string),
            resume_reply: resume_reply.map(str::to_string).map_err(str::to_string),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AIProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = if prompt.starts_with("Extract the key information from this job posting") {
            &self.jd_reply
        } else {
            &self.resume_reply
        };
        reply.clone().map_err(|msg| anyhow!(msg))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

// --- Cache double ---

/// Real in-memory cache that also counts lookups and saves.
pub struct RecordingStore {
    inner: Database,
    lookups: AtomicUsize,
    saves: AtomicUsize,
}

impl RecordingStore {
    pub fn new(inner: Database) -> Self {
        Self {
            inner,
            lookups: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl JobStore for RecordingStore {
    fn get_job_description(&self, url: &str) -> Result<Option<JobDescription>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_job_description(url)
    }

    fn save_job_description(&self, job: &JobDescription) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_job_description(job)
    }
}

// --- Renderer double ---

#[derive(Default)]
struct RenderLog {
    renders: usize,
    last_css: Option<PathBuf>,
}

/// Writes a placeholder file instead of invoking a real PDF engine.
#[derive(Clone)]
pub struct FakeRenderer {
    failure: Option<String>,
    log: Arc<Mutex<RenderLog>>,
}

impl FakeRenderer {
    pub fn succeeding() -> Self {
        Self {
            failure: None,
            log: Arc::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            log: Arc::default(),
        }
    }

    pub fn renders(&self) -> usize {
        self.log.lock().unwrap().renders
    }

    pub fn last_css(&self) -> Option<PathBuf> {
        self.log.lock().unwrap().last_css.clone()
    }
}

impl DocumentRenderer for FakeRenderer {
    fn render_pdf(&self, markdown: &str, css: Option<&Path>, output: &Path) -> Result<()> {
        {
            let mut log = self.log.lock().unwrap();
            log.renders += 1;
            log.last_css = css.map(Path::to_path_buf);
        }
        if let Some(message) = &self.failure {
            return Err(anyhow!(message.clone()));
        }
        std::fs::write(output, format!("%PDF-1.4\n{}", markdown))?;
        Ok(())
    }
}
