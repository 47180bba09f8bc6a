//! The tailoring pipeline: resolve the posting, tailor the resume, write the
//! markdown and PDF artifacts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::ai::AIProvider;
use crate::assistant::ResumeAssistant;
use crate::db::JobStore;
use crate::error::{Result, TailorError, cause};
use crate::fetcher::JobFetcher;
use crate::models::JobDescription;
use crate::render::{DocumentRenderer, PandocRenderer};

pub const MARKDOWN_DIR: &str = "Markdown";
pub const PDF_DIR: &str = "PDF";
pub const DEFAULT_CSS: &str = "styles.css";

#[derive(Debug, Clone)]
pub struct OptimizeRequest {
    pub company: String,
    pub jd_url: String,
    pub base_resume_path: PathBuf,
    pub output_dir: PathBuf,
    /// Raw posting text supplied by the caller; bypasses the cache lookup and fetch.
    pub jd_text: Option<String>,
    pub css_path: PathBuf,
}

impl OptimizeRequest {
    pub fn new(
        company: impl Into<String>,
        jd_url: impl Into<String>,
        base_resume_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            company: company.into(),
            jd_url: jd_url.into(),
            base_resume_path: base_resume_path.into(),
            output_dir: output_dir.into(),
            jd_text: None,
            css_path: PathBuf::from(DEFAULT_CSS),
        }
    }

    pub fn with_jd_text(mut self, jd_text: impl Into<String>) -> Self {
        self.jd_text = Some(jd_text.into());
        self
    }

    pub fn with_css(mut self, css_path: impl Into<PathBuf>) -> Self {
        self.css_path = css_path.into();
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationSummary {
    pub company: String,
    pub role: String,
    pub markdown_path: PathBuf,
    pub pdf_path: PathBuf,
    pub job_description: JobDescription,
}

pub struct ResumeOptimizer {
    assistant: Arc<ResumeAssistant>,
    fetcher: JobFetcher,
    store: Box<dyn JobStore>,
    renderer: Arc<dyn DocumentRenderer>,
}

impl ResumeOptimizer {
    /// Needs a language model client or an API key; neither is a
    /// configuration error. Performs no filesystem I/O.
    pub fn new(
        provider: Option<Arc<dyn AIProvider>>,
        api_key: Option<String>,
        store: Box<dyn JobStore>,
    ) -> Result<Self> {
        let assistant = Arc::new(ResumeAssistant::new(provider, api_key)?);
        let fetcher = JobFetcher::new(assistant.clone())?;
        Ok(Self {
            assistant,
            fetcher,
            store,
            renderer: Arc::new(PandocRenderer::default()),
        })
    }

    pub fn with_renderer(mut self, renderer: Box<dyn DocumentRenderer>) -> Self {
        self.renderer = Arc::from(renderer);
        self
    }

    pub fn assistant(&self) -> &ResumeAssistant {
        &self.assistant
    }

    pub async fn optimize(&self, request: &OptimizeRequest) -> Result<OptimizationSummary> {
        self.validate_paths(&request.base_resume_path, &request.output_dir)?;
        validate_company(&request.company)?;

        let resume_content = tokio::fs::read_to_string(&request.base_resume_path)
            .await
            .map_err(|source| TailorError::ReadResume {
                path: request.base_resume_path.clone(),
                source,
            })?;

        let job = self
            .resolve_job_description(&request.jd_url, request.jd_text.as_deref())
            .await?;

        let tailored = self
            .assistant
            .tailor_resume(&resume_content, &job)
            .await?;

        let (markdown_path, pdf_path) = self
            .generate_documents(
                &tailored,
                &request.company,
                &request.output_dir.join(MARKDOWN_DIR),
                &request.output_dir.join(PDF_DIR),
                Some(&request.css_path),
            )
            .await?;

        info!(
            company = %request.company,
            role = %job.role,
            "Resume tailored: {}",
            pdf_path.display()
        );

        Ok(OptimizationSummary {
            company: request.company.clone(),
            role: job.role.clone(),
            markdown_path,
            pdf_path,
            job_description: job,
        })
    }

    /// The base resume must exist and the output directory must already hold
    /// the markdown and PDF subdirectories.
    pub fn validate_paths(&self, base_resume_path: &Path, output_dir: &Path) -> Result<()> {
        if !base_resume_path.is_file() {
            return Err(TailorError::ResumeNotFound(base_resume_path.to_path_buf()));
        }

        let missing: Vec<String> = [MARKDOWN_DIR, PDF_DIR]
            .iter()
            .filter(|dir| !output_dir.join(dir).is_dir())
            .map(|dir| dir.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(TailorError::InvalidLayout { missing });
        }
        Ok(())
    }

    /// Caller-supplied text is always parsed and saved, replacing any cached
    /// record for the url. Otherwise (including blank text) the cache is
    /// consulted before fetching.
    pub async fn resolve_job_description(
        &self,
        jd_url: &str,
        jd_text: Option<&str>,
    ) -> Result<JobDescription> {
        self.lookup_or_fetch(jd_url, jd_text).await.map_err(|e| {
            error!(url = jd_url, "{}", e);
            TailorError::JobDescription(e.to_string())
        })
    }

    async fn lookup_or_fetch(&self, jd_url: &str, jd_text: Option<&str>) -> Result<JobDescription> {
        if let Some(text) = jd_text.filter(|text| !text.trim().is_empty()) {
            info!(url = jd_url, "Parsing supplied job description text");
            let job = self.assistant.parse_jd(text, jd_url).await?;
            self.save(&job)?;
            return Ok(job);
        }

        if let Some(job) = self.lookup(jd_url)? {
            info!(url = jd_url, "Using cached job description");
            return Ok(job);
        }

        let job = self.fetcher.fetch_and_parse(jd_url).await?;
        self.save(&job)?;
        Ok(job)
    }

    fn lookup(&self, url: &str) -> Result<Option<JobDescription>> {
        self.store
            .get_job_description(url)
            .map_err(|e| TailorError::Cache(cause(&e)))
    }

    fn save(&self, job: &JobDescription) -> Result<()> {
        self.store
            .save_job_description(job)
            .map_err(|e| TailorError::Cache(cause(&e)))
    }

    /// Writes `{company}.md` into `markdown_dir`, then renders
    /// `Resume_{company}.pdf` into `pdf_dir`. A rendering failure leaves the
    /// markdown file in place.
    pub async fn generate_documents(
        &self,
        markdown: &str,
        company: &str,
        markdown_dir: &Path,
        pdf_dir: &Path,
        css_path: Option<&Path>,
    ) -> Result<(PathBuf, PathBuf)> {
        let markdown_path = markdown_dir.join(format!("{}.md", company));
        tokio::fs::write(&markdown_path, markdown)
            .await
            .map_err(|source| TailorError::Write {
                path: markdown_path.clone(),
                source,
            })?;
        info!(path = %markdown_path.display(), "Wrote markdown resume");

        let css = css_path.filter(|path| path.is_file());
        if let (Some(requested), None) = (css_path, css) {
            warn!(css = %requested.display(), "Stylesheet not found, using default styling");
        }

        let pdf_path = pdf_dir.join(format!("Resume_{}.pdf", company));
        // Renderers shell out and block; keep them off the async workers.
        let renderer = Arc::clone(&self.renderer);
        let input = markdown.to_owned();
        let css = css.map(Path::to_path_buf);
        let output = pdf_path.clone();
        tokio::task::spawn_blocking(move || renderer.render_pdf(&input, css.as_deref(), &output))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|rendered| rendered)
            .map_err(|e| {
                error!(path = %pdf_path.display(), "PDF rendering failed: {:#}", e);
                TailorError::Pdf(cause(&e))
            })?;
        info!(path = %pdf_path.display(), "Rendered PDF resume");

        Ok((markdown_path, pdf_path))
    }
}

/// Explicit setup step: creates the markdown and PDF subdirectories.
pub fn prepare_output_dir(output_dir: &Path) -> Result<()> {
    for dir in [MARKDOWN_DIR, PDF_DIR] {
        let path = output_dir.join(dir);
        std::fs::create_dir_all(&path).map_err(|source| TailorError::Write { path, source })?;
    }
    Ok(())
}

fn validate_company(company: &str) -> Result<()> {
    let trimmed = company.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || company.contains(['/', '\\'])
    {
        return Err(TailorError::InvalidCompany(company.to_string()));
    }
    Ok(())
}
