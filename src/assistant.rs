//! Resume assistant: the two prompt/parse round-trips against the language model.
//!
//! Every model reply goes through [`parse_structured`] before it is trusted:
//! the JSON payload is pulled out of the reply, deserialized into the target
//! record and validated.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use anyhow::{Context, anyhow};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::ai::{AIProvider, DEFAULT_MODEL, OpenAIProvider};
use crate::error::{Result, TailorError, cause};
use crate::models::{JobDescription, JobRequirements, TailoredResume};

const PARSE_MAX_TOKENS: u32 = 4096;
const TAILOR_MAX_TOKENS: u32 = 8192;

const JD_FORMAT_INSTRUCTIONS: &str = r#"Return ONLY a JSON object with exactly these keys:
{
  "role": "job title",
  "company": "hiring company",
  "location": "work location, or \"Remote\"",
  "responsibilities": ["..."],
  "requirements": {
    "skills": ["..."],
    "experience": ["..."],
    "education": ["..."]
  },
  "salary": "salary range as written, or null if not stated",
  "benefits": ["..."],
  "other_information": {"key": "value"}
}
Use empty lists when a section is not mentioned. Do not add commentary."#;

const JD_PROMPT_TEMPLATE: &str = "Extract the key information from this job posting.\n\
Identify the role, company, location, responsibilities, requirements \
(skills, experience, education), salary, benefits, and any other relevant \
information as key/value pairs.\n\n\
{format_instructions}\n\n\
Job posting:\n{text}";

const RESUME_FORMAT_INSTRUCTIONS: &str = r#"Return ONLY a JSON object with exactly these keys:
{
  "name": "", "title": "", "location": "", "phone": "", "email": "",
  "github": "", "linkedin": "", "summary": "",
  "education": [{"degree": "", "institution": "", "dates": "", "location": null}],
  "skills": [{"category": "", "skills": ["..."]}],
  "experience": [{"title": "", "company": "", "location": "", "dates": "",
                  "bullets": ["..."], "company_description": null}],
  "publications": [{"journal": "", "title": "", "date": ""}],
  "open_source": [{"name": "", "description": ""}]
}
Leave "publications" and "open_source" as empty lists when the resume has none. Do not add commentary."#;

const TAILOR_PROMPT_TEMPLATE: &str = "You are an expert resume writer. Rewrite the resume below \
so it emphasizes the qualifications that match the job description.\n\n\
IMPORTANT RULES:\n\
- Stay 100% truthful: only use facts present in the resume\n\
- Reorder skills and experience bullets so the most relevant come first\n\
- Mirror the job description's keywords where the resume supports them\n\
- Rewrite the summary for this specific role\n\n\
{format_instructions}\n\n\
Job description:\n{job_description}\n\n\
Resume:\n{resume}";

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("valid regex"));

/// Posting fields as returned by the model. The url never comes from the model.
#[derive(Debug, Deserialize)]
struct ExtractedPosting {
    role: String,
    company: String,
    location: String,
    responsibilities: Vec<String>,
    requirements: JobRequirements,
    #[serde(default)]
    salary: Option<String>,
    benefits: Vec<String>,
    #[serde(default)]
    other_information: BTreeMap<String, String>,
}

impl ExtractedPosting {
    fn into_job_description(self, url: &str) -> JobDescription {
        JobDescription {
            url: url.to_string(),
            role: self.role,
            company: self.company,
            location: self.location,
            responsibilities: self.responsibilities,
            requirements: self.requirements,
            salary: self.salary.filter(|s| !s.trim().is_empty()),
            benefits: self.benefits,
            other_information: self.other_information,
        }
    }
}

pub struct ResumeAssistant {
    provider: Arc<dyn AIProvider>,
}

impl ResumeAssistant {
    /// Builds an assistant from a ready provider or an API key for the default
    /// OpenAI model. A provider takes precedence when both are supplied.
    pub fn new(provider: Option<Arc<dyn AIProvider>>, api_key: Option<String>) -> Result<Self> {
        match (provider, api_key) {
            (Some(provider), api_key) => {
                if api_key.is_some() {
                    warn!("Both a provider and an API key were supplied; using the provider");
                }
                Ok(Self { provider })
            }
            (None, Some(key)) if !key.trim().is_empty() => {
                let provider = OpenAIProvider::new(key, DEFAULT_MODEL.to_string())
                    .map_err(|e| TailorError::Config(cause(&e)))?;
                Ok(Self {
                    provider: Arc::new(provider),
                })
            }
            _ => Err(TailorError::Config(
                "Either a language model client or an API key must be provided".to_string(),
            )),
        }
    }

    pub fn with_provider(provider: Arc<dyn AIProvider>) -> Self {
        Self { provider }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub async fn parse_jd(&self, raw_text: &str, url: &str) -> Result<JobDescription> {
        info!(url, model = self.model_name(), "Extracting job description");
        let prompt = fill_template(
            JD_PROMPT_TEMPLATE,
            &[("format_instructions", JD_FORMAT_INSTRUCTIONS), ("text", raw_text)],
        );

        let result = async {
            let reply = self.provider.complete(&prompt, PARSE_MAX_TOKENS).await?;
            debug!(reply_len = reply.len(), "Received job description reply");
            let posting: ExtractedPosting = parse_structured(&reply)?;
            let job = posting.into_job_description(url);
            job.validate().map_err(|msg| anyhow!(msg))?;
            Ok::<_, anyhow::Error>(job)
        }
        .await;

        result.map_err(|e| {
            error!(url, "Job description extraction failed: {:#}", e);
            TailorError::ParseJobDescription(cause(&e))
        })
    }

    /// Rewrites `resume_text` for `job` and returns the rendered markdown.
    pub async fn tailor_resume(&self, resume_text: &str, job: &JobDescription) -> Result<String> {
        info!(role = %job.role, company = %job.company, "Tailoring resume");

        let result = async {
            let job_json = serde_json::to_string_pretty(job)
                .context("Failed to serialize job description")?;
            let prompt = fill_template(
                TAILOR_PROMPT_TEMPLATE,
                &[
                    ("format_instructions", RESUME_FORMAT_INSTRUCTIONS),
                    ("job_description", &job_json),
                    ("resume", resume_text),
                ],
            );

            let reply = self.provider.complete(&prompt, TAILOR_MAX_TOKENS).await?;
            debug!(reply_len = reply.len(), "Received tailored resume reply");
            let resume: TailoredResume = parse_structured(&reply)?;
            resume.validate().map_err(|msg| anyhow!(msg))?;
            Ok::<_, anyhow::Error>(resume.to_markdown())
        }
        .await;

        result.map_err(|e| {
            error!("Resume tailoring failed: {:#}", e);
            TailorError::Tailor(cause(&e))
        })
    }
}

/// Pulls the JSON payload out of a model reply and deserializes it.
///
/// Accepts a bare object, an object inside a ```json fence, or an object
/// surrounded by prose.
pub fn parse_structured<T: DeserializeOwned>(reply: &str) -> anyhow::Result<T> {
    let payload = extract_json(reply).ok_or_else(|| anyhow!("no JSON object in model output"))?;
    serde_json::from_str(payload).context("model output does not match the expected schema")
}

/// Substitutes `{name}` placeholders in one pass over the template, so values
/// that themselves contain placeholder text are inserted verbatim.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn extract_json(reply: &str) -> Option<&str> {
    // A fence without an object (a note, say) falls back to the whole reply.
    let text = FENCED_JSON
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|fenced| fenced.contains('{'))
        .unwrap_or(reply)
        .trim();

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
