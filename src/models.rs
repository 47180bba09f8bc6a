use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// --- Job postings ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequirements {
    pub skills: Vec<String>,
    pub experience: Vec<String>,
    pub education: Vec<String>,
}

/// A parsed job posting. `url` is the natural key used by the posting cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescription {
    pub url: String,
    pub role: String,
    pub company: String,
    pub location: String,
    pub responsibilities: Vec<String>,
    pub requirements: JobRequirements,
    #[serde(default)]
    pub salary: Option<String>,
    pub benefits: Vec<String>,
    #[serde(default)]
    pub other_information: BTreeMap<String, String>,
}

impl JobDescription {
    pub fn validate(&self) -> Result<(), String> {
        if self.url.trim().is_empty() {
            return Err("job description has an empty url".to_string());
        }
        if self.role.trim().is_empty() {
            return Err("job description has an empty role".to_string());
        }
        if self.company.trim().is_empty() {
            return Err("job description has an empty company".to_string());
        }
        Ok(())
    }
}

/// Cache listing row, used by `tailor list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPosting {
    pub url: String,
    pub role: String,
    pub company: String,
    pub updated_at: String,
}

// --- Resume records ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
    pub degree: String,
    pub institution: String,
    pub dates: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub location: String,
    pub dates: String,
    pub bullets: Vec<String>,
    #[serde(default)]
    pub company_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub category: String,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub journal: String,
    pub title: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSourceProject {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailoredResume {
    pub name: String,
    pub title: String,
    pub location: String,
    pub phone: String,
    pub email: String,
    pub github: String,
    pub linkedin: String,
    pub summary: String,
    pub education: Vec<Education>,
    pub skills: Vec<Skill>,
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub publications: Vec<Publication>,
    #[serde(default)]
    pub open_source: Vec<OpenSourceProject>,
}

impl TailoredResume {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("resume has an empty name".to_string());
        }
        Ok(())
    }

    /// Renders the resume as markdown. Publications and open-source sections
    /// are left out entirely when their lists are empty.
    pub fn to_markdown(&self) -> String {
        let md = self.to_string();
        md.trim_end().to_string() + "\n"
    }
}

impl fmt::Display for TailoredResume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {}", self.name)?;
        writeln!(f, "**{}**\n", self.title)?;
        let contact = [
            &self.location,
            &self.phone,
            &self.email,
            &self.github,
            &self.linkedin,
        ]
        .iter()
        .filter(|field| !field.trim().is_empty())
        .map(|field| field.as_str())
        .collect::<Vec<_>>()
        .join(" | ");
        writeln!(f, "{}\n", contact)?;

        writeln!(f, "## Summary\n{}\n", self.summary)?;

        if !self.skills.is_empty() {
            writeln!(f, "## Skills")?;
            for skill in &self.skills {
                writeln!(f, "- **{}**: {}", skill.category, skill.skills.join(", "))?;
            }
            writeln!(f)?;
        }

        if !self.experience.is_empty() {
            writeln!(f, "## Experience")?;
            for exp in &self.experience {
                writeln!(f, "### {}", exp.title)?;
                writeln!(f, "**{}** | {} | {}", exp.company, exp.location, exp.dates)?;
                if let Some(description) = &exp.company_description {
                    writeln!(f, "*{}*", description)?;
                }
                writeln!(f)?;
                for bullet in &exp.bullets {
                    writeln!(f, "- {}", bullet)?;
                }
                writeln!(f)?;
            }
        }

        if !self.education.is_empty() {
            writeln!(f, "## Education")?;
            for edu in &self.education {
                match &edu.location {
                    Some(location) => writeln!(
                        f,
                        "- **{}**, {} | {} | {}",
                        edu.degree, edu.institution, location, edu.dates
                    )?,
                    None => writeln!(f, "- **{}**, {} | {}", edu.degree, edu.institution, edu.dates)?,
                }
            }
            writeln!(f)?;
        }

        if !self.publications.is_empty() {
            writeln!(f, "## Publications")?;
            for publication in &self.publications {
                writeln!(
                    f,
                    "- {}, *{}*, {}",
                    publication.title, publication.journal, publication.date
                )?;
            }
            writeln!(f)?;
        }

        if !self.open_source.is_empty() {
            writeln!(f, "## Open-Source Contributions")?;
            for project in &self.open_source {
                writeln!(f, "- **{}**: {}", project.name, project.description)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}
