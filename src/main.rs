use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tailor::ai::{AIProvider, create_provider};
use tailor::config::Config;
use tailor::db::{Database, JobStore};
use tailor::optimizer::{DEFAULT_CSS, OptimizeRequest, ResumeOptimizer, prepare_output_dir};
use tailor::render::PandocRenderer;

#[derive(Parser)]
#[command(name = "tailor")]
#[command(about = "Tailor a markdown resume to a job posting and render it to PDF")]
struct Cli {
    /// Posting cache location (overrides TAILOR_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the posting cache and, optionally, an output directory layout
    Init {
        /// Output directory to prepare with Markdown/ and PDF/ subdirectories
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Tailor a resume for one job posting
    Optimize {
        /// Company label used in output file names
        #[arg(short, long)]
        company: String,

        /// URL of the job posting
        #[arg(short, long)]
        url: String,

        /// Base resume in markdown
        #[arg(short, long)]
        resume: PathBuf,

        /// Directory containing Markdown/ and PDF/ subdirectories
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Read the posting text from a file instead of fetching the URL
        #[arg(long)]
        jd_file: Option<PathBuf>,

        /// Stylesheet for the PDF
        #[arg(long, default_value = DEFAULT_CSS)]
        css: PathBuf,

        /// Model to use (overrides TAILOR_MODEL)
        #[arg(short, long)]
        model: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a cached job description
    Show {
        /// Posting URL
        url: String,
    },

    /// List cached job descriptions
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.rust_log).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command {
        Commands::Init { output_dir } => {
            let db = Database::open_at(&config.db_path)?;
            println!("Database initialized at {}", db.path().display());
            if let Some(dir) = output_dir {
                prepare_output_dir(&dir)?;
                println!("Output directory ready at {}", dir.display());
            }
        }

        Commands::Optimize {
            company,
            url,
            resume,
            output_dir,
            jd_file,
            css,
            model,
            json,
        } => {
            if let Some(model) = model {
                config.model = model;
            }
            let spec = config.model_spec()?;
            let api_key = config.api_key_for(&spec)?;
            let provider: Arc<dyn AIProvider> = Arc::from(create_provider(&spec, api_key)?);

            let store = Database::open_at(&config.db_path)?;
            let optimizer = ResumeOptimizer::new(Some(provider), None, Box::new(store))?
                .with_renderer(Box::new(PandocRenderer::new(config.pandoc.clone())));

            let mut request = OptimizeRequest::new(company, url, resume, output_dir).with_css(css);
            if let Some(path) = jd_file {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                request = request.with_jd_text(text);
            }

            let summary = optimizer.optimize(&request).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Tailored resume for {} at {}", summary.role, summary.company);
                println!("  Markdown: {}", summary.markdown_path.display());
                println!("  PDF:      {}", summary.pdf_path.display());
            }
        }

        Commands::Show { url } => {
            let db = Database::open_at(&config.db_path)?;
            match db.get_job_description(&url)? {
                Some(job) => {
                    println!("Role: {}", job.role);
                    println!("Company: {}", job.company);
                    println!("Location: {}", job.location);
                    if let Some(salary) = &job.salary {
                        println!("Salary: {}", salary);
                    }
                    print_list("Responsibilities", &job.responsibilities);
                    print_list("Skills", &job.requirements.skills);
                    print_list("Experience", &job.requirements.experience);
                    print_list("Education", &job.requirements.education);
                    print_list("Benefits", &job.benefits);
                    if !job.other_information.is_empty() {
                        println!("\nOther:");
                        for (key, value) in &job.other_information {
                            println!("  {}: {}", key, value);
                        }
                    }
                }
                None => {
                    println!("No cached job description for {}", url);
                }
            }
        }

        Commands::List => {
            let db = Database::open_at(&config.db_path)?;
            let postings = db.list_job_descriptions()?;
            if postings.is_empty() {
                println!("No cached job descriptions.");
            } else {
                println!("{:<25} {:<20} {:<40} {:<20}", "ROLE", "COMPANY", "URL", "UPDATED");
                println!("{}", "-".repeat(108));
                for posting in postings {
                    println!(
                        "{:<25} {:<20} {:<40} {:<20}",
                        truncate(&posting.role, 23),
                        truncate(&posting.company, 18),
                        truncate(&posting.url, 38),
                        truncate(&posting.updated_at, 19)
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_list(heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("\n{}:", heading);
    for item in items {
        println!("  - {}", item);
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
