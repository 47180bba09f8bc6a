use std::ffi::OsString;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

/// Turns rendered markdown into a print-ready document.
pub trait DocumentRenderer: Send + Sync {
    fn render_pdf(&self, markdown: &str, css: Option<&Path>, output: &Path) -> Result<()>;
}

/// Renders through an external `pandoc` binary, using weasyprint as the PDF
/// engine so a CSS stylesheet controls the layout.
#[derive(Debug, Clone)]
pub struct PandocRenderer {
    program: String,
    pdf_engine: String,
}

impl Default for PandocRenderer {
    fn default() -> Self {
        Self::new("pandoc")
    }
}

impl PandocRenderer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            pdf_engine: "weasyprint".to_string(),
        }
    }

    pub fn with_pdf_engine(mut self, engine: impl Into<String>) -> Self {
        self.pdf_engine = engine.into();
        self
    }

    fn args(&self, css: Option<&Path>, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--from=markdown".into(),
            "--standalone".into(),
            "--metadata=pagetitle:Resume".into(),
            format!("--pdf-engine={}", self.pdf_engine).into(),
            "--output".into(),
            output.as_os_str().to_owned(),
        ];
        if let Some(css) = css {
            args.push("--css".into());
            args.push(css.as_os_str().to_owned());
        }
        args
    }
}

impl DocumentRenderer for PandocRenderer {
    fn render_pdf(&self, markdown: &str, css: Option<&Path>, output: &Path) -> Result<()> {
        let args = self.args(css, output);
        debug!(program = %self.program, ?args, "Running PDF renderer");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute '{}'. Is it installed?", self.program))?;

        // Feed stdin from its own thread so a renderer that fills its stderr
        // pipe before reading all input cannot stall us.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("Failed to open stdin for '{}'", self.program))?;
        let input = markdown.to_owned();
        let writer = std::thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output_status = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for '{}'", self.program))?;
        let written = writer
            .join()
            .map_err(|_| anyhow!("stdin writer for '{}' panicked", self.program))?;

        if !output_status.status.success() {
            let stderr = String::from_utf8_lossy(&output_status.stderr);
            return Err(anyhow!(
                "{} exited with {}: {}",
                self.program,
                output_status.status,
                stderr.trim()
            ));
        }
        written.context("Failed to pass markdown to renderer")?;

        if !output.exists() {
            return Err(anyhow!("{} produced no file at {}", self.program, output.display()));
        }

        Ok(())
    }
}
