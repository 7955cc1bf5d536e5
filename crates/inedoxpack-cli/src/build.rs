//! Building an extension project with `dotnet publish` before packaging.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{PackError, PackResult};

const PROJECT_EXTENSION: &str = "csproj";

pub const CLEANUP_ATTEMPTS: u32 = 5;
pub const CLEANUP_DELAY: Duration = Duration::from_secs(1);

#[cfg(windows)]
const DOTNET: &str = "dotnet.exe";
#[cfg(not(windows))]
const DOTNET: &str = "dotnet";

/// A project to publish once per target framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectBuild {
    pub project: PathBuf,
    pub configuration: String,
    pub frameworks: Vec<String>,
}

impl ProjectBuild {
    /// Locate the project in `source_dir` and read its target frameworks.
    pub fn load(source_dir: &Path, configuration: &str) -> PackResult<Self> {
        let project = find_project(source_dir)?;
        let xml = std::fs::read_to_string(&project)?;
        let frameworks = target_frameworks(&xml).map_err(|e| {
            PackError::Build(format!("Could not read {}: {e}", project.display()))
        })?;
        if frameworks.is_empty() {
            return Err(PackError::Build(format!(
                "No TargetFramework or TargetFrameworks elements found in {}",
                project.display()
            )));
        }

        Ok(Self {
            project,
            configuration: configuration.to_string(),
            frameworks,
        })
    }

    /// Publish every framework to `<staging>/<framework>`.
    pub async fn publish_all(&self, staging: &Path) -> PackResult<()> {
        let file_name = self
            .project
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        for framework in &self.frameworks {
            println!("Executing dotnet publish for {file_name} ({framework})...");

            let status = self.publish(framework, &staging.join(framework)).await?;
            if !status.success() {
                debug!("dotnet publish exited with {status}");
                return Err(PackError::Build(format!(
                    "Error building {} for {framework}.",
                    self.project.display()
                )));
            }
        }
        Ok(())
    }

    /// Run one `dotnet publish`, relaying its output as it arrives.
    async fn publish(&self, framework: &str, output: &Path) -> PackResult<ExitStatus> {
        let mut child = Command::new(DOTNET)
            .arg("publish")
            .arg(&self.project)
            .args(["-c", self.configuration.as_str(), "-f", framework, "--nologo", "-o"])
            .arg(output)
            .args(["-v", "q"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PackError::Build(format!("Failed to execute {DOTNET}: {e}")))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, _, _) = tokio::join!(
            child.wait(),
            relay_lines(stdout, |line| println!("{line}")),
            relay_lines(stderr, |line| eprintln!("{line}")),
        );
        Ok(status?)
    }
}

/// Forward each line of `stream` to `emit` until it closes.
async fn relay_lines<R>(stream: Option<R>, emit: impl Fn(&str))
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return;
    };

    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => emit(&line),
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped relaying build output: {e}");
                break;
            }
        }
    }
}

/// The first `*.csproj` in `dir`, in file-name order.
pub fn find_project(dir: &Path) -> PackResult<PathBuf> {
    let missing = || {
        PackError::Build(format!(
            "No .csproj files were found in {} and --build was specified.",
            dir.display()
        ))
    };

    if !dir.is_dir() {
        return Err(missing());
    }

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let is_project = entry
            .path()
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(PROJECT_EXTENSION));
        if entry.file_type().is_file() && is_project {
            return Ok(entry.into_path());
        }
    }
    Err(missing())
}

/// Target frameworks declared by a project file.
///
/// Reads `<TargetFrameworks>` (`;`-separated) and then `<TargetFramework>`
/// from the `<PropertyGroup>` children of the root element. Groups nested
/// deeper (`<Choose>`, targets) are not evaluated. Duplicates are dropped,
/// first occurrence wins.
pub fn target_frameworks(project_xml: &str) -> Result<Vec<String>, roxmltree::Error> {
    let doc = roxmltree::Document::parse(project_xml)?;
    let groups: Vec<_> = doc
        .root_element()
        .children()
        .filter(|n| n.has_tag_name("PropertyGroup"))
        .collect();

    let properties = |name: &str| -> Vec<String> {
        let mut texts = Vec::new();
        for group in &groups {
            for property in group.children().filter(|n| n.has_tag_name(name)) {
                texts.push(element_text(&property));
            }
        }
        texts
    };

    let plural = properties("TargetFrameworks");
    let single = properties("TargetFramework");

    let mut frameworks: Vec<String> = Vec::new();
    let candidates = plural
        .iter()
        .flat_map(|text| text.split(';'))
        .chain(single.iter().map(String::as_str));
    for framework in candidates.map(str::trim) {
        if !framework.is_empty() && !frameworks.iter().any(|f| f == framework) {
            frameworks.push(framework.to_string());
        }
    }
    Ok(frameworks)
}

/// All text below `node`, CDATA included.
fn element_text(node: &roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}

/// Create a fresh staging directory for publish output.
pub fn create_staging_dir() -> PackResult<PathBuf> {
    let dir = tempfile::Builder::new()
        .prefix("inedoxpack-")
        .tempdir()?
        .keep();
    debug!("Staging build output in {}", dir.display());
    Ok(dir)
}

/// Delete `dir`, retrying while files are still locked.
///
/// Returns whether the directory is gone. Failure is logged, never raised.
pub async fn remove_staging_dir(dir: &Path, attempts: u32, delay: Duration) -> bool {
    for attempt in 1..=attempts {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => return true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) if attempt < attempts => {
                debug!("Attempt {attempt} to remove {} failed: {e}", dir.display());
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!("Could not remove staging directory {}: {e}", dir.display());
            }
        }
    }
    false
}
