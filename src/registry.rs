use anyhow::{Context, Result, anyhow, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::project::{Project, ProjectsConfig};
use crate::drivers::selector::{OperatorBuilder, select_operator};

pub const CONFIG_FILENAME: &str = ".dbsnap.json";
pub const CONFIG_ENV: &str = "DBSNAP_CONFIG";

/// How many parent directories are searched for an existing config file.
const MAX_CLIMB: usize = 10;

pub const FAST_RESTORE_KEY: &str = "fastRestore";

/// JSON file of projects plus the currently selected one.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    path: PathBuf,
}

impl ProjectStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$DBSNAP_CONFIG` if set, otherwise the nearest `.dbsnap.json` in the
    /// current directory or its parents, otherwise a new one in the current
    /// directory.
    pub fn locate() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Ok(Self::at(path));
            }
        }
        let cwd = std::env::current_dir()?;
        Ok(Self::locate_from(&cwd))
    }

    pub fn locate_from(start: &Path) -> Self {
        let found = start
            .ancestors()
            .take(MAX_CLIMB + 1)
            .map(|dir| dir.join(CONFIG_FILENAME))
            .find(|candidate| candidate.is_file());
        Self::at(found.unwrap_or_else(|| start.join(CONFIG_FILENAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<ProjectsConfig> {
        if !self.path.exists() {
            return Ok(ProjectsConfig::default());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(ProjectsConfig::default());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("invalid project config in {}", self.path.display()))
    }

    pub fn save(&self, config: &ProjectsConfig) -> Result<()> {
        let json = serde_json::to_string_pretty(config)?;
        // Write atomically: write to temp file then rename
        let dir = self
            .path
            .parent()
            .ok_or_else(|| anyhow!("invalid config path {}", self.path.display()))?;
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json)?;
        if self.path.exists() {
            let _ = fs::remove_file(&self.path);
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    /// Register a project and select it. The URL must belong to a supported
    /// backend; nothing is contacted.
    pub fn init_project(
        &self,
        name: &str,
        db_url: &str,
        builders: &[Arc<dyn OperatorBuilder>],
    ) -> Result<Project> {
        if name.trim().is_empty() {
            bail!("project name cannot be empty");
        }
        if db_url.trim().is_empty() {
            bail!("database URL cannot be empty");
        }
        select_operator(db_url, builders)?;

        let mut config = self.load()?;
        if config.find(name).is_some() {
            bail!("project '{}' already exists", name);
        }
        let project = Project::new(name, db_url);
        config.projects.push(project.clone());
        config.selected_project = Some(name.to_string());
        self.save(&config)?;
        Ok(project)
    }

    pub fn select_project(&self, name: &str) -> Result<()> {
        let mut config = self.load()?;
        if config.find(name).is_none() {
            bail!("project '{}' not found", name);
        }
        config.selected_project = Some(name.to_string());
        self.save(&config)
    }

    /// The named project, or the selected one when `name` is `None`.
    pub fn project(&self, name: Option<&str>) -> Result<Project> {
        let config = self.load()?;
        let wanted = resolve_name(&config, name)?;
        config
            .find(&wanted)
            .cloned()
            .ok_or_else(|| anyhow!("project '{}' not found", wanted))
    }

    pub fn set_option(&self, name: Option<&str>, key: &str, value: &str) -> Result<Project> {
        let mut config = self.load()?;
        let wanted = resolve_name(&config, name)?;
        let project = config
            .find_mut(&wanted)
            .ok_or_else(|| anyhow!("project '{}' not found", wanted))?;

        match key {
            FAST_RESTORE_KEY => {
                let flag = match value {
                    "true" => true,
                    "false" => false,
                    other => bail!("invalid value '{}' for {}: expected true or false", other, key),
                };
                project.fast_restore = Some(flag);
            }
            other => bail!("unknown option '{}' (supported: {})", other, FAST_RESTORE_KEY),
        }

        let updated = project.clone();
        self.save(&config)?;
        Ok(updated)
    }

    pub fn projects(&self) -> Result<ProjectsConfig> {
        self.load()
    }
}

fn resolve_name(config: &ProjectsConfig, name: Option<&str>) -> Result<String> {
    match name {
        Some(n) => Ok(n.to_string()),
        None => config.selected_project.clone().ok_or_else(|| {
            anyhow!("no project selected; run `dbsnap init <project> <database_url>` first")
        }),
    }
}
