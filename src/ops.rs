use anyhow::{Context, Result};
use chrono::{Local, Utc};
use colored::*;
use comfy_table::{Attribute, Cell, ContentArrangement, Table, presets::UTF8_FULL};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::sync::Arc;

use dbsnap::config::project::Project;
use dbsnap::drivers::connection_url::redact;
use dbsnap::drivers::selector::{OperatorBuilder, backend_id, select_operator};
use dbsnap::drivers::{DbOperator, RestoreMode};
use dbsnap::registry::ProjectStore;
use dbsnap::utils::time::relative_age;

/// Shared state for one CLI invocation.
pub struct App {
    store: ProjectStore,
    builders: Vec<Arc<dyn OperatorBuilder>>,
    project: Option<String>,
    runtime: tokio::runtime::Runtime,
}

impl App {
    pub fn new(
        store: ProjectStore,
        builders: Vec<Arc<dyn OperatorBuilder>>,
        project: Option<String>,
    ) -> Result<Self> {
        // One operation per process; no need for worker threads.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        Ok(Self {
            store,
            builders,
            project,
            runtime,
        })
    }

    pub fn do_init(&self, name: &str, db_url: &str) -> Result<()> {
        let project = self.store.init_project(name, db_url, &self.builders)?;
        println!(
            "{} {}",
            "✔".green().bold(),
            format!(
                "Created project '{}' for {} ({})",
                project.name,
                redact(&project.db_url),
                self.store.path().display()
            )
            .green()
        );
        Ok(())
    }

    pub fn do_select(&self, name: &str) -> Result<()> {
        self.store.select_project(name)?;
        println!(
            "{} {}",
            "✔".green().bold(),
            format!("Selected project '{}'", name).green()
        );
        Ok(())
    }

    pub fn do_set(&self, key: &str, value: &str) -> Result<()> {
        let project = self.store.set_option(self.project.as_deref(), key, value)?;
        println!(
            "{} {}",
            "✔".green().bold(),
            format!("Set {} = {} on project '{}'", key, value, project.name).green()
        );
        Ok(())
    }

    pub fn do_status(&self) -> Result<()> {
        let config = self.store.projects()?;
        if config.projects.is_empty() {
            println!("{} {}", "i".yellow().bold(), "No projects defined".yellow());
            return Ok(());
        }

        let selected = self.project.clone().or(config.selected_project.clone());
        let now = Local::now();
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Project").add_attribute(Attribute::Bold),
                Cell::new("Database").add_attribute(Attribute::Bold),
                Cell::new("Type").add_attribute(Attribute::Bold),
                Cell::new("URL").add_attribute(Attribute::Bold),
                Cell::new("Age").add_attribute(Attribute::Bold),
            ]);
        for p in &config.projects {
            let marker = if selected.as_deref() == Some(p.name.as_str()) { "* " } else { "  " };
            table.add_row(vec![
                Cell::new(format!("{}{}", marker, p.name)),
                Cell::new(p.database_name().unwrap_or_else(|| "unknown".into())),
                Cell::new(backend_id(&p.db_url, &self.builders).unwrap_or("unknown")),
                Cell::new(redact(&p.db_url)),
                Cell::new(relative_age(&p.created_at, &now)),
            ]);
        }
        println!("{}", table);
        Ok(())
    }

    pub fn do_snapshot(&self, name: &str) -> Result<()> {
        let (project, operator) = self.operator()?;
        let entry = self
            .with_spinner(
                format!("Creating snapshot '{}'", name),
                operator.snapshot(name),
            )
            .with_context(|| failure("snapshot", name, &project))?;
        println!(
            "{} {}",
            "✔".green().bold(),
            format!(
                "Snapshot '{}' of {} created",
                entry.label, entry.source_database
            )
            .green()
        );
        Ok(())
    }

    pub fn do_restore(&self, name: &str, fast_override: Option<bool>) -> Result<()> {
        let (project, operator) = self.operator()?;
        let mode = RestoreMode::from_fast(fast_override.unwrap_or_else(|| project.fast_restore()));
        if mode == RestoreMode::Fast {
            eprintln!(
                "{} {}",
                "!".yellow().bold(),
                "Fast restore keeps no backup; a failure can leave the database missing".yellow()
            );
        }
        self.with_spinner(
            format!("Restoring snapshot '{}'", name),
            operator.restore(name, mode),
        )
        .with_context(|| failure("restore", name, &project))?;
        println!(
            "{} {}",
            "✔".green().bold(),
            format!("Snapshot '{}' restored", name).green()
        );
        Ok(())
    }

    pub fn do_delete(&self, name: &str, yes: bool) -> Result<()> {
        let (project, operator) = self.operator()?;
        if !yes && !prompt_confirm(&format!("Delete snapshot '{}'? [y/N] ", name))? {
            println!("Aborted.");
            return Ok(());
        }
        self.with_spinner(format!("Deleting snapshot '{}'", name), operator.delete(name))
            .with_context(|| failure("delete", name, &project))?;
        println!(
            "{} {}",
            "✔".green().bold(),
            format!("Deleted snapshot '{}'", name).green()
        );
        Ok(())
    }

    pub fn do_list(&self) -> Result<()> {
        let (project, operator) = self.operator()?;
        let mut entries = self
            .with_spinner("Listing snapshots".to_string(), operator.list())
            .with_context(|| format!("failed to list snapshots on {}", redact(&project.db_url)))?;

        if entries.is_empty() {
            println!("{} {}", "i".yellow().bold(), "No snapshots found".yellow());
            return Ok(());
        }
        entries.sort_by_key(|e| e.created_at);

        let now = Utc::now();
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Name").add_attribute(Attribute::Bold),
                Cell::new("Database").add_attribute(Attribute::Bold),
                Cell::new("Created").add_attribute(Attribute::Bold),
                Cell::new("Age").add_attribute(Attribute::Bold),
            ]);
        for e in &entries {
            let ts = e
                .created_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string();
            table.add_row(vec![
                Cell::new(&e.label),
                Cell::new(&e.source_database),
                Cell::new(ts),
                Cell::new(relative_age(&e.created_at, &now)),
            ]);
        }
        println!("{}", table);
        Ok(())
    }

    fn operator(&self) -> Result<(Project, Box<dyn DbOperator>)> {
        let project = self.store.project(self.project.as_deref())?;
        let operator = select_operator(&project.db_url, &self.builders)
            .with_context(|| format!("project '{}' has an unusable database URL", project.name))?;
        Ok((project, operator))
    }

    fn with_spinner<T, F>(&self, message: String, work: F) -> F::Output
    where
        F: Future<Output = T>,
    {
        let bar = create_progress_bar(&message);
        let output = self.runtime.block_on(work);
        bar.finish_and_clear();
        output
    }
}

pub fn do_version() {
    println!("{} {}", "dbsnap".bold(), env!("CARGO_PKG_VERSION").cyan());
}

fn failure(operation: &str, label: &str, project: &Project) -> String {
    format!(
        "{} of snapshot '{}' failed on {}",
        operation,
        label,
        redact(&project.db_url)
    )
}

fn create_progress_bar(prefix: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");
    bar.set_style(style);
    bar.set_message(prefix.to_string());
    bar.enable_steady_tick(std::time::Duration::from_millis(80));
    bar
}

fn prompt_confirm(message: &str) -> Result<bool> {
    use std::io::{self, Write};
    print!("{} {}", "?".cyan().bold(), message.cyan());
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let ans = input.trim().to_lowercase();
    Ok(ans == "y" || ans == "yes")
}
