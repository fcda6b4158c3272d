use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::drivers::connection_url::ConnectionUrl;

/// A named binding to one database.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub db_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast_restore: Option<bool>,
    pub created_at: DateTime<Local>,
}

impl Project {
    pub fn new(name: &str, db_url: &str) -> Self {
        Self {
            name: name.to_string(),
            db_url: db_url.to_string(),
            fast_restore: None,
            created_at: Local::now(),
        }
    }

    pub fn fast_restore(&self) -> bool {
        self.fast_restore.unwrap_or(false)
    }

    pub fn database_name(&self) -> Option<String> {
        ConnectionUrl::parse(&self.db_url)
            .ok()
            .map(|u| u.database().to_string())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_project: Option<String>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl ProjectsConfig {
    pub fn find(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let mut project = Project::new("shop", "postgresql://u:p@localhost/shop");
        project.fast_restore = Some(true);
        let config = ProjectsConfig {
            selected_project: Some("shop".into()),
            projects: vec![project],
        };

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["selectedProject"], "shop");
        assert_eq!(json["projects"][0]["dbUrl"], "postgresql://u:p@localhost/shop");
        assert_eq!(json["projects"][0]["fastRestore"], true);
        assert!(json["projects"][0]["createdAt"].is_string());
    }

    #[test]
    fn missing_fields_default() {
        let config: ProjectsConfig = serde_json::from_str("{}").unwrap();
        assert!(config.selected_project.is_none());
        assert!(config.projects.is_empty());

        let project: Project = serde_json::from_str(
            r#"{"name":"a","dbUrl":"mongodb://localhost/a","createdAt":"2024-04-13T10:00:00+02:00"}"#,
        )
        .unwrap();
        assert!(!project.fast_restore());
        assert_eq!(project.database_name().as_deref(), Some("a"));
    }
}
