pub mod settings;

use crate::api::{ApiError, Client};
use serde::{Deserialize, Serialize};

/// Project summary as returned by `GET /v1/projects/{ref}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Project {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub region: String,
    pub status: Option<String>,
    pub created_at: Option<String>,
}

/// Projects API, scoped by project reference
pub struct ProjectsApi<'a> {
    client: &'a Client,
}

impl<'a> ProjectsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, project_ref: &str) -> Result<Project, ApiError> {
        self.client.get(&project_path(project_ref)).await
    }

    /// Configuration endpoints of one project
    pub fn settings(&self, project_ref: &str) -> settings::SettingsApi<'a> {
        settings::SettingsApi::new(self.client, project_path(project_ref))
    }
}

fn project_path(project_ref: &str) -> String {
    format!("/v1/projects/{}", urlencoding::encode(project_ref))
}
