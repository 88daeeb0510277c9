/// Type tag of search hits that are dashboards.
pub const DASHBOARD_TYPE: &str = "dash-db";

/// Folder title of dashboards that don't live in a folder.
pub const GENERAL_FOLDER: &str = "General";

/// One hit of the Grafana search API (`/api/search`).
///
/// Hits are not only dashboards, folders are returned as well. See [is_dashboard](Self::is_dashboard).
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardSummary {
    pub id: i64,
    pub uid: String,
    pub title: String,
    /// Deprecated by Grafana in favor of [uid](Self::uid), e.g. `db/node-exporter`.
    pub uri: String,
    pub url: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub tags: Vec<String>,
    pub is_starred: bool,
    pub folder_id: Option<i64>,
    pub folder_uid: Option<String>,
    pub folder_title: Option<String>,
    pub folder_url: Option<String>,
}

impl DashboardSummary {
    /// Returns `true` if the hit is a dashboard (and not e.g. a folder).
    pub fn is_dashboard(&self) -> bool {
        self.kind == DASHBOARD_TYPE
    }

    /// Title of the containing folder, [GENERAL_FOLDER] if there is none.
    pub fn folder(&self) -> &str {
        match self.folder_title.as_deref() {
            Some(title) if !title.is_empty() => title,
            _ => GENERAL_FOLDER,
        }
    }

    /// Path of the dashboard below `/api/dashboards/`.
    ///
    /// Falls back to the uid endpoint for Grafana versions that no longer return a uri.
    pub fn dashboard_path(&self) -> String {
        if self.uri.is_empty() {
            format!("uid/{}", self.uid)
        } else {
            self.uri.clone()
        }
    }
}
