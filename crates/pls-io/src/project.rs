//! Native project file format (spec §6 "Native format"): a single JSON
//! document carrying the full in-memory project state, using the same
//! camelCase shape as the wire/event-payload Task and Calendar types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use pls_core::{Calendar, Task};

use crate::error::Result;

/// Bumped whenever the native format gains a field that an older reader
/// would silently drop. Readers do not reject unknown future versions;
/// they only use this to decide whether to warn.
pub const FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
    pub calendar: Calendar,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trade_partners: Vec<Value>,
}

impl ProjectFile {
    pub fn new(tasks: Vec<Task>, calendar: Calendar, trade_partners: Vec<Value>, exported_at: DateTime<Utc>) -> Self {
        ProjectFile {
            version: FORMAT_VERSION.to_string(),
            exported_at,
            tasks,
            calendar,
            trade_partners,
        }
    }
}

/// Serialize a project to the native JSON format (pretty-printed, since
/// this is a user-facing save file rather than a wire payload).
pub fn to_json(project: &ProjectFile) -> Result<String> {
    Ok(serde_json::to_string_pretty(project)?)
}

/// Parse a native JSON project file. Unknown top-level fields (a newer
/// writer than this reader) are ignored by serde's default behavior;
/// a version mismatch is logged, not rejected.
pub fn from_json(s: &str) -> Result<ProjectFile> {
    let project: ProjectFile = serde_json::from_str(s)?;
    if project.version != FORMAT_VERSION {
        tracing::warn!(
            found = %project.version,
            expected = FORMAT_VERSION,
            "native project file version mismatch; reading best-effort"
        );
    }
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pls_core::{Dependency, LinkType};

    fn sample_project() -> ProjectFile {
        let mut t1 = Task::new("t1", "V", 3);
        t1.name = "Excavate".into();
        let mut t2 = Task::new("t2", "h", 2);
        t2.name = "Pour footings".into();
        t2.dependencies.push(Dependency {
            id: "t1".into(),
            link_type: LinkType::FS,
            lag: 0,
        });
        ProjectFile::new(
            vec![t1, t2],
            Calendar::default(),
            Vec::new(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn round_trips_through_json() {
        let project = sample_project();
        let json = to_json(&project).unwrap();
        let back = from_json(&json).unwrap();
        assert_eq!(back.tasks.len(), 2);
        assert_eq!(back.tasks[1].dependencies[0].id, "t1");
        assert_eq!(back.calendar, project.calendar);
    }

    #[test]
    fn version_mismatch_is_tolerated_not_rejected() {
        let mut project = sample_project();
        project.version = "0.9".into();
        let json = to_json(&project).unwrap();
        let back = from_json(&json).unwrap();
        assert_eq!(back.tasks.len(), 2);
    }
}
