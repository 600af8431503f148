//! Plain-text listings of jobs and job logs

use crate::storage::{JobRecord, LogEntry};
use std::fmt::Write;

/// One line per job, newest first as given
pub fn format_jobs(jobs: &[JobRecord]) -> String {
    let mut out = String::new();
    if jobs.is_empty() {
        out.push_str("No jobs found\n");
        return out;
    }

    for job in jobs {
        let _ = write!(
            out,
            "{}  {:<10} {:>3}%  {}  {}",
            job.id,
            job.status.to_db_string(),
            job.progress,
            job.created_at,
            job.target_url
        );
        if let Some(path) = &job.storage_path {
            let _ = write!(out, "  -> {}", path);
        }
        if let Some(message) = &job.error_message {
            let _ = write!(out, "  ({})", message);
        }
        out.push('\n');
    }
    out
}

/// Log lines of one job in insertion order
pub fn format_logs(logs: &[LogEntry]) -> String {
    let mut out = String::new();
    for entry in logs {
        let _ = writeln!(
            out,
            "{} [{}] {}",
            entry.created_at,
            entry.level.to_db_string().to_uppercase(),
            entry.message
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{JobStatus, LogLevel};

    #[test]
    fn test_format_jobs() {
        let jobs = vec![JobRecord {
            id: "job-1".to_string(),
            submitter_id: "user".to_string(),
            target_url: "https://example.test/".to_string(),
            status: JobStatus::Completed,
            progress: 100,
            storage_path: Some("job-1/export.zip".to_string()),
            error_message: None,
            created_at: "2024-05-01T12:00:00Z".to_string(),
            updated_at: "2024-05-01T12:01:00Z".to_string(),
        }];
        let text = format_jobs(&jobs);
        assert!(text.starts_with("job-1  completed"));
        assert!(text.contains("100%"));
        assert!(text.contains("-> job-1/export.zip"));

        assert_eq!(format_jobs(&[]), "No jobs found\n");
    }

    #[test]
    fn test_format_logs() {
        let logs = vec![LogEntry {
            id: 1,
            job_id: "job-1".to_string(),
            level: LogLevel::Warn,
            message: "Failed to download image".to_string(),
            created_at: "2024-05-01T12:00:00Z".to_string(),
        }];
        assert_eq!(
            format_logs(&logs),
            "2024-05-01T12:00:00Z [WARN] Failed to download image\n"
        );
    }
}
