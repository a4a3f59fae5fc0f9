//! Human-readable message bodies and titles for domain events.
//!
//! Formatting never fails: unknown event types and missing fields fall back
//! to generic text.

use serde_json::Value;

use crate::events::{EventData, EventType};

/// Title used by test deliveries.
pub const TEST_TITLE: &str = "Test Notification";

/// Body used by test deliveries.
pub const TEST_MESSAGE: &str =
    "This is a test notification. If you can read this, the destination is configured correctly.";

/// Fields extracted from event data and normalized for formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFields {
    pub file_path: Option<String>,
    /// Final segment of `file_path`, empty when absent.
    pub file_name: String,
    pub corruption_type: Option<String>,
    pub path: Option<String>,
    pub error: Option<String>,
    pub reason: Option<String>,
    pub healthy_files: Option<i64>,
    pub corrupt_files: Option<i64>,
    pub total_files: Option<i64>,
    pub retry_count: Option<i64>,
    pub max_retries: Option<i64>,
    pub attempts: Option<i64>,
}

impl EventFields {
    pub fn from_data(data: &EventData) -> Self {
        let file_path = string_field(data, "file_path");
        let file_name = file_path.as_deref().map(file_name_of).unwrap_or_default();

        Self {
            file_name,
            file_path,
            corruption_type: string_field(data, "corruption_type"),
            path: string_field(data, "path"),
            error: string_field(data, "error"),
            reason: string_field(data, "reason"),
            healthy_files: int_field(data, "healthy_files"),
            corrupt_files: int_field(data, "corrupt_files"),
            total_files: int_field(data, "total_files"),
            retry_count: int_field(data, "retry_count"),
            max_retries: int_field(data, "max_retries"),
            attempts: int_field(data, "attempts"),
        }
    }

    fn file(&self) -> &str {
        if self.file_name.is_empty() {
            "unknown file"
        } else {
            &self.file_name
        }
    }

    fn failure(&self) -> &str {
        self.error
            .as_deref()
            .or(self.reason.as_deref())
            .unwrap_or("unknown error")
    }

    fn scan_path(&self) -> &str {
        self.path.as_deref().unwrap_or("unknown path")
    }
}

/// Final path segment, accepting both `/` and `\` separators.
pub fn file_name_of(path: &str) -> String {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .to_string()
}

fn string_field(data: &EventData, key: &str) -> Option<String> {
    match data.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Integers may arrive as JSON integers, floats, or numeric strings.
fn int_field(data: &EventData, key: &str) -> Option<i64> {
    match data.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

fn count(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string())
}

/// Render the message body for `event_type`.
pub fn format(event_type: &str, f: &EventFields) -> String {
    let Ok(kind) = event_type.parse::<EventType>() else {
        return format!("Event: {}", event_type);
    };

    match kind {
        EventType::ScanStarted => format!("Scan started for {}", f.scan_path()),
        EventType::ScanCompleted => format!(
            "Scan completed for {}\nTotal files: {} | Healthy: {} | Corrupt: {}",
            f.scan_path(),
            count(f.total_files),
            count(f.healthy_files),
            count(f.corrupt_files)
        ),
        EventType::ScanFailed => format!("Scan failed for {}: {}", f.scan_path(), f.failure()),
        EventType::CorruptionDetected => {
            let mut msg = format!(
                "Corruption detected in {}\nType: {}",
                f.file(),
                f.corruption_type.as_deref().unwrap_or("unknown")
            );
            if let Some(path) = &f.file_path {
                msg.push_str(&format!("\nPath: {}", path));
            }
            msg
        }
        EventType::CorruptionIgnored => match &f.reason {
            Some(reason) => format!("Corruption in {} was ignored: {}", f.file(), reason),
            None => format!("Corruption in {} was ignored", f.file()),
        },
        EventType::RemediationQueued => format!("Remediation queued for {}", f.file()),
        EventType::DeletionStarted => format!("Deleting corrupt file {}", f.file()),
        EventType::DeletionCompleted => format!("Deleted corrupt file {}", f.file()),
        EventType::DeletionFailed => {
            format!("Failed to delete {}: {}", f.file(), f.failure())
        }
        EventType::SearchStarted => format!("Searching for a replacement for {}", f.file()),
        EventType::SearchCompleted => {
            format!("Replacement search completed for {}", f.file())
        }
        EventType::SearchFailed => format!(
            "Replacement search failed for {}: {}",
            f.file(),
            f.failure()
        ),
        EventType::SearchExhausted => format!(
            "No replacement found for {} after {} attempts",
            f.file(),
            count(f.attempts)
        ),
        EventType::DownloadTimeout => format!("Download timed out for {}", f.file()),
        EventType::DownloadFailed => {
            format!("Download failed for {}: {}", f.file(), f.failure())
        }
        EventType::ImportBlocked => format!(
            "Import blocked for {}: {}",
            f.file(),
            f.reason.as_deref().or(f.error.as_deref()).unwrap_or("no reason given")
        ),
        EventType::ManuallyRemoved => format!("{} was removed manually", f.file()),
        EventType::VerificationStarted => format!("Verifying replacement for {}", f.file()),
        EventType::VerificationSuccess => {
            format!("Replacement for {} verified healthy", f.file())
        }
        EventType::VerificationFailed => {
            format!("Verification failed for {}: {}", f.file(), f.failure())
        }
        EventType::RetryScheduled => format!(
            "Retry {}/{} scheduled for {}",
            count(f.retry_count),
            count(f.max_retries),
            f.file()
        ),
        EventType::MaxRetriesReached => format!(
            "Giving up on {} after {} of {} retries",
            f.file(),
            count(f.retry_count.or(f.attempts)),
            count(f.max_retries)
        ),
        EventType::StuckRemediation => format!(
            "Remediation for {} appears stuck: {}",
            f.file(),
            f.reason.as_deref().unwrap_or("no progress")
        ),
        EventType::SystemHealthDegraded => {
            format!("System health degraded: {}", f.failure())
        }
        EventType::NotificationSent => "Notification delivered".to_string(),
        EventType::NotificationFailed => format!("Notification failed: {}", f.failure()),
    }
}

/// Render the short title for `event_type`.
pub fn title(event_type: &str, file_name: &str) -> String {
    let Ok(kind) = event_type.parse::<EventType>() else {
        return format!("Event: {}", event_type);
    };

    match kind.category() {
        crate::events::EventCategory::Scan | crate::events::EventCategory::System => {
            kind.label().to_string()
        }
        _ if file_name.is_empty() => kind.label().to_string(),
        _ => format!("{}: {}", kind.label(), file_name),
    }
}
