//! Event type catalog.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// Every event type the system publishes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
pub enum EventType {
    ScanStarted,
    ScanCompleted,
    ScanFailed,
    CorruptionDetected,
    CorruptionIgnored,
    RemediationQueued,
    DeletionStarted,
    DeletionCompleted,
    DeletionFailed,
    SearchStarted,
    SearchCompleted,
    SearchFailed,
    SearchExhausted,
    DownloadTimeout,
    DownloadFailed,
    ImportBlocked,
    ManuallyRemoved,
    VerificationStarted,
    VerificationSuccess,
    VerificationFailed,
    RetryScheduled,
    MaxRetriesReached,
    StuckRemediation,
    SystemHealthDegraded,
    NotificationSent,
    NotificationFailed,
}

/// Grouping used when presenting the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventCategory {
    Scan,
    Corruption,
    Remediation,
    Verification,
    System,
}

impl EventType {
    /// Wire name (same as `Display`).
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Human-friendly label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ScanStarted => "Scan Started",
            Self::ScanCompleted => "Scan Completed",
            Self::ScanFailed => "Scan Failed",
            Self::CorruptionDetected => "Corruption Detected",
            Self::CorruptionIgnored => "Corruption Ignored",
            Self::RemediationQueued => "Remediation Queued",
            Self::DeletionStarted => "Deletion Started",
            Self::DeletionCompleted => "Deletion Completed",
            Self::DeletionFailed => "Deletion Failed",
            Self::SearchStarted => "Search Started",
            Self::SearchCompleted => "Search Completed",
            Self::SearchFailed => "Search Failed",
            Self::SearchExhausted => "Search Exhausted",
            Self::DownloadTimeout => "Download Timeout",
            Self::DownloadFailed => "Download Failed",
            Self::ImportBlocked => "Import Blocked",
            Self::ManuallyRemoved => "Manually Removed",
            Self::VerificationStarted => "Verification Started",
            Self::VerificationSuccess => "Verification Succeeded",
            Self::VerificationFailed => "Verification Failed",
            Self::RetryScheduled => "Retry Scheduled",
            Self::MaxRetriesReached => "Max Retries Reached",
            Self::StuckRemediation => "Stuck Remediation",
            Self::SystemHealthDegraded => "System Health Degraded",
            Self::NotificationSent => "Notification Sent",
            Self::NotificationFailed => "Notification Failed",
        }
    }

    pub fn category(&self) -> EventCategory {
        match self {
            Self::ScanStarted | Self::ScanCompleted | Self::ScanFailed => EventCategory::Scan,
            Self::CorruptionDetected | Self::CorruptionIgnored => EventCategory::Corruption,
            Self::RemediationQueued
            | Self::DeletionStarted
            | Self::DeletionCompleted
            | Self::DeletionFailed
            | Self::SearchStarted
            | Self::SearchCompleted
            | Self::SearchFailed
            | Self::SearchExhausted
            | Self::DownloadTimeout
            | Self::DownloadFailed
            | Self::ImportBlocked
            | Self::ManuallyRemoved
            | Self::RetryScheduled
            | Self::MaxRetriesReached
            | Self::StuckRemediation => EventCategory::Remediation,
            Self::VerificationStarted | Self::VerificationSuccess | Self::VerificationFailed => {
                EventCategory::Verification
            }
            Self::SystemHealthDegraded | Self::NotificationSent | Self::NotificationFailed => {
                EventCategory::System
            }
        }
    }

    /// Correlation events emitted by the notification engine itself.
    pub fn is_notification_outcome(&self) -> bool {
        matches!(self, Self::NotificationSent | Self::NotificationFailed)
    }

    /// Event types a notification config may subscribe to.
    pub fn notifiable() -> impl Iterator<Item = EventType> {
        Self::iter().filter(|e| !e.is_notification_outcome())
    }
}
