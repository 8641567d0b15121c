//! The wire model every Scheduler Driver produces.
use serde_derive::Deserialize;
use serde_derive::Serialize;

/// Up/down status of an instance as reported by its Scheduler Driver.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum InstanceStatus {
    #[serde(rename = "up")]
    Up,
    #[serde(rename = "down")]
    Down,
}

/// A point-in-time view of one running container instance.
///
/// Immutable once produced by a Scheduler Driver; the Updater copies it
/// wholesale into an `ObservedInstance` and never mutates it in place.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub id: String,
    pub image_name: String,
    pub image_tag: String,
    pub host: String,
    pub container_name: String,
    pub status: InstanceStatus,
}

impl InstanceSnapshot {
    /// `image_name:image_tag`, the string Criteria match image constraints against.
    pub fn full_image_name(&self) -> String {
        format!("{}:{}", self.image_name, self.image_tag)
    }

    /// `status == Up`.
    pub fn healthy(&self) -> bool {
        self.status == InstanceStatus::Up
    }
}
