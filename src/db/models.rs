use serde::{Deserialize, Serialize};

/// Settings key the learner profile is stored under.
pub const PROFILE_KEY: &str = "studentData";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Setting {
    pub key: String,
    pub value: String,
}
