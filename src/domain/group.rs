use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(title: String) -> Self {
        Self {
            id: 0,
            title,
            created_at: Utc::now(),
        }
    }
}
