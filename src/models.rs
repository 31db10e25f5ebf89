use chrono::NaiveDateTime;

/// A shortened link record from the `links` table.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Link {
    pub id: i64,
    pub short_code: String,
    pub original_url: String,
    pub created_at: NaiveDateTime,
}

/// A link that has not been written yet. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub short_code: String,
    pub original_url: String,
    pub created_at: NaiveDateTime,
}

/// A redirect observed on the request path, waiting in the click queue until
/// a worker picks it up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickEvent {
    pub link_id: i64,
    pub clicked_at: NaiveDateTime,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// A row for the `clicks` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewClick {
    pub link_id: i64,
    pub clicked_at: NaiveDateTime,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl From<ClickEvent> for NewClick {
    fn from(event: ClickEvent) -> Self {
        Self {
            link_id: event.link_id,
            clicked_at: event.clicked_at,
            user_agent: event.user_agent,
            ip_address: event.ip_address,
        }
    }
}
