use shared::{MeetRequest, RequestStatus};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: String,
    pub created_at: Option<String>,
}

/// One row of the `requests` table. Status is kept as TEXT in storage and
/// parsed into `RequestStatus` at the wire boundary.
#[derive(Debug, Clone, FromRow)]
pub struct RequestRow {
    pub id: String,
    pub from_user_id: String,
    pub from_name: Option<String>,
    pub from_email: Option<String>,
    pub to_name: Option<String>,
    pub to_email: String,
    pub date: String,
    pub start_time: String,
    pub duration_minutes: i64,
    pub place: String,
    pub note: Option<String>,
    pub status: String,
    pub created_at: Option<String>,
}

impl From<RequestRow> for MeetRequest {
    fn from(row: RequestRow) -> Self {
        let status = row
            .status
            .parse::<RequestStatus>()
            .unwrap_or(RequestStatus::Pending);
        MeetRequest {
            id: row.id,
            from_user_id: row.from_user_id,
            from_name: row.from_name,
            from_email: row.from_email,
            to_name: row.to_name,
            to_email: row.to_email,
            date: row.date,
            start_time: row.start_time,
            duration_minutes: row.duration_minutes,
            place: row.place,
            note: row.note,
            status,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Contact {
    pub owner_user_id: String,
    pub contact_email: String,
    pub contact_name: Option<String>,
    pub times_used: i64,
    pub last_used_at: Option<String>,
}
