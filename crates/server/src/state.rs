use crate::{config::Config, db::Database, mailer::Mailer};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub mailer: Mailer,
}

impl AppState {
    pub fn new(db: Database, config: Config, mailer: Mailer) -> Self {
        Self { db, config, mailer }
    }
}
