use std::sync::Arc;

use inspirt_db::Database;
use inspirt_providers::{SpeechSynthesizer, TextGenerator};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub text: Arc<dyn TextGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
}
