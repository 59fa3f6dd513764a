// src/config/mod.rs
// All values load from the environment (.env supported); defaults match the
// tuning the triage pipeline was calibrated with.

/// Service configuration.
///
/// Constructed once in `main` and passed into the components that need it;
/// clients are injected explicitly, never reached through globals.
#[derive(Debug, Clone)]
pub struct ArogyaConfig {
    // ── Server
    pub host: String,
    pub port: u16,

    // ── Database
    pub database_url: String,
    pub sqlite_max_connections: u32,

    // ── Model inference (OpenAI-compatible chat completions)
    pub groq_api_key: String,
    pub groq_api_base: String,
    pub groq_model: String,
    pub request_timeout_secs: u64,

    // ── Protocol knowledge index
    pub qdrant_url: Option<String>,
    pub protocols_collection: String,
    pub gemini_api_key: Option<String>,

    // ── Emergency scan
    /// Optional JSON file with named emergency patterns; summarized into the
    /// scan prompt. Missing file is not an error.
    pub emergency_rules_path: Option<String>,
    /// How many trailing messages the scan sees beyond the latest exchange.
    pub scan_history_window: usize,

    // ── Planner tuning
    /// Similarity ratio above which a candidate question counts as a repeat.
    /// Tuned heuristic, not a contract.
    pub dedup_threshold: f32,
    /// Candidates shorter than this are dropped outright.
    pub min_question_chars: usize,
    /// Upper bound on questions accepted from one incremental pass.
    pub max_new_questions: usize,
    /// How many trailing messages the planner prompt includes.
    pub planner_history_window: usize,

    // ── Retrieval
    pub retrieval_k: usize,
}

impl Default for ArogyaConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_url: "sqlite://arogya.db?mode=rwc".to_string(),
            sqlite_max_connections: 5,
            groq_api_key: String::new(),
            groq_api_base: "https://api.groq.com/openai/v1".to_string(),
            groq_model: "openai/gpt-oss-120b".to_string(),
            request_timeout_secs: 30,
            qdrant_url: None,
            protocols_collection: "decision_rules".to_string(),
            gemini_api_key: None,
            emergency_rules_path: None,
            scan_history_window: 5,
            dedup_threshold: 0.6,
            min_question_chars: 5,
            max_new_questions: 3,
            planner_history_window: 20,
            retrieval_k: 3,
        }
    }
}

impl ArogyaConfig {
    /// Load config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("AROGYA_HOST") {
            config.host = val;
        }
        if let Ok(val) = std::env::var("AROGYA_PORT") {
            if let Ok(port) = val.parse() {
                config.port = port;
            }
        }
        if let Ok(val) = std::env::var("DATABASE_URL") {
            config.database_url = val;
        }
        if let Ok(val) = std::env::var("AROGYA_SQLITE_MAX_CONNECTIONS") {
            if let Ok(n) = val.parse() {
                config.sqlite_max_connections = n;
            }
        }
        if let Ok(val) = std::env::var("GROQ_API_KEY") {
            config.groq_api_key = val;
        }
        if let Ok(val) = std::env::var("GROQ_API_BASE") {
            config.groq_api_base = val;
        }
        if let Ok(val) = std::env::var("GROQ_MODEL") {
            config.groq_model = val;
        }
        if let Ok(val) = std::env::var("AROGYA_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.request_timeout_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("QDRANT_URL") {
            config.qdrant_url = Some(val);
        }
        if let Ok(val) = std::env::var("AROGYA_PROTOCOLS_COLLECTION") {
            config.protocols_collection = val;
        }
        if let Ok(val) = std::env::var("GEMINI_API_KEY") {
            config.gemini_api_key = Some(val);
        }
        if let Ok(val) = std::env::var("AROGYA_EMERGENCY_RULES") {
            config.emergency_rules_path = Some(val);
        }
        if let Ok(val) = std::env::var("AROGYA_SCAN_HISTORY_WINDOW") {
            if let Ok(n) = val.parse() {
                config.scan_history_window = n;
            }
        }
        if let Ok(val) = std::env::var("AROGYA_DEDUP_THRESHOLD") {
            if let Ok(t) = val.parse() {
                config.dedup_threshold = t;
            }
        }
        if let Ok(val) = std::env::var("AROGYA_MIN_QUESTION_CHARS") {
            if let Ok(n) = val.parse() {
                config.min_question_chars = n;
            }
        }
        if let Ok(val) = std::env::var("AROGYA_MAX_NEW_QUESTIONS") {
            if let Ok(n) = val.parse() {
                config.max_new_questions = n;
            }
        }
        if let Ok(val) = std::env::var("AROGYA_PLANNER_HISTORY_WINDOW") {
            if let Ok(n) = val.parse() {
                config.planner_history_window = n;
            }
        }
        if let Ok(val) = std::env::var("AROGYA_RETRIEVAL_K") {
            if let Ok(k) = val.parse() {
                config.retrieval_k = k;
            }
        }

        config
    }
}
