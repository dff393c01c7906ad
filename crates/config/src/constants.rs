//! Centralized constants for the cold-calling assistant
//!
//! Single source of truth for thresholds shared between the turn detector,
//! the response pipeline and the learning stores.

/// Utterance boundary timing
pub mod turn_detection {
    /// Pauses shorter than this are mid-word stutter
    pub const STUTTER_THRESHOLD_MS: u64 = 500;

    /// Pauses at least this long end a thought
    pub const PAUSE_THRESHOLD_MS: u64 = 1_500;

    /// Silence after which a non-empty buffer is force-flushed
    pub const INCOMPLETE_TIMEOUT_MS: u64 = 2_000;

    /// Average pause above which speech counts as very slow
    pub const VERY_SLOW_PAUSE_MS: u64 = 3_000;

    /// Share of stutter-length pauses that marks a speaker as stuttering
    pub const STUTTER_RATIO: f64 = 0.6;
}

/// Response cache
pub mod cache {
    /// Entry lifetime (seconds)
    pub const DEFAULT_TTL_SECS: u64 = 3_600;

    /// Queries with at most this many tokens are always cacheable
    pub const SHORT_QUERY_TOKENS: usize = 5;

    /// Hits an entry needs to count as frequent
    pub const FREQUENT_MIN_HITS: u64 = 3;

    /// How many entries the frequent-query scan considers
    pub const FREQUENT_TOP_N: usize = 10;
}

/// Learning thresholds
pub mod learning {
    /// Outcomes below this score are never memorized
    pub const MIN_LEARN_SCORE: u8 = 40;

    /// Responses kept per learned pattern
    pub const MAX_RESPONSES_PER_PATTERN: usize = 5;

    /// Pattern keys longer than this (chars) are truncated to the first words
    pub const PATTERN_KEY_MAX_CHARS: usize = 50;

    /// Words kept when a pattern key is truncated
    pub const PATTERN_KEY_MAX_WORDS: usize = 7;

    /// Minimum token overlap ratio for a fuzzy pattern match
    pub const FUZZY_MIN_OVERLAP: f64 = 0.5;

    /// Calls at or above this score feed openings, closings and objection handlers
    pub const INSIGHT_MIN_SCORE: u8 = 70;

    /// Calls at or above this score count as successful
    pub const SUCCESS_MIN_SCORE: u8 = 60;

    /// Examples kept per conversation bucket
    pub const MAX_BUCKET_EXAMPLES: usize = 5;

    /// Openings/closings kept across calls
    pub const MAX_OPENINGS: usize = 10;

    /// Handlers kept per objection keyword
    pub const MAX_OBJECTION_HANDLERS: usize = 5;

    /// Openings, closings and handlers are clipped to this many chars
    pub const SNIPPET_MAX_CHARS: usize = 100;
}

/// Reply shaping
pub mod reply {
    /// Replies longer than this (chars) are cut to the first sentences
    pub const LONG_REPLY_CHARS: usize = 200;

    /// Sentences kept from a long reply
    pub const MAX_SENTENCES: usize = 2;

    /// Token budget for ordinary replies
    pub const DEFAULT_MAX_TOKENS: u32 = 45;

    /// Token budget for confirmations and rejections
    pub const SHORT_MAX_TOKENS: u32 = 30;
}

/// Service endpoints (defaults for local development)
pub mod endpoints {
    /// OpenAI API endpoint
    pub const OPENAI_DEFAULT: &str = "https://api.openai.com/v1";

    /// Default chat model
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
}

/// Timeouts
pub mod timeouts {
    /// LLM request timeout
    pub const LLM_REQUEST_MS: u64 = 15_000;
}
