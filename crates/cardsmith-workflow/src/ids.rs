//! Stable identifiers of the built-in workflows.

pub const CARD_GENERATION: &str = "card-generation";
pub const CONTENT_RECOMMENDATION: &str = "content-recommendation";
pub const CONTENT_SEARCH: &str = "content-search";
pub const USER_ACHIEVEMENT: &str = "user-achievement";
pub const USER_ANALYTICS: &str = "user-analytics";
pub const USER_ENGAGEMENT: &str = "user-engagement";
pub const TREND_ANALYSIS: &str = "trend-analysis";
