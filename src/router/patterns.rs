//! Routing pattern tables
//!
//! Plain data, compiled case-insensitively by [`super::QueryRouter::new`].

/// Whole-message conversational micro-patterns answered without a model
pub const INSTANT_PATTERNS: &[&str] = &[
    r"^(hi|hello|hey|hola|yo)[\s!.,]*$",
    r"^good\s*(morning|afternoon|evening|night)[\s!.,]*$",
    r"^(thanks|thank\s*you|thx|ty)[\s!.,]*$",
    r"^(ok|okay|k|got\s*it|understood|sure|alright)[\s!.,]*$",
    r"^(bye|goodbye|see\s*you|cya|later)[\s!.,]*$",
    r"^(yes|no|yeah|nope|yep|nah)[\s!.,]*$",
];

/// Keywords selecting the canned reply, checked in order
pub const GREETING_KEYWORDS: &str = r"\b(hi|hello|hey|hola|yo|morning|afternoon|evening)\b";
pub const THANKS_KEYWORDS: &str = r"\b(thanks?|thx|ty)\b";
pub const FAREWELL_KEYWORDS: &str = r"\b(bye|goodbye|see\s*you|cya|later|night)\b";
pub const AFFIRMATIVE_KEYWORDS: &str = r"\b(yes|yeah|yep)\b";

pub const GREETING_REPLY: &str = "Hey! How can I help you today?";
pub const THANKS_REPLY: &str = "You're welcome! Let me know if you need anything else.";
pub const FAREWELL_REPLY: &str = "See you later! Take care.";
pub const AFFIRMATIVE_REPLY: &str = "Understood!";
pub const ACKNOWLEDGMENT_REPLY: &str = "Got it!";

/// A link anywhere in the text
pub const URL_PATTERN: &str = r"https?://[^\s]+";

/// Analytical intent that warrants the strongest model
pub const COMPLEX_PATTERNS: &[&str] = &[
    r"\b(compare|contrast|difference|between)\b",
    r"\b(analyze|analysis|evaluate|assessment)\b",
    r"\b(explain\s+why|how\s+does|what\s+causes)\b",
    r"\b(pros?\s+and\s+cons?|advantages?\s+and\s+disadvantages?)\b",
    r"\b(step\s+by\s+step|in\s+detail|comprehensive|thorough)\b",
    r"\b(implications?|consequences?|impact)\b",
    r"\b(strategy|strategic|plan|planning)\b",
    r"\b(recommend|suggestion|advice|should\s+i)\b",
];

/// Messages longer than this many tokens are treated as complex
pub const COMPLEX_TOKEN_LIMIT: usize = 30;

/// References to earlier conversation or shared material
pub const RETRIEVAL_PATTERNS: &[&str] = &[
    r"\b(remember|recall|previously|earlier|last\s+time)\b",
    r"\b(what\s+did\s+(i|we|you)\s+say)\b",
    r"\b(that\s+(article|link|url|post))\b",
    r"\b(based\s+on|according\s+to)\b",
];

/// Freshness cues that need a web search
pub const SEARCH_PATTERNS: &[&str] = &[
    r"\b(latest|recent|current|today|now|20\d{2})\b",
    r"\b(news|update|happening)\b",
    r"\b(how\s+much|price|cost)\b.*\b(now|current|today)\b",
    r"\b(who\s+is|what\s+is)\b.*\b(now|current|today)\b",
];
