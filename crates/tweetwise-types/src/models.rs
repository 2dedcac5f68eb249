use serde::{Deserialize, Serialize};

/// Tweet lifecycle status. One authoritative enumeration shared by the
/// tweet CRUD surface and the Twitter posting surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TweetStatus {
    Draft,
    Completed,
    Scheduled,
    Sent,
}

impl TweetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TweetStatus::Draft => "draft",
            TweetStatus::Completed => "completed",
            TweetStatus::Scheduled => "scheduled",
            TweetStatus::Sent => "sent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(TweetStatus::Draft),
            "completed" => Some(TweetStatus::Completed),
            "scheduled" => Some(TweetStatus::Scheduled),
            "sent" => Some(TweetStatus::Sent),
            _ => None,
        }
    }

    /// Guard table for status transitions. `sent` is terminal; a
    /// scheduled tweet can only be posted or cancelled back to draft.
    pub fn can_transition(self, to: TweetStatus) -> bool {
        use TweetStatus::*;
        matches!(
            (self, to),
            (Draft, Completed)
                | (Completed, Draft)
                | (Draft, Scheduled)
                | (Scheduled, Draft)
                | (Draft, Sent)
                | (Scheduled, Sent)
        )
    }
}

impl std::fmt::Display for TweetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four AI analysis kinds. Each kind has its own prompt template,
/// response shape, and cache namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Spelling,
    Grammar,
    Critique,
    Curation,
}

impl SuggestionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionKind::Spelling => "spelling",
            SuggestionKind::Grammar => "grammar",
            SuggestionKind::Critique => "critique",
            SuggestionKind::Curation => "curation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "spelling" => Some(SuggestionKind::Spelling),
            "grammar" => Some(SuggestionKind::Grammar),
            "critique" => Some(SuggestionKind::Critique),
            "curation" => Some(SuggestionKind::Curation),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_roundtrip() {
        for status in [
            TweetStatus::Draft,
            TweetStatus::Completed,
            TweetStatus::Scheduled,
            TweetStatus::Sent,
        ] {
            assert_eq!(TweetStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TweetStatus::parse("posted"), None);
    }

    #[test]
    fn sent_is_terminal() {
        use TweetStatus::*;
        for to in [Draft, Completed, Scheduled, Sent] {
            assert!(!Sent.can_transition(to));
        }
    }

    #[test]
    fn scheduled_only_cancels_or_posts() {
        use TweetStatus::*;
        assert!(Scheduled.can_transition(Draft));
        assert!(Scheduled.can_transition(Sent));
        assert!(!Scheduled.can_transition(Completed));
        assert!(!Scheduled.can_transition(Scheduled));
    }

    #[test]
    fn completed_cannot_be_posted_directly() {
        use TweetStatus::*;
        assert!(Completed.can_transition(Draft));
        assert!(!Completed.can_transition(Sent));
        assert!(!Completed.can_transition(Scheduled));
    }
}
