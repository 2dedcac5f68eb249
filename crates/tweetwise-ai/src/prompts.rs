use tweetwise_types::models::SuggestionKind;

/// Low temperature for mechanical checks; curation gets room to vary.
pub fn temperature(kind: SuggestionKind) -> f32 {
    match kind {
        SuggestionKind::Curation => 0.7,
        _ => 0.2,
    }
}

pub fn system_prompt(kind: SuggestionKind) -> &'static str {
    match kind {
        SuggestionKind::Spelling => {
            "You are a spelling checker for short social media posts. \
             Respond with a JSON object of the form \
             {\"suggestions\": [{\"original\": string, \"suggestion\": string, \"explanation\": string}]}. \
             Only report genuine spelling mistakes; intentional slang, hashtags, \
             @mentions and URLs are not mistakes. Respond with an empty list when \
             the text is clean."
        }
        SuggestionKind::Grammar => {
            "You are a grammar checker for short social media posts. \
             Respond with a JSON object of the form \
             {\"suggestions\": [{\"original\": string, \"suggestion\": string, \"explanation\": string}]}. \
             Only report genuine grammatical errors; informal tone and sentence \
             fragments common on social media are acceptable. Respond with an \
             empty list when the text is fine."
        }
        SuggestionKind::Critique => {
            "You are a social media writing coach. Assess the tweet and respond \
             with a JSON object of the form \
             {\"engagement_score\": 1-10, \"clarity_score\": 1-10, \
             \"strengths\": [string], \"improvements\": [string], \"overall\": string}. \
             Be specific and concrete; generic advice is worthless."
        }
        SuggestionKind::Curation => {
            "You are a social media editor. Respond with a JSON object of the \
             form {\"variants\": [string], \"hashtags\": [string]}: up to three \
             rewritten variants of the tweet (each 280 characters or fewer, \
             preserving the author's intent and voice) and up to five relevant \
             hashtags without the # prefix."
        }
    }
}

/// The user message embeds the raw text verbatim.
pub fn user_prompt(kind: SuggestionKind, text: &str) -> String {
    match kind {
        SuggestionKind::Spelling => format!("Check the spelling of this tweet:\n\n{text}"),
        SuggestionKind::Grammar => format!("Check the grammar of this tweet:\n\n{text}"),
        SuggestionKind::Critique => format!("Critique this tweet:\n\n{text}"),
        SuggestionKind::Curation => format!("Suggest variants and hashtags for this tweet:\n\n{text}"),
    }
}
