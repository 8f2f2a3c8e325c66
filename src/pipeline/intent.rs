//! Intent labels assigned to inbound email.

use std::fmt;
use std::str::FromStr;

/// Closed set of intents the classifier may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Question,
    Request,
    Complaint,
    Compliment,
    Meeting,
    Business,
    Personal,
    Spam,
    Other,
}

impl Intent {
    pub const ALL: [Intent; 9] = [
        Intent::Question,
        Intent::Request,
        Intent::Complaint,
        Intent::Compliment,
        Intent::Meeting,
        Intent::Business,
        Intent::Personal,
        Intent::Spam,
        Intent::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Intent::Question => "QUESTION",
            Intent::Request => "REQUEST",
            Intent::Complaint => "COMPLAINT",
            Intent::Compliment => "COMPLIMENT",
            Intent::Meeting => "MEETING",
            Intent::Business => "BUSINESS",
            Intent::Personal => "PERSONAL",
            Intent::Spam => "SPAM",
            Intent::Other => "OTHER",
        }
    }

    /// Map free-form model output onto a label.
    ///
    /// The answer must open with a label, ignoring case and punctuation
    /// (`**Spam**.` → SPAM). A leading `Category:`-style prefix is
    /// allowed. Anything else, including a label buried later in the
    /// text, is OTHER.
    pub fn from_model_output(raw: &str) -> Intent {
        let mut words = raw
            .split(|c: char| !c.is_ascii_alphabetic())
            .filter(|word| !word.is_empty())
            .peekable();

        if words
            .peek()
            .is_some_and(|word| ANSWER_PREFIXES.iter().any(|p| word.eq_ignore_ascii_case(p)))
        {
            words.next();
        }

        words
            .next()
            .and_then(|word| word.parse().ok())
            .unwrap_or(Intent::Other)
    }
}

/// Words a model may put before the label itself.
const ANSWER_PREFIXES: [&str; 4] = ["category", "intent", "label", "classification"];

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Intent::ALL
            .into_iter()
            .find(|intent| intent.label() == upper)
            .ok_or_else(|| format!("unknown intent '{s}'"))
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_labels_parse() {
        for intent in Intent::ALL {
            assert_eq!(Intent::from_model_output(intent.label()), intent);
        }
    }

    #[test]
    fn case_and_punctuation_ignored() {
        assert_eq!(Intent::from_model_output("spam."), Intent::Spam);
        assert_eq!(Intent::from_model_output("**Meeting**"), Intent::Meeting);
        assert_eq!(
            Intent::from_model_output("Category: Request\n"),
            Intent::Request
        );
    }

    #[test]
    fn first_label_wins() {
        assert_eq!(
            Intent::from_model_output("QUESTION (though it could be a REQUEST)"),
            Intent::Question
        );
    }

    #[test]
    fn negated_or_buried_label_is_other() {
        assert_eq!(Intent::from_model_output("Not spam, QUESTION"), Intent::Other);
        assert_eq!(Intent::from_model_output("This is not SPAM."), Intent::Other);
        assert_eq!(
            Intent::from_model_output("I think this is a REQUEST"),
            Intent::Other
        );
    }

    #[test]
    fn prefix_without_label_is_other() {
        assert_eq!(Intent::from_model_output("Category:"), Intent::Other);
        assert_eq!(Intent::from_model_output("Intent: unclear"), Intent::Other);
    }

    #[test]
    fn unrecognized_is_other() {
        assert_eq!(Intent::from_model_output(""), Intent::Other);
        assert_eq!(Intent::from_model_output("newsletter"), Intent::Other);
        assert_eq!(Intent::from_model_output("SPAMMY"), Intent::Other);
    }

    #[test]
    fn display_matches_label() {
        assert_eq!(Intent::Business.to_string(), "BUSINESS");
    }
}
