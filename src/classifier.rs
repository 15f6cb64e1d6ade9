//! Relevance classification of crawled pages.
//!
//! A page is judged by its title through the generation model. Only when that
//! call fails does the classifier fall back to scanning the page text for
//! keywords the model produced for the instructions earlier in the session.

use crate::llm::LanguageModel;
use std::collections::HashMap;

/// Decides whether pages serve the user's instructions
pub struct RelevanceClassifier<M> {
    model: M,
    /// Keyword set per instruction string, computed at most once each
    keywords: HashMap<String, Vec<String>>,
}

impl<M: LanguageModel> RelevanceClassifier<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            keywords: HashMap::new(),
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Drop cached keyword sets; called at the start of every crawl
    pub fn reset(&mut self) {
        self.keywords.clear();
    }

    /// Keywords for `instructions`, asking the model on first use.
    ///
    /// A failed request caches an empty set so the session does not retry.
    pub async fn keywords(&mut self, instructions: &str) -> &[String] {
        if !self.keywords.contains_key(instructions) {
            let keywords = match self.model.generate(&keyword_prompt(instructions)).await {
                Ok(reply) => {
                    let keywords = parse_keywords(&reply);
                    ::log::info!("Generated keywords: {:?}", keywords);
                    keywords
                }
                Err(e) => {
                    ::log::warn!("Error generating keywords: {}", e);
                    Vec::new()
                }
            };
            self.keywords.insert(instructions.to_string(), keywords);
        }

        self.keywords
            .get(instructions)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Judge whether a page is relevant to `instructions`
    pub async fn is_relevant(&mut self, page_text: &str, title: &str, instructions: &str) -> bool {
        self.keywords(instructions).await;

        match self.model.generate(&title_prompt(instructions, title)).await {
            Ok(reply) => {
                let relevant = is_yes(&reply);
                if relevant {
                    ::log::info!("LLM determined title '{}' is relevant", title);
                } else {
                    ::log::debug!("LLM determined title '{}' is not relevant", title);
                }
                relevant
            }
            Err(e) => {
                ::log::warn!("Error checking relevance with LLM: {}", e);
                let keywords = self.keywords(instructions).await;
                match find_keyword(page_text, keywords) {
                    Some(keyword) => {
                        ::log::info!("Found relevant keyword: {}", keyword);
                        true
                    }
                    None => false,
                }
            }
        }
    }
}

fn keyword_prompt(instructions: &str) -> String {
    format!(
        "Given these instructions: {instructions}\n\n\
         Please generate a list of semantically similar keywords and phrases that could \
         indicate relevant content. Include variations of words (singular/plural, \
         different tenses).\n\n\
         For example, if looking for \"product information\", relevant keywords might include:\n\
         - product\n- products\n- what we do\n- our product\n- features\n- solutions\n\n\
         Respond with ONLY the keywords/phrases, one per line, no bullets or other formatting."
    )
}

fn title_prompt(instructions: &str, title: &str) -> String {
    format!(
        "Given these instructions: {instructions}\n\
         And this page title: {title}\n\n\
         Based on this title, would this page likely contain information that answers or \
         is relevant to the instructions? Consider the semantic meaning and topic of the \
         title.\nRespond with ONLY 'yes' or 'no'."
    )
}

/// One lowercase keyword per non-empty line; list markers are tolerated
pub fn parse_keywords(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(['-', '*', '•'])
                .trim()
                .to_lowercase()
        })
        .filter(|k| !k.is_empty())
        .collect()
}

/// A reply counts as "yes" once trimmed, lowercased and stripped of
/// trailing punctuation
pub fn is_yes(reply: &str) -> bool {
    reply
        .trim()
        .trim_end_matches(['.', '!'])
        .eq_ignore_ascii_case("yes")
}

/// First keyword that occurs in `text`, case-insensitively
pub fn find_keyword<'k>(text: &str, keywords: &'k [String]) -> Option<&'k str> {
    if keywords.is_empty() {
        return None;
    }
    let haystack = text.to_lowercase();
    keywords
        .iter()
        .map(String::as_str)
        .find(|k| haystack.contains(&k.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies; `None` entries fail the call
    struct ScriptedModel {
        replies: Mutex<VecDeque<Option<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Option<&str>>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().map(|r| r.map(String::from)).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match self.replies.lock().unwrap().pop_front().flatten() {
                Some(reply) => Ok(reply),
                None => Err(LlmError::Response("unavailable".into())),
            }
        }
    }

    #[test]
    fn test_parse_keywords() {
        let reply = "Pricing\n\n  - Plans \n* cost\n•  Subscription Fees\n   ";
        assert_eq!(
            parse_keywords(reply),
            vec!["pricing", "plans", "cost", "subscription fees"]
        );
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("yes"));
        assert!(is_yes("  Yes.\n"));
        assert!(is_yes("YES!"));
        assert!(!is_yes("no"));
        assert!(!is_yes("yes, probably"));
        assert!(!is_yes(""));
    }

    #[test]
    fn test_find_keyword_is_case_insensitive() {
        let keywords = vec!["pricing".to_string(), "our plans".to_string()];
        assert_eq!(find_keyword("See OUR Plans here", &keywords), Some("our plans"));
        assert_eq!(find_keyword("Nothing to see", &keywords), None);
        assert_eq!(find_keyword("pricing", &[]), None);
    }

    #[tokio::test]
    async fn test_keywords_are_computed_once() {
        let model = ScriptedModel::new(vec![Some("alpha\nbeta"), Some("unused")]);
        let mut classifier = RelevanceClassifier::new(model);

        assert_eq!(classifier.keywords("find docs").await, ["alpha", "beta"]);
        assert_eq!(classifier.keywords("find docs").await, ["alpha", "beta"]);
        assert_eq!(classifier.model().calls(), 1);
    }

    #[tokio::test]
    async fn test_keyword_failure_caches_empty_set() {
        let model = ScriptedModel::new(vec![None, Some("late")]);
        let mut classifier = RelevanceClassifier::new(model);

        assert!(classifier.keywords("find docs").await.is_empty());
        assert!(classifier.keywords("find docs").await.is_empty());
        assert_eq!(classifier.model().calls(), 1);
    }

    #[tokio::test]
    async fn test_title_judgment_yes_and_no() {
        let model = ScriptedModel::new(vec![Some("pricing"), Some("Yes"), Some("no")]);
        let mut classifier = RelevanceClassifier::new(model);

        assert!(classifier.is_relevant("text", "Pricing", "find pricing").await);
        // A "no" is final even when the text holds a keyword
        assert!(!classifier.is_relevant("pricing table", "Blog", "find pricing").await);
        assert_eq!(classifier.model().calls(), 3);
    }

    #[tokio::test]
    async fn test_falls_back_to_keywords_when_model_errors() {
        let model = ScriptedModel::new(vec![Some("pricing"), None, None]);
        let mut classifier = RelevanceClassifier::new(model);

        assert!(classifier.is_relevant("Our PRICING page", "Home", "find pricing").await);
        assert!(!classifier.is_relevant("About the team", "Team", "find pricing").await);
    }

    #[tokio::test]
    async fn test_total_outage_is_never_relevant() {
        let model = ScriptedModel::new(vec![]);
        let mut classifier = RelevanceClassifier::new(model);

        assert!(!classifier.is_relevant("anything at all", "Title", "find pricing").await);
        assert!(!classifier.is_relevant("more text", "Other", "find pricing").await);
        // One keyword request, then one title request per page
        assert_eq!(classifier.model().calls(), 3);
    }

    #[tokio::test]
    async fn test_reset_forgets_keywords() {
        let model = ScriptedModel::new(vec![Some("one"), Some("two")]);
        let mut classifier = RelevanceClassifier::new(model);

        assert_eq!(classifier.keywords("x").await, ["one"]);
        classifier.reset();
        assert_eq!(classifier.keywords("x").await, ["two"]);
    }
}
