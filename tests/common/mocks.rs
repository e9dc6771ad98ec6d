use sentiment_service::{
    Error, Result,
    classifier::{LabelMap, SentimentModel, argmax},
};
use std::sync::{Arc, Mutex};

const POSITIVE_WORDS: &[&str] = &["love", "great", "good", "excellent", "happy"];
const NEGATIVE_WORDS: &[&str] = &["terrible", "awful", "bad", "hate", "worst"];

/// Keyword-scoring stand-in for the DistilBERT checkpoint.
///
/// Emits logits `[negative, positive]`, so text with no keywords ties and
/// resolves to index 0 like the real argmax.
#[derive(Debug)]
pub struct StubSentimentModel {
    labels: LabelMap,
    max_words: usize,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl StubSentimentModel {
    pub fn new() -> Self {
        Self {
            labels: LabelMap::new(vec!["NEGATIVE".to_string(), "POSITIVE".to_string()]).unwrap(),
            max_words: 512,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn get_requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn logits(&self, text: &str) -> [f32; 2] {
        let mut scores = [0.0f32; 2];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .take(self.max_words)
        {
            let word = word.to_lowercase();
            if NEGATIVE_WORDS.contains(&word.as_str()) {
                scores[0] += 1.0;
            }
            if POSITIVE_WORDS.contains(&word.as_str()) {
                scores[1] += 1.0;
            }
        }
        scores
    }
}

impl Default for StubSentimentModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentModel for StubSentimentModel {
    fn classify_batch(&self, texts: &[&str]) -> Result<Vec<String>> {
        let mut requests = self.requests.lock().unwrap();
        texts
            .iter()
            .map(|text| {
                requests.push(text.to_string());
                let index = argmax(&self.logits(text))
                    .ok_or_else(|| Error::inference("empty logits"))?;
                self.labels
                    .get(index)
                    .map(str::to_string)
                    .ok_or_else(|| Error::inference("label out of range"))
            })
            .collect()
    }

    fn labels(&self) -> &LabelMap {
        &self.labels
    }
}

/// Model whose forward pass always fails.
#[derive(Debug)]
pub struct FailingSentimentModel {
    labels: LabelMap,
    error: String,
}

impl FailingSentimentModel {
    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            labels: LabelMap::new(vec!["NEGATIVE".to_string(), "POSITIVE".to_string()]).unwrap(),
            error: error.into(),
        }
    }
}

impl SentimentModel for FailingSentimentModel {
    fn classify_batch(&self, _texts: &[&str]) -> Result<Vec<String>> {
        Err(Error::inference(self.error.clone()))
    }

    fn labels(&self) -> &LabelMap {
        &self.labels
    }
}
