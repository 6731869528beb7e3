/// Marker that opens an assistant turn in ChatGLM3 prompts.
pub const DEFAULT_ASSISTANT_MARKER: &str = "<|assistant|>";

/// Pulls the assistant's reply out of a decoded generation.
///
/// The decoded text holds the whole conversation, so the reply is whatever
/// follows the last assistant marker, up to the first stop marker.
#[derive(Debug, Clone)]
pub struct ReplyExtractor {
    marker: String,
    stop_markers: Vec<String>,
}

impl Default for ReplyExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_ASSISTANT_MARKER)
    }
}

impl ReplyExtractor {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            stop_markers: Vec::new(),
        }
    }

    pub fn with_stop_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_markers = markers
            .into_iter()
            .map(Into::into)
            .filter(|m: &String| !m.trim().is_empty())
            .collect();
        self
    }

    pub fn extract(&self, decoded: &str) -> String {
        let reply = if self.marker.is_empty() {
            decoded
        } else {
            decoded.rsplit(self.marker.as_str()).next().unwrap_or(decoded)
        };

        let end = self
            .stop_markers
            .iter()
            .filter_map(|m| reply.find(m.as_str()))
            .min()
            .unwrap_or(reply.len());

        reply[..end].trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_takes_text_after_last_marker() {
        let decoded = "[gMASK]sop<|user|>\n hi<|assistant|>\n hello<|user|>\n bye<|assistant|> \n see you";
        assert_eq!(ReplyExtractor::default().extract(decoded), "see you");
    }

    #[test]
    fn test_cuts_at_first_stop_marker() {
        let extractor = ReplyExtractor::default().with_stop_markers(["<|user|>", "</s>"]);
        let decoded = "<|user|>\n q<|assistant|>\n answer</s><|user|>";
        assert_eq!(extractor.extract(decoded), "answer");
    }

    #[test]
    fn test_missing_marker_returns_whole_text() {
        assert_eq!(ReplyExtractor::default().extract("  plain  "), "plain");
    }

    #[test]
    fn test_blank_stop_markers_are_ignored() {
        let extractor = ReplyExtractor::default().with_stop_markers(["", " "]);
        assert_eq!(extractor.extract("<|assistant|>ok"), "ok");
    }
}
