use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{
    AudioArtifact, ChatReply, ConversationTurn, DomainError, LanguageCode, Passage, Query,
};

/// Classifies the language of a piece of text.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Result<LanguageCode, DomainError>;
}

/// External translation service.
pub trait Translator: Send + Sync {
    fn to_english(&self, text: &str, source: &LanguageCode) -> Result<String, DomainError>;

    fn to_target_language(&self, text: &str, target: &LanguageCode)
        -> Result<String, DomainError>;
}

/// Returns the passages most similar to a question, best first.
pub trait KnowledgeRetriever: Send + Sync {
    fn retrieve(&self, question: &str) -> Result<Vec<Passage>, DomainError>;
}

/// Conversational language model conditioned on retrieved context.
pub trait AnswerGenerator: Send + Sync {
    fn generate(
        &self,
        question: &str,
        context: &[Passage],
        history: &[ConversationTurn],
    ) -> Result<String, DomainError>;
}

/// Text-to-speech backend producing MP3 bytes.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str, language: &LanguageCode) -> Result<Vec<u8>, DomainError>;

    fn supports(&self, _language: &LanguageCode) -> bool {
        true
    }
}

/// Where synthesized audio lives until a client fetches it.
pub trait AudioStore: Send + Sync {
    fn save(&self, audio: &[u8]) -> Result<AudioArtifact, DomainError>;

    fn load(&self, file_name: &str) -> Result<Vec<u8>, DomainError>;
}

#[derive(Debug, Clone, Default)]
pub struct ChatConfig {
    /// Return the text answer even when speech synthesis fails.
    pub allow_text_only: bool,
}

/// Runs one `/chat` request through the pipeline:
/// validate, detect, translate in, retrieve, generate, translate out,
/// synthesize, store. The first failing stage ends the request.
pub struct ChatService {
    detector: Arc<dyn LanguageDetector>,
    translator: Arc<dyn Translator>,
    retriever: Arc<dyn KnowledgeRetriever>,
    generator: Arc<dyn AnswerGenerator>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    audio: Arc<dyn AudioStore>,
    config: ChatConfig,
}

impl ChatService {
    pub fn new(
        detector: Arc<dyn LanguageDetector>,
        translator: Arc<dyn Translator>,
        retriever: Arc<dyn KnowledgeRetriever>,
        generator: Arc<dyn AnswerGenerator>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        audio: Arc<dyn AudioStore>,
        config: ChatConfig,
    ) -> Self {
        Self {
            detector,
            translator,
            retriever,
            generator,
            synthesizer,
            audio,
            config,
        }
    }

    pub fn chat(&self, raw_query: Option<&str>) -> Result<ChatReply, DomainError> {
        let query = Query::parse(raw_query)?;

        let language = self.detector.detect(query.as_str())?;
        info!(language = %language, "Detected language");

        let question = self.translate_in(&query, &language)?;
        info!(query = %question, "Query asked");

        let passages = self.retriever.retrieve(&question)?;
        debug!(passages = passages.len(), "context retrieved");

        let answer = self.generator.generate(&question, &passages, &[])?;
        info!(response = %answer, "Generated response");

        let answer = self.translate_out(answer, &language)?;

        let voice = self.voice_for(&language);
        let (audio, audio_error) = match self.speak(&answer, &voice) {
            Ok(artifact) => (Some(artifact), None),
            Err(err) if self.config.allow_text_only => {
                warn!(error = %err, "audio synthesis failed, replying with text only");
                (None, Some(err.to_string()))
            }
            Err(err) => return Err(err),
        };

        Ok(ChatReply {
            answer,
            language,
            audio,
            audio_error,
        })
    }

    pub fn audio(&self) -> Arc<dyn AudioStore> {
        Arc::clone(&self.audio)
    }

    fn translate_in(&self, query: &Query, language: &LanguageCode) -> Result<String, DomainError> {
        if !language.is_punjabi() {
            return Ok(query.as_str().to_string());
        }
        self.translator.to_english(query.as_str(), language)
    }

    fn translate_out(&self, answer: String, language: &LanguageCode) -> Result<String, DomainError> {
        if !language.is_punjabi() {
            return Ok(answer);
        }
        self.translator.to_target_language(&answer, language)
    }

    /// Speak in the language of the returned text: Punjabi answers are
    /// translated back, everything else falls back to English when the
    /// synthesizer has no voice for the detected language.
    fn voice_for(&self, language: &LanguageCode) -> LanguageCode {
        if language.is_punjabi() || self.synthesizer.supports(language) {
            language.clone()
        } else {
            debug!(language = %language, "no voice for detected language, using English");
            LanguageCode::english()
        }
    }

    fn speak(&self, text: &str, voice: &LanguageCode) -> Result<AudioArtifact, DomainError> {
        let bytes = self.synthesizer.synthesize(text, voice)?;
        if bytes.is_empty() {
            return Err(DomainError::synthesis("synthesizer returned no audio"));
        }
        self.audio.save(&bytes).map_err(|err| match err {
            err @ DomainError::AudioSynthesisFailed(_) => err,
            other => DomainError::synthesis(format!("failed to store audio: {other}")),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::{Calls, Fakes};
    use super::*;
    use crate::domain::TranslationDirection;

    #[test]
    fn english_queries_skip_translation() {
        let fakes = Fakes::new(Some("en"));
        let service = fakes.service(ChatConfig::default());

        let reply = service.chat(Some("What services do you offer?")).unwrap();

        assert_eq!(Calls::get(&fakes.calls.translate), 0);
        assert_eq!(
            *fakes.seen_questions.lock(),
            vec![
                "What services do you offer?".to_string(),
                "What services do you offer?".to_string()
            ]
        );
        assert_eq!(
            reply.answer,
            "answer to What services do you offer? using 1 passages"
        );
        assert!(reply.audio.is_some());
    }

    #[test]
    fn punjabi_queries_are_translated_both_ways() {
        let fakes = Fakes::new(Some("pa"));
        let service = fakes.service(ChatConfig::default());

        let reply = service.chat(Some("ਤੁਸੀਂ ਕਿਹੜੀਆਂ ਸੇਵਾਵਾਂ ਦਿੰਦੇ ਹੋ?")).unwrap();

        assert_eq!(Calls::get(&fakes.calls.translate), 2);
        let english = "en(ਤੁਸੀਂ ਕਿਹੜੀਆਂ ਸੇਵਾਵਾਂ ਦਿੰਦੇ ਹੋ?)";
        assert_eq!(fakes.seen_questions.lock()[1], english);
        assert_eq!(
            reply.answer,
            format!("pa(answer to {english} using 1 passages)")
        );

        let stored = fakes.load(&reply.audio.unwrap().file_name).unwrap();
        assert!(String::from_utf8(stored).unwrap().starts_with("mp3[pa]"));
    }

    #[test]
    fn empty_query_touches_no_collaborator() {
        let fakes = Fakes::new(Some("en"));
        let service = fakes.service(ChatConfig::default());

        assert!(matches!(service.chat(Some("")), Err(DomainError::Validation(_))));
        assert!(matches!(service.chat(None), Err(DomainError::Validation(_))));
        assert_eq!(fakes.calls.total(), 0);
    }

    #[test]
    fn detection_failure_stops_before_retrieval() {
        let fakes = Fakes::new(None);
        let service = fakes.service(ChatConfig::default());

        assert!(matches!(
            service.chat(Some("12345")),
            Err(DomainError::DetectionFailed(_))
        ));
        assert_eq!(Calls::get(&fakes.calls.retrieve), 0);
        assert_eq!(Calls::get(&fakes.calls.generate), 0);
    }

    #[test]
    fn generation_failure_skips_synthesis() {
        let fakes = Fakes::new(Some("en")).with(|f| f.fail_generation = true);
        let service = fakes.service(ChatConfig::default());

        assert!(matches!(
            service.chat(Some("hello there")),
            Err(DomainError::GenerationFailed(_))
        ));
        assert_eq!(Calls::get(&fakes.calls.synthesize), 0);
    }

    #[test]
    fn outbound_translation_failure_is_terminal() {
        let fakes =
            Fakes::new(Some("pa")).with(|f| f.fail_translation = Some(TranslationDirection::Outbound));
        let service = fakes.service(ChatConfig::default());

        let err = service.chat(Some("ਸਤ ਸ੍ਰੀ ਅਕਾਲ")).unwrap_err();
        assert_eq!(err.public_message(), "Failed to translate response.");
        assert_eq!(Calls::get(&fakes.calls.synthesize), 0);
    }

    #[test]
    fn synthesis_failure_fails_request_by_default() {
        let fakes = Fakes::new(Some("en")).with(|f| f.fail_synthesis = true);
        let service = fakes.service(ChatConfig::default());

        assert!(matches!(
            service.chat(Some("hello there")),
            Err(DomainError::AudioSynthesisFailed(_))
        ));
    }

    #[test]
    fn synthesis_failure_can_degrade_to_text_only() {
        let fakes = Fakes::new(Some("en")).with(|f| f.fail_synthesis = true);
        let service = fakes.service(ChatConfig {
            allow_text_only: true,
        });

        let reply = service.chat(Some("hello there")).unwrap();
        assert!(reply.audio.is_none());
        assert!(reply.audio_error.unwrap().contains("tts unreachable"));
        assert!(!reply.answer.is_empty());
    }

    #[test]
    fn unsupported_voices_fall_back_to_english() {
        let fakes = Fakes::new(Some("fr"));
        let service = fakes.service(ChatConfig::default());

        let reply = service.chat(Some("Quels services offrez-vous ?")).unwrap();
        let stored = fakes.load(&reply.audio.unwrap().file_name).unwrap();
        assert!(String::from_utf8(stored).unwrap().starts_with("mp3[en]"));
        assert_eq!(reply.language.as_str(), "fr");
    }

    #[test]
    fn repeated_queries_give_identical_answers() {
        let fakes = Fakes::new(Some("en"));
        let service = fakes.service(ChatConfig::default());

        let first = service.chat(Some("What services do you offer?")).unwrap();
        let second = service.chat(Some("What services do you offer?")).unwrap();
        assert_eq!(first.answer, second.answer);
        assert_ne!(
            first.audio.unwrap().file_name,
            second.audio.unwrap().file_name
        );
    }
}
