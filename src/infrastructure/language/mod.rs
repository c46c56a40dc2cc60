//! Language identification backed by `whatlang`'s trigram model.
//!
//! `whatlang` has no random component, so the same text always yields the
//! same language.

use tracing::debug;
use whatlang::{Detector, Lang};

use crate::{
    application::services::LanguageDetector,
    domain::{DomainError, LanguageCode},
};

/// `whatlang` speaks ISO 639-3; the rest of the service speaks 639-1.
const ISO_639_1: &[(Lang, &str)] = &[
    (Lang::Epo, "eo"),
    (Lang::Eng, "en"),
    (Lang::Rus, "ru"),
    (Lang::Cmn, "zh"),
    (Lang::Spa, "es"),
    (Lang::Por, "pt"),
    (Lang::Ita, "it"),
    (Lang::Ben, "bn"),
    (Lang::Fra, "fr"),
    (Lang::Deu, "de"),
    (Lang::Ukr, "uk"),
    (Lang::Kat, "ka"),
    (Lang::Ara, "ar"),
    (Lang::Hin, "hi"),
    (Lang::Jpn, "ja"),
    (Lang::Heb, "he"),
    (Lang::Yid, "yi"),
    (Lang::Pol, "pl"),
    (Lang::Amh, "am"),
    (Lang::Jav, "jv"),
    (Lang::Kor, "ko"),
    (Lang::Nob, "no"),
    (Lang::Dan, "da"),
    (Lang::Swe, "sv"),
    (Lang::Fin, "fi"),
    (Lang::Tur, "tr"),
    (Lang::Nld, "nl"),
    (Lang::Hun, "hu"),
    (Lang::Ces, "cs"),
    (Lang::Ell, "el"),
    (Lang::Bul, "bg"),
    (Lang::Bel, "be"),
    (Lang::Mar, "mr"),
    (Lang::Kan, "kn"),
    (Lang::Ron, "ro"),
    (Lang::Slv, "sl"),
    (Lang::Hrv, "hr"),
    (Lang::Srp, "sr"),
    (Lang::Mkd, "mk"),
    (Lang::Lit, "lt"),
    (Lang::Lav, "lv"),
    (Lang::Est, "et"),
    (Lang::Tam, "ta"),
    (Lang::Vie, "vi"),
    (Lang::Urd, "ur"),
    (Lang::Tha, "th"),
    (Lang::Guj, "gu"),
    (Lang::Uzb, "uz"),
    (Lang::Pan, "pa"),
    (Lang::Aze, "az"),
    (Lang::Ind, "id"),
    (Lang::Tel, "te"),
    (Lang::Pes, "fa"),
    (Lang::Mal, "ml"),
    (Lang::Ori, "or"),
    (Lang::Mya, "my"),
    (Lang::Nep, "ne"),
    (Lang::Sin, "si"),
    (Lang::Khm, "km"),
    (Lang::Tuk, "tk"),
    (Lang::Aka, "ak"),
    (Lang::Zul, "zu"),
    (Lang::Sna, "sn"),
    (Lang::Afr, "af"),
    (Lang::Lat, "la"),
    (Lang::Slk, "sk"),
    (Lang::Cat, "ca"),
    (Lang::Tgl, "tl"),
    (Lang::Hye, "hy"),
];

fn to_iso_639_1(lang: Lang) -> LanguageCode {
    ISO_639_1
        .iter()
        .find(|(candidate, _)| *candidate == lang)
        .map(|(_, code)| LanguageCode::new(*code))
        .unwrap_or_else(|| LanguageCode::new(lang.code()))
}

/// Resolve a configured language name in either ISO 639-1 or 639-3 form.
fn parse_lang(code: &str) -> Option<Lang> {
    let code = code.trim().to_ascii_lowercase();
    ISO_639_1
        .iter()
        .find(|(_, short)| *short == code)
        .map(|(lang, _)| *lang)
        .or_else(|| Lang::from_code(&code))
}

pub struct WhatlangDetector {
    detector: Detector,
}

impl WhatlangDetector {
    pub fn new() -> Self {
        Self {
            detector: Detector::new(),
        }
    }

    /// Restrict detection to `codes`. An empty list means every language.
    pub fn with_allowlist(codes: &[String]) -> Result<Self, DomainError> {
        if codes.is_empty() {
            return Ok(Self::new());
        }

        let langs = codes
            .iter()
            .map(|code| {
                parse_lang(code).ok_or_else(|| {
                    DomainError::configuration(format!("unknown detector language `{code}`"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            detector: Detector::with_allowlist(langs),
        })
    }
}

impl Default for WhatlangDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Result<LanguageCode, DomainError> {
        let info = self
            .detector
            .detect(text)
            .ok_or_else(|| DomainError::detection("no features in text"))?;

        let code = to_iso_639_1(info.lang());
        debug!(
            language = %code,
            script = ?info.script(),
            confidence = info.confidence(),
            "language detected"
        );
        Ok(code)
    }
}
