//! DeepL HTTP backend.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::{TranslateError, TranslationBackend};

/// Request body of `POST /v2/translate`.
#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    /// Texts to translate (always one here).
    text: [&'a str; 1],
    /// Uppercase DeepL target language code.
    target_lang: String,
    /// `default`, `more`, `less`, `prefer_more` or `prefer_less`.
    formality: &'a str,
    /// Keep punctuation and casing as in the source.
    preserve_formatting: bool,
}

/// Response body of `POST /v2/translate`.
#[derive(Debug, Deserialize)]
struct TranslateResponse {
    /// One entry per requested text.
    translations: Vec<Translation>,
}

/// One translated text.
#[derive(Debug, Deserialize)]
struct Translation {
    /// Translated text.
    text: String,
}

/// What: Map a locale directory name to a DeepL target language code.
///
/// Details:
/// - DeepL requires a regional variant for English and Portuguese;
///   `en` becomes `EN-US` and `pt` becomes `PT-PT`.
/// - `pt_BR` style locales are normalised to `PT-BR`.
#[must_use]
pub fn target_language(locale: &str) -> String {
    let normalised = locale.replace('_', "-").to_ascii_uppercase();
    match normalised.as_str() {
        "EN" => "EN-US".to_string(),
        "PT" => "PT-PT".to_string(),
        _ => normalised,
    }
}

/// What: Translation backend calling the DeepL REST API.
#[derive(Debug, Clone)]
pub struct DeepLBackend {
    client: reqwest::Client,
    api_url: String,
    auth_key: String,
    formality: String,
    preserve_formatting: bool,
}

impl DeepLBackend {
    /// What: Backend for `api_url` authenticating with `auth_key`.
    ///
    /// Inputs:
    /// - `formality`: Passed through as DeepL's `formality` parameter
    /// - `preserve_formatting`: Passed through as DeepL's `preserve_formatting`
    #[must_use]
    pub fn new(
        api_url: impl Into<String>,
        auth_key: impl Into<String>,
        formality: impl Into<String>,
        preserve_formatting: bool,
    ) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("transwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_url: api_url.into(),
            auth_key: auth_key.into(),
            formality: formality.into(),
            preserve_formatting,
        }
    }

    /// Send one translation request.
    async fn request(&self, text: &str, target_locale: &str) -> Result<String, TranslateError> {
        let body = TranslateRequest {
            text: [text],
            target_lang: target_language(target_locale),
            formality: &self.formality,
            preserve_formatting: self.preserve_formatting,
        };
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("DeepL-Auth-Key {}", self.auth_key))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let preview: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            return Err(TranslateError::Status {
                status: status.as_u16(),
                body: preview,
            });
        }
        let parsed: TranslateResponse = response.json().await?;
        let first = parsed
            .translations
            .into_iter()
            .next()
            .ok_or(TranslateError::EmptyResponse)?;
        Ok(first.text)
    }
}

impl TranslationBackend for DeepLBackend {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        target_locale: &'a str,
    ) -> BoxFuture<'a, Result<String, TranslateError>> {
        Box::pin(self.request(text, target_locale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: Locale names map to DeepL codes with regional defaults.
    fn target_language_codes() {
        assert_eq!(target_language("en"), "EN-US");
        assert_eq!(target_language("pt"), "PT-PT");
        assert_eq!(target_language("pt_BR"), "PT-BR");
        assert_eq!(target_language("de"), "DE");
        assert_eq!(target_language("en-GB"), "EN-GB");
    }

    #[test]
    /// What: The request body uses DeepL's field names.
    fn request_body_shape() {
        let body = TranslateRequest {
            text: ["Hello"],
            target_lang: target_language("nl"),
            formality: "less",
            preserve_formatting: true,
        };
        let value = serde_json::to_value(&body).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "text": ["Hello"],
                "target_lang": "NL",
                "formality": "less",
                "preserve_formatting": true
            })
        );
    }

    #[test]
    /// What: Only the translated text is read from a response.
    fn response_reads_translated_text() {
        let parsed: TranslateResponse = serde_json::from_str(
            r#"{"translations": [{"detected_source_language": "EN", "text": "Hallo"}]}"#,
        )
        .expect("deserialize");
        let texts: Vec<&str> = parsed.translations.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["Hallo"]);
    }
}
