//! Translation with provider fallback
//!
//! Providers are tried in order: the unofficial Google endpoint, a
//! LibreTranslate instance, then a built-in word dictionary. Any failure
//! moves on to the next provider. The dictionary never fails, so a
//! request always produces some answer.

use crate::config::TranslateConfig;
use crate::services::{require_max_len, ServiceError, ServiceResult};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

const MAX_TEXT_LENGTH: usize = 5000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: String,
    pub from_language: String,
    pub to_language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    pub translated_text: String,
    pub confidence: f64,
    pub service: String,
}

/// One translation backend
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<TranslateResponse>;
}

/// `translate_a/single?client=gtx`
pub struct GoogleProvider {
    client: reqwest::Client,
    url: String,
}

impl GoogleProvider {
    pub const CONFIDENCE: f64 = 0.9;

    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl TranslationProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<TranslateResponse> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("client", "gtx"),
                ("sl", from),
                ("tl", to),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await
            .context("Google request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("Google returned {}", response.status()));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .context("Google returned malformed JSON")?;

        Ok(TranslateResponse {
            translated_text: parse_google_body(&body)?,
            confidence: Self::CONFIDENCE,
            service: self.name().to_string(),
        })
    }
}

/// The body is `[[["segment", "source", ...], ...], ...]`; segments are concatenated.
fn parse_google_body(body: &serde_json::Value) -> Result<String> {
    let segments = body
        .get(0)
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("Unexpected Google response shape"))?;

    let text: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(|s| s.as_str()))
        .collect();
    if text.trim().is_empty() {
        return Err(anyhow!("Google returned an empty translation"));
    }
    Ok(text)
}

/// `POST {url}/translate`
pub struct LibreTranslateProvider {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct LibreTranslateBody<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LibreTranslateReply {
    translated_text: String,
}

impl LibreTranslateProvider {
    pub const CONFIDENCE: f64 = 0.8;

    pub fn new(client: reqwest::Client, url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl TranslationProvider for LibreTranslateProvider {
    fn name(&self) -> &'static str {
        "libretranslate"
    }

    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<TranslateResponse> {
        let url = format!("{}/translate", self.url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&LibreTranslateBody {
                q: text,
                source: from,
                target: to,
                format: "text",
                api_key: self.api_key.as_deref(),
            })
            .send()
            .await
            .context("LibreTranslate request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("LibreTranslate returned {}", response.status()));
        }
        let reply: LibreTranslateReply = response
            .json()
            .await
            .context("LibreTranslate returned malformed JSON")?;
        if reply.translated_text.trim().is_empty() {
            return Err(anyhow!("LibreTranslate returned an empty translation"));
        }

        Ok(TranslateResponse {
            translated_text: reply.translated_text,
            confidence: Self::CONFIDENCE,
            service: self.name().to_string(),
        })
    }
}

type WordTable = HashMap<&'static str, &'static str>;

/// English <-> Spanish/French/German word lists. Reverse directions are derived.
static DICTIONARY: Lazy<HashMap<(&'static str, &'static str), WordTable>> = Lazy::new(|| {
    let pairs: [(&str, &[(&str, &str)]); 3] = [
        (
            "es",
            &[
                ("hello", "hola"),
                ("goodbye", "adiós"),
                ("thanks", "gracias"),
                ("yes", "sí"),
                ("no", "no"),
                ("welcome", "bienvenido"),
                ("news", "noticias"),
                ("event", "evento"),
                ("events", "eventos"),
                ("team", "equipo"),
                ("contact", "contacto"),
                ("home", "inicio"),
                ("about", "acerca"),
                ("us", "nosotros"),
                ("the", "el"),
                ("and", "y"),
                ("our", "nuestro"),
                ("question", "pregunta"),
                ("questions", "preguntas"),
                ("answer", "respuesta"),
                ("world", "mundo"),
                ("good", "bueno"),
                ("morning", "mañana"),
                ("day", "día"),
                ("post", "publicación"),
            ],
        ),
        (
            "fr",
            &[
                ("hello", "bonjour"),
                ("goodbye", "au revoir"),
                ("thanks", "merci"),
                ("yes", "oui"),
                ("no", "non"),
                ("welcome", "bienvenue"),
                ("news", "actualités"),
                ("event", "événement"),
                ("events", "événements"),
                ("team", "équipe"),
                ("contact", "contact"),
                ("home", "accueil"),
                ("the", "le"),
                ("and", "et"),
                ("our", "notre"),
                ("question", "question"),
                ("answer", "réponse"),
                ("world", "monde"),
                ("good", "bon"),
                ("day", "jour"),
            ],
        ),
        (
            "de",
            &[
                ("hello", "hallo"),
                ("goodbye", "auf wiedersehen"),
                ("thanks", "danke"),
                ("yes", "ja"),
                ("no", "nein"),
                ("welcome", "willkommen"),
                ("news", "nachrichten"),
                ("event", "veranstaltung"),
                ("team", "team"),
                ("contact", "kontakt"),
                ("home", "startseite"),
                ("the", "die"),
                ("and", "und"),
                ("our", "unser"),
                ("question", "frage"),
                ("answer", "antwort"),
                ("world", "welt"),
                ("good", "gut"),
                ("day", "tag"),
            ],
        ),
    ];

    let mut tables = HashMap::new();
    for (lang, words) in pairs {
        let forward: WordTable = words.iter().copied().collect();
        let reverse: WordTable = words.iter().map(|(en, other)| (*other, *en)).collect();
        tables.insert(("en", lang), forward);
        tables.insert((lang, "en"), reverse);
    }
    tables
});

/// Word-by-word substitution from the built-in tables
pub struct DictionaryProvider;

impl DictionaryProvider {
    pub const MAX_CONFIDENCE: f64 = 0.5;
    pub const MIN_CONFIDENCE: f64 = 0.1;

    /// Never fails; unknown words and unsupported pairs pass through unchanged
    pub fn substitute(text: &str, from: &str, to: &str) -> TranslateResponse {
        let table = DICTIONARY.get(&(base_language(from), base_language(to)));

        let mut total = 0usize;
        let mut known = 0usize;
        let words: Vec<String> = text
            .split_whitespace()
            .map(|token| {
                let (lead, core, trail) = split_punctuation(token);
                if core.is_empty() {
                    return token.to_string();
                }
                total += 1;
                let lower = core.to_lowercase();
                match table.and_then(|t| t.get(lower.as_str())) {
                    Some(translated) => {
                        known += 1;
                        format!("{}{}{}", lead, match_case(core, translated), trail)
                    }
                    None => token.to_string(),
                }
            })
            .collect();

        let ratio = if total == 0 {
            0.0
        } else {
            known as f64 / total as f64
        };
        TranslateResponse {
            translated_text: words.join(" "),
            confidence: (Self::MAX_CONFIDENCE * ratio).max(Self::MIN_CONFIDENCE),
            service: "dictionary".to_string(),
        }
    }
}

#[async_trait]
impl TranslationProvider for DictionaryProvider {
    fn name(&self) -> &'static str {
        "dictionary"
    }

    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<TranslateResponse> {
        Ok(Self::substitute(text, from, to))
    }
}

/// `pt-BR` -> `pt`
fn base_language(code: &str) -> &str {
    code.split(['-', '_']).next().unwrap_or(code)
}

fn split_punctuation(token: &str) -> (&str, &str, &str) {
    let start = token
        .char_indices()
        .find(|(_, c)| c.is_alphanumeric())
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    let end = token
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_alphanumeric())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(start);
    (&token[..start], &token[start..end], &token[end..])
}

fn match_case(original: &str, translated: &str) -> String {
    let mut chars = original.chars();
    let first_upper = chars.next().map_or(false, char::is_uppercase);
    if first_upper && original.chars().count() > 1 && original.chars().all(|c| !c.is_lowercase()) {
        return translated.to_uppercase();
    }
    if first_upper {
        let mut out = translated.chars();
        return match out.next() {
            Some(first) => first.to_uppercase().chain(out).collect(),
            None => String::new(),
        };
    }
    translated.to_string()
}

pub struct TranslationService {
    providers: Vec<Box<dyn TranslationProvider>>,
}

impl TranslationService {
    /// Google, then LibreTranslate, then the dictionary
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_providers(vec![
            Box::new(GoogleProvider::new(client.clone(), config.google_url.clone())),
            Box::new(LibreTranslateProvider::new(
                client,
                config.libretranslate_url.clone(),
                config.libretranslate_api_key.clone(),
            )),
            Box::new(DictionaryProvider),
        ]))
    }

    pub fn with_providers(providers: Vec<Box<dyn TranslationProvider>>) -> Self {
        Self { providers }
    }

    pub async fn translate(&self, request: TranslateRequest) -> ServiceResult<TranslateResponse> {
        if request.text.trim().is_empty() {
            return Err(ServiceError::validation("Text cannot be empty"));
        }
        require_max_len("Text", &request.text, MAX_TEXT_LENGTH)?;

        let from = request.from_language.trim().to_lowercase();
        let to = request.to_language.trim().to_lowercase();
        if from.is_empty() || to.is_empty() {
            return Err(ServiceError::validation("Source and target languages are required"));
        }

        if from == to {
            return Ok(TranslateResponse {
                translated_text: request.text,
                confidence: 1.0,
                service: "none".to_string(),
            });
        }

        for provider in &self.providers {
            match provider.translate(&request.text, &from, &to).await {
                Ok(response) => {
                    tracing::debug!(service = provider.name(), %from, %to, "Translated");
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!(service = provider.name(), error = %e, "Translation provider failed, trying next");
                }
            }
        }

        Ok(DictionaryProvider::substitute(&request.text, &from, &to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, routing::get, routing::post, Json, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Failing(Arc<AtomicUsize>);

    #[async_trait]
    impl TranslationProvider for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn translate(&self, _: &str, _: &str, _: &str) -> Result<TranslateResponse> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("network down"))
        }
    }

    fn request(text: &str, from: &str, to: &str) -> TranslateRequest {
        TranslateRequest {
            text: text.into(),
            from_language: from.into(),
            to_language: to.into(),
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_falls_through_to_dictionary() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = TranslationService::with_providers(vec![
            Box::new(Failing(calls.clone())),
            Box::new(Failing(calls.clone())),
            Box::new(DictionaryProvider),
        ]);

        let response = service.translate(request("Hello world!", "en", "es")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(response.service, "dictionary");
        assert_eq!(response.translated_text, "Hola mundo!");
        assert_eq!(response.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_same_language_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = TranslationService::with_providers(vec![Box::new(Failing(calls.clone()))]);

        let response = service.translate(request("Bonjour", "FR", "fr")).await.unwrap();
        assert_eq!(response.translated_text, "Bonjour");
        assert_eq!(response.confidence, 1.0);
        assert_eq!(response.service, "none");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let service = TranslationService::with_providers(vec![Box::new(DictionaryProvider)]);
        let err = service.translate(request("   ", "en", "es")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_exhausted_chain_still_answers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = TranslationService::with_providers(vec![Box::new(Failing(calls))]);
        let response = service.translate(request("hello", "en", "de")).await.unwrap();
        assert_eq!(response.translated_text, "hallo");
        assert_eq!(response.service, "dictionary");
    }

    #[test]
    fn test_dictionary_confidence_scales() {
        let half = DictionaryProvider::substitute("hello stranger", "en", "fr");
        assert_eq!(half.translated_text, "bonjour stranger");
        assert!((half.confidence - 0.25).abs() < f64::EPSILON);

        let none = DictionaryProvider::substitute("xyzzy plugh", "en", "fr");
        assert_eq!(none.translated_text, "xyzzy plugh");
        assert_eq!(none.confidence, DictionaryProvider::MIN_CONFIDENCE);

        let unsupported = DictionaryProvider::substitute("hello", "ja", "ko");
        assert_eq!(unsupported.translated_text, "hello");
        assert_eq!(unsupported.confidence, DictionaryProvider::MIN_CONFIDENCE);
    }

    #[test]
    fn test_dictionary_reverse_and_case() {
        let response = DictionaryProvider::substitute("GRACIAS, equipo.", "es-MX", "en");
        assert_eq!(response.translated_text, "THANKS, team.");
    }

    #[test]
    fn test_parse_google_body() {
        let body = serde_json::json!([[["Hola ", "Hello ", null], ["mundo", "world", null]], null, "en"]);
        assert_eq!(parse_google_body(&body).unwrap(), "Hola mundo");
        assert!(parse_google_body(&serde_json::json!({"error": 1})).is_err());
        assert!(parse_google_body(&serde_json::json!([[]])).is_err());
    }

    #[tokio::test]
    async fn test_google_provider_against_local_server() {
        let router = Router::new().route(
            "/translate_a/single",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q.get("client").map(String::as_str), Some("gtx"));
                Json(serde_json::json!([[[format!("<{}>", q["q"]), q["q"], null]]]))
            }),
        );
        let base = serve(router).await;

        let provider = GoogleProvider::new(
            reqwest::Client::new(),
            format!("{}/translate_a/single", base),
        );
        let response = provider.translate("hi", "en", "es").await.unwrap();
        assert_eq!(response.translated_text, "<hi>");
        assert_eq!(response.confidence, GoogleProvider::CONFIDENCE);
        assert_eq!(response.service, "google");
    }

    #[tokio::test]
    async fn test_libretranslate_provider_and_error_status() {
        let router = Router::new()
            .route(
                "/ok/translate",
                post(|Json(body): Json<serde_json::Value>| async move {
                    assert_eq!(body["format"], "text");
                    assert_eq!(body["api_key"], "k");
                    Json(serde_json::json!({"translatedText": "Hallo"}))
                }),
            )
            .route(
                "/down/translate",
                post(|| async { axum::http::StatusCode::SERVICE_UNAVAILABLE }),
            );
        let base = serve(router).await;

        let ok = LibreTranslateProvider::new(
            reqwest::Client::new(),
            format!("{}/ok/", base),
            Some("k".into()),
        );
        let response = ok.translate("Hello", "en", "de").await.unwrap();
        assert_eq!(response.translated_text, "Hallo");
        assert_eq!(response.service, "libretranslate");

        let down = LibreTranslateProvider::new(reqwest::Client::new(), format!("{}/down", base), None);
        assert!(down.translate("Hello", "en", "de").await.is_err());
    }
}
