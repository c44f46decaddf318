use std::future::Future;
use std::time::Duration;

use scraper::Html;

use crate::BoxError;

const TOTAL_ATTEMPTS: usize = 5;
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

pub(crate) enum FetchFailure {
    Status(u16),
    Transport(String),
}

/// Runs `request` up to the attempt bound. A transport failure moves straight
/// to the next attempt; a non-success status sleeps the fixed backoff first.
pub(crate) async fn retry_request<T, Fut>(
    url: &str,
    backoff: Duration,
    mut request: impl FnMut() -> Fut,
) -> Option<T>
where
    Fut: Future<Output = Result<T, FetchFailure>>,
{
    for attempt in 1..=TOTAL_ATTEMPTS {
        match request().await {
            Ok(value) => return Some(value),
            Err(FetchFailure::Status(code)) => {
                log::warn!(
                    "GET {} returned status {} (attempt {}/{})",
                    url,
                    code,
                    attempt,
                    TOTAL_ATTEMPTS
                );
                smol::Timer::after(backoff).await;
            }
            Err(FetchFailure::Transport(err)) => {
                log::warn!(
                    "GET {} failed: {} (attempt {}/{})",
                    url,
                    err,
                    attempt,
                    TOTAL_ATTEMPTS
                );
            }
        }
    }
    None
}

/// Retrieves one URL and turns its body into channel-ready items. Retry
/// exhaustion is an error for this source only; callers log it and move on.
pub async fn fetch_items(url: &str) -> Result<Vec<String>, BoxError> {
    let request = || async move {
        match surf::get(url).await {
            Ok(response) if response.status().is_success() => Ok(response),
            Ok(response) => Err(FetchFailure::Status(response.status() as u16)),
            Err(err) => Err(FetchFailure::Transport(err.to_string())),
        }
    };
    let mut response = match retry_request(url, RETRY_BACKOFF, request).await {
        Some(response) => response,
        None => {
            return Err(format!(
                "no successful response from {} after {} attempts",
                url, TOTAL_ATTEMPTS
            )
            .into())
        }
    };
    let is_html = response
        .content_type()
        .map(|mime| mime.to_string().contains("text/html"))
        .unwrap_or(false);
    let body = response.body_string().await?;
    let body = html_escape::decode_html_entities(&body);
    Ok(extract_items(&body, is_html))
}

/// Splits a fetched body into items. HTML bodies contribute their text-node
/// payloads as units; anything else contributes its lines. Units then pass
/// the character-class check and the sentence/phrase split.
pub fn extract_items(body: &str, is_html: bool) -> Vec<String> {
    let mut items = Vec::new();
    if is_html {
        let document = Html::parse_document(body);
        for text in document.root_element().text() {
            if valid_html_unit(text) {
                split_unit(text, &mut items);
            }
        }
    } else {
        for line in body.split('\n') {
            if valid_plain_unit(line) {
                split_unit(line, &mut items);
            }
        }
    }
    items
}

fn allowed_char(c: char) -> bool {
    c.is_alphanumeric()
        || matches!(
            c,
            '.' | ',' | ';' | ':' | '!' | '?' | '\'' | '"' | '-' | ' '
        )
}

// The two branches check opposite directions on purpose: an HTML text node is
// dropped when anything outside the allowed set appears, while a raw line is
// kept only when something outside the set appears. See DESIGN.md.
fn valid_html_unit(unit: &str) -> bool {
    unit.chars().all(allowed_char)
}

fn valid_plain_unit(unit: &str) -> bool {
    unit.chars().any(|c| !allowed_char(c))
}

/// Emits every non-empty phrase of every non-empty sentence, and the sentence
/// itself. A sentence without a comma therefore appears twice.
fn split_unit(unit: &str, items: &mut Vec<String>) {
    for sentence in unit.split('.') {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        for phrase in sentence.split(',') {
            let phrase = phrase.trim();
            if !phrase.is_empty() {
                items.push(phrase.to_string());
            }
        }
        items.push(sentence.to_string());
    }
}

#[test]
fn retry_gives_up_after_five_status_failures() {
    let calls = std::cell::Cell::new(0usize);
    let outcome: Option<()> = futures_lite::future::block_on(retry_request(
        "http://example.test/",
        Duration::ZERO,
        || {
            calls.set(calls.get() + 1);
            async { Err(FetchFailure::Status(503)) }
        },
    ));
    assert!(outcome.is_none());
    assert_eq!(calls.get(), 5);
}

#[test]
fn retry_counts_transport_failures_against_the_bound() {
    let calls = std::cell::Cell::new(0usize);
    let outcome: Option<()> = futures_lite::future::block_on(retry_request(
        "http://example.test/",
        Duration::ZERO,
        || {
            calls.set(calls.get() + 1);
            async { Err(FetchFailure::Transport("connection refused".to_string())) }
        },
    ));
    assert!(outcome.is_none());
    assert_eq!(calls.get(), 5);
}

#[test]
fn retry_returns_the_first_success() {
    let calls = std::cell::Cell::new(0usize);
    let outcome = futures_lite::future::block_on(retry_request(
        "http://example.test/",
        Duration::ZERO,
        || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(FetchFailure::Status(500))
                } else {
                    Ok(n)
                }
            }
        },
    ));
    assert_eq!(outcome, Some(3));
}

#[test]
fn html_units_outside_the_allowed_set_are_dropped() {
    let html = "<html><body><p>Good clean text</p><div>bad text with @symbol</div></body></html>";
    let items = extract_items(html, true);
    assert!(items.contains(&"Good clean text".to_string()));
    assert!(!items.iter().any(|item| item.contains('@')));
}

#[test]
fn plain_units_need_a_character_outside_the_allowed_set() {
    let body = "clean line without markers\nline with marker @here";
    let items = extract_items(body, false);
    assert!(!items.iter().any(|item| item.contains("clean line")));
    assert!(items.contains(&"line with marker @here".to_string()));
}

#[test]
fn sentences_and_their_phrases_are_both_emitted() {
    let items = extract_items("alpha, beta. gamma @x", false);
    assert_eq!(
        items,
        vec!["alpha", "beta", "alpha, beta", "gamma @x", "gamma @x"]
    );
}
