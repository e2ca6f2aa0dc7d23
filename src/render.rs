//! The single HTML page, with or without an answer.

use askama::Template;
use pulldown_cmark::{html, Event, Options, Parser};

/// How an answer is placed into the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnswerFormat {
    /// Escaped, whitespace preserved.
    #[default]
    Text,
    /// Converted from Markdown to HTML.
    Markdown,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage<'a> {
    pub prompt: Option<&'a str>,
    pub answer_text: Option<String>,
    pub answer_html: Option<String>,
    pub error: Option<String>,
}

impl<'a> IndexPage<'a> {
    pub fn empty() -> Self {
        Self {
            prompt: None,
            answer_text: None,
            answer_html: None,
            error: None,
        }
    }

    pub fn answered(prompt: &'a str, answer: &str, format: AnswerFormat) -> Self {
        let (answer_text, answer_html) = match format {
            AnswerFormat::Text => (Some(answer.to_string()), None),
            AnswerFormat::Markdown => (None, Some(markdown_to_html(answer))),
        };
        Self {
            prompt: Some(prompt),
            answer_text,
            answer_html,
            error: None,
        }
    }

    pub fn failed(prompt: &'a str, error: String) -> Self {
        Self {
            prompt: Some(prompt),
            answer_text: None,
            answer_html: None,
            error: Some(error),
        }
    }
}

/// Renders Markdown to HTML. Raw HTML in the source is emitted as escaped
/// text, so model output cannot inject markup.
pub fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
