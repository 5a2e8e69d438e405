//! Per-language link parsers
//!
//! Parsers extract raw link occurrences (target text, alias, 1-based line
//! and column) from a note body. Resolution to URIs happens later; a
//! parser only knows its syntax. Selection is a typed registry keyed by
//! the parser name, with extension-based defaults.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// How the link was written, which affects target resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
	/// `[[Target]]` / `![[Target]]`: vault-relative, extension optional
	Wiki,
	/// Everything else: paths and URLs taken literally
	Plain,
}

/// One link occurrence in a source file
#[derive(Debug, Clone, PartialEq)]
pub struct RawLink {
	pub target: String,
	pub name: String,
	pub line: u32,
	pub column: u32,
	pub kind: LinkKind,
}

pub trait Parser: Send + Sync {
	fn name(&self) -> &'static str;
	fn parse(&self, text: &str) -> Vec<RawLink>;
}

/// Select a parser: explicit name first, then file extension, `raw` as the
/// fallback for anything unrecognized
pub fn parser_for(explicit: Option<&str>, path: &Path) -> Option<&'static dyn Parser> {
	static MARKDOWN: MarkdownParser = MarkdownParser;
	static HTML: HtmlParser = HtmlParser;
	static RST: RstParser = RstParser;
	static RAW: RawParser = RawParser;

	if let Some(name) = explicit {
		return match name {
			"markdown" => Some(&MARKDOWN),
			"html" => Some(&HTML),
			"rst" => Some(&RST),
			"raw" => Some(&RAW),
			_ => None,
		};
	}
	Some(match crate::util::extension(path).as_deref() {
		Some("md") | Some("markdown") => &MARKDOWN,
		Some("html") | Some("htm") => &HTML,
		Some("rst") => &RST,
		_ => &RAW,
	})
}

/// True for the extensions the daemon routes through link sync
pub fn is_parseable_note(path: &Path) -> bool {
	matches!(
		crate::util::extension(path).as_deref(),
		Some("md") | Some("markdown") | Some("html") | Some("htm") | Some("rst")
	)
}

/// Tracks claimed character spans so overlapping patterns (an embed is
/// also a wiki link, a URL inside an inline link) emit one link only
struct SpanClaim {
	spans: Vec<(usize, usize)>,
}

impl SpanClaim {
	fn new() -> Self {
		SpanClaim { spans: Vec::new() }
	}

	fn claim(&mut self, start: usize, end: usize) -> bool {
		if self.spans.iter().any(|&(s, e)| start < e && s < end) {
			return false;
		}
		self.spans.push((start, end));
		true
	}
}

fn push_link(
	out: &mut Vec<RawLink>,
	claims: &mut SpanClaim,
	line_no: usize,
	start: usize,
	end: usize,
	target: &str,
	name: &str,
	kind: LinkKind,
) {
	let target = target.trim();
	if target.is_empty() || !claims.claim(start, end) {
		return;
	}
	out.push(RawLink {
		target: target.to_string(),
		name: name.trim().to_string(),
		line: (line_no + 1) as u32,
		column: (start + 1) as u32,
		kind,
	});
}

fn bare_url_pattern() -> &'static Regex {
	static RE: OnceLock<Regex> = OnceLock::new();
	RE.get_or_init(|| Regex::new(r#"https?://[^\s<>\)\]"']+"#).expect("valid pattern"))
}

pub struct MarkdownParser;

impl Parser for MarkdownParser {
	fn name(&self) -> &'static str {
		"markdown"
	}

	fn parse(&self, text: &str) -> Vec<RawLink> {
		static WIKI: OnceLock<Regex> = OnceLock::new();
		static INLINE: OnceLock<Regex> = OnceLock::new();
		static AUTO: OnceLock<Regex> = OnceLock::new();
		let wiki = WIKI.get_or_init(|| {
			Regex::new(r"!?\[\[([^\]\|]+)(?:\|([^\]]*))?\]\]").expect("valid pattern")
		});
		let inline = INLINE.get_or_init(|| {
			Regex::new(r"\[([^\]]*)\]\(([^()\s]+)\)").expect("valid pattern")
		});
		let auto = AUTO.get_or_init(|| Regex::new(r"<(https?://[^>]+)>").expect("valid pattern"));

		let mut out = Vec::new();
		for (line_no, line) in text.lines().enumerate() {
			let mut claims = SpanClaim::new();
			for caps in wiki.captures_iter(line) {
				let whole = caps.get(0).unwrap();
				let target = caps.get(1).map(|m| m.as_str()).unwrap_or("");
				let alias = caps.get(2).map(|m| m.as_str()).unwrap_or("");
				push_link(
					&mut out,
					&mut claims,
					line_no,
					whole.start(),
					whole.end(),
					target,
					alias,
					LinkKind::Wiki,
				);
			}
			for caps in inline.captures_iter(line) {
				let whole = caps.get(0).unwrap();
				let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
				let target = caps.get(2).map(|m| m.as_str()).unwrap_or("");
				push_link(
					&mut out,
					&mut claims,
					line_no,
					whole.start(),
					whole.end(),
					target,
					name,
					LinkKind::Plain,
				);
			}
			for caps in auto.captures_iter(line) {
				let whole = caps.get(0).unwrap();
				let target = caps.get(1).map(|m| m.as_str()).unwrap_or("");
				push_link(
					&mut out,
					&mut claims,
					line_no,
					whole.start(),
					whole.end(),
					target,
					"",
					LinkKind::Plain,
				);
			}
			for m in bare_url_pattern().find_iter(line) {
				push_link(
					&mut out,
					&mut claims,
					line_no,
					m.start(),
					m.end(),
					m.as_str(),
					"",
					LinkKind::Plain,
				);
			}
		}
		out
	}
}

pub struct HtmlParser;

impl Parser for HtmlParser {
	fn name(&self) -> &'static str {
		"html"
	}

	fn parse(&self, text: &str) -> Vec<RawLink> {
		static ATTR: OnceLock<Regex> = OnceLock::new();
		let attr = ATTR.get_or_init(|| {
			Regex::new(r#"(?:href|src)\s*=\s*["']([^"']+)["']"#).expect("valid pattern")
		});

		let mut out = Vec::new();
		for (line_no, line) in text.lines().enumerate() {
			let mut claims = SpanClaim::new();
			for caps in attr.captures_iter(line) {
				let whole = caps.get(0).unwrap();
				let target = caps.get(1).map(|m| m.as_str()).unwrap_or("");
				push_link(
					&mut out,
					&mut claims,
					line_no,
					whole.start(),
					whole.end(),
					target,
					"",
					LinkKind::Plain,
				);
			}
		}
		out
	}
}

pub struct RstParser;

impl Parser for RstParser {
	fn name(&self) -> &'static str {
		"rst"
	}

	fn parse(&self, text: &str) -> Vec<RawLink> {
		static INLINE: OnceLock<Regex> = OnceLock::new();
		static DIRECTIVE: OnceLock<Regex> = OnceLock::new();
		let inline = INLINE.get_or_init(|| {
			Regex::new(r"`([^`<]*)<([^>`]+)>`_{1,2}").expect("valid pattern")
		});
		let directive = DIRECTIVE.get_or_init(|| {
			Regex::new(r"^\.\.\s+_([^:]+):\s+(\S+)").expect("valid pattern")
		});

		let mut out = Vec::new();
		for (line_no, line) in text.lines().enumerate() {
			let mut claims = SpanClaim::new();
			for caps in inline.captures_iter(line) {
				let whole = caps.get(0).unwrap();
				let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
				let target = caps.get(2).map(|m| m.as_str()).unwrap_or("");
				push_link(
					&mut out,
					&mut claims,
					line_no,
					whole.start(),
					whole.end(),
					target,
					name,
					LinkKind::Plain,
				);
			}
			if let Some(caps) = directive.captures(line) {
				let whole = caps.get(0).unwrap();
				let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
				let target = caps.get(2).map(|m| m.as_str()).unwrap_or("");
				push_link(
					&mut out,
					&mut claims,
					line_no,
					whole.start(),
					whole.end(),
					target,
					name,
					LinkKind::Plain,
				);
			}
			for m in bare_url_pattern().find_iter(line) {
				push_link(
					&mut out,
					&mut claims,
					line_no,
					m.start(),
					m.end(),
					m.as_str(),
					"",
					LinkKind::Plain,
				);
			}
		}
		out
	}
}

/// Fallback parser: URLs only
pub struct RawParser;

impl Parser for RawParser {
	fn name(&self) -> &'static str {
		"raw"
	}

	fn parse(&self, text: &str) -> Vec<RawLink> {
		let mut out = Vec::new();
		for (line_no, line) in text.lines().enumerate() {
			let mut claims = SpanClaim::new();
			for m in bare_url_pattern().find_iter(line) {
				push_link(
					&mut out,
					&mut claims,
					line_no,
					m.start(),
					m.end(),
					m.as_str(),
					"",
					LinkKind::Plain,
				);
			}
		}
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_markdown_wiki_links_and_embeds() {
		let links = MarkdownParser.parse("[[B]]\n![[img.png]]\n");
		assert_eq!(links.len(), 2);
		assert_eq!(links[0].target, "B");
		assert_eq!(links[0].line, 1);
		assert_eq!(links[0].column, 1);
		assert_eq!(links[0].kind, LinkKind::Wiki);
		assert_eq!(links[1].target, "img.png");
		assert_eq!(links[1].line, 2);
	}

	#[test]
	fn test_markdown_alias() {
		let links = MarkdownParser.parse("see [[Target Note|the note]]\n");
		assert_eq!(links.len(), 1);
		assert_eq!(links[0].target, "Target Note");
		assert_eq!(links[0].name, "the note");
		assert_eq!(links[0].column, 5);
	}

	#[test]
	fn test_markdown_inline_and_bare() {
		let links =
			MarkdownParser.parse("[docs](./guide.md) and https://example.org/page\n");
		assert_eq!(links.len(), 2);
		assert_eq!(links[0].target, "./guide.md");
		assert_eq!(links[0].name, "docs");
		assert_eq!(links[1].target, "https://example.org/page");
	}

	#[test]
	fn test_markdown_autolink_not_double_counted() {
		let links = MarkdownParser.parse("<https://example.org>\n");
		assert_eq!(links.len(), 1);
		assert_eq!(links[0].target, "https://example.org");
	}

	#[test]
	fn test_markdown_parse_is_deterministic() {
		let text = "[[A]] then [b](c.md) then https://x.example\n";
		assert_eq!(MarkdownParser.parse(text), MarkdownParser.parse(text));
	}

	#[test]
	fn test_html_attributes() {
		let links =
			HtmlParser.parse("<a href=\"https://example.org\">x</a>\n<img src='pic.png'>\n");
		assert_eq!(links.len(), 2);
		assert_eq!(links[0].target, "https://example.org");
		assert_eq!(links[1].target, "pic.png");
		assert_eq!(links[1].line, 2);
	}

	#[test]
	fn test_rst_inline_and_directive() {
		let links = RstParser.parse("see `guide <./guide.rst>`_\n.. _home: https://example.org\n");
		assert_eq!(links.len(), 2);
		assert_eq!(links[0].target, "./guide.rst");
		assert_eq!(links[0].name, "guide");
		assert_eq!(links[1].target, "https://example.org");
		assert_eq!(links[1].name, "home");
	}

	#[test]
	fn test_raw_urls_only() {
		let links = RawParser.parse("plain text [[NotAWikiLink]] https://example.org/x\n");
		assert_eq!(links.len(), 1);
		assert_eq!(links[0].target, "https://example.org/x");
	}

	#[test]
	fn test_parser_selection_by_extension() {
		assert_eq!(parser_for(None, Path::new("a.md")).unwrap().name(), "markdown");
		assert_eq!(parser_for(None, Path::new("a.html")).unwrap().name(), "html");
		assert_eq!(parser_for(None, Path::new("a.rst")).unwrap().name(), "rst");
		assert_eq!(parser_for(None, Path::new("a.bin")).unwrap().name(), "raw");
		assert_eq!(parser_for(Some("raw"), Path::new("a.md")).unwrap().name(), "raw");
		assert!(parser_for(Some("nope"), Path::new("a.md")).is_none());
	}
}

// vim: ts=4
