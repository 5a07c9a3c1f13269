use crate::config::Config;
use crate::paper::{Paper, SourceKind};
use crate::search::SearchSession;
use crate::zotero::{Collection, ExportSummary};

const MAX_LISTED_AUTHORS: usize = 3;
const ABSTRACT_PREVIEW_CHARS: usize = 300;

/// Collapse every whitespace run, newlines included, into one space so the text stays on
/// its heading or list line.
fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Paper title as Markdown link text: single line, with brackets and backslashes escaped.
fn link_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in single_line(title).chars() {
        if matches!(c, '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn source_label(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::SemanticScholar => "Semantic Scholar",
        SourceKind::Arxiv => "arXiv",
    }
}

fn format_authors(authors: &[String]) -> String {
    match authors.len() {
        0 => "Unknown authors".to_string(),
        n if n <= MAX_LISTED_AUTHORS => authors.join(", "),
        n => format!(
            "{} +{} more",
            authors[..MAX_LISTED_AUTHORS].join(", "),
            n - MAX_LISTED_AUTHORS
        ),
    }
}

/// Score column value: two decimals, or `-` when the paper was never ranked.
pub fn format_score(paper: &Paper) -> String {
    paper
        .relevance
        .score()
        .map(|s| format!("{s:.2}"))
        .unwrap_or_else(|| "-".to_string())
}

/// Numbered result list. Numbers are the 1-based positions accepted by `push --indices`.
pub fn format_results(session: &SearchSession, show_abstracts: bool) -> String {
    let mut out = format!("# Results: {}\n\n", single_line(&session.query));

    if session.effective_query != session.query {
        out.push_str(&format!(
            "Searched as: {}\n\n",
            single_line(&session.effective_query)
        ));
    }

    if session.results.is_empty() {
        out.push_str("No papers found.\n");
        return out;
    }

    for (i, paper) in session.results.iter().enumerate() {
        format_paper(i + 1, paper, show_abstracts, &mut out);
    }

    out.push_str(&format!(
        "{} papers. Push with `paper-finder push --indices 1,2,3`.\n",
        session.results.len()
    ));
    out
}

fn format_paper(number: usize, paper: &Paper, show_abstract: bool, out: &mut String) {
    let title = if paper.title.trim().is_empty() {
        "(untitled)".to_string()
    } else {
        link_title(&paper.title)
    };
    match paper.url.as_deref() {
        Some(url) => out.push_str(&format!("{number}. [{title}]({url})\n")),
        None => out.push_str(&format!("{number}. {title}\n")),
    }

    let year = paper.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".to_string());
    let mut meta = vec![
        format_authors(&paper.authors),
        year,
        source_label(paper.source).to_string(),
        format!("{} citations", paper.citations),
        format!("score {}", format_score(paper)),
    ];
    if !paper.venue.is_empty() {
        meta.insert(2, paper.venue.clone());
    }
    out.push_str(&format!("   {}\n", meta.join(" · ")));

    if let Some(pdf) = paper.pdf_url.as_deref().filter(|_| paper.has_pdf()) {
        out.push_str(&format!("   PDF: {pdf}\n"));
    }

    if show_abstract && !paper.abstract_text.is_empty() {
        let preview: String = paper.abstract_text.chars().take(ABSTRACT_PREVIEW_CHARS).collect();
        let ellipsis = if paper.abstract_text.chars().count() > ABSTRACT_PREVIEW_CHARS {
            "..."
        } else {
            ""
        };
        out.push_str(&format!("   > {}{ellipsis}\n", single_line(&preview)));
    }
    out.push('\n');
}

pub fn format_collections(collections: &[Collection]) -> String {
    if collections.is_empty() {
        return "No collections found.\n".to_string();
    }
    let mut out = String::from("| Key | Name | Parent |\n|-----|------|--------|\n");
    for c in collections {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            c.key,
            c.name.replace('|', "\\|"),
            c.parent.as_deref().unwrap_or("-")
        ));
    }
    out
}

pub fn format_status(config: &Config) -> String {
    let mut out = String::from("| Component | Status | Details |\n|-----------|--------|---------|\n");

    if config.has_ai() {
        out.push_str(&format!(
            "| OpenAI | Configured | {} / {} |\n",
            config.chat_model, config.embedding_model
        ));
    } else {
        out.push_str("| OpenAI | Not configured | Set OPENAI_API_KEY |\n");
    }

    match (config.has_reference_manager(), config.ref_user_id.as_deref()) {
        (true, Some(id)) => out.push_str(&format!(
            "| Zotero | Configured | {}/{id} |\n",
            config.ref_library_type.path_segment()
        )),
        _ => out.push_str("| Zotero | Not configured | Set ZOTERO_API_KEY and ZOTERO_USER_ID |\n"),
    }

    if config.semantic_scholar_key.is_some() {
        out.push_str("| Semantic Scholar | API key set | Higher rate limits |\n");
    } else {
        out.push_str("| Semantic Scholar | Public API | Rate limited |\n");
    }
    out.push_str("| arXiv | Public API | No key required |\n");
    out
}

pub fn format_export(summary: &ExportSummary, collection: Option<&str>) -> String {
    let mut out = format!("Added {} papers", summary.added);
    if let Some(name) = collection {
        out.push_str(&format!(" to collection '{name}'"));
    }
    out.push_str(".\n");
    if summary.attachments > 0 {
        out.push_str(&format!("Linked {} PDFs.\n", summary.attachments));
    }
    if summary.failed > 0 {
        out.push_str(&format!("Failed to add {} papers.\n", summary.failed));
    }
    out
}

pub fn format_analysis(query: &str, paper_count: usize, analysis: &str) -> String {
    format!(
        "# Research Analysis: {}\n\nBased on the top {} of the papers found.\n\n{analysis}\n",
        single_line(query),
        paper_count.min(10)
    )
}
