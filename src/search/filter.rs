use std::collections::HashSet;

use crate::paper::{Paper, SearchOptions};

/// Keep the first paper for each trimmed, case-folded title. Later duplicates are dropped
/// regardless of which source produced them.
pub fn dedup_by_title(papers: Vec<Paper>) -> Vec<Paper> {
    let mut seen = HashSet::new();
    papers
        .into_iter()
        .filter(|p| seen.insert(p.dedup_key()))
        .collect()
}

/// Re-apply every structural filter after merge. Adapters may skip filters they cannot
/// express natively, so this pass decides correctness.
pub fn apply_filters(papers: Vec<Paper>, options: &SearchOptions) -> Vec<Paper> {
    let fields: Vec<String> = options.fields.iter().map(|f| f.to_lowercase()).collect();

    papers
        .into_iter()
        .filter(|p| match options.year_range {
            Some(range) => p.year.is_some_and(|y| range.contains(y)),
            None => true,
        })
        .filter(|p| p.citations >= options.min_citations)
        .filter(|p| fields.is_empty() || matches_any_field(p, &fields))
        .filter(|p| !options.pdf_only || p.has_pdf())
        .collect()
}

fn matches_any_field(paper: &Paper, wanted: &[String]) -> bool {
    paper.fields.iter().any(|f| {
        let f = f.to_lowercase();
        wanted.iter().any(|w| f.contains(w.as_str()))
    })
}

/// Descending by citation count. Stable: equal counts keep their prior relative order.
pub fn sort_by_citations(papers: &mut [Paper]) {
    papers.sort_by(|a, b| b.citations.cmp(&a.citations));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::{SourceKind, YearRange};

    fn paper(id: &str, title: &str) -> Paper {
        Paper::new(id, title, SourceKind::SemanticScholar)
    }

    fn with_citations(id: &str, citations: u32) -> Paper {
        let mut p = paper(id, id);
        p.citations = citations;
        p
    }

    fn ids(papers: &[Paper]) -> Vec<&str> {
        papers.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn dedup_keeps_first_occurrence_across_sources() {
        let mut dup = Paper::new("x1", "  attention is all you need", SourceKind::Arxiv);
        dup.citations = 999;
        let papers = vec![
            paper("s1", "Attention Is All You Need"),
            paper("s2", "BERT"),
            dup,
        ];
        let deduped = dedup_by_title(papers);
        assert_eq!(ids(&deduped), vec!["s1", "s2"]);
    }

    #[test]
    fn dedup_is_idempotent_and_bounded_by_distinct_titles() {
        let papers = vec![
            paper("1", "A"),
            paper("2", "a "),
            paper("3", "B"),
            paper("4", ""),
            paper("5", "  "),
        ];
        let distinct: HashSet<String> = papers.iter().map(Paper::dedup_key).collect();

        let once = dedup_by_title(papers);
        let twice = dedup_by_title(once.clone());
        assert_eq!(once, twice);
        assert!(once.len() <= distinct.len());
        assert_eq!(ids(&once), vec!["1", "3", "4"]);
    }

    #[test]
    fn citation_sort_is_stable() {
        let mut papers = vec![
            with_citations("a", 5),
            with_citations("b", 100),
            with_citations("c", 5),
            with_citations("d", 0),
        ];
        sort_by_citations(&mut papers);
        assert_eq!(ids(&papers), vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn pdf_only_keeps_papers_with_locator() {
        let mut second = paper("2", "Two");
        second.pdf_url = Some("https://example.org/2.pdf".into());
        let papers = vec![paper("1", "One"), second, paper("3", "Three")];

        let options = SearchOptions {
            pdf_only: true,
            ..SearchOptions::default()
        };
        assert_eq!(ids(&apply_filters(papers, &options)), vec!["2"]);
    }

    #[test]
    fn year_range_drops_papers_without_year() {
        let mut old = paper("old", "Old");
        old.year = Some(2010);
        let mut new = paper("new", "New");
        new.year = Some(2021);
        let undated = paper("undated", "Undated");

        let options = SearchOptions {
            year_range: YearRange::new(Some(2020), None),
            ..SearchOptions::default()
        };
        assert_eq!(ids(&apply_filters(vec![old, new, undated], &options)), vec!["new"]);
    }

    #[test]
    fn min_citations_applies_to_every_source() {
        let mut preprint = Paper::new("x", "Preprint", SourceKind::Arxiv);
        preprint.citations = 0;
        let papers = vec![with_citations("cited", 12), preprint];

        let options = SearchOptions {
            min_citations: 10,
            ..SearchOptions::default()
        };
        assert_eq!(ids(&apply_filters(papers, &options)), vec!["cited"]);
    }

    #[test]
    fn field_filter_is_case_insensitive_substring() {
        let mut cs = paper("cs", "CS");
        cs.fields = vec!["Computer Science".into()];
        let mut bio = paper("bio", "Bio");
        bio.fields = vec!["Biology".into()];
        let untagged = paper("none", "None");

        let options = SearchOptions {
            fields: vec!["computer".into()],
            ..SearchOptions::default()
        };
        assert_eq!(ids(&apply_filters(vec![cs, bio, untagged], &options)), vec!["cs"]);
    }

    #[test]
    fn default_options_keep_everything() {
        let papers = vec![paper("1", "One"), paper("2", "Two")];
        assert_eq!(apply_filters(papers, &SearchOptions::default()).len(), 2);
    }
}
