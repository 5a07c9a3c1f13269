use super::types::{Attachment, Creator, Item, Tag};
use crate::paper::Paper;

const MAX_CREATORS: usize = 50;
const MAX_ABSTRACT_CHARS: usize = 10_000;
const MAX_TAGS: usize = 20;

/// Convert a paper into a Zotero item, filed under `collection` when given.
///
/// Papers with an arXiv identifier become `preprint`s; everything else is a `journalArticle`.
pub fn paper_to_item(paper: &Paper, collection: Option<&str>) -> Item {
    let is_preprint = paper.arxiv_id.is_some();
    let venue = Some(paper.venue.trim())
        .filter(|v| !v.is_empty())
        .map(String::from);

    let (publication_title, venue_repository) = if is_preprint {
        (None, venue)
    } else {
        (venue, None)
    };

    Item {
        item_type: if is_preprint { "preprint" } else { "journalArticle" },
        title: paper.title.clone(),
        creators: paper
            .authors
            .iter()
            .take(MAX_CREATORS)
            .map(|name| Creator {
                creator_type: "author",
                name: name.clone(),
            })
            .collect(),
        abstract_note: paper.abstract_text.chars().take(MAX_ABSTRACT_CHARS).collect(),
        date: paper.year.map(|y| y.to_string()).unwrap_or_default(),
        url: paper.url.clone().unwrap_or_default(),
        doi: paper.doi.clone(),
        repository: venue_repository.or_else(|| paper.arxiv_id.as_ref().map(|_| "arXiv".to_string())),
        archive_id: paper.arxiv_id.as_ref().map(|id| format!("arXiv:{id}")),
        publication_title,
        tags: paper
            .fields
            .iter()
            .take(MAX_TAGS)
            .map(|f| Tag { tag: f.clone() })
            .collect(),
        collections: collection.map(|c| vec![c.to_string()]).unwrap_or_default(),
    }
}

/// Linked-URL PDF attachment for an already created item, if the paper has a PDF locator.
pub fn pdf_attachment(parent_key: &str, paper: &Paper) -> Option<Attachment> {
    let url = paper.pdf_url.as_deref().filter(|_| paper.has_pdf())?;
    let short: String = paper.title.chars().take(50).collect();
    Some(Attachment {
        item_type: "attachment",
        parent_item: parent_key.to_string(),
        link_mode: "linked_url",
        title: format!("{short} (PDF)"),
        url: url.trim().to_string(),
        content_type: "application/pdf",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::SourceKind;

    fn journal_paper() -> Paper {
        let mut p = Paper::new("s2", "Deep Residual Learning", SourceKind::SemanticScholar);
        p.authors = vec!["Kaiming He".into(), "Xiangyu Zhang".into()];
        p.year = Some(2016);
        p.doi = Some("10.1109/CVPR.2016.90".into());
        p.venue = "CVPR".into();
        p.fields = vec!["Computer Science".into()];
        p.url = Some("https://www.semanticscholar.org/paper/s2".into());
        p
    }

    #[test]
    fn journal_article_uses_publication_title() {
        let item = paper_to_item(&journal_paper(), Some("COLL1"));
        assert_eq!(item.item_type, "journalArticle");
        assert_eq!(item.publication_title.as_deref(), Some("CVPR"));
        assert_eq!(item.repository, None);
        assert_eq!(item.date, "2016");
        assert_eq!(item.creators.len(), 2);
        assert_eq!(item.collections, vec!["COLL1"]);

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["DOI"], "10.1109/CVPR.2016.90");
        assert_eq!(json["itemType"], "journalArticle");
        assert_eq!(json["creators"][0]["creatorType"], "author");
        assert_eq!(json["tags"][0]["tag"], "Computer Science");
        assert!(json.get("archiveID").is_none());
    }

    #[test]
    fn arxiv_paper_is_preprint_in_repository() {
        let mut p = Paper::new("arxiv:1706.03762", "Attention", SourceKind::Arxiv);
        p.arxiv_id = Some("1706.03762".into());
        p.venue = "arXiv".into();
        let item = paper_to_item(&p, None);

        assert_eq!(item.item_type, "preprint");
        assert_eq!(item.repository.as_deref(), Some("arXiv"));
        assert_eq!(item.archive_id.as_deref(), Some("arXiv:1706.03762"));
        assert_eq!(item.publication_title, None);
        assert!(item.collections.is_empty());
    }

    #[test]
    fn preprint_without_venue_still_names_repository() {
        let mut p = Paper::new("x", "T", SourceKind::SemanticScholar);
        p.arxiv_id = Some("2101.00001".into());
        assert_eq!(paper_to_item(&p, None).repository.as_deref(), Some("arXiv"));
    }

    #[test]
    fn limits_are_enforced() {
        let mut p = journal_paper();
        p.authors = (0..80).map(|i| format!("Author {i}")).collect();
        p.abstract_text = "é".repeat(12_000);
        p.fields = (0..30).map(|i| format!("F{i}")).collect();
        let item = paper_to_item(&p, None);

        assert_eq!(item.creators.len(), 50);
        assert_eq!(item.abstract_note.chars().count(), 10_000);
        assert_eq!(item.tags.len(), 20);
    }

    #[test]
    fn attachment_requires_pdf_locator() {
        let mut p = journal_paper();
        assert!(pdf_attachment("KEY", &p).is_none());

        p.pdf_url = Some("https://example.org/paper.pdf".into());
        let att = pdf_attachment("KEY", &p).unwrap();
        assert_eq!(att.parent_item, "KEY");
        assert_eq!(att.link_mode, "linked_url");
        assert_eq!(att.title, "Deep Residual Learning (PDF)");

        let json = serde_json::to_value(&att).unwrap();
        assert_eq!(json["contentType"], "application/pdf");
        assert_eq!(json["parentItem"], "KEY");
    }
}
