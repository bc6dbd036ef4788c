use crate::parsers::text::{dedup_stable, dedup_stable_by_key};
use serde::{Deserialize, Serialize};

/// Headings found outside navigation, header and footer chrome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headings {
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub h3: Vec<String>,
}

/// Bullet and numbered list items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lists {
    pub bullets: Vec<String>,
    pub numbered: Vec<String>,
}

/// One question/answer pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

/// Blog post content detected on a page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogRecord {
    pub url: String,
    pub title: String,
    pub paragraphs: Vec<String>,
    /// Best-effort date string, never parsed or validated
    pub published_date: String,
}

/// Structured content extracted from one fetched page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// Canonical URL of the page
    pub url: String,
    pub headings: Headings,
    pub paragraphs: Vec<String>,
    pub lists: Lists,
    pub faq: Vec<FaqEntry>,
    pub ctas: Vec<String>,
    pub blog: Option<BlogRecord>,
    /// Canonical same-site links, in discovery order
    pub outbound_links: Vec<String>,
    /// Set when the page was captured after a load timeout
    #[serde(default)]
    pub partial: bool,
}

/// Deduplicated union of every page's content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    pub website_url: String,
    pub total_pages: usize,
    pub headings: Headings,
    pub paragraphs: Vec<String>,
    pub lists: Lists,
    pub faq: Vec<FaqEntry>,
    pub ctas: Vec<String>,
    pub blogs: Vec<BlogRecord>,
    pub average_load_time_seconds: f64,
    pub rejected_urls: Vec<String>,
    /// Individual page records in crawl order
    #[serde(skip)]
    pub pages: Vec<PageRecord>,
}

impl CrawlResult {
    /// Builds the aggregate over `pages`, deduplicating every list in first-seen order.
    pub fn aggregate(
        website_url: impl Into<String>,
        pages: Vec<PageRecord>,
        load_times_secs: &[f64],
        rejected_urls: Vec<String>,
    ) -> Self {
        let mut result = Self {
            website_url: website_url.into(),
            total_pages: pages.len(),
            rejected_urls: dedup_stable(rejected_urls),
            average_load_time_seconds: average(load_times_secs),
            ..Self::default()
        };

        for page in &pages {
            result.absorb(page);
        }
        result.dedup();
        result.pages = pages;
        result
    }

    /// Re-runs the aggregate dedup pass; applying it twice changes nothing.
    pub fn dedup(&mut self) {
        self.headings.h1 = dedup_stable(std::mem::take(&mut self.headings.h1));
        self.headings.h2 = dedup_stable(std::mem::take(&mut self.headings.h2));
        self.headings.h3 = dedup_stable(std::mem::take(&mut self.headings.h3));
        self.paragraphs = dedup_stable(std::mem::take(&mut self.paragraphs));
        self.lists.bullets = dedup_stable(std::mem::take(&mut self.lists.bullets));
        self.lists.numbered = dedup_stable(std::mem::take(&mut self.lists.numbered));
        self.ctas = dedup_stable(std::mem::take(&mut self.ctas));
        self.faq = dedup_stable(std::mem::take(&mut self.faq));
        self.blogs = dedup_stable_by_key(std::mem::take(&mut self.blogs), |blog| {
            (blog.url.clone(), blog.title.clone())
        });
        self.rejected_urls = dedup_stable(std::mem::take(&mut self.rejected_urls));
    }

    /// Summary counts over the aggregate
    pub fn summary(&self) -> ScrapedSummary {
        ScrapedSummary {
            total_pages: self.total_pages,
            total_h1: self.headings.h1.len(),
            total_h2: self.headings.h2.len(),
            total_h3: self.headings.h3.len(),
            total_paragraphs: self.paragraphs.len(),
            total_faq: self.faq.len(),
            total_bullets: self.lists.bullets.len(),
            total_numbers: self.lists.numbered.len(),
            total_ctas: self.ctas.len(),
            total_blogs: self.blogs.len(),
            average_page_load_speed: self.average_load_time_seconds,
        }
    }

    /// Flattens headings, paragraphs and FAQs into prompt-ready text
    pub fn as_text(&self) -> String {
        let faq = self
            .faq
            .iter()
            .map(|f| format!("{} {}", f.question, f.answer))
            .collect::<Vec<_>>()
            .join(" ");
        [
            self.headings.h1.join(" "),
            self.headings.h2.join(" "),
            self.paragraphs.join("\n"),
            faq,
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
    }

    fn absorb(&mut self, page: &PageRecord) {
        self.headings.h1.extend(page.headings.h1.iter().cloned());
        self.headings.h2.extend(page.headings.h2.iter().cloned());
        self.headings.h3.extend(page.headings.h3.iter().cloned());
        self.paragraphs.extend(page.paragraphs.iter().cloned());
        self.lists.bullets.extend(page.lists.bullets.iter().cloned());
        self.lists.numbered.extend(page.lists.numbered.iter().cloned());
        self.faq.extend(page.faq.iter().cloned());
        self.ctas.extend(page.ctas.iter().cloned());
        if let Some(blog) = &page.blog {
            self.blogs.push(blog.clone());
        }
    }
}

/// Counts reported next to the aggregate content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedSummary {
    pub total_pages: usize,
    pub total_h1: usize,
    pub total_h2: usize,
    pub total_h3: usize,
    pub total_paragraphs: usize,
    pub total_faq: usize,
    pub total_bullets: usize,
    pub total_numbers: usize,
    pub total_ctas: usize,
    pub total_blogs: usize,
    pub average_page_load_speed: f64,
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, h1: &str, faq: (&str, &str), blog_title: Option<&str>) -> PageRecord {
        PageRecord {
            url: url.to_string(),
            headings: Headings {
                h1: vec![h1.to_string()],
                ..Headings::default()
            },
            paragraphs: vec!["A paragraph that is long enough to keep".to_string()],
            faq: vec![FaqEntry {
                question: faq.0.to_string(),
                answer: faq.1.to_string(),
            }],
            ctas: vec!["Contact us".to_string()],
            blog: blog_title.map(|t| BlogRecord {
                url: "https://example.com/blog/post-1".to_string(),
                title: t.to_string(),
                paragraphs: vec![],
                published_date: String::new(),
            }),
            ..PageRecord::default()
        }
    }

    #[test]
    fn test_aggregate_dedups_in_first_seen_order() {
        let pages = vec![
            page("https://example.com", "Welcome", ("Q1", "A1"), None),
            page("https://example.com/about", "About", ("Q1", "A1"), Some("Post")),
            page("https://example.com/blog/post-1", "Welcome", ("Q1", "A2"), Some("Post")),
        ];
        let result = CrawlResult::aggregate("https://example.com", pages, &[1.0, 2.0, 3.0], vec![]);

        assert_eq!(result.total_pages, 3);
        assert_eq!(result.headings.h1, vec!["Welcome", "About"]);
        assert_eq!(result.paragraphs.len(), 1);
        assert_eq!(result.faq.len(), 2);
        assert_eq!(result.faq[1].answer, "A2");
        assert_eq!(result.blogs.len(), 1);
        assert_eq!(result.ctas, vec!["Contact us"]);
        assert!((result.average_load_time_seconds - 2.0).abs() < f64::EPSILON);
        assert_eq!(result.pages.len(), 3);
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let pages = vec![
            page("https://example.com", "Welcome", ("Q1", "A1"), Some("Post")),
            page("https://example.com/x", "Welcome", ("Q1", "A1"), Some("Post")),
        ];
        let once = CrawlResult::aggregate("https://example.com", pages, &[], vec![]);
        let mut twice = once.clone();
        twice.dedup();

        assert_eq!(once.faq.len(), twice.faq.len());
        assert_eq!(once.blogs.len(), twice.blogs.len());
        assert_eq!(once.headings, twice.headings);
        assert_eq!(once.lists, twice.lists);
        assert_eq!(once.average_load_time_seconds, 0.0);
    }

    #[test]
    fn test_summary_counts() {
        let pages = vec![page("https://example.com", "Welcome", ("Q", "A"), Some("Post"))];
        let summary = CrawlResult::aggregate("https://example.com", pages, &[0.5], vec![]).summary();
        assert_eq!(summary.total_pages, 1);
        assert_eq!(summary.total_h1, 1);
        assert_eq!(summary.total_faq, 1);
        assert_eq!(summary.total_blogs, 1);
        assert_eq!(summary.average_page_load_speed, 0.5);
    }
}
