use crate::filter::{UrlFilter, canonicalize, fetchable};
use crate::parsers::text::{clean_fragments, dedup_stable, dedup_stable_by_key, is_substantial};
use crate::results::{BlogRecord, FaqEntry, Headings, Lists, PageRecord};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

/// Path segments that mark a page as a blog post
pub const BLOG_INDICATORS: &[&str] = &["/blog/", "/news/", "/articles/", "/post/", "/posts/"];

/// Keywords in a link target that signal a call to action
pub const CTA_HREF_KEYWORDS: &[&str] = &["contact", "signup", "register", "buy", "purchase", "order"];

const CHROME: &[&str] = &["nav", "header", "footer"];

/// Elements whose boundaries separate words even without surrounding whitespace
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "ol", "p", "section", "table", "td", "th",
    "tr", "ul",
];

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

static H1: LazyLock<Selector> = LazyLock::new(|| selector("h1"));
static H2: LazyLock<Selector> = LazyLock::new(|| selector("h2"));
static H3: LazyLock<Selector> = LazyLock::new(|| selector("h3"));
static P: LazyLock<Selector> = LazyLock::new(|| selector("p"));
static UL_ITEM: LazyLock<Selector> = LazyLock::new(|| selector("ul li"));
static OL_ITEM: LazyLock<Selector> = LazyLock::new(|| selector("ol li"));
static FAQ_CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"[class*="faq"], [id*="faq"]"#));
static FAQ_QUESTION: LazyLock<Selector> = LazyLock::new(|| selector("h2, h3, dt"));
static DL: LazyLock<Selector> = LazyLock::new(|| selector("dl"));
static CTA_CLASS_LINK: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"a[class*="btn"], a[class*="cta"]"#));
static CTA_CLASS_BUTTON: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"button[class*="btn"], button[class*="cta"]"#));
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static ARTICLE: LazyLock<Selector> = LazyLock::new(|| selector("article"));
static TIME: LazyLock<Selector> = LazyLock::new(|| selector("time"));
static META_DATE: LazyLock<Selector> = LazyLock::new(|| {
    selector(r#"meta[name="date"], meta[property="article:published_time"]"#)
});
static DATE_CLASS: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"[class*="date"], [class*="published"]"#));

/// A same-site link found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    /// Canonical key used for dedup
    pub key: String,
    /// URL to navigate to (fragment and query removed)
    pub url: Url,
}

/// Links found on a page, split into crawlable and filtered-out
#[derive(Debug, Clone, Default)]
pub struct LinkScan {
    pub accepted: Vec<DiscoveredLink>,
    pub rejected: Vec<String>,
}

/// Extracts a structured page record from raw HTML. Pure and deterministic.
pub fn extract(html: &str, url: &str) -> PageRecord {
    let doc = Html::parse_document(html);
    let page_url = Url::parse(url).ok();
    let links = match &page_url {
        Some(base) => discover_links(&doc, base, &UrlFilter::new(base)),
        None => LinkScan::default(),
    };
    build_record(&doc, url, page_url.as_ref(), &links)
}

/// Extracts the page record and the link scan against the crawl's own filter.
pub fn extract_with_links(html: &str, url: &Url, filter: &UrlFilter) -> (PageRecord, LinkScan) {
    let doc = Html::parse_document(html);
    let links = discover_links(&doc, url, filter);
    let record = build_record(&doc, url.as_str(), Some(url), &links);
    (record, links)
}

fn build_record(doc: &Html, raw_url: &str, url: Option<&Url>, links: &LinkScan) -> PageRecord {
    let canonical = url.map(canonicalize).unwrap_or_else(|| raw_url.to_string());
    let record = PageRecord {
        headings: extract_headings(doc),
        paragraphs: extract_paragraphs(doc),
        lists: extract_lists(doc),
        faq: extract_faq(doc),
        ctas: extract_ctas(doc),
        blog: extract_blog(doc, raw_url, &canonical),
        outbound_links: dedup_stable(links.accepted.iter().map(|l| l.key.clone()).collect()),
        url: canonical,
        partial: false,
    };
    ::log::debug!(
        "Extracted {}: {} paragraphs, {} faq, {} links",
        record.url,
        record.paragraphs.len(),
        record.faq.len(),
        record.outbound_links.len()
    );
    record
}

/// Resolves every anchor against `base` and sorts it through the filter.
///
/// Fragment-only anchors are skipped outright; other fragments and queries are
/// dropped before filtering.
pub fn discover_links(doc: &Html, base: &Url, filter: &UrlFilter) -> LinkScan {
    let mut scan = LinkScan::default();
    for anchor in doc.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            scan.rejected.push(href.to_string());
            continue;
        };
        let target = fetchable(&resolved);
        match filter.check(target.as_str(), |_| false) {
            Ok(url) => scan.accepted.push(DiscoveredLink {
                key: canonicalize(&url),
                url,
            }),
            Err(reason) => {
                ::log::trace!("Filtered {} ({:?})", target, reason);
                scan.rejected.push(target.to_string());
            }
        }
    }
    scan.accepted = dedup_stable_by_key(scan.accepted, |l| l.key.clone());
    scan.rejected = dedup_stable(scan.rejected);
    scan
}

fn has_ancestor(el: &ElementRef, names: &[&str]) -> bool {
    el.ancestors()
        .filter_map(|node| node.value().as_element())
        .any(|e| names.contains(&e.name()))
}

fn text_of(el: &ElementRef) -> String {
    let mut fragments = Vec::new();
    collect_fragments(el, &mut fragments);
    clean_fragments(fragments)
}

fn collect_fragments<'a>(el: &ElementRef<'a>, out: &mut Vec<&'a str>) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push(&**text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            let block = BLOCK_ELEMENTS.contains(&child_el.value().name());
            if block {
                out.push(" ");
            }
            collect_fragments(&child_el, out);
            if block {
                out.push(" ");
            }
        }
    }
}

fn content_texts(doc: &Html, sel: &Selector) -> Vec<String> {
    doc.select(sel)
        .filter(|el| !has_ancestor(el, CHROME))
        .map(|el| text_of(&el))
        .filter(|t| !t.is_empty())
        .collect()
}

fn extract_headings(doc: &Html) -> Headings {
    Headings {
        h1: content_texts(doc, &H1),
        h2: content_texts(doc, &H2),
        h3: content_texts(doc, &H3),
    }
}

fn extract_paragraphs(doc: &Html) -> Vec<String> {
    content_texts(doc, &P)
        .into_iter()
        .filter(|t| is_substantial(t))
        .collect()
}

fn extract_lists(doc: &Html) -> Lists {
    Lists {
        bullets: content_texts(doc, &UL_ITEM),
        numbered: content_texts(doc, &OL_ITEM),
    }
}

fn extract_faq(doc: &Html) -> Vec<FaqEntry> {
    let mut faq = Vec::new();

    for container in doc.select(&FAQ_CONTAINER) {
        for question in container.select(&FAQ_QUESTION) {
            let answer = question
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|sib| matches!(sib.value().name(), "p" | "div" | "dd"));
            if let Some(answer) = answer {
                push_faq(&mut faq, text_of(&question), text_of(&answer));
            }
        }
    }

    for dl in doc.select(&DL) {
        let children: Vec<ElementRef> = dl.children().filter_map(ElementRef::wrap).collect();
        let terms = children.iter().filter(|c| c.value().name() == "dt");
        let definitions = children.iter().filter(|c| c.value().name() == "dd");
        for (dt, dd) in terms.zip(definitions) {
            push_faq(&mut faq, text_of(dt), text_of(dd));
        }
    }

    faq
}

fn push_faq(faq: &mut Vec<FaqEntry>, question: String, answer: String) {
    if !question.is_empty() && !answer.is_empty() {
        faq.push(FaqEntry { question, answer });
    }
}

fn extract_ctas(doc: &Html) -> Vec<String> {
    let by_class = doc
        .select(&CTA_CLASS_LINK)
        .chain(doc.select(&CTA_CLASS_BUTTON));
    let by_intent = doc.select(&ANCHOR).filter(|a| {
        let href = a.value().attr("href").unwrap_or_default().to_lowercase();
        CTA_HREF_KEYWORDS.iter().any(|k| href.contains(k))
    });
    let ctas = by_class
        .chain(by_intent)
        .map(|el| text_of(&el))
        .filter(|t| !t.is_empty())
        .collect();
    dedup_stable(ctas)
}

/// Whether a page looks like a blog post
pub fn is_blog_page(doc: &Html, url: &str) -> bool {
    let lower = url.to_lowercase();
    BLOG_INDICATORS.iter().any(|i| lower.contains(i)) || doc.select(&ARTICLE).next().is_some()
}

fn extract_blog(doc: &Html, raw_url: &str, canonical: &str) -> Option<BlogRecord> {
    if !is_blog_page(doc, raw_url) {
        return None;
    }

    let first_text = |sel: &Selector| doc.select(sel).map(|el| text_of(&el)).find(|t| !t.is_empty());
    let title = first_text(&H1).or_else(|| first_text(&H2)).unwrap_or_default();

    let paragraphs: Vec<String> = doc
        .select(&P)
        .filter(|el| has_ancestor(el, &["article", "main"]) && !has_ancestor(el, &["footer"]))
        .map(|el| text_of(&el))
        .filter(|t| is_substantial(t))
        .collect();

    if title.is_empty() && paragraphs.is_empty() {
        return None;
    }

    Some(BlogRecord {
        url: canonical.to_string(),
        title,
        paragraphs,
        published_date: extract_date(doc),
    })
}

fn extract_date(doc: &Html) -> String {
    let from_time = doc.select(&TIME).find_map(|el| {
        let text = text_of(&el);
        if text.is_empty() {
            el.value().attr("datetime").map(|d| d.trim().to_string())
        } else {
            Some(text)
        }
    });
    let from_meta = || {
        doc.select(&META_DATE)
            .filter_map(|el| el.value().attr("content"))
            .map(|c| c.trim().to_string())
            .find(|c| !c.is_empty())
    };
    let from_class = || doc.select(&DATE_CLASS).map(|el| text_of(&el)).find(|t| !t.is_empty());

    from_time
        .filter(|d| !d.is_empty())
        .or_else(from_meta)
        .or_else(from_class)
        .unwrap_or_default()
}
