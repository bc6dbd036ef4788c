use crate::filter::{UrlFilter, canonicalize, fetchable};
use crate::parsers::DiscoveredLink;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// Crawl-owned URL state: what has been visited, what is waiting, and what was turned away.
///
/// Every crawl builds its own frontier, so concurrent crawls never share state.
#[derive(Debug)]
pub struct Frontier {
    filter: UrlFilter,
    visited: HashSet<String>,
    queued: HashSet<String>,
    queue: VecDeque<DiscoveredLink>,
    rejected: Vec<String>,
    rejected_set: HashSet<String>,
}

impl Frontier {
    /// Creates a frontier for `base` with the base URL already queued
    pub fn new(base: &Url) -> Self {
        let mut frontier = Self {
            filter: UrlFilter::new(base),
            visited: HashSet::new(),
            queued: HashSet::new(),
            queue: VecDeque::new(),
            rejected: Vec::new(),
            rejected_set: HashSet::new(),
        };
        let seed = fetchable(base);
        frontier.enqueue(DiscoveredLink {
            key: canonicalize(&seed),
            url: seed,
        });
        frontier
    }

    pub fn filter(&self) -> &UrlFilter {
        &self.filter
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_visited(&self, key: &str) -> bool {
        self.visited.contains(key)
    }

    /// Whether a canonical key was visited or is waiting in the queue
    pub fn is_seen(&self, key: &str) -> bool {
        self.visited.contains(key) || self.queued.contains(key)
    }

    /// Pops up to `size` unvisited URLs and marks each visited before it is handed out.
    pub fn next_batch(&mut self, size: usize) -> Vec<DiscoveredLink> {
        let mut batch = Vec::with_capacity(size);
        while batch.len() < size {
            let Some(link) = self.queue.pop_front() else {
                break;
            };
            self.queued.remove(&link.key);
            if self.visited.insert(link.key.clone()) {
                batch.push(link);
            }
        }
        batch
    }

    /// Appends a discovered link unless it was already seen. Returns whether it was queued.
    pub fn enqueue(&mut self, link: DiscoveredLink) -> bool {
        if self.is_seen(&link.key) {
            return false;
        }
        ::log::debug!("Queuing link for crawling: {}", link.key);
        self.queued.insert(link.key.clone());
        self.queue.push_back(link);
        true
    }

    /// Records a URL that will not be crawled. Each URL is recorded once.
    pub fn reject(&mut self, url: impl Into<String>) {
        let url = url.into();
        if self.rejected_set.insert(url.clone()) {
            self.rejected.push(url);
        }
    }

    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    pub fn into_rejected(self) -> Vec<String> {
        self.rejected
    }
}
