use chrono::{DateTime, Duration, Utc};

use crate::api::{Item, SortMode};

pub const FRESH_WINDOW_DAYS: i64 = 7;
pub const DEFAULT_PAGE_SIZE: usize = 25;

// Categories offered in the navigation pane; an item matches a category when
// any of its tags starts with the category id, and "all" matches everything.
pub const CATEGORIES: [(&str, &str); 9] = [
    ("all", "All"),
    ("cs.AI", "AI"),
    ("cs.LG", "ML"),
    ("cs.CL", "NLP"),
    ("cs.CV", "Vision"),
    ("cs.RO", "Robotics"),
    ("stat.ML", "Stats"),
    ("math", "Math"),
    ("quant-ph", "Quantum"),
];

pub struct FeedIndex {
    items: Vec<Item>,
    category: String,
    search: String,
    sort: SortMode,
    page_size: usize,
    pages: usize,
}

impl FeedIndex {
    pub fn new(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            category: "all".to_string(),
            search: String::new(),
            sort: SortMode::default(),
            page_size: page_size.max(1),
            pages: 1,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn sort(&self) -> SortMode {
        self.sort
    }

    pub fn set_category<S: Into<String>>(&mut self, category: S) {
        self.category = category.into();
    }

    pub fn set_search<S: Into<String>>(&mut self, search: S) {
        self.search = search.into();
    }

    pub fn set_sort(&mut self, sort: SortMode) {
        self.sort = sort;
    }

    // Replaces the raw collection after a refresh; category, search, sort,
    // and the page counter all survive the swap.
    pub fn replace_items(&mut self, items: Vec<Item>) {
        self.items = items;
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn load_more(&mut self) {
        self.pages = self.pages.saturating_add(1);
    }

    pub fn visible_items(&self, now: DateTime<Utc>) -> Vec<&Item> {
        let mut filtered = self.filtered(now);
        // The slice is clamped to the filtered length so a category or
        // search change can never leave the page counter pointing past it.
        let cap = self.page_size.saturating_mul(self.pages).min(filtered.len());
        filtered.truncate(cap);
        filtered
    }

    pub fn has_more(&self, now: DateTime<Utc>) -> bool {
        self.filtered(now).len() > self.page_size.saturating_mul(self.pages)
    }

    pub fn filtered_len(&self, now: DateTime<Utc>) -> usize {
        self.filtered(now).len()
    }

    // Counts are only ever updated from reconciled gateway responses,
    // never computed locally.
    pub fn apply_vote_count(&mut self, id: &str, count: i64) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
            item.vote_count = count.max(0);
        }
    }

    pub fn apply_comment_count(&mut self, id: &str, count: i64) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
            item.comment_count = count.max(0);
        }
    }

    fn filtered(&self, now: DateTime<Utc>) -> Vec<&Item> {
        let needle = self.search.trim().to_lowercase();
        let mut matched: Vec<&Item> = self
            .items
            .iter()
            .filter(|item| matches_category(item, &self.category))
            .filter(|item| matches_search(item, &needle))
            .collect();

        match self.sort {
            SortMode::Hot => {
                matched.retain(|item| within_fresh_window(item, now));
                // sort_by is stable, so equal counts keep their input order
                matched.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
            }
            SortMode::Discussed => {
                matched.retain(|item| within_fresh_window(item, now));
                matched.sort_by(|a, b| b.comment_count.cmp(&a.comment_count));
            }
            SortMode::New => {
                matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            }
        }
        matched
    }
}

fn within_fresh_window(item: &Item, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(item.created_at) <= Duration::days(FRESH_WINDOW_DAYS)
}

fn matches_category(item: &Item, category: &str) -> bool {
    category == "all"
        || item
            .categories
            .iter()
            .any(|tag| tag.starts_with(category))
}

fn matches_search(item: &Item, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    item.title.to_lowercase().contains(needle)
        || item.summary.to_lowercase().contains(needle)
        || item
            .authors
            .iter()
            .any(|author| author.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, votes: i64, comments: i64, days_old: i64) -> Item {
        Item {
            id: id.to_owned(),
            title: format!("Paper {id}"),
            summary: "a study of things".to_owned(),
            authors: vec!["Ada Lovelace".to_owned()],
            categories: vec!["cs.AI".to_owned()],
            created_at: Utc::now() - Duration::days(days_old),
            vote_count: votes,
            comment_count: comments,
            submitter: "ada".to_owned(),
            url: String::new(),
        }
    }

    fn ids(items: &[&Item]) -> Vec<String> {
        items.iter().map(|item| item.id.clone()).collect()
    }

    #[test]
    fn hot_excludes_items_older_than_the_window() {
        let mut index = FeedIndex::new(10);
        index.replace_items(vec![item("old", 5, 0, 10), item("fresh", 3, 0, 1)]);
        index.set_sort(SortMode::Hot);
        assert_eq!(ids(&index.visible_items(Utc::now())), vec!["fresh"]);
    }

    #[test]
    fn discussed_shares_the_window_and_orders_by_comments() {
        let mut index = FeedIndex::new(10);
        index.replace_items(vec![
            item("quiet", 9, 1, 2),
            item("busy", 1, 8, 2),
            item("stale", 0, 50, 30),
        ]);
        index.set_sort(SortMode::Discussed);
        assert_eq!(ids(&index.visible_items(Utc::now())), vec!["busy", "quiet"]);
    }

    #[test]
    fn new_has_no_window_and_orders_by_recency() {
        let mut index = FeedIndex::new(10);
        index.replace_items(vec![item("ancient", 0, 0, 400), item("today", 0, 0, 0)]);
        index.set_sort(SortMode::New);
        assert_eq!(
            ids(&index.visible_items(Utc::now())),
            vec!["today", "ancient"]
        );
    }

    #[test]
    fn hot_ties_keep_input_order() {
        let mut index = FeedIndex::new(10);
        index.replace_items(vec![
            item("first", 4, 0, 1),
            item("second", 4, 0, 2),
            item("third", 4, 0, 3),
        ]);
        index.set_sort(SortMode::Hot);
        assert_eq!(
            ids(&index.visible_items(Utc::now())),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn category_matches_by_prefix() {
        let mut index = FeedIndex::new(10);
        let mut math = item("math", 1, 0, 1);
        math.categories = vec!["math.CO".to_owned()];
        index.replace_items(vec![item("ai", 1, 0, 1), math]);
        index.set_sort(SortMode::New);

        index.set_category("math");
        assert_eq!(ids(&index.visible_items(Utc::now())), vec!["math"]);
        index.set_category("all");
        assert_eq!(index.visible_items(Utc::now()).len(), 2);
    }

    #[test]
    fn search_is_case_insensitive_over_title_summary_and_authors() {
        let mut index = FeedIndex::new(10);
        let mut by_turing = item("turing", 1, 0, 1);
        by_turing.authors = vec!["Alan Turing".to_owned()];
        by_turing.title = "On computable numbers".to_owned();
        index.replace_items(vec![item("other", 1, 0, 1), by_turing]);
        index.set_sort(SortMode::New);

        index.set_search("TURING");
        assert_eq!(ids(&index.visible_items(Utc::now())), vec!["turing"]);
        index.set_search("computable");
        assert_eq!(ids(&index.visible_items(Utc::now())), vec!["turing"]);
        index.set_search("");
        assert_eq!(index.visible_items(Utc::now()).len(), 2);
    }

    #[test]
    fn paging_slices_and_reports_more() {
        let mut index = FeedIndex::new(2);
        index.replace_items(vec![
            item("a", 5, 0, 1),
            item("b", 4, 0, 1),
            item("c", 3, 0, 1),
            item("d", 2, 0, 1),
            item("e", 1, 0, 1),
        ]);
        index.set_sort(SortMode::Hot);

        let now = Utc::now();
        assert_eq!(index.visible_items(now).len(), 2);
        assert!(index.has_more(now));
        index.load_more();
        assert_eq!(index.visible_items(now).len(), 4);
        index.load_more();
        assert_eq!(index.visible_items(now).len(), 5);
        assert!(!index.has_more(now));
    }

    #[test]
    fn narrowing_the_filter_clamps_instead_of_indexing_past() {
        let mut index = FeedIndex::new(2);
        index.replace_items(vec![
            item("a", 5, 0, 1),
            item("b", 4, 0, 1),
            item("c", 3, 0, 1),
            item("d", 2, 0, 1),
        ]);
        index.set_sort(SortMode::Hot);
        index.load_more();
        let now = Utc::now();
        assert_eq!(index.visible_items(now).len(), 4);

        index.set_search("Paper a");
        let visible = index.visible_items(now);
        assert_eq!(ids(&visible), vec!["a"]);
        assert!(!index.has_more(now));
    }

    #[test]
    fn selections_survive_item_replacement() {
        let mut index = FeedIndex::new(10);
        index.set_category("cs.AI");
        index.set_search("paper");
        index.set_sort(SortMode::Discussed);
        index.replace_items(vec![item("a", 1, 2, 1)]);
        assert_eq!(index.category(), "cs.AI");
        assert_eq!(index.search(), "paper");
        assert_eq!(index.sort(), SortMode::Discussed);
    }

    #[test]
    fn counts_update_only_through_reconciliation() {
        let mut index = FeedIndex::new(10);
        index.replace_items(vec![item("a", 5, 1, 1)]);
        index.apply_vote_count("a", 6);
        index.apply_comment_count("a", 2);
        index.apply_vote_count("missing", 9);
        let fetched = index.item("a").unwrap();
        assert_eq!(fetched.vote_count, 6);
        assert_eq!(fetched.comment_count, 2);
    }
}
