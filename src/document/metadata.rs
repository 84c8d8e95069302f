use serde::Serialize;

use crate::textutil::today_stamp;

pub const PLACEHOLDER_TITLE: &str = "FILL_THE_TITLE_HERE";
pub const PLACEHOLDER_AUTHOR: &str = "FILL_THE_AUTHOR_HERE";
pub const PLACEHOLDER_GITHUB_ID: &str = "FILL_YOUR_GITHUB_ID_HERE";
pub const PLACEHOLDER_LINK: &str = "FILL_THE_LINK_HERE";

pub const FIELD_ORDER: [&str; 8] = [
    "status",
    "title",
    "author",
    "collector",
    "collected_date",
    "translator",
    "translating_date",
    "link",
];

/// Document header record. `None` means the field was not present in the source header.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub status: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub collector: Option<String>,
    pub collected_date: Option<String>,
    pub translator: Option<String>,
    pub translating_date: Option<String>,
    pub link: Option<String>,
    pub extra: Vec<(String, String)>,
}

impl Metadata {
    /// Every field filled: placeholders for people and links, today's date for both dates.
    pub fn with_defaults() -> Self {
        let today = today_stamp();
        Self {
            status: Some("translating".to_string()),
            title: Some(PLACEHOLDER_TITLE.to_string()),
            author: Some(PLACEHOLDER_AUTHOR.to_string()),
            collector: Some(PLACEHOLDER_GITHUB_ID.to_string()),
            collected_date: Some(today.clone()),
            translator: Some(PLACEHOLDER_GITHUB_ID.to_string()),
            translating_date: Some(today),
            link: Some(PLACEHOLDER_LINK.to_string()),
            extra: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Set a field by key. Keys are matched case-insensitively; `translated_date` is accepted as
    /// an alias of `translating_date`. Unknown keys land in `extra`.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let lower = key.trim().to_ascii_lowercase();
        let slot = match lower.as_str() {
            "status" => &mut self.status,
            "title" => &mut self.title,
            "author" => &mut self.author,
            "collector" => &mut self.collector,
            "collected_date" => &mut self.collected_date,
            "translator" => &mut self.translator,
            "translating_date" | "translated_date" => &mut self.translating_date,
            "link" => &mut self.link,
            _ => {
                match self.extra.iter_mut().find(|(k, _)| *k == lower) {
                    Some(entry) => entry.1 = value,
                    None => self.extra.push((lower.clone(), value)),
                }
                return;
            }
        };
        *slot = Some(value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        let slot = match key {
            "status" => &self.status,
            "title" => &self.title,
            "author" => &self.author,
            "collector" => &self.collector,
            "collected_date" => &self.collected_date,
            "translator" => &self.translator,
            "translating_date" => &self.translating_date,
            "link" => &self.link,
            _ => {
                return self
                    .extra
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.as_str())
            }
        };
        slot.as_deref()
    }

    #[must_use]
    pub fn fields(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<(&str, &str)> = FIELD_ORDER
            .iter()
            .filter_map(|k| self.get(k).map(|v| (*k, v)))
            .collect();
        out.extend(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        out
    }

    /// Mark the document as translated. Only fields already present are touched.
    pub fn mark_translated(&mut self, translator_id: &str) {
        if self.status.is_some() {
            self.status = Some("translated".to_string());
        }
        if self.translator.is_some() {
            self.translator = Some(translator_id.to_string());
        }
        if self.translating_date.is_some() {
            self.translating_date = Some(today_stamp());
        }
    }
}
