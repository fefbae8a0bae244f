use serde::{Deserialize, Serialize};

use super::item::PrintVisibility;
use super::Quotation;
use crate::{QuotationError, Result};

/// A named group of items, e.g. "Hardware".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationTitle {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub print_visibility: PrintVisibility,
}

impl Quotation {
    pub fn title(&self, title_id: &str) -> Option<&QuotationTitle> {
        self.titles.iter().find(|t| t.id == title_id)
    }

    /// Appends an unnamed title and returns its id.
    pub fn add_title(&mut self) -> String {
        let title = QuotationTitle {
            id: uuid::Uuid::new_v4().to_string(),
            title: String::new(),
            print_visibility: PrintVisibility::default(),
        };
        let id = title.id.clone();
        self.titles.push(title);
        self.touch();
        id
    }

    pub fn rename_title(&mut self, title_id: &str, name: impl Into<String>) -> Result<()> {
        let title = self.title_mut(title_id)?;
        title.title = name.into();
        self.refresh_totals();
        self.touch();
        Ok(())
    }

    /// Removes the title together with all of its items and their service state.
    pub fn remove_title(&mut self, title_id: &str) -> Result<()> {
        let pos = self
            .titles
            .iter()
            .position(|t| t.id == title_id)
            .ok_or_else(|| QuotationError::not_found("title", title_id))?;
        self.titles.remove(pos);

        let removed: Vec<String> = self
            .items
            .iter()
            .filter(|i| i.title_id == title_id)
            .map(|i| i.id.clone())
            .collect();
        self.items.retain(|i| i.title_id != title_id);
        for item_id in &removed {
            self.drop_service_state(item_id);
        }
        self.collapsed_titles.retain(|id| id != title_id);

        tracing::debug!(title_id, removed_items = removed.len(), "title removed");
        self.renumber_items();
        self.refresh_totals();
        self.touch();
        Ok(())
    }

    /// Flips the display-only collapsed flag and returns the new state.
    pub fn toggle_collapse(&mut self, title_id: &str) -> Result<bool> {
        if self.title(title_id).is_none() {
            return Err(QuotationError::not_found("title", title_id));
        }
        if let Some(pos) = self.collapsed_titles.iter().position(|id| id == title_id) {
            self.collapsed_titles.remove(pos);
            Ok(false)
        } else {
            self.collapsed_titles.push(title_id.to_string());
            Ok(true)
        }
    }

    pub fn is_collapsed(&self, title_id: &str) -> bool {
        self.collapsed_titles.iter().any(|id| id == title_id)
    }

    /// Sets the printed columns for a title and copies them onto its items.
    pub fn set_title_visibility(&mut self, title_id: &str, visibility: PrintVisibility) -> Result<()> {
        self.title_mut(title_id)?.print_visibility = visibility;
        for item in self.items.iter_mut().filter(|i| i.title_id == title_id) {
            item.print_visibility = visibility;
        }
        self.touch();
        Ok(())
    }

    fn title_mut(&mut self, title_id: &str) -> Result<&mut QuotationTitle> {
        self.titles
            .iter_mut()
            .find(|t| t.id == title_id)
            .ok_or_else(|| QuotationError::not_found("title", title_id))
    }
}
