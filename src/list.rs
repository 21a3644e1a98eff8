//! The adventure list screen.
use std::sync::Arc;

use log::{debug, info};

use crate::{AdventureCard, AdventureError, AdventureStore, Coordinates, Navigator, Result, Route};

pub const LIST_TITLE: &str = "Minhas aventuras";

pub const EMPTY_MESSAGE: &str =
    "Parece que você ainda não tem aventuras registradas, mas é sempre hora de começar!";

pub const EMPTY_ACTION: &str = "Adicionar aventura!";

/// What the list screen shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ListView {
    /// No adventures yet: a prompt with a single call-to-action
    Empty {
        message: &'static str,
        action_label: &'static str,
    },
    /// One card per adventure, in insertion order
    Cards(Vec<AdventureCard>),
}

impl ListView {
    pub fn cards(&self) -> &[AdventureCard] {
        match self {
            ListView::Cards(cards) => cards,
            ListView::Empty { .. } => &[],
        }
    }
}

pub struct ListScreen {
    store: Arc<AdventureStore>,
}

impl ListScreen {
    pub fn new(store: Arc<AdventureStore>) -> Self {
        Self { store }
    }

    pub fn title(&self) -> &'static str {
        LIST_TITLE
    }

    /// Renders the whole collection, or the empty state.
    pub fn render(&self, user_location: Option<Coordinates>, width: usize) -> Result<ListView> {
        let adventures = self.store.adventures()?;
        debug!("Rendering {} adventures", adventures.len());

        if adventures.is_empty() {
            return Ok(ListView::Empty {
                message: EMPTY_MESSAGE,
                action_label: EMPTY_ACTION,
            });
        }

        Ok(ListView::Cards(
            adventures
                .iter()
                .map(|adventure| AdventureCard::new(adventure, user_location, width))
                .collect(),
        ))
    }

    /// The floating add button and the empty-state call-to-action.
    pub fn add_adventure(&self, navigator: &dyn Navigator) -> Result<()> {
        self.store.select(None)?;
        navigator.navigate(Route::AdventureForm)
    }

    /// Wired to the card's edit request: selects the adventure and opens the
    /// form, which starts pre-filled from the selection.
    pub fn edit_adventure(&self, id: &str, navigator: &dyn Navigator) -> Result<()> {
        let adventure = self
            .store
            .get(id)?
            .ok_or_else(|| AdventureError::AdventureNotFound { id: id.to_string() })?;

        info!("Editing adventure {} as a template", id);
        self.store.select(Some(adventure))?;
        navigator.navigate(Route::AdventureForm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Adventure, NavigationStack};

    #[test]
    fn empty_store_shows_prompt_then_one_card() {
        let store = Arc::new(AdventureStore::new());
        let screen = ListScreen::new(store.clone());

        let view = screen.render(None, 40).unwrap();
        assert_eq!(
            view,
            ListView::Empty {
                message: EMPTY_MESSAGE,
                action_label: EMPTY_ACTION,
            }
        );

        store.add(Adventure::new(store.next_id().unwrap(), "Bungee jump")).unwrap();

        let view = screen.render(None, 40).unwrap();
        assert_eq!(view.cards().len(), 1);
        assert_eq!(view.cards()[0].name, "Bungee jump");
    }

    #[test]
    fn cards_follow_insertion_order() {
        let store = Arc::new(AdventureStore::new());
        for name in ["Zipline", "Arvorismo", "Mergulho"] {
            store.add(Adventure::new(store.next_id().unwrap(), name)).unwrap();
        }

        let view = ListScreen::new(store).render(None, 40).unwrap();
        let names: Vec<_> = view.cards().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Zipline", "Arvorismo", "Mergulho"]);
    }

    #[test]
    fn add_navigates_to_form() {
        let store = Arc::new(AdventureStore::new());
        let nav = NavigationStack::default();

        ListScreen::new(store).add_adventure(&nav).unwrap();
        assert_eq!(nav.current().unwrap(), Some(Route::AdventureForm));
    }

    #[test]
    fn edit_selects_and_opens_form() {
        let store = Arc::new(AdventureStore::new());
        store.add(Adventure::new("1", "Cavalgada")).unwrap();
        let nav = NavigationStack::default();
        let screen = ListScreen::new(store.clone());

        let view = screen.render(None, 40).unwrap();
        view.cards()[0].request_edit(|id| screen.edit_adventure(id, &nav).unwrap());

        assert_eq!(store.current().unwrap().unwrap().name, "Cavalgada");
        assert_eq!(nav.current().unwrap(), Some(Route::AdventureForm));

        let err = screen.edit_adventure("42", &nav).unwrap_err();
        assert!(matches!(err, AdventureError::AdventureNotFound { .. }));
    }
}
