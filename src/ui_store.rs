//! UI preference store: theme, modal flags, sidebar and upload state.
//!
//! Owned by the presentation root; readers subscribe through [`UiStore::subscribe`].

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiPreferences {
    pub dark_mode: bool,
    pub create_twin_modal_open: bool,
    pub create_campaign_modal_open: bool,
    pub sidebar_open: bool,
    pub uploading: bool,
}

#[derive(Debug, Clone)]
pub struct UiStore {
    tx: Arc<watch::Sender<UiPreferences>>,
}

impl Default for UiStore {
    fn default() -> Self {
        Self::new(UiPreferences::default())
    }
}

impl UiStore {
    pub fn new(initial: UiPreferences) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> UiPreferences {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<UiPreferences> {
        self.tx.subscribe()
    }

    pub fn toggle_dark_mode(&self) -> bool {
        let mut dark_mode = false;
        self.tx.send_modify(|prefs| {
            prefs.dark_mode = !prefs.dark_mode;
            dark_mode = prefs.dark_mode;
        });
        dark_mode
    }

    pub fn set_create_twin_modal_open(&self, open: bool) {
        self.tx
            .send_if_modified(|prefs| replace(&mut prefs.create_twin_modal_open, open));
    }

    pub fn set_create_campaign_modal_open(&self, open: bool) {
        self.tx
            .send_if_modified(|prefs| replace(&mut prefs.create_campaign_modal_open, open));
    }

    pub fn set_sidebar_open(&self, open: bool) {
        self.tx
            .send_if_modified(|prefs| replace(&mut prefs.sidebar_open, open));
    }

    pub fn set_uploading(&self, uploading: bool) {
        self.tx
            .send_if_modified(|prefs| replace(&mut prefs.uploading, uploading));
    }
}

/// Assign and report whether the value changed.
fn replace(slot: &mut bool, value: bool) -> bool {
    std::mem::replace(slot, value) != value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_theme() {
        let store = UiStore::default();
        assert!(store.toggle_dark_mode());
        assert!(!store.toggle_dark_mode());
    }

    #[test]
    fn unchanged_flags_do_not_notify() {
        let store = UiStore::default();
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.set_sidebar_open(false);
        assert!(!rx.has_changed().unwrap());

        store.set_create_twin_modal_open(true);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().create_twin_modal_open);
    }

    #[test]
    fn flags_are_independent() {
        let store = UiStore::default();
        store.set_create_campaign_modal_open(true);
        store.set_uploading(true);

        let prefs = store.snapshot();
        assert!(prefs.create_campaign_modal_open);
        assert!(prefs.uploading);
        assert!(!prefs.create_twin_modal_open);
        assert!(!prefs.sidebar_open);
    }
}
