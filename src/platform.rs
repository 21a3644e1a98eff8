//! Platform capabilities consumed by the screens.
//!
//! Camera, geocoding, live location, system settings and navigation are
//! external collaborators. The screens only see these traits, so a real
//! device bridge, the [`crate::SimulatedPlatform`] or a test double can be
//! plugged in.
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{AdventureError, Coordinates, PermissionStatus, Result, Route};

#[async_trait]
/// Single-photo capture guarded by the camera permission.
pub trait Camera: Send + Sync {
    async fn permission_status(&self) -> Result<PermissionStatus>;

    /// Asks the user; returns the resulting status
    async fn request_permission(&self) -> Result<PermissionStatus>;

    /// Captures one photo and returns an opaque reference (URI) to it
    async fn take_picture(&self) -> Result<String>;
}

/// Address parts returned by reverse geocoding; any of them may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressComponents {
    pub street: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
}

impl AddressComponents {
    /// "street, city, region", skipping absent or blank parts.
    /// Returns `None` when nothing is left.
    pub fn compose(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.street, &self.city, &self.region]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

#[async_trait]
/// Forward and reverse geocoding.
///
/// Implementations return `GeocodeService` for transport failures and an
/// empty list when nothing matched.
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Vec<Coordinates>>;

    async fn reverse_geocode(&self, at: Coordinates) -> Result<Vec<AddressComponents>>;
}

#[async_trait]
/// Foreground location permission and position updates.
pub trait LocationProvider: Send + Sync {
    async fn permission_status(&self) -> Result<PermissionStatus>;

    async fn request_permission(&self) -> Result<PermissionStatus>;

    /// Starts delivering position updates.
    ///
    /// Dropping the receiver must stop the underlying platform subscription.
    async fn watch_position(&self) -> Result<mpsc::Receiver<Coordinates>>;
}

#[async_trait]
/// Opens the system settings page for this application.
pub trait SystemSettings: Send + Sync {
    async fn open_settings(&self) -> Result<()>;
}

/// Screen navigation commands.
pub trait Navigator: Send + Sync {
    /// Pushes a screen on top of the history
    fn navigate(&self, route: Route) -> Result<()>;

    /// Replaces the whole history with a single screen
    fn reset_to(&self, route: Route) -> Result<()>;
}

/// Collaborators used by the creation form
#[derive(Clone)]
pub struct FormServices {
    pub camera: Arc<dyn Camera>,
    pub geocoder: Arc<dyn Geocoder>,
    pub settings: Arc<dyn SystemSettings>,
}

/// In-memory navigation history, rooted at the adventure list.
#[derive(Debug)]
pub struct NavigationStack {
    history: Mutex<Vec<Route>>,
}

impl NavigationStack {
    pub fn new(root: Route) -> Self {
        Self {
            history: Mutex::new(vec![root]),
        }
    }

    fn with_history<T>(&self, f: impl FnOnce(&mut Vec<Route>) -> T) -> Result<T> {
        let mut history = self
            .history
            .lock()
            .map_err(|_| AdventureError::LockAcquisitionFailed {
                message: "Failed to acquire lock on navigation history".to_string(),
            })?;
        Ok(f(&mut history))
    }

    /// The screen on top of the history
    pub fn current(&self) -> Result<Option<Route>> {
        self.with_history(|h| h.last().copied())
    }

    pub fn history(&self) -> Result<Vec<Route>> {
        self.with_history(|h| h.clone())
    }

    pub fn can_go_back(&self) -> Result<bool> {
        self.with_history(|h| h.len() > 1)
    }

    /// Pops the top screen; the root is never popped
    pub fn go_back(&self) -> Result<Option<Route>> {
        self.with_history(|h| {
            if h.len() > 1 {
                h.pop();
            }
            h.last().copied()
        })
    }
}

impl Default for NavigationStack {
    fn default() -> Self {
        Self::new(Route::Adventures)
    }
}

impl Navigator for NavigationStack {
    fn navigate(&self, route: Route) -> Result<()> {
        debug!("Navigating to {}", route);
        self.with_history(|h| h.push(route))
    }

    fn reset_to(&self, route: Route) -> Result<()> {
        info!("Resetting navigation to {}", route);
        self.with_history(|h| {
            h.clear();
            h.push(route);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_skips_missing_parts() {
        let full = AddressComponents {
            street: Some("Av. Atlântica".into()),
            city: Some("Rio de Janeiro".into()),
            region: Some("RJ".into()),
        };
        assert_eq!(
            full.compose().as_deref(),
            Some("Av. Atlântica, Rio de Janeiro, RJ")
        );

        let partial = AddressComponents {
            street: None,
            city: Some("Curitiba".into()),
            region: Some(" ".into()),
        };
        assert_eq!(partial.compose().as_deref(), Some("Curitiba"));

        assert_eq!(AddressComponents::default().compose(), None);
    }

    #[test]
    fn reset_removes_back_path() {
        let nav = NavigationStack::default();
        nav.navigate(Route::AdventureForm).unwrap();
        assert!(nav.can_go_back().unwrap());

        nav.reset_to(Route::Adventures).unwrap();
        assert_eq!(nav.history().unwrap(), [Route::Adventures]);
        assert!(!nav.can_go_back().unwrap());
        assert_eq!(nav.go_back().unwrap(), Some(Route::Adventures));
    }
}
