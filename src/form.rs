//! The adventure creation form.
//!
//! The form is a small state machine over [`FormMode`]. `Editing` is the
//! initial and only re-entrant mode; photo capture and location picking are
//! full-screen sub-modes that always return to it. Submitting leaves the
//! screen through navigation.
//!
//! Every call into a platform collaborator races the form's unmount token,
//! so an operation still in flight when the screen goes away ends with
//! [`AdventureError::Cancelled`] and never writes into the discarded draft.
use std::{fmt, future::Future, sync::Arc};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    Adventure, AdventureDraft, AdventureError, AdventureStore, Alert, Capability, Config,
    Coordinates, DraftField, FormServices, Location, Navigator, PermissionStatus, PromptChoice,
    Result, Route,
};

pub const FORM_TITLE: &str = "Adicionar aventura";
pub const ADD_IMAGE_TITLE: &str = "Adicionar imagem";
pub const CHANGE_IMAGE_TITLE: &str = "Alterar imagem";
pub const MAP_TITLE: &str = "Localização";

/// The map's focal region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapRegion {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl MapRegion {
    /// Same zoom, new center
    pub fn centered_on(&self, at: Coordinates) -> Self {
        MapRegion {
            latitude: at.latitude,
            longitude: at.longitude,
            ..*self
        }
    }

    pub fn center(&self) -> Option<Coordinates> {
        Coordinates::new(self.latitude, self.longitude).ok()
    }
}

impl Default for MapRegion {
    /// Downtown São Paulo
    fn default() -> Self {
        MapRegion {
            latitude: -23.55052,
            longitude: -46.633308,
            latitude_delta: 0.0922,
            longitude_delta: 0.0421,
        }
    }
}

/// Pin shown on the map for the picked location
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub coordinates: Coordinates,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Editing,
    CapturingPhoto,
    PickingLocation,
}

impl fmt::Display for FormMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormMode::Editing => write!(f, "editing"),
            FormMode::CapturingPhoto => write!(f, "capturing a photo"),
            FormMode::PickingLocation => write!(f, "picking a location"),
        }
    }
}

/// Outcome of the "add image" action
#[derive(Debug, Clone, PartialEq)]
pub enum ImageRequest {
    /// The camera is open
    Capturing,
    /// Permission was denied; the user must choose to cancel or open settings
    SettingsPrompt(Alert),
}

#[derive(Debug, Clone, Default)]
pub struct FormOptions {
    /// Refuse to submit a draft with a blank name
    pub require_name: bool,
    /// Where the map starts when the draft has no location
    pub default_region: MapRegion,
}

impl From<&Config> for FormOptions {
    fn from(config: &Config) -> Self {
        Self {
            require_name: config.require_name,
            default_region: config.default_region,
        }
    }
}

pub struct AdventureForm {
    store: Arc<AdventureStore>,
    services: FormServices,
    navigator: Arc<dyn Navigator>,
    options: FormOptions,

    draft: AdventureDraft,
    mode: FormMode,
    region: MapRegion,
    marker: Option<Marker>,

    /// Cancelled when the screen unmounts
    unmounted: CancellationToken,
}

impl AdventureForm {
    /// Mounts the form. When the store has a current adventure the draft
    /// starts as a copy of it.
    pub fn open(
        store: Arc<AdventureStore>,
        services: FormServices,
        navigator: Arc<dyn Navigator>,
        options: FormOptions,
    ) -> Result<Self> {
        let template = store.current()?;
        let draft = template
            .as_ref()
            .map(AdventureDraft::from_adventure)
            .unwrap_or_default();

        let picked = draft
            .location
            .as_ref()
            .and_then(|l| l.coordinates().map(|at| (at, l.address.clone())));
        let region = match &picked {
            Some((at, _)) => options.default_region.centered_on(*at),
            None => options.default_region,
        };
        let marker = picked.map(|(coordinates, title)| Marker { coordinates, title });

        debug!(
            "Adventure form opened{}",
            template
                .map(|a| format!(" from adventure {}", a.id))
                .unwrap_or_default()
        );

        Ok(Self {
            store,
            services,
            navigator,
            options,
            draft,
            mode: FormMode::Editing,
            region,
            marker,
            unmounted: CancellationToken::new(),
        })
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn draft(&self) -> &AdventureDraft {
        &self.draft
    }

    pub fn region(&self) -> MapRegion {
        self.region
    }

    pub fn marker(&self) -> Option<&Marker> {
        self.marker.as_ref()
    }

    /// Header title for the current mode
    pub fn title(&self) -> &'static str {
        match self.mode {
            FormMode::Editing => FORM_TITLE,
            FormMode::CapturingPhoto if self.draft.image.is_some() => CHANGE_IMAGE_TITLE,
            FormMode::CapturingPhoto => ADD_IMAGE_TITLE,
            FormMode::PickingLocation => MAP_TITLE,
        }
    }

    /// A token that unmounts the form when cancelled, for whoever owns the
    /// screen's lifetime (e.g. the navigator leaving the route)
    pub fn unmount_token(&self) -> CancellationToken {
        self.unmounted.clone()
    }

    fn expect_mode(&self, expected: FormMode, action: &'static str) -> Result<()> {
        if self.mode != expected {
            return Err(AdventureError::InvalidTransition {
                action,
                mode: self.mode.to_string(),
            });
        }
        Ok(())
    }

    /// Runs a collaborator call unless the form unmounts first
    async fn guarded<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.unmounted.cancelled() => {
                warn!("Abandoning {} after unmount", operation);
                Err(AdventureError::Cancelled { operation })
            }
            result = call => result,
        }
    }

    /// Free-text write into the draft
    pub fn set_field(&mut self, field: DraftField, value: impl Into<String>) -> Result<()> {
        self.expect_mode(FormMode::Editing, "edit a field")?;
        self.draft.set(field, value.into());
        Ok(())
    }

    // ── Photo ──

    /// "Add image": opens the camera unless the permission was denied.
    pub async fn add_image(&mut self) -> Result<ImageRequest> {
        self.expect_mode(FormMode::Editing, "add an image")?;

        let camera = &self.services.camera;
        let mut status = self
            .guarded("camera permission query", camera.permission_status())
            .await?;
        if status == PermissionStatus::Undetermined {
            debug!("Requesting camera permission");
            status = self
                .guarded("camera permission request", camera.request_permission())
                .await?;
        }

        match status {
            PermissionStatus::Granted => {
                debug!("Entering photo capture");
                self.mode = FormMode::CapturingPhoto;
                Ok(ImageRequest::Capturing)
            }
            PermissionStatus::Denied => {
                info!("Camera permission denied, offering system settings");
                Ok(ImageRequest::SettingsPrompt(Alert::permission_required(
                    Capability::Camera,
                )))
            }
            PermissionStatus::Undetermined => Err(AdventureError::PermissionDenied {
                capability: Capability::Camera,
            }),
        }
    }

    /// Handles the user's answer to a settings prompt.
    pub async fn resolve_prompt(&self, choice: PromptChoice) -> Result<()> {
        match choice {
            PromptChoice::OpenSettings => {
                self.guarded("opening settings", self.services.settings.open_settings())
                    .await
            }
            PromptChoice::Cancel | PromptChoice::Dismiss => Ok(()),
        }
    }

    /// Captures a photo into the draft and returns to editing.
    ///
    /// On failure the camera stays open so the user can retry or cancel.
    pub async fn take_picture(&mut self) -> Result<()> {
        self.expect_mode(FormMode::CapturingPhoto, "take a picture")?;

        let uri = self
            .guarded("photo capture", self.services.camera.take_picture())
            .await
            .map_err(|e| {
                error!("Photo capture failed: {}", e);
                e
            })?;

        info!("Photo attached to draft: {}", uri);
        self.draft.image = Some(uri);
        self.mode = FormMode::Editing;
        Ok(())
    }

    /// Closes the camera without touching the draft
    pub fn cancel_capture(&mut self) -> Result<()> {
        self.expect_mode(FormMode::CapturingPhoto, "cancel the camera")?;
        self.mode = FormMode::Editing;
        Ok(())
    }

    // ── Location ──

    pub fn open_location_picker(&mut self) -> Result<()> {
        self.expect_mode(FormMode::Editing, "open the map")?;
        self.mode = FormMode::PickingLocation;
        Ok(())
    }

    pub fn close_location_picker(&mut self) -> Result<()> {
        self.expect_mode(FormMode::PickingLocation, "close the map")?;
        self.mode = FormMode::Editing;
        Ok(())
    }

    /// Picks the double-tapped point, named through reverse geocoding.
    pub async fn map_double_tap(&mut self, latitude: f64, longitude: f64) -> Result<()> {
        self.expect_mode(FormMode::PickingLocation, "pick a location")?;
        let at = Coordinates::new(latitude, longitude)?;

        self.region = self.region.centered_on(at);
        let address = self.lookup_address(at, &at.to_string()).await?;
        self.commit_location(address, at);
        Ok(())
    }

    /// Picks the first match of a text search.
    ///
    /// A failed search leaves the draft unchanged.
    pub async fn search_location(&mut self, query: &str) -> Result<()> {
        self.expect_mode(FormMode::PickingLocation, "search for a location")?;
        let query = query.trim();
        if query.is_empty() {
            return Err(AdventureError::GeocodeNotFound {
                query: query.to_string(),
            });
        }

        let candidates = self
            .guarded("geocoding", self.services.geocoder.geocode(query))
            .await
            .map_err(|e| search_error(query, e))?;

        let at = candidates.first().copied().ok_or_else(|| {
            let e = AdventureError::GeocodeNotFound {
                query: query.to_string(),
            };
            error!("Error searching location: {}", e);
            e
        })?;

        self.region = self.region.centered_on(at);
        let address = self.lookup_address(at, query).await?;
        self.commit_location(address, at);
        Ok(())
    }

    async fn lookup_address(&self, at: Coordinates, query: &str) -> Result<String> {
        let components = self
            .guarded("reverse geocoding", self.services.geocoder.reverse_geocode(at))
            .await
            .map_err(|e| search_error(query, e))?;

        let Some(first) = components.first() else {
            let e = AdventureError::GeocodeNotFound {
                query: query.to_string(),
            };
            error!("Error searching location: {}", e);
            return Err(e);
        };

        Ok(first.compose().unwrap_or_else(|| at.to_string()))
    }

    fn commit_location(&mut self, address: String, at: Coordinates) {
        info!("Location picked: {} ({})", address, at);
        self.marker = Some(Marker {
            coordinates: at,
            title: address.clone(),
        });
        self.draft.location = Some(Location::new(address, at));
    }

    // ── Submit ──

    /// Commits the draft as a new adventure and returns to the list.
    ///
    /// Navigation history is reset to the list, so the form cannot be
    /// reached again by going back.
    pub fn submit(&mut self) -> Result<Adventure> {
        self.expect_mode(FormMode::Editing, "submit")?;

        if self.options.require_name && self.draft.name.trim().is_empty() {
            return Err(AdventureError::InvalidDraft {
                message: "name is required".to_string(),
            });
        }

        let id = self.store.next_id()?;
        let adventure = self.draft.clone().into_adventure(id);
        self.store.add(adventure.clone())?;

        self.draft = AdventureDraft::default();
        self.marker = None;
        self.store.select(None)?;
        self.navigator.reset_to(Route::Adventures)?;

        Ok(adventure)
    }
}

impl Drop for AdventureForm {
    fn drop(&mut self) {
        debug!("Adventure form unmounted");
        self.unmounted.cancel();
    }
}

/// Normalises collaborator failures into the geocoding taxonomy
fn search_error(query: &str, e: AdventureError) -> AdventureError {
    let e = match e {
        AdventureError::GeocodeNotFound { .. }
        | AdventureError::GeocodeService { .. }
        | AdventureError::Cancelled { .. } => e,
        other => AdventureError::GeocodeService {
            message: other.to_string(),
        },
    };
    error!("Error searching location '{}': {}", query, e);
    e
}
