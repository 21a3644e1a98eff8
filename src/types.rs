//! Shared data structures for the adventures application.
//!
//! This module contains the small value types passed between the screens,
//! the platform collaborators and the CLI.
use std::fmt;

use clap::Subcommand;
use serde::{Deserialize, Serialize};

use crate::{AdventureError, Coordinates};

/// A specialized Result type for adventures operations.
pub type Result<T> = std::result::Result<T, AdventureError>;

/// Named screens known to the navigator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Route {
    /// The adventure list (navigation root)
    Adventures,
    /// The creation form
    AdventureForm,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Adventures => write!(f, "Adventures"),
            Route::AdventureForm => write!(f, "AdventureForm"),
        }
    }
}

/// Device capabilities guarded by a runtime permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Camera,
    Location,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Camera => write!(f, "camera"),
            Capability::Location => write!(f, "location"),
        }
    }
}

/// Result of a permission query or request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    /// Never asked
    Undetermined,
    Granted,
    /// Explicitly refused; only the system settings can change it
    Denied,
}

/// A button offered by an [`Alert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    /// Acknowledge and close
    Dismiss,
    /// Close without doing anything
    Cancel,
    /// Leave the app for the system settings
    OpenSettings,
}

impl PromptChoice {
    pub fn label(&self) -> &'static str {
        match self {
            PromptChoice::Dismiss => "OK",
            PromptChoice::Cancel => "Cancelar",
            PromptChoice::OpenSettings => "Abrir Configurações",
        }
    }
}

/// A blocking, user-facing modal message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub choices: Vec<PromptChoice>,
}

impl Alert {
    /// A plain informational alert with a single dismiss button
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            choices: vec![PromptChoice::Dismiss],
        }
    }

    /// The settings-redirect choice shown when a permission was denied
    pub fn permission_required(capability: Capability) -> Self {
        let resource = match capability {
            Capability::Camera => "à câmera",
            Capability::Location => "à localização",
        };
        Self {
            title: "Permissão Necessária".to_string(),
            message: format!(
                "Para utilizar esse recurso, você precisa permitir o acesso {} no seu dispositivo",
                resource
            ),
            choices: vec![PromptChoice::Cancel, PromptChoice::OpenSettings],
        }
    }
}

/// Available subcommands for the adventures application
#[derive(Subcommand)]
pub enum Commands {
    /// List recorded adventures
    List {
        /// Your current latitude, used to show distances
        #[clap(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Your current longitude, used to show distances
        #[clap(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Record a new adventure
    Add {
        /// Name of the adventure
        #[clap(short, long)]
        name: String,

        /// Free-form date, e.g. 21/04/2024
        #[clap(short, long)]
        date: Option<String>,

        /// Description of the adventure
        #[clap(short = 'D', long)]
        description: Option<String>,

        /// Take a photo with the camera
        #[clap(short, long)]
        photo: bool,

        /// Search for a place and use it as the location
        #[clap(long, conflicts_with = "at")]
        place: Option<String>,

        /// Pick the location at LAT,LON on the map
        #[clap(long, value_parser = parse_lat_lon, allow_hyphen_values = true)]
        at: Option<(f64, f64)>,
    },

    /// Search adventures by name and description
    Search {
        /// Search query text
        query: String,

        /// Limit the number of search results
        #[clap(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Great-circle distance between two points, in kilometers
    Distance {
        #[clap(allow_negative_numbers = true)]
        lat1: f64,
        #[clap(allow_negative_numbers = true)]
        lon1: f64,
        #[clap(allow_negative_numbers = true)]
        lat2: f64,
        #[clap(allow_negative_numbers = true)]
        lon2: f64,
    },
}

impl Commands {
    /// Where the device reports itself to be for this command, if anywhere
    pub fn device_position(&self) -> Result<Option<Coordinates>> {
        match self {
            Commands::List {
                lat: Some(lat),
                lon: Some(lon),
                ..
            } => Ok(Some(Coordinates::new(*lat, *lon)?)),
            _ => Ok(None),
        }
    }
}

// Helper for parsing "LAT,LON" arguments
fn parse_lat_lon(value: &str) -> std::result::Result<(f64, f64), String> {
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON but got '{}'", value))?;
    let lat = lat
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid latitude '{}': {}", lat.trim(), e))?;
    let lon = lon
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid longitude '{}': {}", lon.trim(), e))?;
    Ok((lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_list_places_the_device() {
        let list = Commands::List {
            lat: Some(-22.9068),
            lon: Some(-43.1729),
            json: false,
        };
        let at = list.device_position().unwrap().unwrap();
        assert_eq!(at.latitude, -22.9068);

        let off_map = Commands::List {
            lat: Some(91.0),
            lon: Some(0.0),
            json: false,
        };
        assert!(off_map.device_position().is_err());

        let search = Commands::Search {
            query: "trilha".into(),
            limit: None,
        };
        assert_eq!(search.device_position().unwrap(), None);
    }

    #[test]
    fn parses_lat_lon_pairs() {
        assert_eq!(parse_lat_lon("10,20").unwrap(), (10.0, 20.0));
        assert_eq!(
            parse_lat_lon("-23.55, -46.63").unwrap(),
            (-23.55, -46.63)
        );
        assert!(parse_lat_lon("10").is_err());
        assert!(parse_lat_lon("north,20").is_err());
    }

    #[test]
    fn permission_alert_offers_settings() {
        let alert = Alert::permission_required(Capability::Camera);
        assert_eq!(alert.title, "Permissão Necessária");
        assert!(alert.message.contains("câmera"));
        assert_eq!(
            alert.choices,
            vec![PromptChoice::Cancel, PromptChoice::OpenSettings]
        );
    }
}
