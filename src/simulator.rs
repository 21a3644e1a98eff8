//! Deterministic, in-process platform.
//!
//! Stands in for the device camera, geocoding service, GPS and settings app
//! when running from a terminal, and doubles as the collaborator set for
//! tests. Geocoding answers from a small built-in gazetteer.
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use log::{debug, info, trace, warn};
use tokio::sync::mpsc;

use crate::{
    distance_km, AddressComponents, AdventureError, Camera, Coordinates, FormServices, Geocoder,
    LocationProvider, PermissionStatus, Result, SystemSettings,
};

/// Reverse geocoding only answers within this radius of a known place
const REVERSE_RADIUS_KM: f64 = 100.0;

fn lock<T>(mutex: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| AdventureError::LockAcquisitionFailed {
            message: "Failed to acquire lock on simulated device".to_string(),
        })
}

// ── Camera ──

pub struct SimulatedCamera {
    status: Mutex<PermissionStatus>,
    /// Status the user "answers" when asked
    on_request: PermissionStatus,
    delay: Option<Duration>,
    failing: bool,
    shots: AtomicUsize,
    requests: AtomicUsize,
}

impl SimulatedCamera {
    pub fn new(status: PermissionStatus, on_request: PermissionStatus) -> Self {
        Self {
            status: Mutex::new(status),
            on_request,
            delay: None,
            failing: false,
            shots: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn granted() -> Self {
        Self::new(PermissionStatus::Granted, PermissionStatus::Granted)
    }

    pub fn denied() -> Self {
        Self::new(PermissionStatus::Denied, PermissionStatus::Denied)
    }

    /// Every capture takes this long
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every capture fails
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn shots(&self) -> usize {
        self.shots.load(Ordering::SeqCst)
    }

    pub fn permission_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Camera for SimulatedCamera {
    async fn permission_status(&self) -> Result<PermissionStatus> {
        Ok(*lock(&self.status)?)
    }

    async fn request_permission(&self) -> Result<PermissionStatus> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut status = lock(&self.status)?;
        if *status == PermissionStatus::Undetermined {
            *status = self.on_request;
        }
        debug!("Simulated camera permission answered: {:?}", *status);
        Ok(*status)
    }

    async fn take_picture(&self) -> Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(AdventureError::Io(std::io::Error::other(
                "simulated camera failure",
            )));
        }

        let shot = self.shots.fetch_add(1, Ordering::SeqCst) + 1;
        let uri = format!("file:///simulated/camera/IMG_{:04}.jpg", shot);
        info!("Simulated photo captured: {}", uri);
        Ok(uri)
    }
}

// ── Geocoding ──

/// A named place known to the simulated geocoder
#[derive(Debug, Clone)]
pub struct Place {
    pub name: String,
    pub coordinates: Coordinates,
    pub address: AddressComponents,
}

pub struct SimulatedGeocoder {
    places: Vec<Place>,
    offline: bool,
    delay: Option<Duration>,
    lookups: AtomicUsize,
}

impl SimulatedGeocoder {
    /// A geocoder that knows no places
    pub fn empty() -> Self {
        Self {
            places: Vec::new(),
            offline: false,
            delay: None,
            lookups: AtomicUsize::new(0),
        }
    }

    /// A handful of Brazilian capitals
    pub fn gazetteer() -> Self {
        let places = [
            ("São Paulo", -23.5505, -46.6333, "Praça da Sé", "São Paulo", "SP"),
            ("Rio de Janeiro", -22.9068, -43.1729, "Praça Floriano", "Rio de Janeiro", "RJ"),
            ("Belo Horizonte", -19.9167, -43.9345, "Praça Sete", "Belo Horizonte", "MG"),
            ("Curitiba", -25.4284, -49.2733, "Rua XV de Novembro", "Curitiba", "PR"),
            ("Florianópolis", -27.5954, -48.5480, "Praça XV de Novembro", "Florianópolis", "SC"),
        ];

        places
            .into_iter()
            .fold(Self::empty(), |geocoder, (name, lat, lon, street, city, region)| {
                match Coordinates::new(lat, lon) {
                    Ok(at) => geocoder.with_place(
                        name,
                        at,
                        AddressComponents {
                            street: Some(street.to_string()),
                            city: Some(city.to_string()),
                            region: Some(region.to_string()),
                        },
                    ),
                    Err(_) => geocoder,
                }
            })
    }

    pub fn with_place(
        mut self,
        name: impl Into<String>,
        coordinates: Coordinates,
        address: AddressComponents,
    ) -> Self {
        self.places.push(Place {
            name: name.into(),
            coordinates,
            address,
        });
        self
    }

    /// Every lookup fails with a service error
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    async fn begin_lookup(&self) -> Result<()> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.offline {
            warn!("Simulated geocoder is offline");
            return Err(AdventureError::GeocodeService {
                message: "network unreachable".to_string(),
            });
        }
        Ok(())
    }
}

/// Parses "lat, lon" queries, the form a map tap is searched with
fn parse_coordinate_query(query: &str) -> Option<Coordinates> {
    let (lat, lon) = query.split_once(',')?;
    let lat = lat.trim().parse::<f64>().ok()?;
    let lon = lon.trim().parse::<f64>().ok()?;
    Coordinates::new(lat, lon).ok()
}

#[async_trait]
impl Geocoder for SimulatedGeocoder {
    async fn geocode(&self, query: &str) -> Result<Vec<Coordinates>> {
        self.begin_lookup().await?;

        if let Some(at) = parse_coordinate_query(query) {
            return Ok(vec![at]);
        }

        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let matches: Vec<Coordinates> = self
            .places
            .iter()
            .filter(|place| {
                place.name.to_lowercase().contains(&needle)
                    || place
                        .address
                        .compose()
                        .is_some_and(|a| a.to_lowercase().contains(&needle))
            })
            .map(|place| place.coordinates)
            .collect();

        trace!("Simulated geocode '{}' matched {} places", query, matches.len());
        Ok(matches)
    }

    async fn reverse_geocode(&self, at: Coordinates) -> Result<Vec<AddressComponents>> {
        self.begin_lookup().await?;

        let nearest = self
            .places
            .iter()
            .map(|place| (distance_km(place.coordinates, at), place))
            .filter(|(km, _)| *km <= REVERSE_RADIUS_KM)
            .min_by(|a, b| a.0.total_cmp(&b.0));

        Ok(nearest
            .map(|(_, place)| vec![place.address.clone()])
            .unwrap_or_default())
    }
}

// ── Location ──

pub struct SimulatedLocation {
    status: Mutex<PermissionStatus>,
    on_request: PermissionStatus,
    /// Positions delivered as soon as a stream starts
    initial: Vec<Coordinates>,
    streams: Mutex<Vec<mpsc::Sender<Coordinates>>>,
    watch_calls: AtomicUsize,
}

impl SimulatedLocation {
    pub fn with_permission(
        status: PermissionStatus,
        on_request: PermissionStatus,
        initial: Vec<Coordinates>,
    ) -> Self {
        Self {
            status: Mutex::new(status),
            on_request,
            initial,
            streams: Mutex::new(Vec::new()),
            watch_calls: AtomicUsize::new(0),
        }
    }

    pub fn granted(initial: Vec<Coordinates>) -> Self {
        Self::with_permission(PermissionStatus::Granted, PermissionStatus::Granted, initial)
    }

    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    fn open_streams(&self) -> Vec<mpsc::Sender<Coordinates>> {
        match lock(&self.streams) {
            Ok(mut streams) => {
                streams.retain(|tx| !tx.is_closed());
                streams.clone()
            }
            Err(_) => Vec::new(),
        }
    }

    /// Number of streams still held by a consumer
    pub fn active_streams(&self) -> usize {
        self.open_streams().len()
    }

    /// Moves the simulated device; returns how many streams received it
    pub async fn push(&self, fix: Coordinates) -> usize {
        let mut delivered = 0;
        for tx in self.open_streams() {
            if tx.send(fix).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Resolves once every stream handed out has been released
    pub async fn wait_all_closed(&self) {
        let streams = match lock(&self.streams) {
            Ok(streams) => streams.clone(),
            Err(_) => return,
        };
        for tx in streams {
            tx.closed().await;
        }
    }
}

#[async_trait]
impl LocationProvider for SimulatedLocation {
    async fn permission_status(&self) -> Result<PermissionStatus> {
        Ok(*lock(&self.status)?)
    }

    async fn request_permission(&self) -> Result<PermissionStatus> {
        let mut status = lock(&self.status)?;
        if *status == PermissionStatus::Undetermined {
            *status = self.on_request;
        }
        Ok(*status)
    }

    async fn watch_position(&self) -> Result<mpsc::Receiver<Coordinates>> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);

        for fix in &self.initial {
            if tx.try_send(*fix).is_err() {
                break;
            }
        }

        lock(&self.streams)?.push(tx);
        debug!("Simulated location stream opened");
        Ok(rx)
    }
}

// ── Settings ──

#[derive(Default)]
pub struct SimulatedSettings {
    opened: AtomicUsize,
}

impl SimulatedSettings {
    pub fn times_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SystemSettings for SimulatedSettings {
    async fn open_settings(&self) -> Result<()> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        info!("Simulated system settings opened");
        Ok(())
    }
}

/// The full simulated device
#[derive(Clone)]
pub struct SimulatedPlatform {
    pub camera: Arc<SimulatedCamera>,
    pub geocoder: Arc<SimulatedGeocoder>,
    pub location: Arc<SimulatedLocation>,
    pub settings: Arc<SimulatedSettings>,
}

impl SimulatedPlatform {
    pub fn new(
        camera: SimulatedCamera,
        geocoder: SimulatedGeocoder,
        location: SimulatedLocation,
    ) -> Self {
        Self {
            camera: Arc::new(camera),
            geocoder: Arc::new(geocoder),
            location: Arc::new(location),
            settings: Arc::new(SimulatedSettings::default()),
        }
    }

    /// Everything granted, the built-in gazetteer, and the device standing
    /// at `position` when one is given
    pub fn standard(position: Option<Coordinates>) -> Self {
        Self::new(
            SimulatedCamera::granted(),
            SimulatedGeocoder::gazetteer(),
            SimulatedLocation::granted(position.into_iter().collect()),
        )
    }

    pub fn form_services(&self) -> FormServices {
        FormServices {
            camera: self.camera.clone(),
            geocoder: self.geocoder.clone(),
            settings: self.settings.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(latitude: f64, longitude: f64) -> Coordinates {
        Coordinates::new(latitude, longitude).unwrap()
    }

    #[tokio::test]
    async fn gazetteer_geocodes_by_name_and_coordinates() {
        let geocoder = SimulatedGeocoder::gazetteer();

        let hits = geocoder.geocode("rio de janeiro").await.unwrap();
        assert_eq!(hits, vec![point(-22.9068, -43.1729)]);

        let hits = geocoder.geocode("10, 20").await.unwrap();
        assert_eq!(hits, vec![point(10.0, 20.0)]);

        assert!(geocoder.geocode("Atlantis").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reverse_geocode_picks_nearest_place() {
        let geocoder = SimulatedGeocoder::gazetteer();

        let near_paulista = point(-23.5614, -46.6559);
        let found = geocoder.reverse_geocode(near_paulista).await.unwrap();
        assert_eq!(found[0].city.as_deref(), Some("São Paulo"));

        let mid_atlantic = point(-10.0, -20.0);
        assert!(geocoder.reverse_geocode(mid_atlantic).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn offline_geocoder_reports_service_errors() {
        let geocoder = SimulatedGeocoder::gazetteer().offline();
        let err = geocoder.geocode("Curitiba").await.unwrap_err();
        assert!(matches!(err, AdventureError::GeocodeService { .. }));
    }

    #[tokio::test]
    async fn camera_request_only_changes_undetermined_status() {
        let camera = SimulatedCamera::new(PermissionStatus::Undetermined, PermissionStatus::Granted);
        assert_eq!(camera.request_permission().await.unwrap(), PermissionStatus::Granted);

        let camera = SimulatedCamera::denied();
        assert_eq!(camera.request_permission().await.unwrap(), PermissionStatus::Denied);
        assert_eq!(camera.permission_requests(), 1);
    }

    #[tokio::test]
    async fn photos_get_distinct_uris() {
        let camera = SimulatedCamera::granted();
        let first = camera.take_picture().await.unwrap();
        let second = camera.take_picture().await.unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with("file://"));
        assert_eq!(camera.shots(), 2);
    }
}
