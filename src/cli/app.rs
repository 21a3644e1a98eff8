//! CLI module for the adventures application
//!
//! This module drives the list and form screens from command-line
//! arguments, using the simulated platform for camera, geocoding and GPS.
use std::{sync::Arc, time::Duration};

use console::style;
use log::{debug, info, warn};

use crate::{
    distance_km, Adventure, AdventureCard, AdventureError, AdventureForm, AdventureStore, Alert,
    Commands, Config, Coordinates, DraftField, FormOptions, ImageRequest, ListScreen, ListView,
    LocationWatcher, NavigationStack, PromptChoice, Result, SimulatedPlatform,
};

/// How long `list` waits for a first location fix
const FIX_TIMEOUT: Duration = Duration::from_secs(2);

/// Draft input collected from `add` arguments
struct NewAdventure {
    name: String,
    date: Option<String>,
    description: Option<String>,
    photo: bool,
    place: Option<String>,
    at: Option<(f64, f64)>,
}

/// CLI Application handler - processes CLI commands against the adventure store
pub struct App {
    /// The adventure store backend
    store: Arc<AdventureStore>,

    /// Application configuration
    config: Config,

    /// Device collaborators
    platform: SimulatedPlatform,

    navigator: Arc<NavigationStack>,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    /// Create a new CLI application with the given store, config and platform
    pub fn new(
        store: Arc<AdventureStore>,
        config: Config,
        platform: SimulatedPlatform,
        verbose: bool,
    ) -> Self {
        Self {
            store,
            config,
            platform,
            navigator: Arc::new(NavigationStack::default()),
            verbose,
        }
    }

    /// Run the CLI application with the given command
    pub async fn run(&self, command: Commands) -> Result<()> {
        let positioned = command.device_position()?.is_some();

        match command {
            Commands::List { json, .. } => self.list_adventures(positioned, json).await?,

            Commands::Add {
                name,
                date,
                description,
                photo,
                place,
                at,
            } => {
                self.add_adventure(NewAdventure {
                    name,
                    date,
                    description,
                    photo,
                    place,
                    at,
                })
                .await?
            }

            Commands::Search { query, limit } => self.search_adventures(&query, limit)?,

            Commands::Distance {
                lat1,
                lon1,
                lat2,
                lon2,
            } => {
                let from = Coordinates::new(lat1, lon1)?;
                let to = Coordinates::new(lat2, lon2)?;
                println!("{:.2} km", distance_km(from, to));
            }
        }

        Ok(())
    }

    /// Resolves the user's position through a scoped location subscription
    /// on the device's provider
    async fn user_location(&self) -> Option<Coordinates> {
        let watcher = LocationWatcher::new(self.platform.location.clone());

        let mut subscription = match watcher.subscribe().await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!("Location unavailable, distances hidden: {}", e);
                return None;
            }
        };

        if subscription.current().is_none()
            && tokio::time::timeout(FIX_TIMEOUT, subscription.changed())
                .await
                .is_err()
        {
            warn!("No location fix within {:?}", FIX_TIMEOUT);
        }
        // Dropping the subscription releases the provider
        subscription.current()
    }

    async fn list_adventures(&self, positioned: bool, json: bool) -> Result<()> {
        if json {
            let adventures = self.store.adventures()?;
            println!("{}", serde_json::to_string_pretty(&adventures)?);
            return Ok(());
        }

        // Without a device position there is no fix to wait for
        let location = if positioned {
            self.user_location().await
        } else {
            None
        };
        let screen = ListScreen::new(Arc::clone(&self.store));
        println!("{}\n", style(screen.title()).bold().underlined());

        match screen.render(location, self.config.card_width)? {
            ListView::Empty {
                message,
                action_label,
            } => {
                println!("{}", message);
                println!(
                    "\n{}  adventures add --name <NAME>",
                    style(action_label).green()
                );
            }
            ListView::Cards(cards) => {
                self.print_cards(&cards);
                println!(
                    "\n{} adventure{}",
                    cards.len(),
                    if cards.len() == 1 { "" } else { "s" }
                );
            }
        }
        Ok(())
    }

    async fn add_adventure(&self, input: NewAdventure) -> Result<()> {
        let screen = ListScreen::new(Arc::clone(&self.store));
        screen.add_adventure(self.navigator.as_ref())?;

        let mut form = AdventureForm::open(
            Arc::clone(&self.store),
            self.platform.form_services(),
            self.navigator.clone(),
            FormOptions::from(&self.config),
        )?;
        debug!("{}", form.title());

        form.set_field(DraftField::Name, input.name)?;
        if let Some(date) = input.date {
            form.set_field(DraftField::Date, date)?;
        }
        if let Some(description) = input.description {
            form.set_field(DraftField::Description, description)?;
        }

        if input.photo {
            self.capture_photo(&mut form).await?;
        }

        if input.place.is_some() || input.at.is_some() {
            form.open_location_picker()?;
            let picked = match (&input.place, input.at) {
                (Some(query), _) => form.search_location(query).await,
                (None, Some((lat, lon))) => form.map_double_tap(lat, lon).await,
                (None, None) => Ok(()),
            };
            if let Err(e) = picked {
                self.report_recoverable(e)?;
            }
            form.close_location_picker()?;
        }

        let adventure = form.submit()?;
        self.print_created(&adventure);
        Ok(())
    }

    async fn capture_photo(&self, form: &mut AdventureForm) -> Result<()> {
        match form.add_image().await {
            Ok(ImageRequest::Capturing) => {
                if let Err(e) = form.take_picture().await {
                    warn!("Photo capture failed, continuing without a photo: {}", e);
                    form.cancel_capture()?;
                }
            }
            Ok(ImageRequest::SettingsPrompt(alert)) => {
                self.show_alert(&alert);
                // Non-interactive: take the cancel choice
                form.resolve_prompt(PromptChoice::Cancel).await?;
            }
            Err(e) => self.report_recoverable(e)?,
        }
        Ok(())
    }

    /// Shows recoverable errors as alerts; propagates the rest
    fn report_recoverable(&self, e: AdventureError) -> Result<()> {
        match e.alert() {
            Some(alert) => {
                info!("Recovered from: {}", e);
                self.show_alert(&alert);
                Ok(())
            }
            None => Err(e),
        }
    }

    fn show_alert(&self, alert: &Alert) {
        eprintln!("{}: {}", style(&alert.title).red().bold(), alert.message);
        if self.verbose {
            let choices: Vec<&str> = alert.choices.iter().map(|c| c.label()).collect();
            eprintln!("  [{}]", choices.join(" | "));
        }
    }

    fn print_created(&self, adventure: &Adventure) {
        println!("Adventure created with ID: {}", adventure.id);
        if let Some(location) = &adventure.location {
            println!("Location: {}", location.address);
        }
        if let Some(image) = &adventure.image {
            println!("Photo: {}", image);
        }
    }

    fn search_adventures(&self, query: &str, limit: Option<usize>) -> Result<()> {
        let limit = limit.unwrap_or(self.config.search_limit);
        let results = self.store.search(query, limit)?;

        if results.is_empty() {
            println!("No adventures found matching query: \"{}\"", query);
            return Ok(());
        }

        let cards: Vec<AdventureCard> = results
            .iter()
            .map(|adventure| AdventureCard::new(adventure, None, self.config.card_width))
            .collect();
        self.print_cards(&cards);
        println!("\nFound {} matching adventures.", cards.len());
        Ok(())
    }

    fn print_cards(&self, cards: &[AdventureCard]) {
        // Use terminal width for the divider if available
        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);

        for (i, card) in cards.iter().enumerate() {
            if i > 0 {
                println!("{}", "-".repeat(term_width.min(50)));
            }

            if let Some(date) = &card.date {
                println!("{}", style(date).dim());
            }
            println!("{}  {}", style(&card.name).bold(), style("✎").dim());
            for line in &card.description {
                println!("{}", line);
            }
            if let Some(distance) = &card.distance {
                println!("{}", style(distance).cyan());
            }
            if let Some(image) = &card.image {
                println!("{}", style(format!("📷 {}", image)).dim());
            }
            if self.verbose {
                println!("{}", style(format!("#{}", card.id)).dim());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::Route;

    fn app() -> App {
        app_at(None)
    }

    fn app_at(position: Option<Coordinates>) -> App {
        App::new(
            Arc::new(AdventureStore::new()),
            Config::default(),
            SimulatedPlatform::standard(position),
            false,
        )
    }

    fn add_command(name: &str) -> Commands {
        Commands::Add {
            name: name.to_string(),
            date: Some("21/04/2024".to_string()),
            description: None,
            photo: true,
            place: Some("Rio de Janeiro".to_string()),
            at: None,
        }
    }

    #[tokio::test]
    async fn add_runs_the_whole_form() {
        let app = app();
        app.run(add_command("Pão de Açúcar")).await.unwrap();

        let adventures = app.store.adventures().unwrap();
        assert_eq!(adventures.len(), 1);
        let adventure = &adventures[0];
        assert_eq!(adventure.name, "Pão de Açúcar");
        assert!(adventure.image.is_some());
        assert_eq!(
            adventure.location.as_ref().unwrap().address,
            "Praça Floriano, Rio de Janeiro, RJ"
        );
        assert_eq!(app.navigator.history().unwrap(), [Route::Adventures]);
    }

    #[tokio::test]
    async fn unknown_place_still_records_adventure() {
        let app = app();
        let command = Commands::Add {
            name: "Lugar nenhum".to_string(),
            date: None,
            description: None,
            photo: false,
            place: Some("Atlantis".to_string()),
            at: None,
        };
        app.run(command).await.unwrap();

        let adventures = app.store.adventures().unwrap();
        assert_eq!(adventures.len(), 1);
        assert!(adventures[0].location.is_none());
    }

    #[tokio::test]
    async fn list_resolves_location_through_the_device() {
        let here = Coordinates::new(-23.5505, -46.6333).unwrap();
        let app = app_at(Some(here));
        assert_eq!(app.user_location().await, Some(here));
        assert_eq!(app.platform.location.watch_calls(), 1);
        // The subscription was released once the fix was read
        let closed = tokio::time::timeout(
            Duration::from_secs(1),
            app.platform.location.wait_all_closed(),
        )
        .await;
        assert!(closed.is_ok());

        app.run(add_command("Cristo Redentor")).await.unwrap();
        let command = Commands::List {
            lat: Some(-23.5505),
            lon: Some(-46.6333),
            json: false,
        };
        assert!(app.run(command).await.is_ok());
    }

    #[tokio::test]
    async fn unpositioned_list_never_starts_the_provider() {
        let app = app();
        let command = Commands::List {
            lat: None,
            lon: None,
            json: false,
        };
        app.run(command).await.unwrap();
        assert_eq!(app.platform.location.watch_calls(), 0);
    }

    #[tokio::test]
    async fn add_at_coordinates_uses_the_address_found_there() {
        let app = app();
        let command = Commands::Add {
            name: "Parque Barigui".to_string(),
            date: None,
            description: None,
            photo: false,
            place: None,
            at: Some((-25.43, -49.27)),
        };
        app.run(command).await.unwrap();

        let adventures = app.store.adventures().unwrap();
        let location = adventures[0].location.as_ref().unwrap();
        assert_eq!(location.address, "Rua XV de Novembro, Curitiba, PR");
        assert_eq!(location.latitude, -25.43);
        assert_eq!(location.longitude, -49.27);
    }

    #[tokio::test]
    async fn invalid_distance_arguments_are_rejected() {
        let command = Commands::Distance {
            lat1: 95.0,
            lon1: 0.0,
            lat2: 0.0,
            lon2: 0.0,
        };
        let err = app().run(command).await.unwrap_err();
        assert!(matches!(err, AdventureError::InvalidCoordinate { .. }));
    }
}
