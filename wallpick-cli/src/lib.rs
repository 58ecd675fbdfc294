pub use crate::app::{Layout, WallpickCliApp};
pub use crate::args::{Cli, Command, FramingArgs, SurfaceArgs};

mod args;

mod app {
    use anyhow::{bail, Context, Result};
    use chrono::Local;
    use std::io::{self, Write};
    use std::path::Path;
    use std::sync::Arc;
    use wallpick_core::{
        centered_offset, default_crop_surface_size, ChangeNotifier, CommitHistory, Config, CropState,
        CropSurfacePolicy, DesktopPersister, Destination, Dimensions, Offset, Settings, WallpaperCommitWorkflow,
        WorkflowPhase,
    };

    use crate::args::{Cli, Command, FramingArgs, SurfaceArgs};

    const FALLBACK_SCREEN: Dimensions = Dimensions::new(1080, 1920);

    /// Everything `preview` reports about one image on one screen.
    #[derive(Debug, Clone)]
    pub struct Layout {
        pub image: Dimensions,
        pub screen: Dimensions,
        pub policy: CropSurfacePolicy,
        pub surface: Dimensions,
        /// Where the screen sits inside the crop surface.
        pub screen_offset: Offset,
        pub state: CropState,
    }

    pub struct WallpickCliApp {
        config: Config,
        settings: Settings,
    }

    impl WallpickCliApp {
        pub fn new() -> Result<Self> {
            let config = Config::new().context("Failed to set up configuration directories")?;
            Self::with_config(config)
        }

        pub fn with_config(config: Config) -> Result<Self> {
            let settings = config
                .load_settings()
                .with_context(|| format!("Failed to load {}", config.settings_file.display()))?;
            Ok(Self { config, settings })
        }

        pub async fn run(&self, cli: Cli) -> Result<()> {
            let Cli { surface, command } = cli;
            match command {
                Command::Preview { image, framing } => {
                    let layout = self.layout(&surface, &image, &framing)?;
                    print_preview(&layout);
                    Ok(())
                }
                Command::Set { image, dest, framing, no_retry } => {
                    self.set_wallpaper(&surface, &image, &framing, dest, no_retry).await
                }
                Command::History { limit } => self.show_history(limit),
            }
        }

        pub fn screen_size(&self, args: &SurfaceArgs) -> Dimensions {
            args.screen.or(self.settings.screen_size).unwrap_or_else(|| {
                log::warn!("no screen size given or configured, assuming {}", FALLBACK_SCREEN);
                FALLBACK_SCREEN
            })
        }

        pub fn surface_policy(&self, args: &SurfaceArgs) -> CropSurfacePolicy {
            let mut policy = self.settings.crop_surface;
            if let Some(scale) = args.scale {
                policy.scale = scale;
            }
            if let Some(inset) = args.inset {
                policy.inset = inset;
            }
            policy
        }

        pub fn layout(&self, args: &SurfaceArgs, image_path: &Path, framing: &FramingArgs) -> Result<Layout> {
            let (width, height) = image::image_dimensions(image_path)
                .with_context(|| format!("Failed to read image size of {}", image_path.display()))?;
            self.layout_for(args, Dimensions::new(width as i32, height as i32), framing)
        }

        /// Default framing for `image`, then the requested zoom, then the requested pan.
        pub fn layout_for(&self, args: &SurfaceArgs, image: Dimensions, framing: &FramingArgs) -> Result<Layout> {
            let screen = self.screen_size(args);
            let policy = self.surface_policy(args);
            let surface = default_crop_surface_size(screen, policy)?;
            let screen_offset = centered_offset(screen, surface, false, self.settings.rtl)?;

            let mut state = CropState::framed(image, surface, framing.align_start, self.settings.rtl)?;
            if let Some(zoom) = framing.zoom {
                state.apply_zoom(zoom)?;
            }
            if let Some(delta) = framing.scroll {
                state.apply_scroll(delta);
            }

            Ok(Layout {
                image,
                screen,
                policy,
                surface,
                screen_offset,
                state,
            })
        }

        async fn set_wallpaper(
            &self,
            args: &SurfaceArgs,
            image_path: &Path,
            framing: &FramingArgs,
            destination: Destination,
            no_retry: bool,
        ) -> Result<()> {
            let layout = self.layout(args, image_path, framing)?;
            let crop = layout.state.resolve_crop_rectangle();
            let zoom = layout.state.zoom();

            let history = CommitHistory::open(&self.config.history_file, self.settings.history_limit)
                .with_context(|| format!("Failed to open {}", self.config.history_file.display()))?;
            let persister =
                Arc::new(DesktopPersister::new(image_path, &self.config.cache_dir).with_history(Arc::new(history)));

            let notifier = ChangeNotifier::new();
            notifier.subscribe(|event, _| {
                println!(
                    "Wallpaper changed on {}: crop {} at zoom {:.3}",
                    join(&event.destinations),
                    event.crop,
                    event.zoom
                );
            });

            let workflow = WallpaperCommitWorkflow::new(persister, layout.surface, notifier)?;
            println!("Setting {} on {}...", image_path.display(), destination);
            workflow.commit(crop, zoom, &[destination])?;

            loop {
                let phase = workflow.wait().await;
                if phase == WorkflowPhase::AllSucceeded {
                    return Ok(());
                }

                let failed = workflow.failed_destinations();
                if failed.is_empty() {
                    bail!("Wallpaper commit stopped in phase '{}'", phase);
                }
                for failed_destination in &failed {
                    if let Some(e) = workflow.failure(*failed_destination) {
                        eprintln!("  {}: {}", failed_destination, e);
                    }
                }

                if no_retry || !prompt_retry(&failed)? {
                    bail!("Wallpaper not set on {}", join(&failed));
                }
                workflow.retry(&failed)?;
            }
        }

        fn show_history(&self, limit: usize) -> Result<()> {
            let history = CommitHistory::open(&self.config.history_file, self.settings.history_limit)
                .with_context(|| format!("Failed to open {}", self.config.history_file.display()))?;

            let records = history.recent(limit);
            if records.is_empty() {
                println!("No wallpapers committed yet.");
                return Ok(());
            }

            for record in records {
                let source = record
                    .source
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(unknown source)".to_string());
                println!(
                    "{}  {:<4}  zoom {:.3}  crop {}  {}",
                    record.committed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                    record.destination,
                    record.zoom,
                    record.crop,
                    source
                );
            }
            Ok(())
        }
    }

    fn print_preview(layout: &Layout) {
        let state = &layout.state;
        println!("\n=== Wallpick - Crop Preview ===");
        println!("Image:          {}", layout.image);
        println!("Screen:         {}", layout.screen);
        println!(
            "Crop surface:   {} (scale {:.2}, inset {})",
            layout.surface, layout.policy.scale, layout.policy.inset
        );
        println!("Screen offset:  {}", layout.screen_offset);
        println!("Min zoom:       {:.4}", state.min_zoom());
        println!("Zoom:           {:.4}", state.zoom());
        println!("Scroll:         {} (max {})", state.scroll(), state.max_scroll());
        println!("Crop rectangle: {}", state.resolve_crop_rectangle());
    }

    fn prompt_retry(failed: &[Destination]) -> Result<bool> {
        print!("Retry {}? [y/N]: ", join(failed));
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
    }

    fn join(destinations: &[Destination]) -> String {
        destinations
            .iter()
            .copied()
            .map(Destination::as_str)
            .collect::<Vec<_>>()
            .join(" and ")
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use wallpick_core::{CropRectangle, Error};

        fn app(settings: Settings) -> (tempfile::TempDir, WallpickCliApp) {
            let dir = tempfile::tempdir().unwrap();
            let config = Config::at(dir.path()).unwrap();
            config.save_settings(&settings).unwrap();
            let app = WallpickCliApp::with_config(config).unwrap();
            (dir, app)
        }

        fn surface_args(screen: Dimensions) -> SurfaceArgs {
            SurfaceArgs {
                screen: Some(screen),
                ..SurfaceArgs::default()
            }
        }

        #[test]
        fn scaled_surface_shows_whole_image() {
            let (_dir, app) = app(Settings::default());
            let args = SurfaceArgs {
                screen: Some(Dimensions::new(1000, 2000)),
                scale: Some(1.5),
                inset: None,
            };

            let layout = app
                .layout_for(&args, Dimensions::new(1000, 2000), &FramingArgs::default())
                .unwrap();
            assert_eq!(layout.surface, Dimensions::new(1500, 3000));
            assert_eq!(layout.screen_offset, Offset::new(250, 500));
            assert_eq!(layout.state.zoom(), 1.5);
            assert_eq!(layout.state.resolve_crop_rectangle(), CropRectangle::new(0, 0, 1000, 2000));
        }

        #[test]
        fn screen_falls_back_to_settings_then_default() {
            let (_dir, configured) = app(Settings {
                screen_size: Some(Dimensions::new(720, 1280)),
                ..Settings::default()
            });
            assert_eq!(configured.screen_size(&SurfaceArgs::default()), Dimensions::new(720, 1280));
            assert_eq!(
                configured.screen_size(&surface_args(Dimensions::new(1440, 2560))),
                Dimensions::new(1440, 2560)
            );

            let (_dir, bare) = app(Settings::default());
            assert_eq!(bare.screen_size(&SurfaceArgs::default()), FALLBACK_SCREEN);
        }

        #[test]
        fn rtl_setting_mirrors_start_alignment() {
            let (_dir, app) = app(Settings {
                rtl: true,
                ..Settings::default()
            });
            let framing = FramingArgs {
                align_start: true,
                ..FramingArgs::default()
            };

            let layout = app
                .layout_for(&surface_args(Dimensions::new(1000, 2000)), Dimensions::new(4000, 2000), &framing)
                .unwrap();
            assert_eq!(layout.state.resolve_crop_rectangle(), CropRectangle::new(3000, 0, 4000, 2000));
        }

        #[test]
        fn zoom_below_minimum_is_reported() {
            let (_dir, app) = app(Settings::default());
            let framing = FramingArgs {
                zoom: Some(0.5),
                ..FramingArgs::default()
            };

            let err = app
                .layout_for(&surface_args(Dimensions::new(1000, 2000)), Dimensions::new(1000, 2000), &framing)
                .unwrap_err();
            assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ZoomBelowMinimum { .. })));
        }

        #[test]
        fn invalid_scale_override_is_rejected() {
            let (_dir, app) = app(Settings::default());
            let args = SurfaceArgs {
                screen: Some(Dimensions::new(1080, 1920)),
                scale: Some(0.8),
                inset: None,
            };
            assert!(app.layout_for(&args, Dimensions::new(2000, 2000), &FramingArgs::default()).is_err());
        }

        #[test]
        fn huge_inset_override_is_an_error() {
            let (_dir, app) = app(Settings::default());
            let args = SurfaceArgs {
                screen: Some(Dimensions::new(1080, 1920)),
                scale: None,
                inset: Some(1_100_000_000),
            };
            let err = app
                .layout_for(&args, Dimensions::new(2000, 2000), &FramingArgs::default())
                .unwrap_err();
            assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidSurfacePolicy { .. })));
        }

        #[test]
        fn join_lists_destinations() {
            assert_eq!(join(&[Destination::Home, Destination::Lock]), "home and lock");
        }
    }
}
