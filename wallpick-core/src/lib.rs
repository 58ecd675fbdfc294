pub mod config;
pub mod crop;
pub mod destination;
pub mod error;
pub mod geometry;
pub mod history;
pub mod notifier;
pub mod services;
pub mod wallpaper;
pub mod workflow;

pub use config::{Config, Settings};
pub use crop::{CropRectangle, CropState};
pub use destination::{CommitOutcome, Destination};
pub use error::{Error, Result};
pub use geometry::{centered_offset, default_crop_surface_size, min_zoom, CropSurfacePolicy, Dimensions, Offset, PIXEL_EPSILON};
pub use history::{CommitHistory, CommitRecord};
pub use notifier::{ChangeNotifier, SubscriptionId, WallpaperChanged};
pub use services::{CountingEventLogger, LogEventLogger, PersistError, UserEventLogger, WallpaperPersister};
pub use wallpaper::{get_desktop_environment, DesktopPersister};
pub use workflow::{WallpaperCommitWorkflow, WorkflowPhase};
